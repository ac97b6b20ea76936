//! `bet`: brain extraction

use super::{derive_in_cwd, resolved_path, with_suffix};
use crate::config::Environment;
use crate::descriptor::{DeriveContext, ParamDescriptor, ValueFormat};
use crate::outputs::{OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::tool::ToolDefinition;
use crate::value::{ParamKind, ScalarKind, Value};

/// The processing modes other than the one at `index`; at most one mode may be set
fn peers(index: usize) -> &'static [&'static str] {
    match index {
        0 => &["padding", "remove_eyes", "surfaces", "t2_guided", "functional", "reduce_bias"],
        1 => &["robust", "remove_eyes", "surfaces", "t2_guided", "functional", "reduce_bias"],
        2 => &["robust", "padding", "surfaces", "t2_guided", "functional", "reduce_bias"],
        3 => &["robust", "padding", "remove_eyes", "t2_guided", "functional", "reduce_bias"],
        4 => &["robust", "padding", "remove_eyes", "surfaces", "functional", "reduce_bias"],
        5 => &["robust", "padding", "remove_eyes", "surfaces", "t2_guided", "reduce_bias"],
        _ => &["robust", "padding", "remove_eyes", "surfaces", "t2_guided", "functional"],
    }
}

fn brain(ctx: &DeriveContext<'_>) -> Option<Value> {
    derive_in_cwd(ctx, "infile", "_brain")
}

fn outfile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    if params.flag("nooutput") {
        return None;
    }
    resolved_path(params, "outfile")
}

fn companion(
    params: &ResolvedParams,
    env: &Environment,
    flag: &str,
    suffix: &str,
) -> Option<OutputPaths> {
    if !params.flag(flag) {
        return None;
    }
    let out = params.path("outfile")?;
    Some(OutputPaths::Single(with_suffix(out, suffix, env)))
}

fn mask_file(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    companion(params, env, "mask", "_mask")
}

fn outline_file(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    companion(params, env, "outline", "_overlay")
}

fn skull_file(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    companion(params, env, "skull", "_skull")
}

fn meshfile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    if !params.flag("mesh") {
        return None;
    }
    let (dir, stem, _) = super::split_image_name(params.path("outfile")?);
    Some(OutputPaths::Single(dir.join(format!("{}_mesh.vtk", stem))))
}

pub(super) fn definition() -> ToolDefinition {
    ToolDefinition::argv("bet", "bet")
        .summary("Skull-strip an image")
        .params(vec![
            ParamDescriptor::new("infile", ParamKind::Path)
                .positional()
                .mandatory()
                .help("input image"),
            ParamDescriptor::new("outfile", ParamKind::Path)
                .positional()
                .derived(&["infile"], brain)
                .help("output image; defaults to <infile>_brain in the working directory"),
            ParamDescriptor::new("outline", ParamKind::Flag)
                .switch("-o")
                .help("generate brain surface outline overlaid onto the original image"),
            ParamDescriptor::new("mask", ParamKind::Flag)
                .switch("-m")
                .help("generate binary brain mask"),
            ParamDescriptor::new("skull", ParamKind::Flag)
                .switch("-s")
                .help("generate approximate skull image"),
            ParamDescriptor::new("nooutput", ParamKind::Flag)
                .switch("-n")
                .help("don't generate segmented output"),
            ParamDescriptor::new("frac", ParamKind::Float)
                .separate("-f", ValueFormat::Fixed(2))
                .help("fractional intensity threshold"),
            ParamDescriptor::new("vertical_gradient", ParamKind::Float)
                .separate("-g", ValueFormat::Fixed(2))
                .help("vertical gradient in fractional intensity threshold (-1, 1)"),
            ParamDescriptor::new("radius", ParamKind::Int)
                .arg("-r")
                .help("head radius"),
            ParamDescriptor::new(
                "center",
                ParamKind::Tuple {
                    of: ScalarKind::Int,
                    len: 3,
                },
            )
            .arg("-c")
            .help("center of gravity in voxels"),
            ParamDescriptor::new("threshold", ParamKind::Flag)
                .switch("-t")
                .help("apply thresholding to segmented brain image and mask"),
            ParamDescriptor::new("mesh", ParamKind::Flag)
                .switch("-e")
                .help("generate a vtk mesh brain surface"),
            ParamDescriptor::new("verbose", ParamKind::Flag).switch("-v"),
            ParamDescriptor::new("robust", ParamKind::Flag)
                .switch("-R")
                .exclusive_with(peers(0))
                .help("robust brain centre estimation"),
            ParamDescriptor::new("padding", ParamKind::Flag)
                .switch("-Z")
                .exclusive_with(peers(1))
                .help("improve BET if FOV is very small in Z"),
            ParamDescriptor::new("remove_eyes", ParamKind::Flag)
                .switch("-S")
                .exclusive_with(peers(2))
                .help("eye and optic nerve cleanup"),
            ParamDescriptor::new("surfaces", ParamKind::Flag)
                .switch("-A")
                .exclusive_with(peers(3))
                .help("run bet2 and then betsurf to get additional skull and scalp surfaces"),
            ParamDescriptor::new("t2_guided", ParamKind::Path)
                .arg("-A2")
                .exclusive_with(peers(4))
                .help("as with surfaces, when also feeding in a T2 image"),
            ParamDescriptor::new("functional", ParamKind::Flag)
                .switch("-F")
                .exclusive_with(peers(5))
                .help("apply to 4D FMRI data"),
            ParamDescriptor::new("reduce_bias", ParamKind::Flag)
                .switch("-B")
                .exclusive_with(peers(6))
                .help("bias field and neck cleanup"),
        ])
        .positional(&["infile", "outfile"])
        .outputs(vec![
            OutputRule::predicted("outfile", outfile),
            OutputRule::predicted("mask_file", mask_file),
            OutputRule::predicted("outline_file", outline_file),
            OutputRule::predicted("meshfile", meshfile),
            OutputRule::predicted("skull_file", skull_file),
        ])
}
