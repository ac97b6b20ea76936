//! `mcflirt`: motion correction of a 4D series

use super::{derive_in_cwd, glob_base, resolved_path, split_image_name, with_suffix};
use crate::config::Environment;
use crate::descriptor::{DeriveContext, ParamDescriptor, ValueFormat};
use crate::outputs::{GlobSpec, OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::tool::ToolDefinition;
use crate::value::{Choices, ParamKind, Value};

fn mcf(ctx: &DeriveContext<'_>) -> Option<Value> {
    derive_in_cwd(ctx, "infile", "_mcf")
}

fn outfile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "outfile")
}

fn when(
    params: &ResolvedParams,
    env: &Environment,
    flag: &str,
    suffix: &str,
) -> Option<OutputPaths> {
    if !params.flag(flag) {
        return None;
    }
    Some(OutputPaths::Single(with_suffix(
        params.path("outfile")?,
        suffix,
        env,
    )))
}

fn mean_img(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    when(params, env, "meanvol", "_mean_reg")
}

fn variance_img(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    when(params, env, "statsimgs", "_variance")
}

fn std_img(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    when(params, env, "statsimgs", "_sigma")
}

fn par_file(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    if !params.flag("saveplots") {
        return None;
    }
    let (dir, stem, _) = split_image_name(params.path("outfile")?);
    Some(OutputPaths::Single(dir.join(format!("{}.par", stem))))
}

fn mat_files(params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    if !params.flag("savemats") {
        return None;
    }
    let (dir, stem) = glob_base(params.path("outfile")?);
    Some(GlobSpec::new(
        env.cwd().join(dir),
        format!("{}.mat/MAT_*", stem),
    ))
}

pub(super) fn definition() -> ToolDefinition {
    ToolDefinition::argv("mcflirt", "mcflirt")
        .summary("Intra-modal motion correction")
        .params(vec![
            ParamDescriptor::new("infile", ParamKind::Path)
                .arg("-in")
                .mandatory()
                .help("timeseries to motion-correct"),
            ParamDescriptor::new("outfile", ParamKind::Path)
                .arg("-out")
                .derived(&["infile"], mcf)
                .help("corrected series; defaults to <infile>_mcf in the working directory"),
            ParamDescriptor::new(
                "cost",
                ParamKind::Choice(Choices::Text(&[
                    "mutualinfo",
                    "woods",
                    "corratio",
                    "normcorr",
                    "normmi",
                    "leastsquares",
                ])),
            )
            .arg("-cost"),
            ParamDescriptor::new("bins", ParamKind::Int).arg("-bins"),
            ParamDescriptor::new("dof", ParamKind::Int).arg("-dof"),
            ParamDescriptor::new("refvol", ParamKind::Int)
                .arg("-refvol")
                .help("volume to align frames to"),
            ParamDescriptor::new("scaling", ParamKind::Float)
                .separate("-scaling", ValueFormat::Fixed(2)),
            ParamDescriptor::new("smooth", ParamKind::Float)
                .separate("-smooth", ValueFormat::Fixed(2))
                .help("smoothing in the cost function"),
            ParamDescriptor::new("rotation", ParamKind::Int)
                .arg("-rotation")
                .help("scaling factor for rotation tolerances"),
            ParamDescriptor::new("verbose", ParamKind::Flag).switch("-verbose"),
            ParamDescriptor::new("stages", ParamKind::Int)
                .arg("-stages")
                .help("number of search stages (4 = sinc final interpolation)"),
            ParamDescriptor::new("init", ParamKind::Path)
                .arg("-init")
                .help("initial transformation matrix"),
            ParamDescriptor::new("usegradient", ParamKind::Flag)
                .switch("-gdt")
                .help("run search on gradient images"),
            ParamDescriptor::new("usecontour", ParamKind::Flag)
                .switch("-edge")
                .help("run search on contour images"),
            ParamDescriptor::new("meanvol", ParamKind::Flag)
                .switch("-meanvol")
                .help("register to the mean volume"),
            ParamDescriptor::new("statsimgs", ParamKind::Flag)
                .switch("-stats")
                .help("produce variance and std. dev. images"),
            ParamDescriptor::new("savemats", ParamKind::Flag)
                .switch("-mats")
                .help("save transformation matrices"),
            ParamDescriptor::new("saveplots", ParamKind::Flag)
                .switch("-plots")
                .help("save transformation parameters"),
            ParamDescriptor::new("report", ParamKind::Flag).switch("-report"),
        ])
        .outputs(vec![
            OutputRule::predicted("outfile", outfile),
            OutputRule::predicted("mean_img", mean_img),
            OutputRule::predicted("par_file", par_file),
            OutputRule::predicted("variance_img", variance_img),
            OutputRule::predicted("std_img", std_img),
            OutputRule::discovered("mat_files", mat_files),
        ])
}
