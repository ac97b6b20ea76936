//! `fast`: tissue segmentation
//!
//! Options come first and the input images trail the command line. Every
//! output is discovered after the run by globbing next to the output basename
//! (or the first input when no basename is given).

use super::glob_base;
use crate::config::Environment;
use crate::descriptor::{ParamDescriptor, ValueFormat};
use crate::outputs::{GlobSpec, OutputRule};
use crate::params::ResolvedParams;
use crate::tool::ToolDefinition;
use crate::value::{Choices, ParamKind, ScalarKind};

fn basename_glob(params: &ResolvedParams, env: &Environment, suffix: &str) -> Option<GlobSpec> {
    let base = params
        .path("out_basename")
        .map(|p| p.to_path_buf())
        .or_else(|| params.first_path("infiles"))?;
    let (dir, stem) = glob_base(&base);
    Some(GlobSpec::new(env.cwd().join(dir), format!("{}{}", stem, suffix)))
}

fn tissue_class_files(params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    basename_glob(params, env, "_seg*")
}

fn partial_volume_files(params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    basename_glob(params, env, "_pve_*")
}

fn bias_field(params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    basename_glob(params, env, "_bias*")
}

fn restored_image(params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    basename_glob(params, env, "_restore*")
}

fn probability_maps(params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    basename_glob(params, env, "_prob_*")
}

fn mixeltype(params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    basename_glob(params, env, "_mixeltype*")
}

pub(super) fn definition() -> ToolDefinition {
    ToolDefinition::argv("fast", "fast")
        .summary("Segment a brain image into tissue classes")
        .params(vec![
            ParamDescriptor::new(
                "infiles",
                ParamKind::List {
                    of: ScalarKind::Path,
                    min_len: 1,
                },
            )
            .positional()
            .mandatory()
            .help("image(s) to segment"),
            ParamDescriptor::new("number_classes", ParamKind::Int)
                .arg("-n")
                .help("number of tissue-type classes"),
            ParamDescriptor::new("bias_iters", ParamKind::Int)
                .arg("-I")
                .help("number of main-loop iterations during bias-field removal"),
            ParamDescriptor::new("bias_lowpass", ParamKind::Int)
                .arg("-l")
                .help("bias field smoothing extent (FWHM) in mm"),
            ParamDescriptor::new("img_type", ParamKind::Choice(Choices::Int(&[1, 2, 3])))
                .arg("-t")
                .help("type of image: 1 = T1, 2 = T2, 3 = PD"),
            ParamDescriptor::new("init_seg_smooth", ParamKind::Float)
                .separate("-f", ValueFormat::Fixed(3))
                .help("initial segmentation spatial smoothness (during bias field estimation)"),
            ParamDescriptor::new("segments", ParamKind::Flag)
                .switch("-g")
                .help("output a separate binary image for each tissue type"),
            ParamDescriptor::new("init_transform", ParamKind::Path)
                .arg("-a")
                .help("standard-space to input transform, used to initialise priors"),
            ParamDescriptor::new(
                "other_priors",
                ParamKind::Tuple {
                    of: ScalarKind::Path,
                    len: 3,
                },
            )
            .arg("-A")
            .help("alternative prior images"),
            ParamDescriptor::new("nopve", ParamKind::Flag)
                .switch("--nopve")
                .help("turn off PVE (partial volume estimation)"),
            ParamDescriptor::new("output_biasfield", ParamKind::Flag)
                .switch("-b")
                .help("output estimated bias field"),
            ParamDescriptor::new("output_biascorrected", ParamKind::Flag)
                .switch("-B")
                .help("output restored image (bias-corrected image)"),
            ParamDescriptor::new("nobias", ParamKind::Flag)
                .switch("-N")
                .help("do not remove bias field"),
            ParamDescriptor::new("n_inputimages", ParamKind::Int)
                .arg("-S")
                .help("number of input images (channels)"),
            ParamDescriptor::new("out_basename", ParamKind::Path)
                .arg("-o")
                .help("base name of output files"),
            ParamDescriptor::new("use_priors", ParamKind::Flag)
                .switch("-P")
                .help("use priors throughout"),
            ParamDescriptor::new("segment_iters", ParamKind::Int)
                .arg("-W")
                .help("number of segmentation-initialisation iterations"),
            ParamDescriptor::new("mixel_smooth", ParamKind::Float)
                .separate("-R", ValueFormat::Fixed(2))
                .help("spatial smoothness for mixeltype"),
            ParamDescriptor::new("iters_afterbias", ParamKind::Int)
                .arg("-O")
                .help("number of main-loop iterations after bias-field removal"),
            ParamDescriptor::new("hyper", ParamKind::Float)
                .separate("-H", ValueFormat::Fixed(2))
                .help("segmentation spatial smoothness"),
            ParamDescriptor::new("verbose", ParamKind::Flag).switch("-v"),
            ParamDescriptor::new("manualseg", ParamKind::Path)
                .arg("-s")
                .help("filename containing intensities"),
            ParamDescriptor::new("probability_maps", ParamKind::Flag)
                .switch("-p")
                .help("output individual probability maps"),
        ])
        .trailing(&["infiles"])
        .outputs(vec![
            OutputRule::discovered("tissue_class_files", tissue_class_files),
            OutputRule::discovered("partial_volume_files", partial_volume_files),
            OutputRule::discovered("bias_field", bias_field),
            OutputRule::discovered("restored_image", restored_image),
            OutputRule::discovered("probability_maps", probability_maps),
            OutputRule::discovered("mixeltype", mixeltype),
        ])
}
