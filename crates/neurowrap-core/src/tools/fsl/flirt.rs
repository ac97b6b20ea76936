//! `flirt`: affine registration, and `apply_xfm` built on it

use super::{derive_in_cwd, resolved_path};
use crate::config::Environment;
use crate::descriptor::{DefaultRule, DeriveContext, ParamDescriptor};
use crate::outputs::{OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::tool::{Specialization, ToolDefinition};
use crate::value::{Choices, ParamKind, ScalarKind, Value};
use std::sync::Arc;

const COSTS: Choices = Choices::Text(&[
    "mutualinfo",
    "corratio",
    "normcorr",
    "normmi",
    "leastsq",
    "labeldiff",
]);

const SEARCH_RANGE: ParamKind = ParamKind::Tuple {
    of: ScalarKind::Int,
    len: 2,
};

fn outfile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "outfile")
}

fn outmatrix(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "outmatrix")
}

pub(super) fn definition() -> ToolDefinition {
    ToolDefinition::argv("flirt", "flirt")
        .summary("Linear (affine) intra- and inter-modal registration")
        .params(vec![
            ParamDescriptor::new("infile", ParamKind::Path)
                .arg("-in")
                .mandatory()
                .help("input image"),
            ParamDescriptor::new("reference", ParamKind::Path)
                .arg("-ref")
                .mandatory()
                .help("reference image"),
            ParamDescriptor::new("inmatrix", ParamKind::Path)
                .arg("-init")
                .help("input 4x4 affine matrix"),
            ParamDescriptor::new("applyxfm", ParamKind::Flag)
                .switch("-applyxfm")
                .help("apply the transform from -init instead of estimating one"),
            ParamDescriptor::new("bins", ParamKind::Int)
                .arg("-bins")
                .help("number of histogram bins"),
            ParamDescriptor::new("cost", ParamKind::Choice(COSTS))
                .arg("-cost")
                .help("cost function"),
            ParamDescriptor::new("searchcost", ParamKind::Choice(COSTS))
                .arg("-searchcost")
                .help("cost function used during the search"),
            ParamDescriptor::new("dof", ParamKind::Int)
                .arg("-dof")
                .help("number of transform degrees of freedom"),
            ParamDescriptor::new("usesqform", ParamKind::Flag).switch("-usesqform"),
            ParamDescriptor::new(
                "datatype",
                ParamKind::Choice(Choices::Text(&["char", "short", "int", "float", "double"])),
            )
            .arg("-datatype")
            .help("force output data type"),
            ParamDescriptor::new("searchrx", SEARCH_RANGE)
                .arg("-searchrx")
                .help("angular search range about x, in degrees"),
            ParamDescriptor::new("searchry", SEARCH_RANGE)
                .arg("-searchry")
                .help("angular search range about y, in degrees"),
            ParamDescriptor::new("searchrz", SEARCH_RANGE)
                .arg("-searchrz")
                .help("angular search range about z, in degrees"),
            ParamDescriptor::new(
                "interp",
                ParamKind::Choice(Choices::Text(&["trilinear", "nearestneighbour", "sinc"])),
            )
            .arg("-interp")
            .help("final interpolation method"),
            ParamDescriptor::new("outfile", ParamKind::Path)
                .arg("-out")
                .help("registered output image"),
            ParamDescriptor::new("outmatrix", ParamKind::Path)
                .arg("-omat")
                .help("output affine matrix in 4x4 ascii format"),
            ParamDescriptor::new("args", ParamKind::Text)
                .raw()
                .help("additional arguments appended verbatim"),
        ])
        .outputs(vec![
            OutputRule::predicted("outfile", outfile),
            OutputRule::predicted("outmatrix", outmatrix),
        ])
}

fn axfm(ctx: &DeriveContext<'_>) -> Option<Value> {
    derive_in_cwd(ctx, "infile", "_axfm")
}

/// Apply a precomputed affine transform
pub(super) fn apply_xfm(flirt: Arc<ToolDefinition>) -> ToolDefinition {
    ToolDefinition::specialize(
        flirt,
        Specialization {
            name: "apply_xfm",
            summary: "Resample an image with an existing affine matrix",
            mandatory: &["infile", "reference", "inmatrix"],
            fixed: vec![("applyxfm", Value::Bool(true))],
            defaults: vec![(
                "outfile",
                DefaultRule::Derived {
                    inputs: &["infile"],
                    derive: axfm,
                },
            )],
            ..Default::default()
        },
    )
}
