//! `fnirt`: nonlinear registration, and `apply_warp`
//!
//! Both take `--flag=value` arguments; list parameters are comma joined.

use super::{derive_in_cwd, resolved_path};
use crate::config::Environment;
use crate::descriptor::{DeriveContext, ParamDescriptor, ValueFormat};
use crate::outputs::{OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::tool::ToolDefinition;
use crate::value::{Choices, ParamKind, ScalarKind, Value};

const INTS: ParamKind = ParamKind::list(ScalarKind::Int);
const FLOATS: ParamKind = ParamKind::list(ScalarKind::Float);

fn file(name: &'static str, flag: &'static str, help: &'static str) -> ParamDescriptor {
    ParamDescriptor::new(name, ParamKind::Path)
        .joined(flag, ValueFormat::Plain)
        .help(help)
}

fn fieldcoeff_file(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "fieldcoeff_file")
}

fn outimage(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "outimage")
}

fn fieldfile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "fieldfile")
}

fn jacobianfile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "jacobianfile")
}

fn reffile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "reffile")
}

fn intensityfile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "intensityfile")
}

fn logfile(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "logfile")
}

pub(super) fn definition() -> ToolDefinition {
    ToolDefinition::argv("fnirt", "fnirt")
        .summary("Nonlinear registration")
        .params(vec![
            file("infile", "--in", "image to register").mandatory(),
            file("reference", "--ref", "reference image").mandatory(),
            file("affine", "--aff", "affine matrix to use"),
            file("initwarp", "--inwarp", "initial non-linear warps"),
            file("initintensity", "--intin", "initial intensity mapping"),
            file("configfile", "--config", "file with parameter settings"),
            file("referencemask", "--refmask", "reference image mask"),
            file("imagemask", "--inmask", "input image mask"),
            file("fieldcoeff_file", "--cout", "output field coefficients"),
            file("outimage", "--iout", "warped input image"),
            file("fieldfile", "--fout", "output displacement field"),
            file("jacobianfile", "--jout", "jacobian of the field"),
            file("reffile", "--refout", "intensity modulated reference"),
            file("intensityfile", "--intout", "intensity mapping coefficients"),
            file("logfile", "--logout", "log file"),
            ParamDescriptor::new("verbose", ParamKind::Flag).switch("--verbose"),
            ParamDescriptor::new("sub_sampling", INTS)
                .joined("--subsamp", ValueFormat::Plain)
                .help("sub-sampling scheme, one level per entry"),
            ParamDescriptor::new("max_iter", INTS)
                .joined("--miter", ValueFormat::Plain)
                .help("max iterations per sub-sampling level"),
            ParamDescriptor::new("referencefwhm", INTS)
                .joined("--reffwhm", ValueFormat::Plain)
                .help("reference smoothing (mm) per level"),
            ParamDescriptor::new("imgfwhm", INTS)
                .joined("--infwhm", ValueFormat::Plain)
                .help("input smoothing (mm) per level"),
            ParamDescriptor::new("lambdas", INTS)
                .joined("--lambda", ValueFormat::Plain)
                .help("regularisation weight per level"),
            ParamDescriptor::new("estintensity", INTS)
                .joined("--estint", ValueFormat::Plain)
                .help("whether to estimate intensity mapping, per level"),
            ParamDescriptor::new("applyrefmask", FLOATS)
                .joined("--applyrefmask", ValueFormat::Fixed(6))
                .help("use the reference mask, per level"),
            ParamDescriptor::new("applyimgmask", FLOATS)
                .joined("--applyinmask", ValueFormat::Fixed(6))
                .help("use the input mask, per level"),
            ParamDescriptor::new("flags", ParamKind::Text)
                .raw()
                .help("additional arguments appended verbatim"),
        ])
        .outputs(vec![
            OutputRule::predicted("fieldcoeff_file", fieldcoeff_file),
            OutputRule::predicted("outimage", outimage),
            OutputRule::predicted("fieldfile", fieldfile),
            OutputRule::predicted("jacobianfile", jacobianfile),
            OutputRule::predicted("reffile", reffile),
            OutputRule::predicted("intensityfile", intensityfile),
            OutputRule::predicted("logfile", logfile),
        ])
}

fn warp(ctx: &DeriveContext<'_>) -> Option<Value> {
    derive_in_cwd(ctx, "infile", "_warp")
}

fn warped(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    resolved_path(params, "outfile")
}

pub(super) fn apply_warp() -> ToolDefinition {
    ToolDefinition::argv("apply_warp", "applywarp")
        .summary("Apply a warp field to an image")
        .params(vec![
            file("infile", "--in", "image to be warped").mandatory(),
            file("outfile", "--out", "output image; defaults to <infile>_warp")
                .derived(&["infile"], warp),
            file("reference", "--ref", "reference image").mandatory(),
            file("fieldfile", "--warp", "warp field or coefficients").mandatory(),
            file("premat", "--premat", "affine applied before the warp"),
            file("postmat", "--postmat", "affine applied after the warp"),
            ParamDescriptor::new(
                "interp",
                ParamKind::Choice(Choices::Text(&["nn", "trilinear", "sinc", "spline"])),
            )
            .joined("--interp", ValueFormat::Plain)
            .help("interpolation method"),
        ])
        .outputs(vec![OutputRule::predicted("outfile", warped)])
}
