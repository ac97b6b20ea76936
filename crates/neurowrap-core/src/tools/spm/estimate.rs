//! `estimate_model`: parameter estimation of a specified design

use super::{export_model, model_dir, model_file};
use crate::config::Environment;
use crate::descriptor::{FieldStyle, ParamDescriptor};
use crate::outputs::{ModelStructure, OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::tool::{JobPolicy, ToolDefinition};
use crate::value::{Choices, ParamKind};
use std::path::{Path, PathBuf};

fn in_model_dir(params: &ResolvedParams, file: &str) -> Option<OutputPaths> {
    model_dir(params, "spm_mat_file").map(|dir| OutputPaths::Single(dir.join(file)))
}

fn mask_image(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    in_model_dir(params, "mask.img")
}

fn residual_image(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    in_model_dir(params, "ResMS.img")
}

fn rpv_image(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    in_model_dir(params, "RPV.img")
}

fn spm_mat_file(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    model_dir(params, "spm_mat_file").map(|dir| OutputPaths::Single(model_file(&dir)))
}

fn estimated_model(params: &ResolvedParams, _env: &Environment) -> Option<PathBuf> {
    params.first_path("spm_mat_file")
}

/// Export the estimated model's file lists beside it
fn export_estimated(params: &ResolvedParams, _env: &Environment) -> Vec<String> {
    params
        .first_path("spm_mat_file")
        .map(|model| export_model(&model))
        .unwrap_or_default()
}

fn beta_images(model: &ModelStructure, dir: &Path) -> Vec<PathBuf> {
    model.beta_images(dir)
}

pub(super) fn definition() -> ToolDefinition {
    ToolDefinition::job(
        "estimate_model",
        JobPolicy {
            jobtype: "stats",
            jobname: "fmri_est",
            postscript: Some(export_estimated),
        },
    )
    .summary("Estimate the parameters of a specified model")
    .params(vec![
        ParamDescriptor::new("spm_mat_file", ParamKind::Path)
            .field("spmmat", FieldStyle::CellStr)
            .mandatory()
            .help("absolute path to SPM.mat"),
        ParamDescriptor::new(
            "estimation_method",
            ParamKind::Choice(Choices::Text(&["Classical", "Bayesian2", "Bayesian"])),
        )
        .field("method", FieldStyle::ChoiceStruct)
        .help("estimation method"),
        ParamDescriptor::new("flags", ParamKind::Record)
            .field("", FieldStyle::Merge)
            .help("extra job fields, written at the job root"),
    ])
    .outputs(vec![
        OutputRule::predicted("mask_image", mask_image),
        OutputRule::parsed("beta_images", estimated_model, beta_images),
        OutputRule::predicted("residual_image", residual_image),
        OutputRule::predicted("RPVimage", rpv_image),
        OutputRule::predicted("spm_mat_file", spm_mat_file),
    ])
}
