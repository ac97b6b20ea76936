//! Combined second-level analyses
//!
//! Each tool writes a three-job script: specify a factorial design in the
//! working directory, estimate it, then estimate contrasts on it.

use super::{cwd_glob, cwd_model, cwd_model_output, model_file, Consess};
use crate::config::Environment;
use crate::descriptor::ParamDescriptor;
use crate::outputs::{GlobSpec, ModelStructure, OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::script::matlab::{fixed6, quote, quote_path};
use crate::script::ScriptBuilder;
use crate::tool::ToolDefinition;
use crate::value::{ParamKind, ScalarKind, Value};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const IMAGES: ParamKind = ParamKind::List {
    of: ScalarKind::Path,
    min_len: 1,
};

const DESIGN: &str = "jobs{1}.stats{1}.factorial_design";

/// Header and the design directory; the caller adds the design body
fn design_setup(env: &Environment) -> ScriptBuilder {
    let mut script = ScriptBuilder::with_header();
    script
        .blank()
        .comment("Setup Design;")
        .push(format!("{}.dir  = {{{}}};", DESIGN, quote_path(env.cwd())));
    script
}

/// Estimation job and the contrast job's model reference
fn estimate_and_contrast(script: &mut ScriptBuilder, env: &Environment) {
    let model = quote_path(&model_file(env.cwd()));
    script
        .blank()
        .comment("Estimate Model;")
        .push(format!("jobs{{2}}.stats{{1}}.fmri_est(1).spmmat = {{{}}};", model))
        .blank()
        .comment("Estimate Contrast;")
        .push(format!("jobs{{3}}.stats{{1}}.con.spmmat = {{{}}};", model));
}

fn one_sample_script(params: &ResolvedParams, env: &Environment) -> Vec<String> {
    let images = params.paths("con_images");
    let mut script = design_setup(env);
    script.push(format!("{}.des.t1.scans = {{}};", DESIGN));
    for image in &images {
        script.push(format!(
            "{}.des.t1.scans{{end+1}} = {};",
            DESIGN,
            quote_path(image)
        ));
    }
    estimate_and_contrast(&mut script, env);

    let name = images
        .last()
        .and_then(|image| image.file_stem())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    script
        .push(format!(
            "jobs{{3}}.stats{{1}}.con.consess{{1}}.tcon.name = {};",
            quote(&name)
        ))
        .push("jobs{3}.stats{1}.con.consess{1}.tcon.convec = [1];")
        .run_jobs();
    script.finish()
}

fn con_glob(_params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    Some(cwd_glob("con*.img", env))
}

fn spm_t_glob(_params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    Some(cwd_glob("spmT*.img", env))
}

pub(super) fn one_sample() -> ToolDefinition {
    ToolDefinition::script("one_sample_ttest", one_sample_script)
        .summary("One-sample t-test on a set of contrast images")
        .params(vec![ParamDescriptor::new("con_images", IMAGES)
            .mandatory()
            .help("contrast images")])
        .outputs(vec![
            OutputRule::discovered("con_images", con_glob),
            OutputRule::discovered("spmT_images", spm_t_glob),
        ])
}

/// Fixed contrasts of the two-sample test: each group, and both differences
const GROUP_CONTRASTS: &[(&str, &str)] = &[
    ("Group 1", "[1 0]"),
    ("Group 2", "[0 1]"),
    ("Group 1 - Group 2", "[1 -1]"),
    ("Group 2 - Group 1", "[-1 1]"),
];

fn two_sample_script(params: &ResolvedParams, env: &Environment) -> Vec<String> {
    let mut script = design_setup(env);
    for (field, param) in [("scans1", "images_group1"), ("scans2", "images_group2")] {
        script.push(format!("{}.des.t2.{} = {{}};", DESIGN, field));
        for image in params.paths(param) {
            script.push(format!(
                "{}.des.t2.{}{{end+1,1}} = {};",
                DESIGN,
                field,
                quote_path(&image)
            ));
        }
    }
    for (field, param) in [("dept", "dependent"), ("variance", "unequal_variance")] {
        if let Some(flag) = params.get(param).and_then(Value::as_bool) {
            script.push(format!("{}.des.t2.{} = {};", DESIGN, field, u8::from(flag)));
        }
    }
    estimate_and_contrast(&mut script, env);

    for (i, (name, convec)) in GROUP_CONTRASTS.iter().enumerate() {
        script
            .push(format!(
                "jobs{{3}}.stats{{1}}.con.consess{{{}}}.tcon.name = {};",
                i + 1,
                quote(name)
            ))
            .push(format!(
                "jobs{{3}}.stats{{1}}.con.consess{{{}}}.tcon.convec = {};",
                i + 1,
                convec
            ));
    }
    script.run_jobs();
    script.finish()
}

fn numbered(env: &Environment, prefix: &str) -> OutputPaths {
    OutputPaths::Many(
        (1..=GROUP_CONTRASTS.len())
            .map(|i| env.cwd().join(format!("{}{:04}.img", prefix, i)))
            .collect(),
    )
}

fn group_con_images(_params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    Some(numbered(env, "con"))
}

fn group_spm_t_images(_params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    Some(numbered(env, "spmT"))
}

pub(super) fn two_sample() -> ToolDefinition {
    ToolDefinition::script("two_sample_ttest", two_sample_script)
        .summary("Two-sample t-test between two groups of images")
        .params(vec![
            ParamDescriptor::new("images_group1", IMAGES)
                .mandatory()
                .help("contrast images of group 1"),
            ParamDescriptor::new("images_group2", IMAGES)
                .mandatory()
                .help("contrast images of group 2"),
            ParamDescriptor::new("dependent", ParamKind::Flag)
                .help("measurements are dependent between levels"),
            ParamDescriptor::new("unequal_variance", ParamKind::Flag)
                .help("variances differ between groups"),
        ])
        .outputs(vec![
            OutputRule::predicted("con_images", group_con_images),
            OutputRule::predicted("spmT_images", group_spm_t_images),
        ])
}

/// One regression covariate
#[derive(Debug, Clone, PartialEq)]
struct Covariate {
    name: String,
    centering: i64,
    vector: Vec<f64>,
}

fn column<'a>(fields: &'a BTreeMap<String, Value>, key: &str) -> &'a [Value] {
    fields
        .get(key)
        .and_then(Value::as_list)
        .unwrap_or_default()
}

/// Split the `{names, centering, vectors}` record into per-covariate entries
fn split_covariates(record: &Value) -> Vec<Covariate> {
    let Some(fields) = record.as_record() else {
        return Vec::new();
    };
    let names = column(fields, "names");
    let centering = column(fields, "centering");
    let vectors = column(fields, "vectors");

    names
        .iter()
        .enumerate()
        .map(|(i, name)| Covariate {
            name: name.as_text().unwrap_or_default().to_string(),
            centering: centering.get(i).and_then(Value::as_int).unwrap_or(1),
            vector: vectors
                .get(i)
                .and_then(Value::as_list)
                .map(|values| values.iter().filter_map(Value::as_float).collect())
                .unwrap_or_default(),
        })
        .collect()
}

fn regression_script(params: &ResolvedParams, env: &Environment) -> Vec<String> {
    let mreg = format!("{}.des.mreg", DESIGN);
    let mut script = design_setup(env);
    script.push(format!("{}.scans = {{}};", mreg));
    for image in params.paths("images") {
        script.push(format!("{}.scans{{end+1,1}} = {};", mreg, quote_path(&image)));
    }
    script.push(format!("{}.mcov = [];", mreg));

    let covariates = params.get("covariates").map(split_covariates).unwrap_or_default();
    for (i, covariate) in covariates.iter().enumerate() {
        script
            .push(format!("names{{{}}} = {};", i + 1, quote(&covariate.name)))
            .push(format!(
                "{}.mcov(end+1,1).cname = {};",
                mreg,
                quote(&covariate.name)
            ))
            .push(format!("{}.mcov(end,1).iCC = {};", mreg, covariate.centering));
        for (j, value) in covariate.vector.iter().enumerate() {
            script.push(format!(
                "{}.mcov(end,1).c({},1) = {};",
                mreg,
                j + 1,
                fixed6(*value)
            ));
        }
    }

    let intercept = params.flag("include_intercept");
    if intercept {
        script.push("names{end+1} = 'mean';");
    }
    script.push(format!("{}.incint = {};", mreg, u8::from(intercept)));
    estimate_and_contrast(&mut script, env);

    let contrasts = params
        .get("contrasts")
        .and_then(|v| v.as_contrasts())
        .unwrap_or_default();
    script
        .extend(
            Consess {
                contrasts,
                lookup: "names",
                sessions: false,
                t_first: false,
            }
            .statements(),
        )
        .push("jobs{3}.stats{1}.con.consess = consess;")
        .run_jobs();
    script.finish()
}

fn con_images(model: &ModelStructure, dir: &Path) -> Vec<PathBuf> {
    model.con_images(dir)
}

fn stat_images(model: &ModelStructure, dir: &Path) -> Vec<PathBuf> {
    model.stat_images(dir)
}

fn ess_glob(_params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    Some(cwd_glob("ess*.img", env))
}

fn spm_f_glob(_params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
    Some(cwd_glob("spmF*.img", env))
}

pub(super) fn multiple_regression() -> ToolDefinition {
    ToolDefinition::script("multiple_regression", regression_script)
        .summary("Multiple regression of images on covariates")
        .params(vec![
            ParamDescriptor::new("images", IMAGES)
                .mandatory()
                .help("contrast images"),
            ParamDescriptor::new("covariates", ParamKind::Record)
                .mandatory()
                .help("{\"names\": [...], \"centering\": [...], \"vectors\": [[...], ...]}"),
            ParamDescriptor::new("contrasts", ParamKind::Contrasts)
                .mandatory()
                .help("contrasts over covariate names (and 'mean')"),
            ParamDescriptor::new("include_intercept", ParamKind::Flag)
                .default_value(true)
                .help("include an intercept in the model"),
        ])
        .outputs(vec![
            OutputRule::parsed("con_images", cwd_model, con_images),
            OutputRule::parsed("spmT_images", cwd_model, stat_images),
            OutputRule::discovered("ess_images", ess_glob),
            OutputRule::discovered("spmF_images", spm_f_glob),
            OutputRule::predicted("spm_mat_file", cwd_model_output),
        ])
}
