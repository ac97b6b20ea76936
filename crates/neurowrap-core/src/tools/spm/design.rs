//! Design specification: first-level fMRI models and factorial designs

use super::{model_file, working_dir};
use crate::config::Environment;
use crate::descriptor::{FieldStyle, ParamDescriptor};
use crate::outputs::{OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::script::matlab;
use crate::tool::{JobPolicy, Specialization, ToolDefinition};
use crate::value::{Choices, ParamKind, ScalarKind};
use std::sync::Arc;

const COVARIATE_FIELDS: &[(&str, &str)] = &[
    ("name", "cname"),
    ("vector", "c"),
    ("interaction", "iCFI"),
    ("centering", "iCC"),
];

const SCANS: ParamKind = ParamKind::List {
    of: ScalarKind::Path,
    min_len: 2,
};

fn output_dir() -> ParamDescriptor {
    ParamDescriptor::new("spm_mat_dir", ParamKind::Path)
        .field("dir", FieldStyle::CellStr)
        .derived(&[], working_dir)
        .help("directory to store SPM.mat in; defaults to the working directory")
}

fn spm_mat_file(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
    params
        .path("spm_mat_dir")
        .map(|dir| OutputPaths::Single(model_file(dir)))
}

/// Explicit masking the job interface cannot express: swap in the mask
/// volume and threshold after the design has been written.
fn explicit_mask(params: &ResolvedParams, _env: &Environment) -> Vec<String> {
    let Some(mask) = params.path("mask_image") else {
        return Vec::new();
    };
    let threshold = params.float("mask_threshold").unwrap_or(f64::NEG_INFINITY);
    vec![
        "load SPM;".to_string(),
        format!("SPM.xM.VM = spm_vol({});", matlab::quote_path(mask)),
        "SPM.xM.I = 0;".to_string(),
        "SPM.xM.T = [];".to_string(),
        format!(
            "SPM.xM.TH = ones(size(SPM.xM.TH))*({});",
            matlab::float(threshold)
        ),
        "SPM.xM.xs = struct('Masking', 'explicit masking only');".to_string(),
        "save SPM SPM;".to_string(),
    ]
}

pub(super) fn level1_design() -> ToolDefinition {
    ToolDefinition::job(
        "level1_design",
        JobPolicy {
            jobtype: "stats",
            jobname: "fmri_spec",
            postscript: Some(explicit_mask),
        },
    )
    .summary("Specify a first-level fMRI design matrix")
    .params(vec![
        output_dir(),
        ParamDescriptor::new(
            "timing_units",
            ParamKind::Choice(Choices::Text(&["secs", "scans"])),
        )
        .field("timing.units", FieldStyle::Literal)
        .help("units for specification of onsets"),
        ParamDescriptor::new("interscan_interval", ParamKind::Float)
            .field("timing.RT", FieldStyle::Literal)
            .help("interscan interval in seconds"),
        ParamDescriptor::new("microtime_resolution", ParamKind::Int)
            .field("timing.fmri_t", FieldStyle::Literal)
            .help("number of time-bins per scan"),
        ParamDescriptor::new("microtime_onset", ParamKind::Float)
            .field("timing.fmri_t0", FieldStyle::Literal)
            .help("onset time-bin used for alignment"),
        ParamDescriptor::new("session_info", ParamKind::RecordList)
            .field("sess", FieldStyle::Literal)
            .help("one record per session: scans, conditions, regressors, hpf"),
        ParamDescriptor::new("factor_info", ParamKind::RecordList)
            .field("fact", FieldStyle::Literal)
            .help("factor records with name and levels"),
        ParamDescriptor::new("bases", ParamKind::Record)
            .field("bases", FieldStyle::Literal)
            .help("basis set, e.g. {\"hrf\": {\"derivs\": [0, 0]}}"),
        ParamDescriptor::new(
            "volterra_expansion_order",
            ParamKind::Choice(Choices::Int(&[1, 2])),
        )
        .field("volt", FieldStyle::Literal)
        .help("model interactions: 1 = no, 2 = yes"),
        ParamDescriptor::new(
            "global_intensity_normalization",
            ParamKind::Choice(Choices::Text(&["none", "scaling"])),
        )
        .field("global", FieldStyle::Literal),
        ParamDescriptor::new("mask_image", ParamKind::Path)
            .field("mask", FieldStyle::CellStr)
            .help("image for explicitly masking the analysis"),
        ParamDescriptor::new("mask_threshold", ParamKind::Float)
            .default_value(f64::NEG_INFINITY)
            .help("threshold applied to the explicit mask"),
        ParamDescriptor::new(
            "model_serial_correlations",
            ParamKind::Choice(Choices::Text(&["AR(1)", "none"])),
        )
        .field("cvi", FieldStyle::Literal),
    ])
    .outputs(vec![OutputRule::predicted("spm_mat_file", spm_mat_file)])
}

pub(super) fn factorial_design() -> ToolDefinition {
    ToolDefinition::job(
        "factorial_design",
        JobPolicy {
            jobtype: "stats",
            jobname: "factorial_design",
            postscript: None,
        },
    )
    .summary("Second-level factorial design")
    .params(vec![
        output_dir(),
        ParamDescriptor::new("covariates", ParamKind::RecordList)
            .field("cov", FieldStyle::Renamed(COVARIATE_FIELDS))
            .help("covariate records {vector, name, interaction, centering}"),
        ParamDescriptor::new("threshold_mask_none", ParamKind::Flag)
            .field("masking.tm.tm_none", FieldStyle::Literal)
            .exclusive_with(&["threshold_mask_absolute", "threshold_mask_relative"])
            .help("do not use threshold masking"),
        ParamDescriptor::new("threshold_mask_absolute", ParamKind::Float)
            .field("masking.tm.tma.athresh", FieldStyle::Literal)
            .exclusive_with(&["threshold_mask_none", "threshold_mask_relative"])
            .help("use an absolute threshold"),
        ParamDescriptor::new("threshold_mask_relative", ParamKind::Float)
            .field("masking.tm.tmr.rthresh", FieldStyle::Literal)
            .exclusive_with(&["threshold_mask_none", "threshold_mask_absolute"])
            .help("threshold using a proportion of the global value"),
        ParamDescriptor::new("use_implicit_threshold", ParamKind::Flag)
            .field("masking.im", FieldStyle::Literal)
            .help("use an implicit mask of NaNs or zeros"),
        ParamDescriptor::new("explicit_mask_file", ParamKind::Path)
            .field("masking.em", FieldStyle::CellStr)
            .help("explicit mask image"),
        ParamDescriptor::new("global_calc_omit", ParamKind::Flag)
            .field("globalc.g_omit", FieldStyle::Literal)
            .exclusive_with(&["global_calc_mean", "global_calc_values"])
            .help("omit global calculation"),
        ParamDescriptor::new("global_calc_mean", ParamKind::Flag)
            .field("globalc.g_mean", FieldStyle::Literal)
            .exclusive_with(&["global_calc_omit", "global_calc_values"])
            .help("use the mean for global calculation"),
        ParamDescriptor::new("global_calc_values", ParamKind::list(ScalarKind::Float))
            .field("globalc.g_user.global_uval", FieldStyle::Literal)
            .exclusive_with(&["global_calc_omit", "global_calc_mean"])
            .help("user-specified global values"),
        ParamDescriptor::new("no_grand_mean_scaling", ParamKind::Flag)
            .field("globalm.gmsca.gmsca_no", FieldStyle::Literal)
            .help("do not perform grand mean scaling"),
        ParamDescriptor::new(
            "global_normalization",
            ParamKind::Choice(Choices::Int(&[1, 2, 3])),
        )
        .field("globalm.glonorm", FieldStyle::Literal)
        .help("global normalisation: 1 = none, 2 = proportional, 3 = ANCOVA"),
    ])
    .outputs(vec![OutputRule::predicted("spm_mat_file", spm_mat_file)])
}

pub(super) fn one_sample_ttest_design(factorial: Arc<ToolDefinition>) -> ToolDefinition {
    ToolDefinition::specialize(
        factorial,
        Specialization {
            name: "one_sample_ttest_design",
            summary: "Factorial design for a one-sample t-test",
            extra: vec![ParamDescriptor::new("in_files", SCANS)
                .field("des.t1.scans", FieldStyle::CellStr)
                .mandatory()
                .help("input images, at least two")],
            ..Default::default()
        },
    )
}

pub(super) fn two_sample_ttest_design(factorial: Arc<ToolDefinition>) -> ToolDefinition {
    ToolDefinition::specialize(
        factorial,
        Specialization {
            name: "two_sample_ttest_design",
            summary: "Factorial design for a two-sample t-test",
            extra: vec![
                ParamDescriptor::new("group1_files", SCANS)
                    .field("des.t2.scans1", FieldStyle::CellStr)
                    .mandatory()
                    .help("group 1 images, at least two"),
                ParamDescriptor::new("group2_files", SCANS)
                    .field("des.t2.scans2", FieldStyle::CellStr)
                    .mandatory()
                    .help("group 2 images, at least two"),
                ParamDescriptor::new("dependent", ParamKind::Flag)
                    .field("des.t2.dept", FieldStyle::Literal)
                    .help("measurements are dependent between levels"),
                ParamDescriptor::new("unequal_variance", ParamKind::Flag)
                    .field("des.t2.variance", FieldStyle::Literal)
                    .help("variances differ between groups"),
            ],
            ..Default::default()
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::config::WrapConfig;
    use crate::params::ParameterSet;
    use crate::value::Value;

    fn env() -> Environment {
        Environment::with_cwd(&WrapConfig::default(), "/work")
    }

    #[test]
    fn level1_fields_go_under_the_job_prefix() {
        let mut set = ParameterSet::new(Arc::new(level1_design()));
        set.bind("timing_units", "secs").unwrap();
        set.bind("interscan_interval", 2.5).unwrap();
        set.bind(
            "bases",
            Value::record([("hrf", Value::record([("derivs", Value::from(vec![0, 0]))]))]),
        )
        .unwrap();
        let command = compile(&set, &env()).unwrap();
        let statements = command.statements().unwrap();

        assert!(statements.contains(&"jobs{1}.stats{1}.fmri_spec.dir = {'/work'};".to_string()));
        assert!(statements.contains(&"jobs{1}.stats{1}.fmri_spec.timing.units = 'secs';".to_string()));
        assert!(statements.contains(&"jobs{1}.stats{1}.fmri_spec.timing.RT = 2.5;".to_string()));
        assert!(statements
            .contains(&"jobs{1}.stats{1}.fmri_spec.bases.hrf.derivs = [0 0];".to_string()));
        assert!(!statements.iter().any(|s| s.contains("mask_threshold") || s.contains("SPM.xM")));
    }

    #[test]
    fn explicit_mask_appends_postscript() {
        let mut set = ParameterSet::new(Arc::new(level1_design()));
        set.bind("mask_image", "/data/mask.nii").unwrap();
        let command = compile(&set, &env()).unwrap();
        let statements = command.statements().unwrap();

        let run = statements
            .iter()
            .position(|s| s == "spm_jobman('run',jobs);")
            .unwrap();
        assert_eq!(statements[run + 1], "load SPM;");
        assert_eq!(statements[run + 2], "SPM.xM.VM = spm_vol('/data/mask.nii');");
        assert!(statements.contains(&"SPM.xM.TH = ones(size(SPM.xM.TH))*(-Inf);".to_string()));
        assert_eq!(statements.last().map(String::as_str), Some("save SPM SPM;"));
    }

    #[test]
    fn covariate_keys_are_renamed() {
        let mut set = ParameterSet::new(Arc::new(factorial_design()));
        set.bind(
            "covariates",
            Value::record([
                ("name", Value::from("age")),
                ("vector", Value::from(vec![21, 34])),
            ]),
        )
        .unwrap();
        let statements = compile(&set, &env()).unwrap().statements().unwrap().to_vec();
        assert!(statements
            .contains(&"jobs{1}.stats{1}.factorial_design.cov(1).cname = 'age';".to_string()));
        assert!(statements
            .contains(&"jobs{1}.stats{1}.factorial_design.cov(1).c = [21 34];".to_string()));
    }

    #[test]
    fn relative_threshold_mask_has_its_own_field() {
        let mut set = ParameterSet::new(Arc::new(factorial_design()));
        set.bind("threshold_mask_relative", 0.8).unwrap();
        let statements = compile(&set, &env()).unwrap().statements().unwrap().to_vec();
        assert!(statements.contains(
            &"jobs{1}.stats{1}.factorial_design.masking.tm.tmr.rthresh = 0.8;".to_string()
        ));
    }

    #[test]
    fn one_sample_design_needs_two_scans() {
        let tool = Arc::new(one_sample_ttest_design(Arc::new(factorial_design())));
        let mut set = ParameterSet::new(Arc::clone(&tool));
        assert!(set.bind("in_files", Value::paths(["a.nii"])).is_err());
        set.bind("in_files", Value::paths(["a.nii", "b.nii"])).unwrap();
        let statements = compile(&set, &env()).unwrap().statements().unwrap().to_vec();
        assert!(statements.contains(
            &"jobs{1}.stats{1}.factorial_design.des.t1.scans = {'a.nii';'b.nii'};".to_string()
        ));
    }
}
