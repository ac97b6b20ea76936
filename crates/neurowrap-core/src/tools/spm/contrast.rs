//! `estimate_contrast`: contrasts over an estimated model
//!
//! The design matrix columns are only known inside the package, so the
//! script recovers condition names and session numbers from the column names
//! and fills each contrast vector by name. Images are written beside the
//! model file, and the model's file lists are exported there afterwards.

use super::{beside_model, export_model, model_dir, Consess};
use crate::config::Environment;
use crate::descriptor::ParamDescriptor;
use crate::outputs::{GlobSpec, ModelStructure, OutputPaths, OutputRule};
use crate::params::ResolvedParams;
use crate::script::matlab::{quote, quote_path};
use crate::script::ScriptBuilder;
use crate::tool::ToolDefinition;
use crate::value::{ParamKind, ScalarKind};
use std::path::{Path, PathBuf};

const CONDITION_PATTERN: &str = r"pat = 'Sn\([0-9*]\) (.*)';";
const CONDITION_PATTERN_NO_DERIVS: &str =
    r"pat = 'Sn\([0-9*]\) (.*)\*bf\(1\)|Sn\([0-9*]\) .*\*bf\([2-9]\)|Sn\([0-9*]\) (.*)';";
const SESSION_PATTERN: &str = r"pat1 = 'Sn\(([0-9].*)\)\s.*';";
const COLUMN_LOOP: &str = "for i0=1:numel(t),condnames{i0}='';condsess(i0)=0;if ~isempty(t{i0}{1}),condnames{i0} = t{i0}{1}{1};condsess(i0)=str2num(t1{i0}{1}{1});end;end;";

fn script(params: &ResolvedParams, _env: &Environment) -> Vec<String> {
    let mut script = ScriptBuilder::with_header();
    let spmmat = params
        .path("spm_mat_file")
        .map(quote_path)
        .unwrap_or_else(|| quote(""));
    let swd = model_dir(params, "spm_mat_file")
        .map(|dir| quote_path(&dir))
        .unwrap_or_else(|| quote(""));
    script
        .push(format!("jobs{{1}}.stats{{1}}.con.spmmat  = {{{}}};", spmmat))
        .push("load(jobs{1}.stats{1}.con.spmmat{:});")
        .push(format!("SPM.swd = {};", swd))
        .push("save(jobs{1}.stats{1}.con.spmmat{:},'SPM');")
        .push("names = SPM.xX.name;");

    if params.flag("ignore_derivs") {
        script.push(CONDITION_PATTERN_NO_DERIVS);
    } else {
        script.push(CONDITION_PATTERN);
    }
    script
        .push("t = regexp(names,pat,'tokens');")
        .push(SESSION_PATTERN)
        .push("t1 = regexp(names,pat1,'tokens');")
        .push(COLUMN_LOOP);

    let contrasts = params
        .get("contrasts")
        .and_then(|v| v.as_contrasts())
        .unwrap_or_default();
    script.extend(
        Consess {
            contrasts,
            lookup: "condnames",
            sessions: true,
            t_first: true,
        }
        .statements(),
    );
    script
        .push("jobs{1}.stats{1}.con.consess = consess;")
        .run_jobs();
    if let Some(model) = params.path("spm_mat_file") {
        script.extend(export_model(model));
    }
    script.finish()
}

fn model(params: &ResolvedParams, _env: &Environment) -> Option<PathBuf> {
    params.path("spm_mat_file").map(Path::to_path_buf)
}

fn con_images(model: &ModelStructure, dir: &Path) -> Vec<PathBuf> {
    model.con_images(dir)
}

fn spm_t_images(model: &ModelStructure, dir: &Path) -> Vec<PathBuf> {
    model.stat_images(dir)
}

fn ess_images(params: &ResolvedParams, _env: &Environment) -> Option<GlobSpec> {
    beside_model(params, "spm_mat_file", "ess*.img")
}

fn spm_f_images(params: &ResolvedParams, _env: &Environment) -> Option<GlobSpec> {
    beside_model(params, "spm_mat_file", "spmF*.img")
}

fn spm_mat_file(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    model(params, env).map(OutputPaths::Single)
}

pub(super) fn definition() -> ToolDefinition {
    ToolDefinition::script("estimate_contrast", script)
        .summary("Estimate contrasts of interest")
        .params(vec![
            ParamDescriptor::new("spm_mat_file", ParamKind::Path)
                .mandatory()
                .help("absolute path to SPM.mat"),
            ParamDescriptor::new("contrasts", ParamKind::Contrasts)
                .mandatory()
                .help("T and F contrasts; F components name T contrasts of the list"),
            ParamDescriptor::new("beta_images", ParamKind::list(ScalarKind::Path))
                .help("parameter estimates of the design matrix"),
            ParamDescriptor::new("residual_image", ParamKind::Path)
                .help("mean-squared image of the residuals"),
            ParamDescriptor::new("ignore_derivs", ParamKind::Flag)
                .default_value(true)
                .help("ignore derivative columns when matching conditions"),
        ])
        .outputs(vec![
            OutputRule::parsed("con_images", model, con_images),
            OutputRule::parsed("spmT_images", model, spm_t_images),
            OutputRule::discovered("ess_images", ess_images),
            OutputRule::discovered("spmF_images", spm_f_images),
            OutputRule::predicted("spm_mat_file", spm_mat_file),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile;
    use crate::config::WrapConfig;
    use crate::outputs::{OutputResolver, ResolveMode};
    use crate::params::ParameterSet;
    use crate::value::{Contrast, Value};
    use std::sync::Arc;

    fn bound(ignore_derivs: Option<bool>) -> ParameterSet {
        let mut set = ParameterSet::new(Arc::new(definition()));
        set.bind("spm_mat_file", "/study/SPM.mat").unwrap();
        set.bind(
            "contrasts",
            Value::from(vec![
                Contrast::t("Task>Baseline", &["Task-Odd", "Task-Even"], &[0.5, 0.5]),
                Contrast::t("Task-Odd>Task-Even", &["Task-Odd", "Task-Even"], &[1.0, -1.0]),
            ]),
        )
        .unwrap();
        if let Some(flag) = ignore_derivs {
            set.bind("ignore_derivs", flag).unwrap();
        }
        set
    }

    fn compiled(ignore_derivs: Option<bool>) -> Vec<String> {
        let env = Environment::with_cwd(&WrapConfig::default(), "/work");
        compile(&bound(ignore_derivs), &env)
            .unwrap()
            .statements()
            .unwrap()
            .to_vec()
    }

    #[test]
    fn images_are_written_beside_the_model() {
        let statements = compiled(None);
        assert_eq!(
            statements[2],
            "jobs{1}.stats{1}.con.spmmat  = {'/study/SPM.mat'};"
        );
        assert_eq!(statements[4], "SPM.swd = '/study';");
        assert!(!statements.iter().any(|s| s.contains("/work")));
        assert_eq!(statements[7], CONDITION_PATTERN_NO_DERIVS);
        assert!(statements.contains(&"consess{2}.tcon.convec(idx) = -1.000000;".to_string()));

        let export = export_model(Path::new("/study/SPM.mat"));
        let run = statements.len() - export.len();
        assert_eq!(&statements[run..], export.as_slice());
        assert_eq!(statements[run - 1], "spm_jobman('run',jobs);");
        assert_eq!(
            statements[run - 3],
            "jobs{1}.stats{1}.con.consess = consess;"
        );
    }

    #[test]
    fn f_images_are_discovered_beside_a_model_outside_the_working_directory() {
        let study = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        for file in ["ess_0001.img", "spmF_0001.img"] {
            std::fs::write(study.path().join(file), b"").unwrap();
        }
        std::fs::write(work.path().join("spmF_0002.img"), b"").unwrap();
        std::fs::write(
            study.path().join("SPM.json"),
            r#"{"contrasts": [{"name": "Eff", "con_file": "ess_0001.img", "stat_file": "spmF_0001.img"}]}"#,
        )
        .unwrap();

        let mut set = bound(None);
        set.bind("spm_mat_file", Value::path(study.path().join("SPM.mat")))
            .unwrap();
        let env = Environment::with_cwd(&WrapConfig::default(), work.path());
        let statements = compile(&set, &env).unwrap().statements().unwrap().to_vec();
        assert_eq!(statements[4], format!("SPM.swd = {};", quote_path(study.path())));

        let contract = OutputResolver::new()
            .resolve(&set, &env, ResolveMode::AfterRun)
            .unwrap();
        assert_eq!(
            contract.get("ess_images").unwrap().as_slice(),
            &[study.path().join("ess_0001.img")]
        );
        assert_eq!(
            contract.get("spmF_images").unwrap().as_slice(),
            &[study.path().join("spmF_0001.img")]
        );
        assert_eq!(
            contract.get("spmT_images").unwrap().as_slice(),
            &[study.path().join("spmF_0001.img")]
        );
        assert!(contract.unresolved.is_empty());
    }

    #[test]
    fn derivative_columns_kept_on_request() {
        let statements = compiled(Some(false));
        assert_eq!(statements[7], CONDITION_PATTERN);
    }
}
