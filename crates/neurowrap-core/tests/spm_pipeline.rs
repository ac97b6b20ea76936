//! End-to-end runs of the statistical tools
//!
//! A fake adapter plays the interpreter: it records every script and drops
//! the model export the generated scripts write after estimation, so output
//! contracts can be chained from one tool into the next.

use async_trait::async_trait;
use neurowrap_core::outputs::JsonModelReader;
use neurowrap_core::{
    run_tool, CompiledCommand, Contrast, Environment, ExecutionAdapter, ExecutionReport,
    OutputResolver, ParameterSet, Result, Value, WrapConfig,
};
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct FakeInterpreter {
    scripts: Mutex<Vec<String>>,
    export: Mutex<Option<&'static str>>,
}

impl FakeInterpreter {
    fn leave_export(&self, json: &'static str) {
        *self.export.lock().unwrap() = Some(json);
    }
}

#[async_trait]
impl ExecutionAdapter for FakeInterpreter {
    async fn execute(&self, command: &CompiledCommand, workdir: &Path) -> Result<ExecutionReport> {
        self.scripts.lock().unwrap().push(command.command_line());
        if let Some(json) = self.export.lock().unwrap().take() {
            std::fs::write(workdir.join("SPM.json"), json)?;
        }
        Ok(ExecutionReport {
            success: true,
            exit_code: 0,
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

const ESTIMATED: &str = r#"{"beta_files": ["beta_0001.img", "beta_0002.img", "beta_0003.img"]}"#;

const CONTRASTED: &str = r#"{
    "beta_files": ["beta_0001.img", "beta_0002.img", "beta_0003.img"],
    "contrasts": [
        {"name": "Task>Baseline", "con_file": "con_0001.img", "stat_file": "spmT_0001.img"},
        {"name": "Odd>Even", "con_file": "con_0002.img", "stat_file": "spmT_0002.img"}
    ]
}"#;

/// E2E test: design, estimate, contrast and threshold chained through contracts
#[tokio::test]
async fn first_level_pipeline() -> Result<()> {
    let study = tempfile::tempdir()?;
    let env = Environment::with_cwd(&WrapConfig::default(), study.path());
    let interpreter = FakeInterpreter::default();
    let resolver = OutputResolver::new();

    let mut design = ParameterSet::for_tool("level1_design")?;
    design.bind("timing_units", "secs")?;
    design.bind("interscan_interval", 2.0)?;
    let record = run_tool(&interpreter, &resolver, &design, &env).await?;
    assert!(record.succeeded());
    let model = record
        .outputs
        .require("spm_mat_file")?
        .single()
        .map(Path::to_path_buf)
        .unwrap();
    assert_eq!(model, study.path().join("SPM.mat"));

    let mut estimate = ParameterSet::for_tool("estimate_model")?;
    estimate.bind("spm_mat_file", model.clone())?;
    estimate.bind("estimation_method", "Classical")?;
    interpreter.leave_export(ESTIMATED);
    let record = run_tool(&interpreter, &resolver, &estimate, &env).await?;
    let betas = record.outputs.require("beta_images")?.as_slice().to_vec();
    assert_eq!(betas.len(), 3);
    assert_eq!(betas[0], study.path().join("beta_0001.img"));

    let mut contrast = ParameterSet::for_tool("estimate_contrast")?;
    contrast.bind("spm_mat_file", model.clone())?;
    contrast.bind("beta_images", Value::paths(betas))?;
    contrast.bind(
        "contrasts",
        vec![
            Contrast::t("Task>Baseline", &["Task-Odd", "Task-Even"], &[0.5, 0.5]),
            Contrast::t("Odd>Even", &["Task-Odd", "Task-Even"], &[1.0, -1.0]),
        ],
    )?;
    interpreter.leave_export(CONTRASTED);
    let record = run_tool(&interpreter, &resolver, &contrast, &env).await?;
    let stats = record.outputs.require("spmT_images")?.as_slice().to_vec();
    assert_eq!(
        stats,
        vec![study.path().join("spmT_0001.img"), study.path().join("spmT_0002.img")]
    );
    assert!(record.outputs.get("spmF_images").is_none());

    let mut threshold = ParameterSet::for_tool("threshold")?;
    threshold.bind("spm_mat_file", model.clone())?;
    threshold.bind("spmT_images", Value::paths(stats))?;
    threshold.bind("contrast_index", 2)?;
    let record = run_tool(&interpreter, &resolver, &threshold, &env).await?;
    assert_eq!(
        record.outputs.require("thresholded_map")?.single().unwrap(),
        study.path().join("thresholded_map.img")
    );

    let scripts = interpreter.scripts.lock().unwrap();
    assert_eq!(scripts.len(), 4);
    assert!(scripts[0].contains("jobs{1}.stats{1}.fmri_spec.timing.RT = 2;"));
    assert!(scripts[1].contains("jobs{1}.stats{1}.fmri_est.method.Classical = 1;"));
    assert!(scripts[2].contains("consess{2}.tcon.name   = 'Odd>Even';"));
    assert!(scripts[3].contains("xSPM.Ic = 2;"));

    let export = format!(
        "fid = fopen('{}', 'w');",
        JsonModelReader::export_path(&model).display()
    );
    assert!(scripts[1].contains(&export));
    assert!(scripts[2].contains(&export));
    assert!(!scripts[0].contains(&export));
    Ok(())
}

/// E2E test: a second-level one-sample test discovers its images after the run
#[tokio::test]
async fn one_sample_ttest_discovers_contrast_images() -> Result<()> {
    let group = tempfile::tempdir()?;
    let env = Environment::with_cwd(&WrapConfig::default(), group.path());
    let interpreter = FakeInterpreter::default();

    let mut ttest = ParameterSet::for_tool("one_sample_ttest")?;
    ttest.bind(
        "con_images",
        Value::paths(["/subj1/con_0001.img", "/subj2/con_0001.img"]),
    )?;

    let resolver = OutputResolver::new();
    let before = run_tool(&interpreter, &resolver, &ttest, &env).await?;
    assert!(before.outputs.get("con_images").is_none());

    std::fs::write(group.path().join("con_0001.img"), b"")?;
    std::fs::write(group.path().join("spmT_0001.img"), b"")?;
    let after = run_tool(&interpreter, &resolver, &ttest, &env).await?;
    assert_eq!(
        after.outputs.require("spmT_images")?.as_slice(),
        &[group.path().join("spmT_0001.img")]
    );
    assert_eq!(before.fingerprint, after.fingerprint);
    assert_ne!(before.id, after.id);

    let scripts = interpreter.scripts.lock().unwrap();
    assert!(scripts[0].contains("jobs{3}.stats{1}.con.consess{1}.tcon.name = 'con_0001';"));
    Ok(())
}
