//! Integration tests for process-backed runs
//!
//! These use small stand-in tools built from ordinary shell utilities, so
//! they run without any neuroimaging package installed.

use neurowrap_core::descriptor::ParamDescriptor;
use neurowrap_core::outputs::{OutputPaths, OutputRule};
use neurowrap_core::{
    run_tool, Environment, OutputResolver, ParamKind, ParameterSet, ResolvedParams, Result,
    ToolDefinition, WrapConfig,
};
use neurowrap_sandbox::{ProcessAdapter, ScratchDir};
use std::path::PathBuf;
use std::sync::Arc;

fn touched(params: &ResolvedParams, env: &Environment) -> Option<OutputPaths> {
    params
        .path("target")
        .map(|p| OutputPaths::Single(env.cwd().join(p)))
}

fn touch_tool() -> Arc<ToolDefinition> {
    Arc::new(
        ToolDefinition::argv("touch", "touch")
            .summary("create an empty file")
            .params(vec![ParamDescriptor::new("target", ParamKind::Path)
                .positional()
                .mandatory()])
            .positional(&["target"])
            .outputs(vec![OutputRule::predicted("target", touched)]),
    )
}

/// E2E test: a native command runs in the scratch directory and its output exists
#[tokio::test]
async fn native_command_writes_predicted_output() -> Result<()> {
    let scratch = ScratchDir::new()?;
    let config = WrapConfig::default();
    let env = scratch.environment(&config);

    let mut params = ParameterSet::new(touch_tool());
    params.bind("target", "made.txt")?;

    let record = run_tool(
        &ProcessAdapter::new(&config),
        &OutputResolver::new(),
        &params,
        &env,
    )
    .await?;

    assert!(record.succeeded());
    let made = record.outputs.require("target")?.single().unwrap().to_path_buf();
    assert_eq!(made, scratch.path().join("made.txt"));
    assert!(made.exists());
    Ok(())
}

/// E2E test: a failing script run still yields a record and contract
#[tokio::test]
async fn failing_interpreter_is_recorded() -> Result<()> {
    let scratch = ScratchDir::new()?;
    let config = WrapConfig::new().with_interpreter("false");
    let env = scratch.environment(&config);

    let mut threshold = ParameterSet::for_tool("threshold")?;
    threshold.bind("spm_mat_file", scratch.path().join("SPM.mat"))?;
    threshold.bind("spmT_images", vec![PathBuf::from("spmT_0001.img")])?;
    threshold.bind("contrast_index", 1)?;

    let record = run_tool(
        &ProcessAdapter::new(&config),
        &OutputResolver::new(),
        &threshold,
        &env,
    )
    .await?;

    assert!(!record.succeeded());
    assert!(scratch.path().join("neurowrap_script.m").exists());
    assert!(record.outputs.get("thresholded_map").is_some());
    Ok(())
}
