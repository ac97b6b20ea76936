//! Tool invocation
//!
//! Running a tool is bind, compile, execute, resolve. Execution belongs to an
//! [`ExecutionAdapter`]; this module drives the sequence and records what
//! happened in an [`InvocationRecord`]. A failed execution still gets its
//! output contract resolved, so partial outputs stay visible.

use crate::compiler::{self, CompiledCommand};
use crate::config::Environment;
use crate::error::Result;
use crate::outputs::{OutputContract, OutputResolver, ResolveMode};
use crate::params::{BoundValue, ParameterSet};
use crate::types::{now, Blake3Hash, Timestamp};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};
use uuid::Uuid;

/// Exit status and captured streams of one execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Runs compiled commands
///
/// A nonzero exit status is reported, never retried. Timeouts are the
/// adapter's concern.
#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// Execute `command` with `workdir` as its working directory
    async fn execute(&self, command: &CompiledCommand, workdir: &Path) -> Result<ExecutionReport>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// The adapter ran the command; the report says whether it succeeded
    Completed(ExecutionReport),
    /// The adapter could not run the command at all
    AdapterFailed { message: String },
}

impl ExecutionOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, ExecutionOutcome::Completed(report) if report.success)
    }
}

/// Everything known about one finished invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub id: Uuid,
    pub tool: String,
    /// Bound values of the snapshot that was compiled
    pub values: Vec<BoundValue>,
    pub fingerprint: Blake3Hash,
    pub command: CompiledCommand,
    pub execution: ExecutionOutcome,
    pub outputs: OutputContract,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
}

impl InvocationRecord {
    pub fn succeeded(&self) -> bool {
        self.execution.succeeded()
    }
}

/// Compile `params`, run the command and resolve its outputs.
///
/// The caller's set is left untouched: a fork is finalized and recorded, so
/// later binds on the original never change the record. Validation and
/// compilation errors are returned before anything runs; adapter errors are
/// recorded in the outcome instead.
pub async fn run_tool(
    adapter: &dyn ExecutionAdapter,
    resolver: &OutputResolver,
    params: &ParameterSet,
    env: &Environment,
) -> Result<InvocationRecord> {
    let mut snapshot = params.fork();
    snapshot.finalize()?;
    let command = compiler::compile(&snapshot, env)?;

    let id = Uuid::new_v4();
    let started_at = now();
    info!(%id, tool = %command.tool, fingerprint = %command.fingerprint, "Running tool");

    let execution = match adapter.execute(&command, env.cwd()).await {
        Ok(report) => {
            info!(%id, exit_code = report.exit_code, success = report.success, "Tool finished");
            ExecutionOutcome::Completed(report)
        }
        Err(e) => {
            warn!(%id, error = %e, "Execution adapter failed");
            ExecutionOutcome::AdapterFailed {
                message: e.to_string(),
            }
        }
    };

    let outputs = resolver.resolve(&snapshot, env, ResolveMode::AfterRun)?;

    Ok(InvocationRecord {
        id,
        tool: command.tool.clone(),
        values: snapshot.bound_values(),
        fingerprint: command.fingerprint,
        command,
        execution,
        outputs,
        started_at,
        finished_at: now(),
    })
}
