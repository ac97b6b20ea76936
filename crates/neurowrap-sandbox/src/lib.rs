//! Neurowrap Sandbox - process-backed execution
//!
//! [`ProcessAdapter`] runs compiled commands as child processes. Argument
//! vectors are executed directly; script bodies are written to a file in the
//! working directory and handed to the configured interpreter. [`ScratchDir`]
//! provides an ephemeral working directory that is removed on drop.

use async_trait::async_trait;
use neurowrap_core::config::SpmSettings;
use neurowrap_core::script::matlab::quote_path;
use neurowrap_core::{
    CompiledCommand, Environment, ExecutionAdapter, ExecutionReport, Result, WrapConfig,
    WrapError,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::debug;

/// Runs compiled commands with `tokio::process`
#[derive(Debug, Clone)]
pub struct ProcessAdapter {
    spm: SpmSettings,
}

impl ProcessAdapter {
    pub fn new(config: &WrapConfig) -> Self {
        Self {
            spm: config.spm.clone(),
        }
    }

    /// Script file written into `workdir` for script commands
    pub fn script_path(&self, workdir: &Path) -> PathBuf {
        workdir.join(&self.spm.script_name)
    }

    /// Search-path statements followed by the script body
    pub fn script_text(&self, command: &CompiledCommand) -> Option<String> {
        let body = command.script_body()?;
        let mut text = String::new();
        for path in &self.spm.paths {
            text.push_str(&format!("addpath({});\n", quote_path(path)));
        }
        text.push_str(&body);
        Some(text)
    }

    /// Program and arguments for `command`
    fn plan(&self, command: &CompiledCommand, workdir: &Path) -> Result<(String, Vec<String>)> {
        if let Some(argv) = command.argv() {
            let (program, args) = argv.split_first().ok_or_else(|| {
                WrapError::InvalidConfig(format!("'{}' compiled to an empty command", command.tool))
            })?;
            return Ok((program.clone(), args.to_vec()));
        }

        let mut words = self.spm.interpreter.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| WrapError::InvalidConfig("spm.interpreter is empty".to_string()))?;
        let mut args: Vec<String> = words.collect();
        args.push("-r".to_string());
        args.push(format!(
            "try, run({}); catch err, disp(err.message); exit(1); end; exit(0);",
            quote_path(&self.script_path(workdir))
        ));
        Ok((program, args))
    }
}

#[async_trait]
impl ExecutionAdapter for ProcessAdapter {
    async fn execute(&self, command: &CompiledCommand, workdir: &Path) -> Result<ExecutionReport> {
        if let Some(text) = self.script_text(command) {
            let script = self.script_path(workdir);
            tokio::fs::write(&script, text).await?;
            debug!(tool = %command.tool, script = %script.display(), "Wrote script");
        }

        let (program, args) = self.plan(command, workdir)?;
        debug!(%program, ?args, workdir = %workdir.display(), "Spawning");
        let output = Command::new(&program)
            .args(&args)
            .current_dir(workdir)
            .output()
            .await
            .map_err(|e| WrapError::from(e).context(format!("Spawning '{}'", program)))?;

        Ok(ExecutionReport {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Ephemeral working directory, deleted on drop
#[derive(Debug)]
pub struct ScratchDir {
    temp_dir: TempDir,
}

impl ScratchDir {
    pub fn new() -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("neurowrap-").tempdir()?;
        Ok(Self { temp_dir })
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Environment rooted at this directory
    pub fn environment(&self, config: &WrapConfig) -> Environment {
        Environment::with_cwd(config, self.path())
    }

    /// Write input files relative to the directory root
    pub fn prepare(&self, files: &[(PathBuf, Vec<u8>)]) -> Result<()> {
        for (path, content) in files {
            let full_path = self.path().join(path);
            if let Some(parent) = full_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(full_path, content)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurowrap_core::{Blake3Hash, CommandBody};

    fn command(body: CommandBody) -> CompiledCommand {
        CompiledCommand {
            tool: "stub".to_string(),
            program: "stub".to_string(),
            body,
            fingerprint: Blake3Hash::digest(b"stub"),
        }
    }

    #[tokio::test]
    async fn argv_runs_in_the_working_directory() -> Result<()> {
        let scratch = ScratchDir::new()?;
        scratch.prepare(&[(PathBuf::from("hello.sh"), b"echo 'Hello neurowrap'".to_vec())])?;
        let adapter = ProcessAdapter::new(&WrapConfig::default());

        let report = adapter
            .execute(
                &command(CommandBody::Argv(vec!["sh".into(), "hello.sh".into()])),
                scratch.path(),
            )
            .await?;
        assert!(report.success);
        assert_eq!(report.stdout.trim(), "Hello neurowrap");
        Ok(())
    }

    #[tokio::test]
    async fn nonzero_exit_is_reported() -> Result<()> {
        let scratch = ScratchDir::new()?;
        let adapter = ProcessAdapter::new(&WrapConfig::default());
        let report = adapter
            .execute(
                &command(CommandBody::Argv(vec!["sh".into(), "-c".into(), "exit 3".into()])),
                scratch.path(),
            )
            .await?;
        assert!(!report.success);
        assert_eq!(report.exit_code, 3);
        Ok(())
    }

    #[tokio::test]
    async fn scripts_are_written_with_search_paths() -> Result<()> {
        let scratch = ScratchDir::new()?;
        let config = WrapConfig::new()
            .with_interpreter("true")
            .with_search_path("/opt/spm8");
        let adapter = ProcessAdapter::new(&config);

        let report = adapter
            .execute(
                &command(CommandBody::Script(vec!["spm_defaults;".to_string()])),
                scratch.path(),
            )
            .await?;
        assert!(report.success);

        let written = std::fs::read_to_string(adapter.script_path(scratch.path()))?;
        assert_eq!(written, "addpath('/opt/spm8');\nspm_defaults;\n");
        Ok(())
    }

    #[test]
    fn interpreter_gets_a_guarded_run_call() {
        let adapter = ProcessAdapter::new(&WrapConfig::default());
        let (program, args) = adapter
            .plan(&command(CommandBody::Script(Vec::new())), Path::new("/work"))
            .unwrap();
        assert_eq!(program, "matlab");
        assert_eq!(
            args,
            vec![
                "-nodesktop".to_string(),
                "-nosplash".to_string(),
                "-r".to_string(),
                "try, run('/work/neurowrap_script.m'); catch err, disp(err.message); exit(1); end; exit(0);"
                    .to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn missing_program_is_an_adapter_error() {
        let scratch = ScratchDir::new().unwrap();
        let adapter = ProcessAdapter::new(&WrapConfig::default());
        let err = adapter
            .execute(
                &command(CommandBody::Argv(vec!["neurowrap-no-such-program".into()])),
                scratch.path(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Spawning 'neurowrap-no-such-program'"));
    }
}
