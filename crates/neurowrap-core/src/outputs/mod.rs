//! Output contracts
//!
//! A tool's output policy is a list of [`OutputRule`]s. Resolving them against
//! a parameter set gives an [`OutputContract`]: logical output name to one
//! path or an ordered list of paths, each entry tagged as predicted (a pure
//! function of the parameters) or discovered (globbed from disk, or read from
//! the model structure the statistical package saved).
//!
//! One unresolvable name never hides the others: it is recorded in
//! [`OutputContract::unresolved`] and the remaining names still resolve.

pub mod model;

pub use model::{ContrastImages, JsonModelReader, ModelStructure, ModelStructureReader};

use crate::compiler::defaults;
use crate::config::Environment;
use crate::error::{Result, WrapError};
use crate::params::{ParameterSet, ResolvedParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// One path or an ordered list of paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputPaths {
    Single(PathBuf),
    Many(Vec<PathBuf>),
}

impl OutputPaths {
    pub fn as_slice(&self) -> &[PathBuf] {
        match self {
            OutputPaths::Single(path) => std::slice::from_ref(path),
            OutputPaths::Many(paths) => paths,
        }
    }

    pub fn single(&self) -> Option<&Path> {
        match self {
            OutputPaths::Single(path) => Some(path),
            OutputPaths::Many(_) => None,
        }
    }
}

/// Glob rooted at a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobSpec {
    pub root: PathBuf,
    pub pattern: String,
}

impl GlobSpec {
    pub fn new(root: impl Into<PathBuf>, pattern: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            pattern: pattern.into(),
        }
    }

    /// Sorted matches; the root is escaped so only `pattern` is interpreted
    pub fn matches(&self) -> std::result::Result<Vec<PathBuf>, String> {
        let root = glob::Pattern::escape(&self.root.display().to_string());
        let full = Path::new(&root).join(&self.pattern);
        let walker = glob::glob(&full.display().to_string()).map_err(|e| e.to_string())?;
        Ok(readable(walker))
    }
}

/// Sorted readable matches; unreadable entries are logged and skipped
fn readable<E: std::fmt::Display>(
    entries: impl IntoIterator<Item = std::result::Result<PathBuf, E>>,
) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) => found.push(path),
            Err(error) => warn!(%error, "Skipping unreadable glob entry"),
        }
    }
    found.sort();
    found
}

pub type PredictFn = fn(&ResolvedParams, &Environment) -> Option<OutputPaths>;
pub type GlobFn = fn(&ResolvedParams, &Environment) -> Option<GlobSpec>;
pub type SourceFn = fn(&ResolvedParams, &Environment) -> Option<PathBuf>;
pub type ExtractFn = fn(&ModelStructure, &Path) -> Vec<PathBuf>;

/// How one logical output is located
#[derive(Debug, Clone)]
pub enum OutputRule {
    /// Pure function of the parameters; `None` means not produced
    Predicted { name: &'static str, derive: PredictFn },
    /// Glob evaluated after the run
    Discovered { name: &'static str, glob: GlobFn },
    /// Paths read from the saved model structure after the run
    Parsed {
        name: &'static str,
        source: SourceFn,
        extract: ExtractFn,
    },
}

impl OutputRule {
    pub fn predicted(name: &'static str, derive: PredictFn) -> Self {
        OutputRule::Predicted { name, derive }
    }

    pub fn discovered(name: &'static str, glob: GlobFn) -> Self {
        OutputRule::Discovered { name, glob }
    }

    pub fn parsed(name: &'static str, source: SourceFn, extract: ExtractFn) -> Self {
        OutputRule::Parsed {
            name,
            source,
            extract,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputRule::Predicted { name, .. }
            | OutputRule::Discovered { name, .. }
            | OutputRule::Parsed { name, .. } => name,
        }
    }

    pub fn origin(&self) -> OutputOrigin {
        match self {
            OutputRule::Predicted { .. } => OutputOrigin::Predicted,
            OutputRule::Discovered { .. } | OutputRule::Parsed { .. } => OutputOrigin::Discovered,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputOrigin {
    Predicted,
    Discovered,
}

/// When resolution happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Predicted entries only; the filesystem is never read
    DryRun,
    /// Predicted and discovered entries
    AfterRun,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputEntry {
    pub name: String,
    pub origin: OutputOrigin,
    pub paths: OutputPaths,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedOutput {
    pub name: String,
    pub reason: String,
}

/// Resolved outputs of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputContract {
    pub tool: String,
    pub entries: Vec<OutputEntry>,
    pub unresolved: Vec<UnresolvedOutput>,
}

impl OutputContract {
    pub fn get(&self, name: &str) -> Option<&OutputPaths> {
        self.entries.iter().find(|e| e.name == name).map(|e| &e.paths)
    }

    pub fn entry(&self, name: &str) -> Option<&OutputEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// The paths of `name`, or why they are unavailable
    pub fn require(&self, name: &str) -> Result<&OutputPaths> {
        if let Some(paths) = self.get(name) {
            return Ok(paths);
        }
        let reason = self
            .unresolved
            .iter()
            .find(|u| u.name == name)
            .map(|u| u.reason.clone())
            .unwrap_or_else(|| "not produced".to_string());
        Err(WrapError::OutputContractUnresolvable {
            output: name.to_string(),
            reason,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves output rules against parameter sets
#[derive(Clone)]
pub struct OutputResolver {
    reader: Arc<dyn ModelStructureReader>,
}

impl std::fmt::Debug for OutputResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputResolver").finish_non_exhaustive()
    }
}

impl Default for OutputResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputResolver {
    /// Resolver reading model structures with [`JsonModelReader`]
    pub fn new() -> Self {
        Self::with_reader(Arc::new(JsonModelReader))
    }

    pub fn with_reader(reader: Arc<dyn ModelStructureReader>) -> Self {
        Self { reader }
    }

    /// Resolve the contract of `params`.
    ///
    /// Predicted paths use the same default resolution as compilation, so a
    /// dry run reports exactly the paths the command line names.
    pub fn resolve(
        &self,
        params: &ParameterSet,
        env: &Environment,
        mode: ResolveMode,
    ) -> Result<OutputContract> {
        let resolved = defaults::resolve(params, env)?;
        let tool = resolved.tool();
        let mut contract = OutputContract {
            tool: tool.name.to_string(),
            entries: Vec::new(),
            unresolved: Vec::new(),
        };

        for rule in tool.output_rules() {
            let origin = rule.origin();
            let found = match rule {
                OutputRule::Predicted { derive, .. } => derive(&resolved, env),
                OutputRule::Discovered { .. } | OutputRule::Parsed { .. }
                    if mode == ResolveMode::DryRun =>
                {
                    None
                }
                OutputRule::Discovered { name, glob: locate } => match locate(&resolved, env) {
                    Some(spec) => match spec.matches() {
                        Ok(found) if found.is_empty() => None,
                        Ok(found) => Some(OutputPaths::Many(found)),
                        Err(reason) => {
                            record_unresolved(&mut contract, name, reason);
                            None
                        }
                    },
                    None => None,
                },
                OutputRule::Parsed {
                    name,
                    source,
                    extract,
                } => match source(&resolved, env) {
                    Some(file) => match self.reader.read(&file) {
                        Ok(model) => {
                            let dir = file.parent().unwrap_or_else(|| Path::new(""));
                            let found = extract(&model, dir);
                            if found.is_empty() {
                                None
                            } else {
                                Some(OutputPaths::Many(found))
                            }
                        }
                        Err(e) => {
                            record_unresolved(&mut contract, name, e.to_string());
                            None
                        }
                    },
                    None => None,
                },
            };

            if let Some(paths) = found {
                contract.entries.push(OutputEntry {
                    name: rule.name().to_string(),
                    origin,
                    paths,
                });
            }
        }

        debug!(
            tool = %contract.tool,
            entries = contract.entries.len(),
            unresolved = contract.unresolved.len(),
            "Resolved output contract"
        );
        Ok(contract)
    }
}

fn record_unresolved(contract: &mut OutputContract, name: &str, reason: String) {
    warn!(tool = %contract.tool, output = name, %reason, "Output is unresolvable");
    contract.unresolved.push(UnresolvedOutput {
        name: name.to_string(),
        reason,
    });
}

/// `<dir>/<stem><suffix><ext>`, the naming scheme shared by derived outputs
pub fn sibling(dir: &Path, stem: &str, suffix: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}{}{}", stem, suffix, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WrapConfig;
    use crate::descriptor::ParamDescriptor;
    use crate::tool::ToolDefinition;
    use crate::value::ParamKind;

    fn predicted_out(params: &ResolvedParams, _env: &Environment) -> Option<OutputPaths> {
        params.path("out").map(|p| OutputPaths::Single(p.to_path_buf()))
    }

    fn logs(_params: &ResolvedParams, env: &Environment) -> Option<GlobSpec> {
        Some(GlobSpec::new(env.cwd(), "*.log"))
    }

    fn toy() -> Arc<ToolDefinition> {
        Arc::new(
            ToolDefinition::argv("toy", "toy")
                .params(vec![ParamDescriptor::new("out", ParamKind::Path).arg("-o")])
                .outputs(vec![
                    OutputRule::predicted("out", predicted_out),
                    OutputRule::discovered("logs", logs),
                ]),
        )
    }

    #[test]
    fn dry_run_skips_discovered_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.log"), b"").unwrap();
        let env = Environment::with_cwd(&WrapConfig::default(), dir.path());

        let mut set = ParameterSet::new(toy());
        set.bind("out", "/x/out.nii").unwrap();
        let contract = OutputResolver::new()
            .resolve(&set, &env, ResolveMode::DryRun)
            .unwrap();

        assert_eq!(contract.names().collect::<Vec<_>>(), vec!["out"]);
        assert_eq!(contract.entry("out").unwrap().origin, OutputOrigin::Predicted);
    }

    #[test]
    fn glob_matches_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.log", "a.log", "c.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let env = Environment::with_cwd(&WrapConfig::default(), dir.path());
        let contract = OutputResolver::new()
            .resolve(&ParameterSet::new(toy()), &env, ResolveMode::AfterRun)
            .unwrap();

        let logs = contract.get("logs").unwrap().as_slice();
        assert_eq!(logs, &[dir.path().join("a.log"), dir.path().join("b.log")]);
        assert!(contract.get("out").is_none());
        assert!(matches!(
            contract.require("out"),
            Err(WrapError::OutputContractUnresolvable { .. })
        ));
    }

    #[test]
    fn unreadable_glob_entries_are_skipped_not_fatal() {
        let entries = vec![
            Ok(PathBuf::from("/run/b.img")),
            Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "/run/locked: permission denied",
            )),
            Ok(PathBuf::from("/run/a.img")),
        ];
        assert_eq!(
            readable(entries),
            vec![PathBuf::from("/run/a.img"), PathBuf::from("/run/b.img")]
        );
    }
}
