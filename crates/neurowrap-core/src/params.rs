//! Parameter sets
//!
//! A [`ParameterSet`] pairs a tool's descriptor table with the values bound
//! for one invocation. Values live behind an `Arc`, so cloning is cheap and a
//! later `bind` on a clone copies the table instead of touching the snapshot
//! another invocation already recorded.
//!
//! [`ResolvedParams`] is the read-only view produced by default resolution:
//! every bound or defaulted value, in declaration order, tagged with where it
//! came from.

use crate::error::{Result, WrapError};
use crate::tool::ToolDefinition;
use crate::types::Blake3Hash;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which checks [`ParameterSet::validate`] runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Mandatory presence and exclusivity
    Full,
    /// Exclusivity only
    Preview,
}

/// One bound value, as recorded in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundValue {
    pub name: String,
    pub value: Value,
}

/// Descriptor table plus the values bound for one invocation
#[derive(Debug, Clone)]
pub struct ParameterSet {
    tool: Arc<ToolDefinition>,
    values: Arc<Vec<Option<Value>>>,
    frozen: bool,
}

impl ParameterSet {
    /// An empty, mutable set for `tool`
    pub fn new(tool: Arc<ToolDefinition>) -> Self {
        let len = tool.descriptors().len();
        Self {
            tool,
            values: Arc::new(vec![None; len]),
            frozen: false,
        }
    }

    /// An empty set for a catalog tool
    pub fn for_tool(name: &str) -> Result<Self> {
        crate::tools::catalog().get(name).map(Self::new)
    }

    /// A set pre-populated from name/value pairs
    pub fn with_values<I, V>(tool: Arc<ToolDefinition>, values: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'static str, V)>,
        V: Into<Value>,
    {
        let mut set = Self::new(tool);
        for (name, value) in values {
            set.bind(name, value)?;
        }
        Ok(set)
    }

    pub fn tool(&self) -> &Arc<ToolDefinition> {
        &self.tool
    }

    /// Bind `value` to the parameter `name`.
    ///
    /// The value is checked against the descriptor kind and stored in its
    /// normalised form (integers widened for float kinds, scalars wrapped for
    /// list kinds).
    pub fn bind(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        if self.frozen {
            return Err(WrapError::ParameterSetFrozen(self.tool.name.to_string()));
        }
        let index = self.index(name)?;
        let descriptor = &self.tool.descriptors()[index];
        if descriptor.fixed {
            return Err(WrapError::invalid_value(
                name,
                format!("fixed by tool '{}'", self.tool.name),
            ));
        }
        let value = descriptor
            .kind
            .check(value.into())
            .map_err(|reason| WrapError::invalid_value(name, reason))?;

        Arc::make_mut(&mut self.values)[index] = Some(value);
        Ok(())
    }

    /// Parse a command-line literal according to the descriptor kind, then bind it
    pub fn bind_literal(&mut self, name: &str, literal: &str) -> Result<()> {
        let index = self.index(name)?;
        let value = self.tool.descriptors()[index]
            .kind
            .parse_literal(literal)
            .map_err(|reason| WrapError::invalid_value(name, reason))?;
        self.bind(name, value)
    }

    /// Clear a bound value
    pub fn unbind(&mut self, name: &str) -> Result<()> {
        if self.frozen {
            return Err(WrapError::ParameterSetFrozen(self.tool.name.to_string()));
        }
        let index = self.index(name)?;
        if self.values[index].is_some() {
            Arc::make_mut(&mut self.values)[index] = None;
        }
        Ok(())
    }

    /// The bound value of `name`, if any (defaults are not consulted)
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.tool
            .index_of(name)
            .and_then(|index| self.values[index].as_ref())
    }

    pub(crate) fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Validate and mark the set read-only. Idempotent.
    pub fn finalize(&mut self) -> Result<()> {
        if self.frozen {
            return Ok(());
        }
        self.validate(Validation::Full)?;
        self.frozen = true;
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.frozen
    }

    /// A mutable copy sharing the current values until the next bind
    pub fn fork(&self) -> Self {
        Self {
            tool: Arc::clone(&self.tool),
            values: Arc::clone(&self.values),
            frozen: false,
        }
    }

    /// Check mandatory presence (for [`Validation::Full`]) and exclusivity.
    ///
    /// A mandatory descriptor is satisfied by a bound value or by any default
    /// rule; a derived default that yields nothing is caught again when the
    /// command is compiled.
    pub fn validate(&self, mode: Validation) -> Result<()> {
        if mode == Validation::Full {
            let missing = self
                .tool
                .descriptors()
                .iter()
                .enumerate()
                .find(|(i, d)| d.mandatory && self.values[*i].is_none() && d.default.is_none());
            if let Some((_, d)) = missing {
                return Err(WrapError::MissingMandatoryParameter {
                    tool: self.tool.name.to_string(),
                    param: d.name.to_string(),
                });
            }
        }

        for group in self.tool.exclusivity_groups() {
            let bound: Vec<String> = self
                .tool
                .descriptors()
                .iter()
                .enumerate()
                .filter(|(i, d)| group.contains(&d.name) && self.values[*i].is_some())
                .map(|(_, d)| d.name.to_string())
                .collect();
            if bound.len() > 1 {
                return Err(WrapError::ConflictingParameters {
                    group: group.iter().map(|s| s.to_string()).collect(),
                    bound,
                });
            }
        }

        Ok(())
    }

    /// Bound values in declaration order
    pub fn bound_values(&self) -> Vec<BoundValue> {
        self.tool
            .descriptors()
            .iter()
            .zip(self.values.iter())
            .filter_map(|(d, v)| {
                v.as_ref().map(|value| BoundValue {
                    name: d.name.to_string(),
                    value: value.clone(),
                })
            })
            .collect()
    }

    /// Content hash of the tool name and bound values
    pub fn fingerprint(&self) -> Result<Blake3Hash> {
        #[derive(Serialize)]
        struct Snapshot<'a> {
            tool: &'a str,
            values: Vec<BoundValue>,
        }

        let bytes = serde_json::to_vec(&Snapshot {
            tool: self.tool.name,
            values: self.bound_values(),
        })?;
        Ok(Blake3Hash::digest(&bytes))
    }

    fn index(&self, name: &str) -> Result<usize> {
        self.tool
            .index_of(name)
            .ok_or_else(|| WrapError::UnknownParameter {
                tool: self.tool.name.to_string(),
                param: name.to_string(),
            })
    }
}

/// Where a resolved value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Bound,
    Default,
}

/// One resolved parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedEntry {
    pub name: &'static str,
    pub value: Value,
    pub origin: Origin,
}

/// Bound and defaulted values after default resolution
#[derive(Debug, Clone)]
pub struct ResolvedParams {
    tool: Arc<ToolDefinition>,
    entries: Vec<ResolvedEntry>,
}

impl ResolvedParams {
    pub(crate) fn new(tool: Arc<ToolDefinition>, entries: Vec<ResolvedEntry>) -> Self {
        Self { tool, entries }
    }

    pub fn tool(&self) -> &ToolDefinition {
        &self.tool
    }

    /// Entries in declaration order
    pub fn entries(&self) -> &[ResolvedEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&ResolvedEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entry(name).map(|e| &e.value)
    }

    /// Whether the caller bound `name` explicitly
    pub fn is_bound(&self, name: &str) -> bool {
        self.entry(name).map_or(false, |e| e.origin == Origin::Bound)
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.get(name).and_then(Value::as_path)
    }

    /// Every path of a path or path-list parameter
    pub fn paths(&self, name: &str) -> Vec<PathBuf> {
        self.get(name).map(Value::path_list).unwrap_or_default()
    }

    pub fn first_path(&self, name: &str) -> Option<PathBuf> {
        self.paths(name).into_iter().next()
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_text)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_float)
    }

    /// A flag's value; unset flags read as false
    pub fn flag(&self, name: &str) -> bool {
        self.get(name).and_then(Value::as_bool).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParamDescriptor;
    use crate::value::{ParamKind, ScalarKind};

    fn toy() -> Arc<ToolDefinition> {
        Arc::new(ToolDefinition::argv("toy", "toy").params(vec![
            ParamDescriptor::new("infile", ParamKind::Path)
                .positional()
                .mandatory(),
            ParamDescriptor::new("frac", ParamKind::Float).arg("-f"),
            ParamDescriptor::new("levels", ParamKind::list(ScalarKind::Int)).arg("-l"),
            ParamDescriptor::new("robust", ParamKind::Flag)
                .switch("-R")
                .exclusive_with(&["padding"]),
            ParamDescriptor::new("padding", ParamKind::Flag)
                .switch("-Z")
                .exclusive_with(&["robust"]),
        ]))
    }

    #[test]
    fn bind_normalises_values() {
        let mut set = ParameterSet::new(toy());
        set.bind("frac", 1).unwrap();
        set.bind("levels", 4).unwrap();
        assert_eq!(set.get("frac"), Some(&Value::Float(1.0)));
        assert_eq!(set.get("levels"), Some(&Value::from(vec![4])));
    }

    #[test]
    fn bind_rejects_unknown_and_mismatched() {
        let mut set = ParameterSet::new(toy());
        assert!(matches!(
            set.bind("bogus", 1),
            Err(WrapError::UnknownParameter { .. })
        ));
        assert!(matches!(
            set.bind("frac", "high"),
            Err(WrapError::InvalidValue { .. })
        ));
    }

    #[test]
    fn finalize_names_first_missing_mandatory() {
        let mut set = ParameterSet::new(toy());
        match set.finalize() {
            Err(WrapError::MissingMandatoryParameter { param, .. }) => assert_eq!(param, "infile"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(!set.is_finalized());
    }

    #[test]
    fn finalize_rejects_conflicts() {
        let mut set = ParameterSet::new(toy());
        set.bind("infile", "foo.nii").unwrap();
        set.bind("robust", true).unwrap();
        set.bind("padding", true).unwrap();
        match set.finalize() {
            Err(WrapError::ConflictingParameters { group, bound }) => {
                assert_eq!(group, vec!["padding", "robust"]);
                assert_eq!(bound, vec!["robust", "padding"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn finalized_set_is_read_only_and_finalize_is_idempotent() {
        let mut set = ParameterSet::new(toy());
        set.bind("infile", "foo.nii").unwrap();
        set.finalize().unwrap();
        set.finalize().unwrap();
        assert!(matches!(
            set.bind("frac", 0.5),
            Err(WrapError::ParameterSetFrozen(_))
        ));
        assert!(set.unbind("infile").is_err());
    }

    #[test]
    fn fork_does_not_disturb_snapshot() {
        let mut set = ParameterSet::new(toy());
        set.bind("infile", "foo.nii").unwrap();
        set.finalize().unwrap();
        let before = set.fingerprint().unwrap();

        let mut fork = set.fork();
        fork.bind("frac", 0.3).unwrap();
        fork.unbind("infile").unwrap();

        assert_eq!(set.get("infile"), Some(&Value::path("foo.nii")));
        assert_eq!(set.get("frac"), None);
        assert_eq!(set.fingerprint().unwrap(), before);
        assert_ne!(fork.fingerprint().unwrap(), before);
    }

    #[test]
    fn bind_literal_parses_by_kind() {
        let mut set = ParameterSet::new(toy());
        set.bind_literal("levels", "8,6,4").unwrap();
        set.bind_literal("robust", "true").unwrap();
        assert_eq!(set.get("levels"), Some(&Value::from(vec![8, 6, 4])));
        assert_eq!(set.get("robust"), Some(&Value::Bool(true)));
        assert!(set.bind_literal("frac", "abc").is_err());
    }
}
