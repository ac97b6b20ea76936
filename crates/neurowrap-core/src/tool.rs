//! Tool definitions
//!
//! A [`ToolDefinition`] is a declarative bundle: ordered descriptors, the
//! positional order, an emitter (argv or script) and an output policy. A
//! specialised tool is built from a parent definition plus an explicit
//! [`Specialization`]; the merged descriptor table is computed once, and both
//! halves of the pair stay available for introspection.

use crate::config::Environment;
use crate::descriptor::{DefaultRule, ParamDescriptor};
use crate::error::{Result, WrapError};
use crate::outputs::OutputRule;
use crate::params::ResolvedParams;
use crate::value::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// Pure script step: resolved parameters in, ordered statements out
pub type ScriptStep = fn(&ResolvedParams, &Environment) -> Vec<String>;

/// Job-structure emission policy for the statistical package
#[derive(Debug, Clone, Copy)]
pub struct JobPolicy {
    /// Job family, e.g. `stats`
    pub jobtype: &'static str,
    /// Job name, e.g. `fmri_spec`
    pub jobname: &'static str,
    /// Statements appended after the job has run
    pub postscript: Option<ScriptStep>,
}

impl JobPolicy {
    /// Struct prefix every field is written under
    pub fn prefix(&self) -> String {
        format!("jobs{{1}}.{}{{1}}.{}", self.jobtype, self.jobname)
    }
}

/// How a tool turns resolved parameters into a compiled command
#[derive(Debug, Clone)]
pub enum Emitter {
    /// Literal argument vector for a native executable
    Argv,
    /// Generic job structure built from `Field` render rules
    Job(JobPolicy),
    /// Tool-specific statement builder
    Script(ScriptStep),
}

impl Emitter {
    pub fn is_script(&self) -> bool {
        !matches!(self, Emitter::Argv)
    }
}

/// Overrides applied to a parent tool
#[derive(Debug, Clone, Default)]
pub struct Specialization {
    pub name: &'static str,
    pub summary: &'static str,
    /// Replaces the parent's mandatory set for inherited parameters
    pub mandatory: &'static [&'static str],
    /// Parameters forced to a value
    pub fixed: Vec<(&'static str, Value)>,
    /// Replaced default rules
    pub defaults: Vec<(&'static str, DefaultRule)>,
    /// Descriptors appended after the parent's
    pub extra: Vec<ParamDescriptor>,
    /// Output rules appended after the parent's
    pub extra_outputs: Vec<OutputRule>,
}

/// Declarative description of one wrapped tool
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: &'static str,
    /// Executable name, or the interpreter-facing label for script tools
    pub program: &'static str,
    pub summary: &'static str,
    params: Vec<ParamDescriptor>,
    positional: Vec<&'static str>,
    trailing: Vec<&'static str>,
    emitter: Emitter,
    outputs: Vec<OutputRule>,
    parent: Option<Arc<ToolDefinition>>,
    specialization: Option<Specialization>,
}

impl ToolDefinition {
    /// A native tool emitting an argument vector
    pub fn argv(name: &'static str, program: &'static str) -> Self {
        Self::with_emitter(name, program, Emitter::Argv)
    }

    /// A script tool built from job fields
    pub fn job(name: &'static str, policy: JobPolicy) -> Self {
        Self::with_emitter(name, "spm", Emitter::Job(policy))
    }

    /// A script tool with its own statement builder
    pub fn script(name: &'static str, step: ScriptStep) -> Self {
        Self::with_emitter(name, "spm", Emitter::Script(step))
    }

    fn with_emitter(name: &'static str, program: &'static str, emitter: Emitter) -> Self {
        Self {
            name,
            program,
            summary: "",
            params: Vec::new(),
            positional: Vec::new(),
            trailing: Vec::new(),
            emitter,
            outputs: Vec::new(),
            parent: None,
            specialization: None,
        }
    }

    pub fn summary(mut self, summary: &'static str) -> Self {
        self.summary = summary;
        self
    }

    pub fn params(mut self, params: Vec<ParamDescriptor>) -> Self {
        self.params = params;
        self
    }

    /// Parameters emitted before all named arguments, in this order
    pub fn positional(mut self, names: &[&'static str]) -> Self {
        self.positional = names.to_vec();
        self
    }

    /// Parameters emitted after all named arguments, in this order
    pub fn trailing(mut self, names: &[&'static str]) -> Self {
        self.trailing = names.to_vec();
        self
    }

    pub fn outputs(mut self, outputs: Vec<OutputRule>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Build a specialised tool from `parent` and an override set
    pub fn specialize(parent: Arc<ToolDefinition>, spec: Specialization) -> Self {
        let mut params: Vec<ParamDescriptor> = parent
            .params
            .iter()
            .cloned()
            .map(|mut d| {
                d.mandatory = spec.mandatory.contains(&d.name);
                if let Some((_, rule)) = spec.defaults.iter().find(|(n, _)| *n == d.name) {
                    d.default = rule.clone();
                }
                if let Some((_, value)) = spec.fixed.iter().find(|(n, _)| *n == d.name) {
                    d.default = DefaultRule::Constant(value.clone());
                    d.fixed = true;
                }
                d
            })
            .collect();
        params.extend(spec.extra.iter().cloned());

        let mut outputs = parent.outputs.clone();
        outputs.extend(spec.extra_outputs.iter().cloned());

        Self {
            name: spec.name,
            program: parent.program,
            summary: spec.summary,
            params,
            positional: parent.positional.clone(),
            trailing: parent.trailing.clone(),
            emitter: parent.emitter.clone(),
            outputs,
            parent: Some(parent),
            specialization: Some(spec),
        }
    }

    /// Descriptors in declaration order (merged for specialised tools)
    pub fn descriptors(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub fn descriptor(&self, name: &str) -> Option<&ParamDescriptor> {
        self.params.iter().find(|d| d.name == name)
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|d| d.name == name)
    }

    pub fn positional_order(&self) -> &[&'static str] {
        &self.positional
    }

    pub fn trailing_order(&self) -> &[&'static str] {
        &self.trailing
    }

    pub fn emitter(&self) -> &Emitter {
        &self.emitter
    }

    pub fn output_rules(&self) -> &[OutputRule] {
        &self.outputs
    }

    pub fn parent(&self) -> Option<&Arc<ToolDefinition>> {
        self.parent.as_ref()
    }

    pub fn specialization(&self) -> Option<&Specialization> {
        self.specialization.as_ref()
    }

    /// Names of the mandatory descriptors, in declaration order
    pub fn mandatory(&self) -> Vec<&'static str> {
        self.params
            .iter()
            .filter(|d| d.mandatory)
            .map(|d| d.name)
            .collect()
    }

    /// Exclusivity groups: each descriptor together with its declared peers
    pub fn exclusivity_groups(&self) -> Vec<Vec<&'static str>> {
        let mut groups: Vec<Vec<&'static str>> = Vec::new();
        for d in self.params.iter().filter(|d| !d.exclusive_with.is_empty()) {
            let mut group = vec![d.name];
            group.extend(d.exclusive_with.iter().copied());
            group.sort_unstable();
            group.dedup();
            if !groups.contains(&group) {
                groups.push(group);
            }
        }
        groups
    }

    /// Check internal consistency of the definition
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| WrapError::InvalidDefinition {
            tool: self.name.to_string(),
            reason,
        };

        let mut seen = HashSet::new();
        for d in &self.params {
            if !seen.insert(d.name) {
                return Err(fail(format!("duplicate parameter '{}'", d.name)));
            }
            if !d.render.supports(&d.kind) {
                return Err(fail(format!(
                    "render rule {:?} cannot render {:?} for '{}'",
                    d.render, d.kind, d.name
                )));
            }
            if let Some(peer) = d.exclusive_with.iter().find(|p| self.index_of(p).is_none()) {
                return Err(fail(format!("'{}' excludes unknown '{}'", d.name, peer)));
            }
            if let DefaultRule::Derived { inputs, .. } = &d.default {
                if let Some(input) = inputs.iter().find(|i| self.index_of(i).is_none()) {
                    return Err(fail(format!("'{}' derives from unknown '{}'", d.name, input)));
                }
            }
            if let DefaultRule::Constant(value) = &d.default {
                if let Err(reason) = d.kind.check(value.clone()) {
                    return Err(fail(format!("default of '{}': {}", d.name, reason)));
                }
            }
        }

        for name in self.positional.iter().chain(self.trailing.iter()) {
            if self.index_of(name).is_none() {
                return Err(fail(format!("unknown positional '{}'", name)));
            }
        }

        if let Some(spec) = &self.specialization {
            let unknown = spec
                .mandatory
                .iter()
                .chain(spec.fixed.iter().map(|(n, _)| n))
                .chain(spec.defaults.iter().map(|(n, _)| n))
                .find(|n| self.index_of(n).is_none());
            if let Some(name) = unknown {
                return Err(fail(format!("override names unknown '{}'", name)));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParamKind;

    fn parent() -> Arc<ToolDefinition> {
        Arc::new(
            ToolDefinition::argv("reg", "reg")
                .params(vec![
                    ParamDescriptor::new("infile", ParamKind::Path).arg("-in").mandatory(),
                    ParamDescriptor::new("reference", ParamKind::Path).arg("-ref").mandatory(),
                    ParamDescriptor::new("apply", ParamKind::Flag).switch("-apply"),
                ])
                .summary("toy registration"),
        )
    }

    #[test]
    fn specialization_replaces_mandatory_and_fixes_values() {
        let child = ToolDefinition::specialize(
            parent(),
            Specialization {
                name: "apply",
                mandatory: &["infile"],
                fixed: vec![("apply", Value::Bool(true))],
                ..Default::default()
            },
        );

        assert_eq!(child.mandatory(), vec!["infile"]);
        let apply = child.descriptor("apply").unwrap();
        assert!(apply.fixed);
        assert!(matches!(apply.default, DefaultRule::Constant(Value::Bool(true))));
        assert_eq!(child.parent().unwrap().name, "reg");
        assert!(child.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unrenderable_rule() {
        let tool = ToolDefinition::argv("bad", "bad").params(vec![ParamDescriptor::new(
            "radius",
            ParamKind::Int,
        )
        .switch("-r")]);
        assert!(matches!(
            tool.validate(),
            Err(WrapError::InvalidDefinition { .. })
        ));
    }

    #[test]
    fn validate_rejects_unknown_peer() {
        let tool = ToolDefinition::argv("bad", "bad").params(vec![ParamDescriptor::new(
            "robust",
            ParamKind::Flag,
        )
        .switch("-R")
        .exclusive_with(&["ghost"])]);
        assert!(tool.validate().is_err());
    }

    #[test]
    fn exclusivity_groups_are_deduplicated() {
        let tool = ToolDefinition::argv("t", "t").params(vec![
            ParamDescriptor::new("a", ParamKind::Flag)
                .switch("-a")
                .exclusive_with(&["b"]),
            ParamDescriptor::new("b", ParamKind::Flag)
                .switch("-b")
                .exclusive_with(&["a"]),
        ]);
        assert_eq!(tool.exclusivity_groups(), vec![vec!["a", "b"]]);
    }
}
