//! Default resolution
//!
//! Every unbound parameter with a default rule is visited at most once. A
//! derived default pulls its inputs first (bound values, or their own
//! defaults), so the traversal is a depth-first walk over the derivation
//! graph; meeting a parameter that is still being visited is a cycle.

use crate::config::Environment;
use crate::descriptor::{DefaultRule, DeriveContext};
use crate::error::{Result, WrapError};
use crate::params::{Origin, ParameterSet, ResolvedEntry, ResolvedParams};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Mark {
    Unvisited,
    Visiting,
    Done(Option<Value>),
}

struct Resolver<'a> {
    params: &'a ParameterSet,
    env: &'a Environment,
    marks: Vec<Mark>,
    stack: Vec<&'static str>,
}

impl<'a> Resolver<'a> {
    fn value(&mut self, index: usize) -> Result<Option<Value>> {
        let params = self.params;
        if let Some(bound) = params.value_at(index) {
            return Ok(Some(bound.clone()));
        }

        let tool = params.tool();
        let descriptor = &tool.descriptors()[index];
        match &self.marks[index] {
            Mark::Done(value) => return Ok(value.clone()),
            Mark::Visiting => {
                let start = self
                    .stack
                    .iter()
                    .position(|name| *name == descriptor.name)
                    .unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.stack[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(descriptor.name.to_string());
                return Err(WrapError::DefaultCycle(cycle));
            }
            Mark::Unvisited => {}
        }

        self.marks[index] = Mark::Visiting;
        self.stack.push(descriptor.name);

        let value = match &descriptor.default {
            DefaultRule::None => None,
            DefaultRule::Constant(value) => Some(value.clone()),
            DefaultRule::Derived { inputs, derive } => {
                let mut available = BTreeMap::new();
                for input in inputs.iter() {
                    let input_index =
                        tool.index_of(input)
                            .ok_or_else(|| WrapError::InvalidDefinition {
                                tool: tool.name.to_string(),
                                reason: format!(
                                    "'{}' derives from unknown '{}'",
                                    descriptor.name, input
                                ),
                            })?;
                    if let Some(value) = self.value(input_index)? {
                        available.insert(*input, value);
                    }
                }
                match derive(&DeriveContext::new(available, self.env)) {
                    Some(derived) => Some(descriptor.kind.check(derived).map_err(|reason| {
                        WrapError::InvalidDefinition {
                            tool: tool.name.to_string(),
                            reason: format!("derived '{}': {}", descriptor.name, reason),
                        }
                    })?),
                    None => None,
                }
            }
        };

        self.stack.pop();
        self.marks[index] = Mark::Done(value.clone());
        Ok(value)
    }
}

/// Resolve every bound or defaulted parameter, in declaration order.
///
/// Pure: reads only the bound values and `env`, never the filesystem.
pub fn resolve(params: &ParameterSet, env: &Environment) -> Result<ResolvedParams> {
    let tool = Arc::clone(params.tool());
    let count = tool.descriptors().len();
    let mut resolver = Resolver {
        params,
        env,
        marks: vec![Mark::Unvisited; count],
        stack: Vec::new(),
    };

    let mut entries = Vec::new();
    for (index, descriptor) in tool.descriptors().iter().enumerate() {
        let origin = if params.value_at(index).is_some() {
            Origin::Bound
        } else {
            Origin::Default
        };
        if let Some(value) = resolver.value(index)? {
            entries.push(ResolvedEntry {
                name: descriptor.name,
                value,
                origin,
            });
        }
    }

    tracing::debug!(
        tool = tool.name,
        resolved = entries.len(),
        "Resolved parameter defaults"
    );
    Ok(ResolvedParams::new(tool, entries))
}
