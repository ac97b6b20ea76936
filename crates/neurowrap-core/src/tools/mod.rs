//! Built-in tool catalog
//!
//! - [`fsl`]: native executables driven by an argument vector
//! - [`spm`]: the scripted statistical package, driven by generated scripts

pub mod fsl;
pub mod spm;

use crate::error::{Result, WrapError};
use crate::tool::ToolDefinition;
use lazy_static::lazy_static;
use std::collections::BTreeMap;
use std::sync::Arc;

lazy_static! {
    static ref CATALOG: ToolCatalog = ToolCatalog::builtin();
}

/// The shared built-in catalog
pub fn catalog() -> &'static ToolCatalog {
    &CATALOG
}

/// Tool definitions by name
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: BTreeMap<&'static str, Arc<ToolDefinition>>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in tool
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        for tool in fsl::definitions().into_iter().chain(spm::definitions()) {
            catalog.insert(tool);
        }
        catalog
    }

    /// Add or replace a definition
    pub fn insert(&mut self, tool: Arc<ToolDefinition>) {
        self.tools.insert(tool.name, tool);
    }

    pub fn get(&self, name: &str) -> Result<Arc<ToolDefinition>> {
        self.tools
            .get(name)
            .cloned()
            .ok_or_else(|| WrapError::UnknownTool(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ToolDefinition>> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Validate every definition, reporting the first inconsistency
    pub fn validate(&self) -> Result<()> {
        self.tools.values().try_for_each(|tool| tool.validate())
    }
}
