//! Error types for Neurowrap Core
//!
//! This module defines all error types used by the compiler, the output
//! resolver and the tool catalog. We use `thiserror` for ergonomic error
//! definitions with automatic Display/Error implementations.

use thiserror::Error;

/// Result type alias for Neurowrap operations
pub type Result<T> = std::result::Result<T, WrapError>;

/// Main error type for Neurowrap operations
#[derive(Error, Debug)]
pub enum WrapError {
    /// A value does not match the kind declared by its descriptor
    #[error("Invalid value for parameter '{param}': {reason}")]
    InvalidValue { param: String, reason: String },

    /// The parameter name is not declared by the tool
    #[error("Unknown parameter '{param}' for tool '{tool}'")]
    UnknownParameter { tool: String, param: String },

    /// The tool name is not in the catalog
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A bind was attempted after `finalize`
    #[error("Parameter set for '{0}' is finalized and read-only")]
    ParameterSetFrozen(String),

    /// A mandatory descriptor has neither a bound value nor a default
    #[error("Tool '{tool}' requires a value for '{param}'")]
    MissingMandatoryParameter { tool: String, param: String },

    /// Two or more members of an exclusivity group are bound
    #[error("Parameters {group:?} are mutually exclusive, got {bound:?}")]
    ConflictingParameters { group: Vec<String>, bound: Vec<String> },

    /// Derived defaults depend on each other
    #[error("Default derivation cycle: {}", .0.join(" -> "))]
    DefaultCycle(Vec<String>),

    /// One logical output could not be resolved
    #[error("Output '{output}' is unresolvable: {reason}")]
    OutputContractUnresolvable { output: String, reason: String },

    /// Tool definition is internally inconsistent
    #[error("Invalid tool definition '{tool}': {reason}")]
    InvalidDefinition { tool: String, reason: String },

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<WrapError>,
    },
}

impl WrapError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for [`WrapError::InvalidValue`]
    pub fn invalid_value(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// The innermost error, with every context layer removed
    pub fn root(&self) -> &WrapError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<toml::de::Error> for WrapError {
    fn from(e: toml::de::Error) -> Self {
        WrapError::InvalidConfig(e.to_string())
    }
}

impl From<toml::ser::Error> for WrapError {
    fn from(e: toml::ser::Error) -> Self {
        WrapError::InvalidConfig(e.to_string())
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}
