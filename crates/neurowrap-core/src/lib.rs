//! Neurowrap Core - declarative wrappers for neuroimaging command-line tools
//!
//! Neurowrap turns a typed parameter set into either a literal command line
//! for a native image-processing executable or a generated script for the
//! scripted statistical package, and tells you which files the run produces.
//!
//! # Architecture
//!
//! 1. **Descriptors** (`descriptor`): name, kind, default and render rule of
//!    one tool input
//! 2. **Parameter sets** (`params`): bound values, validated against the
//!    mandatory and mutually-exclusive constraints of the tool
//! 3. **Compiler** (`compiler`): defaults resolved, tokens or script
//!    statements emitted in a fixed order
//! 4. **Output contracts** (`outputs`): logical output names mapped to
//!    predicted or discovered paths
//! 5. **Tool catalog** (`tools`): the built-in tool definitions
//! 6. **Invocation** (`invocation`): compile, execute through an adapter,
//!    resolve, record
//!
//! # Quick Start
//!
//! ```
//! use neurowrap_core::{compile, Environment, ParameterSet, WrapConfig};
//!
//! let env = Environment::with_cwd(&WrapConfig::default(), "/work");
//!
//! let mut bet = ParameterSet::for_tool("bet").unwrap();
//! bet.bind("infile", "/data/foo.nii").unwrap();
//! bet.bind("frac", 0.4).unwrap();
//!
//! let command = compile(&bet, &env).unwrap();
//! assert_eq!(command.command_line(), "bet /data/foo.nii /work/foo_brain.nii -f 0.40");
//! ```
//!
//! Compilation and dry-run resolution are pure: they read only the bound
//! values and the working directory sampled into the [`Environment`].

#![deny(unsafe_code)]
#![warn(rust_2018_idioms, missing_debug_implementations, clippy::all)]

pub mod compiler;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod invocation;
pub mod outputs;
pub mod params;
pub mod script;
pub mod tool;
pub mod tools;
pub mod types;
pub mod value;

// Re-exports for convenience
pub use compiler::{compile, preview, CommandBody, CompiledCommand};
pub use config::{Environment, OutputType, WrapConfig};
pub use descriptor::{DefaultRule, FieldStyle, ParamDescriptor, RenderRule, ValueFormat};
pub use error::{Result, ResultExt, WrapError};
pub use invocation::{
    run_tool, ExecutionAdapter, ExecutionOutcome, ExecutionReport, InvocationRecord,
};
pub use outputs::{
    ModelStructureReader, OutputContract, OutputOrigin, OutputPaths, OutputResolver, ResolveMode,
};
pub use params::{ParameterSet, ResolvedParams, Validation};
pub use tool::{Emitter, Specialization, ToolDefinition};
pub use tools::{catalog, ToolCatalog};
pub use types::{Blake3Hash, Timestamp};
pub use value::{Contrast, ParamKind, Value};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = "neurowrap-core";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "neurowrap-core");
    }
}
