//! Command-line compilation
//!
//! `compile` turns a parameter set into a [`CompiledCommand`]: a literal argv
//! for native executables, or an ordered statement list for script tools.
//!
//! Steps:
//! 1. validate the set (mandatory presence, exclusivity)
//! 2. resolve defaults, constant or derived
//! 3. emit positionals, then named parameters in declaration order, then
//!    trailing positionals; script tools hand the resolved values to their
//!    emitter instead
//!
//! Compilation never touches the filesystem.

pub mod defaults;
mod emit;

use crate::config::Environment;
use crate::error::{Result, WrapError};
use crate::params::{ParameterSet, ResolvedParams, Validation};
use crate::script;
use crate::tool::Emitter;
use crate::types::Blake3Hash;
use serde::{Deserialize, Serialize};

/// Compiled output: argv tokens or script statements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandBody {
    /// Program name first, then arguments
    Argv(Vec<String>),
    /// Ordered script statements
    Script(Vec<String>),
}

/// Immutable result of compiling one parameter snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledCommand {
    pub tool: String,
    pub program: String,
    pub body: CommandBody,
    /// Fingerprint of the snapshot this command was compiled from
    pub fingerprint: Blake3Hash,
}

impl CompiledCommand {
    pub fn is_script(&self) -> bool {
        matches!(self.body, CommandBody::Script(_))
    }

    /// Argument vector, program first (argv tools only)
    pub fn argv(&self) -> Option<&[String]> {
        match &self.body {
            CommandBody::Argv(tokens) => Some(tokens),
            CommandBody::Script(_) => None,
        }
    }

    /// Script statements (script tools only)
    pub fn statements(&self) -> Option<&[String]> {
        match &self.body {
            CommandBody::Script(statements) => Some(statements),
            CommandBody::Argv(_) => None,
        }
    }

    /// Joined script body (script tools only)
    pub fn script_body(&self) -> Option<String> {
        self.statements().map(script::join)
    }

    /// Space-joined argv, or the script body
    pub fn command_line(&self) -> String {
        match &self.body {
            CommandBody::Argv(tokens) => tokens.join(" "),
            CommandBody::Script(statements) => script::join(statements),
        }
    }
}

/// Compile with full validation
pub fn compile(params: &ParameterSet, env: &Environment) -> Result<CompiledCommand> {
    compile_with(params, env, Validation::Full)
}

/// Render what the command would be without requiring mandatory parameters.
///
/// Exclusivity and default cycles are still enforced.
pub fn preview(params: &ParameterSet, env: &Environment) -> Result<CompiledCommand> {
    compile_with(params, env, Validation::Preview)
}

fn compile_with(
    params: &ParameterSet,
    env: &Environment,
    mode: Validation,
) -> Result<CompiledCommand> {
    let tool = params.tool();
    params.validate(mode)?;
    let resolved = defaults::resolve(params, env)?;
    if mode == Validation::Full {
        check_resolved_mandatory(&resolved)?;
    }

    let body = match tool.emitter() {
        Emitter::Argv => CommandBody::Argv(emit::argv(&resolved)),
        Emitter::Job(policy) => CommandBody::Script(emit::job(policy, &resolved, env)),
        Emitter::Script(step) => CommandBody::Script(step(&resolved, env)),
    };

    let command = CompiledCommand {
        tool: tool.name.to_string(),
        program: tool.program.to_string(),
        body,
        fingerprint: params.fingerprint()?,
    };

    tracing::debug!(
        tool = tool.name,
        fingerprint = %command.fingerprint,
        script = command.is_script(),
        "Compiled command"
    );
    Ok(command)
}

fn check_resolved_mandatory(resolved: &ResolvedParams) -> Result<()> {
    let tool = resolved.tool();
    match tool
        .descriptors()
        .iter()
        .find(|d| d.mandatory && resolved.get(d.name).is_none())
    {
        Some(d) => Err(WrapError::MissingMandatoryParameter {
            tool: tool.name.to_string(),
            param: d.name.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WrapConfig;
    use crate::descriptor::{DeriveContext, ParamDescriptor, ValueFormat};
    use crate::tool::ToolDefinition;
    use crate::value::{ParamKind, Value};
    use std::sync::Arc;

    fn env() -> Environment {
        Environment::with_cwd(&WrapConfig::default(), "/work")
    }

    fn needs_missing(ctx: &DeriveContext<'_>) -> Option<Value> {
        ctx.get("seed").cloned()
    }

    fn toy() -> Arc<ToolDefinition> {
        Arc::new(
            ToolDefinition::argv("toy", "toy")
                .params(vec![
                    ParamDescriptor::new("verbose", ParamKind::Flag).switch("-v"),
                    ParamDescriptor::new("infile", ParamKind::Path)
                        .positional()
                        .mandatory(),
                    ParamDescriptor::new("frac", ParamKind::Float)
                        .separate("-f", ValueFormat::Fixed(2)),
                    ParamDescriptor::new("extra", ParamKind::list(crate::value::ScalarKind::Path))
                        .positional(),
                ])
                .positional(&["infile"])
                .trailing(&["extra"]),
        )
    }

    #[test]
    fn emission_order_is_positional_named_trailing() {
        let mut set = ParameterSet::new(toy());
        set.bind("extra", Value::paths(["b.nii", "c.nii"])).unwrap();
        set.bind("frac", 0.5).unwrap();
        set.bind("verbose", true).unwrap();
        set.bind("infile", "a.nii").unwrap();

        let command = compile(&set, &env()).unwrap();
        assert_eq!(command.command_line(), "toy a.nii -v -f 0.50 b.nii c.nii");
        assert!(!command.is_script());
    }

    #[test]
    fn preview_skips_mandatory_check() {
        let set = ParameterSet::new(toy());
        assert!(matches!(
            compile(&set, &env()),
            Err(WrapError::MissingMandatoryParameter { .. })
        ));
        assert_eq!(preview(&set, &env()).unwrap().command_line(), "toy");
    }

    #[test]
    fn mandatory_with_empty_derivation_is_missing() {
        let tool = Arc::new(ToolDefinition::argv("t", "t").params(vec![
            ParamDescriptor::new("seed", ParamKind::Path).arg("-s"),
            ParamDescriptor::new("out", ParamKind::Path)
                .arg("-o")
                .mandatory()
                .derived(&["seed"], needs_missing),
        ]));
        let set = ParameterSet::new(Arc::clone(&tool));
        match compile(&set, &env()) {
            Err(WrapError::MissingMandatoryParameter { param, .. }) => assert_eq!(param, "out"),
            other => panic!("unexpected {:?}", other),
        }

        let mut set = ParameterSet::new(tool);
        set.bind("seed", "x.nii").unwrap();
        assert_eq!(compile(&set, &env()).unwrap().command_line(), "t -s x.nii -o x.nii");
    }

    #[test]
    fn fingerprint_tracks_snapshot() {
        let mut a = ParameterSet::new(toy());
        a.bind("infile", "a.nii").unwrap();
        let mut b = a.fork();
        b.bind("frac", 0.1).unwrap();
        let ca = compile(&a, &env()).unwrap();
        let cb = compile(&b, &env()).unwrap();
        assert_ne!(ca.fingerprint, cb.fingerprint);
        assert_eq!(ca, compile(&a, &env()).unwrap());
    }
}
