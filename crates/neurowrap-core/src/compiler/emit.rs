//! Token and job-field emission over resolved parameters

use crate::config::Environment;
use crate::descriptor::{FieldStyle, RenderRule};
use crate::params::ResolvedParams;
use crate::script::{matlab, ScriptBuilder};
use crate::tool::JobPolicy;

/// Argument vector: program, positionals, named parameters, trailing positionals
pub(crate) fn argv(resolved: &ResolvedParams) -> Vec<String> {
    let tool = resolved.tool();
    let mut tokens = vec![tool.program.to_string()];

    let render = |name: &str, tokens: &mut Vec<String>| {
        if let (Some(descriptor), Some(value)) = (tool.descriptor(name), resolved.get(name)) {
            tokens.extend(descriptor.render_tokens(value));
        }
    };

    for name in tool.positional_order() {
        render(name, &mut tokens);
    }

    let placed = |name: &str| {
        tool.positional_order()
            .iter()
            .chain(tool.trailing_order())
            .any(|p| *p == name)
    };
    for entry in resolved.entries().iter().filter(|e| !placed(e.name)) {
        render(entry.name, &mut tokens);
    }

    for name in tool.trailing_order() {
        render(name, &mut tokens);
    }

    tokens
}

/// Job script: header, one assignment per field, run trailer, postscript
pub(crate) fn job(policy: &JobPolicy, resolved: &ResolvedParams, env: &Environment) -> Vec<String> {
    let prefix = policy.prefix();
    let mut script = ScriptBuilder::with_header();

    for entry in resolved.entries() {
        let Some(descriptor) = resolved.tool().descriptor(entry.name) else {
            continue;
        };
        if let RenderRule::Field(path, style) = descriptor.render {
            let target = match style {
                FieldStyle::Merge => prefix.clone(),
                _ => format!("{}.{}", prefix, path),
            };
            script.extend(matlab::assign(&target, &entry.value, style));
        }
    }

    script.run_jobs();
    if let Some(postscript) = policy.postscript {
        script.extend(postscript(resolved, env));
    }
    script.finish()
}
