//! Neurowrap CLI
//!
//! Inspect the tool catalog, print compiled commands and output contracts,
//! and run tools in a working directory.
//!
//! # Usage
//! ```bash
//! neurowrap cmdline bet -p infile=/data/foo.nii -p frac=0.4
//! neurowrap run mcflirt -p infile=run1.nii --workdir /scratch/sub01
//! ```

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use neurowrap_core::{
    catalog, compile, preview, run_tool, Environment, OutputResolver, ParameterSet, ResolveMode,
    WrapConfig,
};
use neurowrap_sandbox::ProcessAdapter;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Neurowrap - declarative wrappers for neuroimaging tools
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available tools
    Tools,

    /// Show the parameters and outputs of a tool
    Describe {
        tool: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the compiled command line or script
    Cmdline {
        #[command(flatten)]
        bind: Bindings,

        /// Skip the mandatory-parameter check
        #[arg(long)]
        preview: bool,
    },

    /// Print the output contract as JSON
    Outputs {
        #[command(flatten)]
        bind: Bindings,

        /// Also look for discovered outputs on disk
        #[arg(long)]
        discover: bool,
    },

    /// Run a tool and print the invocation record as JSON
    Run {
        #[command(flatten)]
        bind: Bindings,

        /// Working directory (default: current directory)
        #[arg(short, long, value_name = "DIR")]
        workdir: Option<PathBuf>,
    },
}

#[derive(Args)]
struct Bindings {
    /// Tool name
    tool: String,

    /// Parameter binding, NAME=VALUE (repeatable)
    #[arg(short = 'p', long = "param", value_name = "NAME=VALUE", value_parser = parse_binding)]
    params: Vec<(String, String)>,
}

impl Bindings {
    fn parameter_set(&self) -> anyhow::Result<ParameterSet> {
        let mut set = ParameterSet::for_tool(&self.tool)?;
        for (name, literal) in &self.params {
            set.bind_literal(name, literal)
                .with_context(|| format!("Binding {}={}", name, literal))?;
        }
        Ok(set)
    }
}

fn parse_binding(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{}'", raw)),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<WrapConfig> {
    let config = match path {
        Some(path) => WrapConfig::from_file(path)
            .with_context(|| format!("Loading configuration {}", path.display()))?,
        None => WrapConfig::default(),
    };
    Ok(config.apply_env()?)
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn describe(tool: &str, json: bool) -> anyhow::Result<()> {
    let definition = catalog().get(tool)?;
    if json {
        let outputs: Vec<&str> = definition.output_rules().iter().map(|r| r.name()).collect();
        return print_json(&serde_json::json!({
            "name": definition.name,
            "program": definition.program,
            "summary": definition.summary,
            "parent": definition.parent().map(|p| p.name),
            "params": definition.descriptors(),
            "outputs": outputs,
        }));
    }

    println!("{} ({}): {}", definition.name, definition.program, definition.summary);
    if let Some(parent) = definition.parent() {
        println!("specialises: {}", parent.name);
    }
    println!();
    for d in definition.descriptors() {
        let marker = if d.mandatory {
            "*"
        } else if d.fixed {
            "="
        } else {
            " "
        };
        let kind = format!("{:?}", d.kind).to_lowercase();
        println!("{} {:<28} {:<10} {}", marker, d.name, kind, d.help);
    }
    println!();
    for rule in definition.output_rules() {
        println!("  -> {:<26} {:?}", rule.name(), rule.origin());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Tools => {
            for tool in catalog().iter() {
                println!("{:<26} {}", tool.name, tool.summary);
            }
        }
        Commands::Describe { tool, json } => describe(&tool, json)?,
        Commands::Cmdline { bind, preview: dry } => {
            let set = bind.parameter_set()?;
            let env = Environment::capture(&config)?;
            let command = if dry {
                preview(&set, &env)?
            } else {
                compile(&set, &env)?
            };
            let text = command.command_line();
            println!("{}", text.trim_end());
        }
        Commands::Outputs { bind, discover } => {
            let set = bind.parameter_set()?;
            let env = Environment::capture(&config)?;
            let mode = if discover {
                ResolveMode::AfterRun
            } else {
                ResolveMode::DryRun
            };
            let contract = OutputResolver::new().resolve(&set, &env, mode)?;
            print_json(&contract)?;
        }
        Commands::Run { bind, workdir } => {
            let set = bind.parameter_set()?;
            let env = match workdir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)
                        .with_context(|| format!("Creating working directory {}", dir.display()))?;
                    // derived paths must be absolute, the child runs inside `dir`
                    let dir = std::fs::canonicalize(&dir)?;
                    Environment::with_cwd(&config, dir)
                }
                None => Environment::capture(&config)?,
            };
            let adapter = ProcessAdapter::new(&config);
            let record = run_tool(&adapter, &OutputResolver::new(), &set, &env).await?;
            print_json(&record)?;
            if !record.succeeded() {
                bail!("{} failed", record.tool);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_split_on_the_first_equals() {
        assert_eq!(
            parse_binding("args=-v -x=1"),
            Ok(("args".to_string(), "-v -x=1".to_string()))
        );
        assert!(parse_binding("=oops").is_err());
        assert!(parse_binding("frac").is_err());
    }

    #[test]
    fn cli_parses_repeated_params() {
        let cli = Cli::try_parse_from([
            "neurowrap",
            "cmdline",
            "bet",
            "-p",
            "infile=/data/foo.nii",
            "-p",
            "frac=0.4",
            "--preview",
        ])
        .unwrap();
        match cli.command {
            Commands::Cmdline { bind, preview } => {
                assert!(preview);
                assert_eq!(bind.params.len(), 2);
                let set = bind.parameter_set().unwrap();
                assert!(set.get("frac").is_some());
            }
            _ => panic!("expected cmdline"),
        }
    }
}
