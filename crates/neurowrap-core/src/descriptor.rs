//! Parameter descriptors
//!
//! A descriptor is the static declaration of one tool input: its kind, whether
//! it is mandatory, which peers it excludes, how its default is obtained and
//! how a bound value becomes command-line tokens or script fields.
//!
//! Descriptors are assembled with a small builder so tool tables read like the
//! option maps they encode:
//!
//! ```
//! use neurowrap_core::descriptor::{ParamDescriptor, ValueFormat};
//! use neurowrap_core::value::ParamKind;
//!
//! let frac = ParamDescriptor::new("frac", ParamKind::Float)
//!     .separate("-f", ValueFormat::Fixed(2))
//!     .help("fractional intensity threshold");
//! assert_eq!(frac.render_tokens(&0.4.into()), vec!["-f", "0.40"]);
//! ```

use crate::config::Environment;
use crate::value::{ParamKind, Value};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Literal formatting of scalar values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// Integers as `%d`, text and paths verbatim, floats in shortest form
    Plain,
    /// Floats with a fixed number of decimals (`%.Nf`)
    Fixed(usize),
}

impl ValueFormat {
    /// Format one scalar
    pub fn scalar(self, value: &Value) -> String {
        match (self, value) {
            (ValueFormat::Fixed(decimals), v) if v.as_float().is_some() => {
                format!("{:.*}", decimals, v.as_float().unwrap_or_default())
            }
            (_, Value::Bool(b)) => u8::from(*b).to_string(),
            (_, Value::Int(i)) => i.to_string(),
            (_, Value::Float(f)) => f.to_string(),
            (_, Value::Text(s)) => s.clone(),
            (_, Value::Path(p)) => p.display().to_string(),
            (_, other) => format!("{:?}", other),
        }
    }

    /// Format every scalar of a value, flattening lists
    pub fn items(self, value: &Value) -> Vec<String> {
        match value {
            Value::List(items) => items.iter().map(|item| self.scalar(item)).collect(),
            scalar => vec![self.scalar(scalar)],
        }
    }
}

/// How a job-structure field is written for script tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldStyle {
    /// Native literal; records become nested fields, record lists struct arrays
    Literal,
    /// Cell array of strings, even for a single path
    CellStr,
    /// A choice becomes a one-member struct: `field.Choice = 1`
    ChoiceStruct,
    /// A record whose members are written at the job root
    Merge,
    /// A record list whose member names are translated
    Renamed(&'static [(&'static str, &'static str)]),
}

/// How a bound value becomes output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderRule {
    /// Value tokens only (positional arguments)
    Bare(ValueFormat),
    /// A lone flag, emitted when the value is true
    Switch(&'static str),
    /// Flag token followed by one token per value: `-c 54 75 80`
    Separate(&'static str, ValueFormat),
    /// Single `flag=value` token, lists comma joined: `--subsamp=8,6,4`
    Joined(&'static str, ValueFormat),
    /// Whitespace-separated extra arguments, appended verbatim
    Raw,
    /// Script job field at the given dotted path
    Field(&'static str, FieldStyle),
    /// Not emitted directly; consumed by a script builder or output rule
    Hidden,
}

impl RenderRule {
    /// Whether this rule can render every value the kind admits
    pub fn supports(&self, kind: &ParamKind) -> bool {
        match self {
            RenderRule::Switch(_) => *kind == ParamKind::Flag,
            RenderRule::Bare(_) | RenderRule::Separate(..) | RenderRule::Joined(..) => !matches!(
                kind,
                ParamKind::Flag | ParamKind::Record | ParamKind::RecordList | ParamKind::Contrasts
            ),
            RenderRule::Raw => *kind == ParamKind::Text,
            RenderRule::Field(_, style) => match style {
                FieldStyle::Literal => *kind != ParamKind::Contrasts,
                FieldStyle::CellStr => matches!(
                    kind,
                    ParamKind::Path | ParamKind::Text | ParamKind::List { .. }
                ),
                FieldStyle::ChoiceStruct => {
                    matches!(kind, ParamKind::Choice(_) | ParamKind::Text)
                }
                FieldStyle::Merge => *kind == ParamKind::Record,
                FieldStyle::Renamed(_) => *kind == ParamKind::RecordList,
            },
            RenderRule::Hidden => true,
        }
    }
}

/// Function deriving a default from other parameter values
pub type DeriveFn = fn(&DeriveContext<'_>) -> Option<Value>;

/// Where an unbound parameter's value comes from
#[derive(Debug, Clone)]
pub enum DefaultRule {
    None,
    Constant(Value),
    /// Computed from the named inputs and the environment
    Derived {
        inputs: &'static [&'static str],
        derive: DeriveFn,
    },
}

impl DefaultRule {
    pub fn is_none(&self) -> bool {
        matches!(self, DefaultRule::None)
    }
}

/// Inputs visible to a [`DeriveFn`]
#[derive(Debug)]
pub struct DeriveContext<'a> {
    values: BTreeMap<&'static str, Value>,
    env: &'a Environment,
}

impl<'a> DeriveContext<'a> {
    pub(crate) fn new(values: BTreeMap<&'static str, Value>, env: &'a Environment) -> Self {
        Self { values, env }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn path(&self, name: &str) -> Option<&Path> {
        self.get(name).and_then(Value::as_path)
    }

    /// First path of a path or path-list input
    pub fn first_path(&self, name: &str) -> Option<PathBuf> {
        self.get(name).and_then(|v| v.path_list().into_iter().next())
    }

    pub fn env(&self) -> &Environment {
        self.env
    }
}

/// Static declaration of one named, typed tool input
#[derive(Debug, Clone, Serialize)]
pub struct ParamDescriptor {
    pub name: &'static str,
    pub kind: ParamKind,
    pub mandatory: bool,
    pub exclusive_with: &'static [&'static str],
    #[serde(skip)]
    pub default: DefaultRule,
    pub render: RenderRule,
    /// Value forced by a specialization; binding it is rejected
    pub fixed: bool,
    pub help: &'static str,
}

impl ParamDescriptor {
    /// A descriptor with no default that renders nothing until a rule is set
    pub fn new(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            mandatory: false,
            exclusive_with: &[],
            default: DefaultRule::None,
            render: RenderRule::Hidden,
            fixed: false,
            help: "",
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn exclusive_with(mut self, peers: &'static [&'static str]) -> Self {
        self.exclusive_with = peers;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultRule::Constant(value.into());
        self
    }

    pub fn derived(mut self, inputs: &'static [&'static str], derive: DeriveFn) -> Self {
        self.default = DefaultRule::Derived { inputs, derive };
        self
    }

    pub fn render(mut self, rule: RenderRule) -> Self {
        self.render = rule;
        self
    }

    pub fn positional(self) -> Self {
        self.render(RenderRule::Bare(ValueFormat::Plain))
    }

    pub fn switch(self, flag: &'static str) -> Self {
        self.render(RenderRule::Switch(flag))
    }

    pub fn separate(self, flag: &'static str, format: ValueFormat) -> Self {
        self.render(RenderRule::Separate(flag, format))
    }

    /// `flag value` with plain formatting
    pub fn arg(self, flag: &'static str) -> Self {
        self.separate(flag, ValueFormat::Plain)
    }

    pub fn joined(self, flag: &'static str, format: ValueFormat) -> Self {
        self.render(RenderRule::Joined(flag, format))
    }

    pub fn raw(self) -> Self {
        self.render(RenderRule::Raw)
    }

    pub fn field(self, path: &'static str, style: FieldStyle) -> Self {
        self.render(RenderRule::Field(path, style))
    }

    pub fn help(mut self, help: &'static str) -> Self {
        self.help = help;
        self
    }

    /// Render a bound value as command-line tokens.
    ///
    /// Total over every value accepted by `kind` when `render.supports(kind)`;
    /// script field rules and hidden parameters yield no tokens.
    pub fn render_tokens(&self, value: &Value) -> Vec<String> {
        match self.render {
            RenderRule::Bare(format) => format.items(value),
            RenderRule::Switch(flag) => {
                if value.as_bool().unwrap_or(false) {
                    vec![flag.to_string()]
                } else {
                    Vec::new()
                }
            }
            RenderRule::Separate(flag, format) => {
                let mut tokens = vec![flag.to_string()];
                tokens.extend(format.items(value));
                tokens
            }
            RenderRule::Joined(flag, format) => {
                let items = format.items(value);
                if items.is_empty() {
                    Vec::new()
                } else {
                    vec![format!("{}={}", flag, items.join(","))]
                }
            }
            RenderRule::Raw => value
                .as_text()
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            RenderRule::Field(..) | RenderRule::Hidden => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarKind;

    #[test]
    fn fixed_format_keeps_trailing_zeros() {
        let d = ParamDescriptor::new("frac", ParamKind::Float).separate("-f", ValueFormat::Fixed(2));
        assert_eq!(d.render_tokens(&Value::Float(0.4)), vec!["-f", "0.40"]);
        let d = ParamDescriptor::new("scaling", ParamKind::Float)
            .separate("-scaling", ValueFormat::Fixed(2));
        assert_eq!(d.render_tokens(&Value::Float(6.0)), vec!["-scaling", "6.00"]);
    }

    #[test]
    fn joined_lists_are_comma_separated() {
        let d = ParamDescriptor::new("sub_sampling", ParamKind::list(ScalarKind::Int))
            .joined("--subsamp", ValueFormat::Plain);
        assert_eq!(d.render_tokens(&Value::from(vec![8, 6, 4])), vec!["--subsamp=8,6,4"]);
        assert!(d.render_tokens(&Value::from(Vec::<i64>::new())).is_empty());
    }

    #[test]
    fn separate_tuples_spread_over_tokens() {
        let d = ParamDescriptor::new(
            "center",
            ParamKind::Tuple {
                of: ScalarKind::Int,
                len: 3,
            },
        )
        .arg("-c");
        assert_eq!(
            d.render_tokens(&Value::from(vec![54, 75, 80])),
            vec!["-c", "54", "75", "80"]
        );
    }

    #[test]
    fn switch_renders_only_when_true() {
        let d = ParamDescriptor::new("mask", ParamKind::Flag).switch("-m");
        assert_eq!(d.render_tokens(&Value::Bool(true)), vec!["-m"]);
        assert!(d.render_tokens(&Value::Bool(false)).is_empty());
    }

    #[test]
    fn raw_arguments_split_on_whitespace() {
        let d = ParamDescriptor::new("args", ParamKind::Text).raw();
        assert_eq!(
            d.render_tokens(&Value::from("-v  -noresample")),
            vec!["-v", "-noresample"]
        );
    }

    #[test]
    fn rule_kind_compatibility() {
        assert!(RenderRule::Switch("-m").supports(&ParamKind::Flag));
        assert!(!RenderRule::Switch("-m").supports(&ParamKind::Int));
        assert!(!RenderRule::Joined("--x", ValueFormat::Plain).supports(&ParamKind::Record));
        assert!(RenderRule::Field("bases", FieldStyle::Literal).supports(&ParamKind::Record));
        assert!(!RenderRule::Field("x", FieldStyle::Merge).supports(&ParamKind::Int));
    }
}
