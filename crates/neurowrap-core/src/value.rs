//! Parameter values and kinds
//!
//! A [`Value`] is what a caller binds; a [`ParamKind`] is what a descriptor
//! accepts. [`ParamKind::check`] is the single place where a value is matched
//! against a kind, so every bind goes through the same tagged-variant match.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A bound parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Path(PathBuf),
    List(Vec<Value>),
    /// Nested key/value structure, emitted as struct fields in scripts
    Record(BTreeMap<String, Value>),
    Contrasts(Vec<Contrast>),
}

impl Value {
    /// Build a path value
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Value::Path(path.into())
    }

    /// Build a list of path values
    pub fn paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Value::List(paths.into_iter().map(|p| Value::Path(p.into())).collect())
    }

    /// Build a record from key/value pairs
    pub fn record<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        Value::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Floats, and integers widened to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Paths, and text interpreted as a path
    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Value::Path(p) => Some(p),
            Value::Text(s) => Some(Path::new(s)),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn as_contrasts(&self) -> Option<&[Contrast]> {
        match self {
            Value::Contrasts(c) => Some(c),
            _ => None,
        }
    }

    /// Every path held by this value: a single path, or each path of a list
    pub fn path_list(&self) -> Vec<PathBuf> {
        match self {
            Value::List(items) => items
                .iter()
                .filter_map(|v| v.as_path().map(Path::to_path_buf))
                .collect(),
            other => other.as_path().map(Path::to_path_buf).into_iter().collect(),
        }
    }

    /// Short name of the variant, used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Path(_) => "path",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Contrasts(_) => "contrasts",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i64::from(i))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<PathBuf> for Value {
    fn from(p: PathBuf) -> Self {
        Value::Path(p)
    }
}

impl From<&Path> for Value {
    fn from(p: &Path) -> Self {
        Value::Path(p.to_path_buf())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Vec<Contrast>> for Value {
    fn from(contrasts: Vec<Contrast>) -> Self {
        Value::Contrasts(contrasts)
    }
}

/// A contrast for the statistical package
///
/// The source accepted 3-, 4- and 5-element tuples whose trailing elements
/// were weights and then per-session multipliers; each shape is kept as its
/// own variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contrast {
    /// T contrast without explicit weights (every condition weighted 1)
    TSimple { name: String, conditions: Vec<String> },
    /// T contrast with one weight per condition
    TWeighted {
        name: String,
        conditions: Vec<String>,
        weights: Vec<f64>,
    },
    /// T contrast with weights scaled per session
    TSessioned {
        name: String,
        conditions: Vec<String>,
        weights: Vec<f64>,
        sessions: Vec<f64>,
    },
    /// F contrast stacking previously defined T contrasts
    F { name: String, components: Vec<Contrast> },
}

impl Contrast {
    pub fn t(name: impl Into<String>, conditions: &[&str], weights: &[f64]) -> Self {
        Contrast::TWeighted {
            name: name.into(),
            conditions: conditions.iter().map(|c| c.to_string()).collect(),
            weights: weights.to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Contrast::TSimple { name, .. }
            | Contrast::TWeighted { name, .. }
            | Contrast::TSessioned { name, .. }
            | Contrast::F { name, .. } => name,
        }
    }

    pub fn is_t(&self) -> bool {
        !matches!(self, Contrast::F { .. })
    }

    /// Conditions of a T contrast (empty for F)
    pub fn conditions(&self) -> &[String] {
        match self {
            Contrast::TSimple { conditions, .. }
            | Contrast::TWeighted { conditions, .. }
            | Contrast::TSessioned { conditions, .. } => conditions,
            Contrast::F { .. } => &[],
        }
    }

    /// Weight applied to the condition at `index`
    pub fn weight(&self, index: usize) -> f64 {
        match self {
            Contrast::TWeighted { weights, .. } | Contrast::TSessioned { weights, .. } => {
                weights.get(index).copied().unwrap_or(1.0)
            }
            _ => 1.0,
        }
    }

    /// Session multipliers, when the contrast is session-specific
    pub fn sessions(&self) -> Option<&[f64]> {
        match self {
            Contrast::TSessioned { sessions, .. } if !sessions.is_empty() => Some(sessions),
            _ => None,
        }
    }
}

/// Scalar element kinds used inside lists and tuples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Int,
    Float,
    Text,
    Path,
}

impl ScalarKind {
    fn check(self, value: Value) -> std::result::Result<Value, String> {
        match (self, value) {
            (ScalarKind::Int, Value::Int(i)) => Ok(Value::Int(i)),
            (ScalarKind::Float, Value::Float(f)) => Ok(Value::Float(f)),
            (ScalarKind::Float, Value::Int(i)) => Ok(Value::Float(i as f64)),
            (ScalarKind::Text, Value::Text(s)) => Ok(Value::Text(s)),
            (ScalarKind::Path, Value::Path(p)) => Ok(Value::Path(p)),
            (ScalarKind::Path, Value::Text(s)) => Ok(Value::Path(PathBuf::from(s))),
            (kind, other) => Err(format!("expected {:?}, got {}", kind, other.type_name())),
        }
    }

    fn parse(self, literal: &str) -> std::result::Result<Value, String> {
        let literal = literal.trim();
        match self {
            ScalarKind::Int => literal
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| format!("'{}' is not an integer: {}", literal, e)),
            ScalarKind::Float => literal
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| format!("'{}' is not a number: {}", literal, e)),
            ScalarKind::Text => Ok(Value::Text(literal.to_string())),
            ScalarKind::Path => Ok(Value::Path(PathBuf::from(literal))),
        }
    }
}

/// Allowed values of an enumerated parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Choices {
    Text(&'static [&'static str]),
    Int(&'static [i64]),
}

/// Semantic kind of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// Boolean switch
    Flag,
    Int,
    Float,
    Text,
    Path,
    /// Variable-length list; a single scalar binds as a one-element list
    List { of: ScalarKind, min_len: usize },
    /// Enumerated choice
    Choice(Choices),
    /// Fixed-arity tuple
    Tuple { of: ScalarKind, len: usize },
    /// Nested key/value structure
    Record,
    /// List of records; a single record binds as a one-element list
    RecordList,
    /// List of contrast definitions
    Contrasts,
}

impl ParamKind {
    /// Shorthand for a list with no minimum length
    pub const fn list(of: ScalarKind) -> Self {
        ParamKind::List { of, min_len: 0 }
    }

    /// Match `value` against this kind, returning the normalised value
    pub fn check(&self, value: Value) -> std::result::Result<Value, String> {
        match (*self, value) {
            (ParamKind::Flag, Value::Bool(b)) => Ok(Value::Bool(b)),
            (ParamKind::Int, v) => ScalarKind::Int.check(v),
            (ParamKind::Float, v) => ScalarKind::Float.check(v),
            (ParamKind::Text, v) => ScalarKind::Text.check(v),
            (ParamKind::Path, v) => ScalarKind::Path.check(v),
            (ParamKind::List { of, min_len }, value) => {
                let items = match value {
                    Value::List(items) => items,
                    scalar => vec![scalar],
                };
                if items.len() < min_len {
                    return Err(format!(
                        "expected at least {} items, got {}",
                        min_len,
                        items.len()
                    ));
                }
                items
                    .into_iter()
                    .map(|item| of.check(item))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            (ParamKind::Choice(Choices::Text(allowed)), Value::Text(s)) => {
                if allowed.contains(&s.as_str()) {
                    Ok(Value::Text(s))
                } else {
                    Err(format!("'{}' is not one of {:?}", s, allowed))
                }
            }
            (ParamKind::Choice(Choices::Int(allowed)), Value::Int(i)) => {
                if allowed.contains(&i) {
                    Ok(Value::Int(i))
                } else {
                    Err(format!("{} is not one of {:?}", i, allowed))
                }
            }
            (ParamKind::Tuple { of, len }, Value::List(items)) => {
                if items.len() != len {
                    return Err(format!("expected {} items, got {}", len, items.len()));
                }
                items
                    .into_iter()
                    .map(|item| of.check(item))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map(Value::List)
            }
            (ParamKind::Record, Value::Record(fields)) => Ok(Value::Record(fields)),
            (ParamKind::RecordList, Value::Record(fields)) => {
                Ok(Value::List(vec![Value::Record(fields)]))
            }
            (ParamKind::RecordList, Value::List(items)) => {
                if items.iter().all(|v| matches!(v, Value::Record(_))) {
                    Ok(Value::List(items))
                } else {
                    Err("expected a list of records".to_string())
                }
            }
            (ParamKind::Contrasts, Value::Contrasts(contrasts)) => {
                validate_contrasts(&contrasts)?;
                Ok(Value::Contrasts(contrasts))
            }
            (kind, other) => Err(format!("expected {:?}, got {}", kind, other.type_name())),
        }
    }

    /// Parse a command-line literal into a value of this kind
    ///
    /// Lists and tuples are comma separated; records and contrasts are JSON.
    pub fn parse_literal(&self, literal: &str) -> std::result::Result<Value, String> {
        let value = match *self {
            ParamKind::Flag => match literal.trim() {
                "true" | "1" | "yes" | "on" => Value::Bool(true),
                "false" | "0" | "no" | "off" => Value::Bool(false),
                other => return Err(format!("'{}' is not a boolean", other)),
            },
            ParamKind::Int | ParamKind::Choice(Choices::Int(_)) => ScalarKind::Int.parse(literal)?,
            ParamKind::Float => ScalarKind::Float.parse(literal)?,
            ParamKind::Text | ParamKind::Choice(Choices::Text(_)) => {
                ScalarKind::Text.parse(literal)?
            }
            ParamKind::Path => ScalarKind::Path.parse(literal)?,
            ParamKind::List { of, .. } | ParamKind::Tuple { of, .. } => Value::List(
                literal
                    .split(',')
                    .filter(|part| !part.trim().is_empty())
                    .map(|part| of.parse(part))
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            ParamKind::Record | ParamKind::RecordList | ParamKind::Contrasts => {
                let json: serde_json::Value =
                    serde_json::from_str(literal).map_err(|e| e.to_string())?;
                json_to_value(*self, json)?
            }
        };
        self.check(value)
    }
}

fn json_to_value(kind: ParamKind, json: serde_json::Value) -> std::result::Result<Value, String> {
    if kind == ParamKind::Contrasts {
        let contrasts: Vec<Contrast> = serde_json::from_value(json).map_err(|e| e.to_string())?;
        return Ok(Value::Contrasts(contrasts));
    }
    Ok(from_json(json))
}

/// Convert loose JSON into a value (numbers keep their integer-ness)
pub fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::List(Vec::new()),
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        serde_json::Value::String(s) => Value::Text(s),
        serde_json::Value::Array(items) => Value::List(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Record(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        }
    }
}

/// Shape checks for a contrast list.
///
/// Only what the generated script cannot survive is rejected: a weight list
/// shorter than its condition list, and F components that do not name a T
/// contrast of the same list. T contrasts are written before any F contrast,
/// so the position of the T contrast does not matter.
fn validate_contrasts(contrasts: &[Contrast]) -> std::result::Result<(), String> {
    for contrast in contrasts {
        match contrast {
            Contrast::TWeighted {
                name,
                conditions,
                weights,
            }
            | Contrast::TSessioned {
                name,
                conditions,
                weights,
                ..
            } => {
                if weights.len() < conditions.len() {
                    return Err(format!(
                        "contrast '{}' has {} conditions but {} weights",
                        name,
                        conditions.len(),
                        weights.len()
                    ));
                }
            }
            Contrast::TSimple { .. } => {}
            Contrast::F { name, components } => {
                for component in components {
                    let defined = contrasts
                        .iter()
                        .any(|c| c.is_t() && c.name() == component.name());
                    if !defined {
                        return Err(format!(
                            "F contrast '{}' references '{}', which is not a T contrast of the list",
                            name,
                            component.name()
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_kind_widens_integers() {
        assert_eq!(ParamKind::Float.check(Value::Int(20)), Ok(Value::Float(20.0)));
        assert!(ParamKind::Int.check(Value::Float(0.5)).is_err());
    }

    #[test]
    fn list_kind_accepts_single_scalar() {
        let kind = ParamKind::list(ScalarKind::Int);
        assert_eq!(
            kind.check(Value::Int(5)),
            Ok(Value::List(vec![Value::Int(5)]))
        );
    }

    #[test]
    fn list_kind_enforces_minimum_length() {
        let kind = ParamKind::List {
            of: ScalarKind::Path,
            min_len: 2,
        };
        assert!(kind.check(Value::paths(["a.nii"])).is_err());
        assert!(kind.check(Value::paths(["a.nii", "b.nii"])).is_ok());
    }

    #[test]
    fn text_binds_as_path() {
        assert_eq!(
            ParamKind::Path.check(Value::from("foo.nii")),
            Ok(Value::path("foo.nii"))
        );
    }

    #[test]
    fn choice_rejects_unknown_member() {
        let kind = ParamKind::Choice(Choices::Text(&["mutualinfo", "corratio"]));
        assert!(kind.check(Value::from("mutualinfo")).is_ok());
        assert!(kind.check(Value::from("bogus")).is_err());
        let kind = ParamKind::Choice(Choices::Int(&[1, 2, 3]));
        assert!(kind.check(Value::Int(4)).is_err());
    }

    #[test]
    fn tuple_requires_exact_arity() {
        let kind = ParamKind::Tuple {
            of: ScalarKind::Int,
            len: 3,
        };
        assert!(kind.check(Value::from(vec![54, 75, 80])).is_ok());
        assert!(kind.check(Value::from(vec![54, 75])).is_err());
    }

    #[test]
    fn parse_literal_follows_kind() {
        assert_eq!(ParamKind::Float.parse_literal("0.40"), Ok(Value::Float(0.4)));
        assert_eq!(
            ParamKind::list(ScalarKind::Int).parse_literal("8,6,4"),
            Ok(Value::from(vec![8, 6, 4]))
        );
        assert_eq!(ParamKind::Flag.parse_literal("true"), Ok(Value::Bool(true)));
        let record = ParamKind::Record
            .parse_literal(r#"{"hrf": {"derivs": [0, 0]}}"#)
            .unwrap();
        let derivs = &record.as_record().unwrap()["hrf"].as_record().unwrap()["derivs"];
        assert_eq!(derivs, &Value::from(vec![0, 0]));
    }

    #[test]
    fn f_components_name_t_contrasts_anywhere_in_the_list() {
        let t = Contrast::t("Task>Baseline", &["Task"], &[1.0]);
        let f = Contrast::F {
            name: "Effects".to_string(),
            components: vec![t.clone()],
        };
        assert!(ParamKind::Contrasts
            .check(Value::Contrasts(vec![t.clone(), f.clone()]))
            .is_ok());
        assert!(ParamKind::Contrasts
            .check(Value::Contrasts(vec![f.clone(), t.clone()]))
            .is_ok());

        let err = ParamKind::Contrasts
            .check(Value::Contrasts(vec![f.clone()]))
            .unwrap_err();
        assert!(err.contains("'Task>Baseline'"));

        let nested = Contrast::F {
            name: "Nested".to_string(),
            components: vec![Contrast::TSimple {
                name: "Effects".to_string(),
                conditions: Vec::new(),
            }],
        };
        assert!(ParamKind::Contrasts
            .check(Value::Contrasts(vec![t, f, nested]))
            .is_err());
    }

    #[test]
    fn short_weight_list_is_rejected() {
        let c = Contrast::t("A>B", &["A", "B"], &[1.0]);
        assert!(ParamKind::Contrasts.check(Value::Contrasts(vec![c])).is_err());
    }

    #[test]
    fn contrasts_parse_from_json() {
        let parsed = ParamKind::Contrasts
            .parse_literal(
                r#"[{"t_weighted": {"name": "A>B", "conditions": ["A", "B"], "weights": [1, -1]}}]"#,
            )
            .unwrap();
        assert_eq!(
            parsed,
            Value::Contrasts(vec![Contrast::t("A>B", &["A", "B"], &[1.0, -1.0])])
        );
    }
}
