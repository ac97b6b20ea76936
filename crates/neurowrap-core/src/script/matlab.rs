//! Literal rendering for the numerical environment's script language

use crate::descriptor::FieldStyle;
use crate::value::Value;
use std::path::Path;

/// Quote a string, doubling embedded single quotes
pub fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

pub fn quote_path(path: &Path) -> String {
    quote(&path.display().to_string())
}

/// Float literal: shortest round-trip form, `Inf`/`-Inf`/`NaN` spelled out
pub fn float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

/// `%f` formatting (six decimals)
pub fn fixed6(value: f64) -> String {
    format!("{:.6}", value)
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Int(_) | Value::Float(_))
}

/// Render a value as a script literal
pub fn literal(value: &Value) -> String {
    match value {
        Value::Bool(b) => u8::from(*b).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => float(*f),
        Value::Text(s) => quote(s),
        Value::Path(p) => quote_path(p),
        Value::List(items) if items.is_empty() => "[]".to_string(),
        Value::List(items) if items.iter().all(is_numeric) => {
            let parts: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", parts.join(" "))
        }
        Value::List(items) => {
            let parts: Vec<String> = items.iter().map(literal).collect();
            format!("{{{}}}", parts.join(","))
        }
        Value::Record(fields) => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(key, value)| format!("{}, {}", quote(key), literal(value)))
                .collect();
            format!("struct({})", parts.join(", "))
        }
        Value::Contrasts(contrasts) => {
            let names: Vec<String> = contrasts.iter().map(|c| quote(c.name())).collect();
            format!("{{{}}}", names.join(","))
        }
    }
}

/// Column cell array of strings; a single path becomes a one-element cell
pub fn cellstr(value: &Value) -> String {
    let items: Vec<String> = match value {
        Value::List(items) => items.iter().map(cell_item).collect(),
        other => vec![cell_item(other)],
    };
    format!("{{{}}}", items.join(";"))
}

fn cell_item(value: &Value) -> String {
    match value {
        Value::Text(_) | Value::Path(_) => literal(value),
        other => quote(&literal(other)),
    }
}

fn is_record_list(value: &Value) -> bool {
    matches!(value, Value::List(items)
        if !items.is_empty() && items.iter().all(|v| matches!(v, Value::Record(_))))
}

/// Assignment statements writing `value` at `target` in the given style.
///
/// Records expand into one statement per leaf field and record lists into
/// struct arrays (`target(1).field`), so the job structure is built field by
/// field the way the package expects.
pub fn assign(target: &str, value: &Value, style: FieldStyle) -> Vec<String> {
    match style {
        FieldStyle::Literal => assign_literal(target, value),
        FieldStyle::CellStr => vec![format!("{} = {};", target, cellstr(value))],
        FieldStyle::ChoiceStruct => match value {
            Value::Text(choice) => vec![format!("{}.{} = 1;", target, choice)],
            other => assign_literal(target, other),
        },
        FieldStyle::Merge => match value {
            Value::Record(fields) => fields
                .iter()
                .flat_map(|(key, value)| assign_literal(&format!("{}.{}", target, key), value))
                .collect(),
            other => assign_literal(target, other),
        },
        FieldStyle::Renamed(names) => {
            let rename = |key: &str| -> String {
                names
                    .iter()
                    .find(|(from, _)| *from == key)
                    .map(|(_, to)| to.to_string())
                    .unwrap_or_else(|| key.to_string())
            };
            let records: Vec<&Value> = match value {
                Value::List(items) => items.iter().collect(),
                single => vec![single],
            };
            let mut statements = Vec::new();
            for (i, record) in records.into_iter().enumerate() {
                let element = format!("{}({})", target, i + 1);
                match record {
                    Value::Record(fields) => {
                        for (key, value) in fields {
                            statements.extend(assign_literal(
                                &format!("{}.{}", element, rename(key)),
                                value,
                            ));
                        }
                    }
                    other => statements.extend(assign_literal(&element, other)),
                }
            }
            statements
        }
    }
}

fn assign_literal(target: &str, value: &Value) -> Vec<String> {
    match value {
        Value::Record(fields) if !fields.is_empty() => fields
            .iter()
            .flat_map(|(key, value)| assign_literal(&format!("{}.{}", target, key), value))
            .collect(),
        Value::List(items) if is_record_list(value) => items
            .iter()
            .enumerate()
            .flat_map(|(i, item)| assign_literal(&format!("{}({})", target, i + 1), item))
            .collect(),
        other => vec![format!("{} = {};", target, literal(other))],
    }
}
