//! Attribute access over entity values, used by the filter/sort engine to
//! walk dotted attribute paths without depending on any one entity shape.

use serde_json::Value;

use crate::xid::Xid;

/// A resolved attribute value, coerced for the filter/sort comparisons of
/// spec §4.3: numeric coercion attempted for ordered comparisons when both
/// sides parse as numbers, case-insensitive string comparison otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

impl AttrValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttrValue::Null,
            Value::Bool(b) => AttrValue::Bool(*b),
            Value::Number(n) => AttrValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => AttrValue::Str(s.clone()),
            other => AttrValue::Str(other.to_string()),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn as_display_string(&self) -> String {
        match self {
            AttrValue::Null => String::new(),
            AttrValue::Bool(b) => b.to_string(),
            AttrValue::Number(n) => n.to_string(),
            AttrValue::Str(s) => s.clone(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }
}

/// Implemented by any type whose dotted attribute paths the filter engine
/// can resolve. Returns `None` when the attribute is absent (as distinct
/// from a present-but-null value, though both satisfy a `= null` test).
pub trait Filterable {
    fn attr(&self, path: &str) -> Option<AttrValue>;
}

/// Implemented by any type the sort/pagination stage can order and
/// tie-break. `xid()` backs the ascending tie-break rule of spec §4.3.
pub trait Sortable {
    fn xid(&self) -> &Xid;
}

/// Walk a dotted attribute path (`labels.team`, `license.spdxid`) through a
/// `serde_json::Value` tree. Adapters serialize a Resource/Version to JSON
/// once per attribute lookup site and delegate here rather than hand-rolling
/// per-field matches, so ecosystem-specific extras are filterable for free.
pub fn resolve_json_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_nested_path() {
        let v = json!({"labels": {"team": "platform"}});
        assert_eq!(
            resolve_json_path(&v, "labels.team"),
            Some(&Value::String("platform".into()))
        );
    }

    #[test]
    fn missing_path_is_none() {
        let v = json!({"labels": {"team": "platform"}});
        assert_eq!(resolve_json_path(&v, "labels.owner"), None);
        assert_eq!(resolve_json_path(&v, "description"), None);
    }
}
