use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed observation returned by an evaluator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum Fact {
    Bool(bool),
    Int(i64),
    Set(BTreeSet<String>),
    Map(BTreeMap<String, i64>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FactKind {
    Bool,
    Int,
    Set,
    Map,
}

impl Fact {
    pub fn kind(&self) -> FactKind {
        match self {
            Fact::Bool(_) => FactKind::Bool,
            Fact::Int(_) => FactKind::Int,
            Fact::Set(_) => FactKind::Set,
            Fact::Map(_) => FactKind::Map,
        }
    }

    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Fact::Set(items.into_iter().map(Into::into).collect())
    }

    /// Reads a fact back out of arbitrary report JSON. Floats and nested objects are not facts.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Fact::Bool(*b)),
            Value::Number(n) => n.as_i64().map(Fact::Int),
            Value::Array(items) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<BTreeSet<_>>>()
                .map(Fact::Set),
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| v.as_i64().map(|n| (k.clone(), n)))
                .collect::<Option<BTreeMap<_, _>>>()
                .map(Fact::Map),
            _ => None,
        }
    }
}

impl From<Fact> for Value {
    fn from(fact: Fact) -> Self {
        match fact {
            Fact::Bool(b) => Value::Bool(b),
            Fact::Int(n) => Value::from(n),
            Fact::Set(s) => Value::Array(s.into_iter().map(Value::String).collect()),
            Fact::Map(m) => Value::Object(m.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fact::Bool(b) => write!(f, "{b}"),
            Fact::Int(n) => write!(f, "{n}"),
            Fact::Set(s) => write!(f, "[{}]", s.iter().cloned().collect::<Vec<_>>().join(", ")),
            Fact::Map(m) => {
                let parts: Vec<String> = m.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn untagged_json_shape() {
        assert_eq!(serde_json::to_value(Fact::Int(3)).unwrap(), json!(3));
        assert_eq!(serde_json::to_value(Fact::set(["b", "a"])).unwrap(), json!(["a", "b"]));
        let back: Fact = serde_json::from_value(json!({"py": 2})).unwrap();
        assert_eq!(back.kind(), FactKind::Map);
    }

    #[test]
    fn from_json_rejects_floats_and_mixed_arrays() {
        assert_eq!(Fact::from_json(&json!(true)), Some(Fact::Bool(true)));
        assert_eq!(Fact::from_json(&json!(1.5)), None);
        assert_eq!(Fact::from_json(&json!(["a", 1])), None);
        assert_eq!(Fact::from_json(&json!(null)), None);
    }
}
