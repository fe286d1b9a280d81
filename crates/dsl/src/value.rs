use nucleus_snapshot::Match;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Runtime value produced by evaluating a Nucleus expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Match(Box<Match>),
    List(Vec<Value>),
    Record(BTreeMap<String, Value>),
}

impl Value {
    /// `null`, `false`, `0`, `NaN` and `""` are falsy. Everything else,
    /// including an empty list, is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Match(_) | Self::List(_) | Self::Record(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Match(_) => "match",
            Self::List(_) => "list",
            Self::Record(_) => "record",
        }
    }

    /// Named field of a match or record. Anything else has no fields.
    pub fn field(&self, key: &str) -> Value {
        match self {
            Self::Match(m) => match key {
                "match" => Self::String(m.matched.clone()),
                "line" => Self::String(m.line.clone()),
                "lineNum" => Self::Number(m.line_num as f64),
                "index" => Self::Number(m.index as f64),
                "groups" => Self::List(
                    m.groups
                        .iter()
                        .map(|g| g.clone().map_or(Self::Null, Self::String))
                        .collect(),
                ),
                _ => Self::Null,
            },
            Self::Record(fields) => fields.get(key).cloned().unwrap_or(Self::Null),
            _ => Self::Null,
        }
    }

    /// Text used when a value is matched against a pattern: a match's full
    /// line, a string itself, otherwise the display form.
    pub fn subject_text(&self) -> String {
        match self {
            Self::Match(m) => m.line.clone(),
            Self::String(s) => s.clone(),
            Self::Record(fields) => match fields.get("line") {
                Some(Self::String(line)) => line.clone(),
                _ => self.to_string(),
            },
            other => other.to_string(),
        }
    }

    /// Sort order: null first, numbers numerically when both sides are
    /// numbers, otherwise ordinal comparison of the display forms.
    pub fn compare(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (a, b) => a.to_string().cmp(&b.to_string()),
        }
    }
}

impl From<Match> for Value {
    fn from(m: Match) -> Self {
        Self::Match(Box::new(m))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Self::Number(n as f64)
    }
}

fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0).then_some(n as i64)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => match integral(*n) {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{n}"),
            },
            Self::String(s) => f.write_str(s),
            Self::Match(m) => f.write_str(&m.line),
            Self::List(_) | Self::Record(_) => {
                let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
                f.write_str(&json)
            }
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None if n.is_finite() => serializer.serialize_f64(*n),
                None => serializer.serialize_unit(),
            },
            Self::String(s) => serializer.serialize_str(s),
            Self::Match(m) => m.serialize(serializer),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_match() -> Match {
        Match {
            matched: "function foo".into(),
            line: "export function foo() {}".into(),
            line_num: 4,
            index: 40,
            groups: vec![Some("foo".into()), None],
        }
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::String(String::new()).is_truthy());
        assert!(Value::List(vec![]).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::from(sample_match()).is_truthy());
    }

    #[test]
    fn match_fields() {
        let v = Value::from(sample_match());
        assert_eq!(v.field("lineNum"), Value::Number(4.0));
        assert_eq!(v.field("match"), Value::from("function foo"));
        assert_eq!(
            v.field("groups"),
            Value::List(vec![Value::from("foo"), Value::Null])
        );
        assert_eq!(v.field("nope"), Value::Null);
        assert_eq!(Value::Number(1.0).field("x"), Value::Null);
    }

    #[test]
    fn serializes_like_json_values() {
        let v = Value::List(vec![
            Value::Number(3.0),
            Value::Number(1.5),
            Value::Null,
            Value::from(sample_match()),
        ]);
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                3,
                1.5,
                null,
                {
                    "match": "function foo",
                    "line": "export function foo() {}",
                    "lineNum": 4,
                    "index": 40,
                    "groups": ["foo", null]
                }
            ])
        );
    }

    #[test]
    fn compare_orders_null_first_then_numbers() {
        assert_eq!(Value::Null.compare(&Value::Number(1.0)), Ordering::Less);
        assert_eq!(Value::Number(10.0).compare(&Value::Number(9.0)), Ordering::Greater);
        assert_eq!(Value::from("10").compare(&Value::from("9")), Ordering::Less);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Number(7.0).to_string(), "7");
        assert_eq!(Value::Number(0.25).to_string(), "0.25");
        assert_eq!(Value::from(sample_match()).to_string(), "export function foo() {}");
        assert_eq!(
            Value::List(vec![Value::from("a"), Value::Bool(true)]).to_string(),
            r#"["a",true]"#
        );
    }
}
