/// Dynamically-typed values exchanged with the sandbox
///
/// Test-case inputs, expected outputs and the values returned by submitted
/// functions all travel as JSON. `Value` is the tagged form the harness and
/// the report layer work with.
///
/// **Equality Rules:**
/// - Numbers compare by numeric value: `1 == 1.0`, integers of any size exactly
/// - Booleans never equal numbers
/// - Lists compare element-wise, in order
/// - Maps compare by key set and per-key value, insertion order ignored

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "serde_json::Value", into = "serde_json::Value")]
pub enum Value {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

/// Integers compare exactly, floats as IEEE doubles, and an integer equals a
/// float only when the double holds exactly that integer
fn numbers_equal(a: &serde_json::Number, b: &serde_json::Number) -> bool {
    match (integer_text(a), integer_text(b)) {
        (Some(x), Some(y)) => x == y,
        (Some(x), None) => float_as_integer(b).is_some_and(|y| x == y),
        (None, Some(y)) => float_as_integer(a).is_some_and(|x| x == y),
        (None, None) => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

fn canonical_zero(text: String) -> String {
    if text == "-0" {
        "0".to_string()
    } else {
        text
    }
}

/// Decimal text of an integer literal, `None` for a float literal.
/// Needs `arbitrary_precision` so the literal text survives parsing.
fn integer_text(n: &serde_json::Number) -> Option<String> {
    let text = n.to_string();
    if text.contains(['.', 'e', 'E']) {
        return None;
    }
    Some(canonical_zero(text))
}

/// Exact decimal text of a float with no fractional part
fn float_as_integer(n: &serde_json::Number) -> Option<String> {
    let f = n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0)?;
    Some(canonical_zero(format!("{:.0}", f)))
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => numbers_equal(a, b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(b),
            Value::Number(n) => serde_json::Value::Number(n),
            Value::String(s) => serde_json::Value::String(s),
            Value::List(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            Value::Map(map) => {
                serde_json::Value::Object(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

fn write_json_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    // serde_json escaping of a plain string cannot fail
    match serde_json::to_string(s) {
        Ok(quoted) => f.write_str(&quoted),
        Err(_) => write!(f, "{:?}", s),
    }
}

/// Compact JSON rendering, used verbatim in reports
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write_json_string(f, s),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(map) => {
                f.write_str("{")?;
                for (idx, (key, item)) in map.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    write_json_string(f, key)?;
                    write!(f, ": {}", item)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// Render a sequence of values as a list, e.g. the positional inputs of a case
pub fn display_list(values: &[Value]) -> String {
    Value::List(values.to_vec()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn v(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_nested_structural_equality() {
        let expected = v(json!([1, [2, 3], {"a": 1}]));
        assert_eq!(expected, v(json!([1, [2, 3], {"a": 1}])));
        assert_ne!(expected, v(json!([1, [2, 3], {"a": 2}])));
    }

    #[test]
    fn test_integer_and_float_compare_numerically() {
        assert_eq!(v(json!(1)), v(json!(1.0)));
        assert_eq!(v(json!([2.5, 3])), v(json!([2.5, 3.0])));
        assert_ne!(v(json!(1)), v(json!(1.5)));
    }

    #[test]
    fn test_bool_is_not_a_number() {
        assert_ne!(v(json!(true)), v(json!(1)));
        assert_ne!(v(json!(false)), v(json!(0)));
        assert_ne!(v(json!(null)), v(json!(false)));
    }

    #[test]
    fn test_map_order_ignored_list_order_kept() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();
        assert_eq!(a, b);
        assert_ne!(v(json!([1, 2])), v(json!([2, 1])));
    }

    #[test]
    fn test_extra_map_key_is_unequal() {
        assert_ne!(v(json!({"a": 1})), v(json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_large_unsigned_integers() {
        assert_eq!(v(json!(u64::MAX)), v(json!(u64::MAX)));
        assert_ne!(v(json!(u64::MAX)), v(json!(-1)));
    }

    fn parse(raw: &str) -> Value {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_integers_beyond_u64_compare_exactly() {
        assert_ne!(parse("18446744073709551616"), parse("18446744073709551617"));
        assert_eq!(parse("18446744073709551616"), parse("18446744073709551616"));
        assert_ne!(parse("-18446744073709551616"), parse("18446744073709551616"));
    }

    #[test]
    fn test_integer_equals_float_only_when_exact() {
        // 2**53 + 1 has no double representation
        assert_ne!(parse("9007199254740993"), parse("9007199254740992.0"));
        assert_eq!(parse("9007199254740992"), parse("9007199254740992.0"));
        assert_eq!(parse("100"), parse("1e2"));
        assert_eq!(parse("0"), parse("-0.0"));
        assert_ne!(parse("3"), parse("3.0000001"));
    }

    #[test]
    fn test_big_integer_displayed_verbatim() {
        let big = parse("[123456789012345678901234567890]");
        assert_eq!(big.to_string(), "[123456789012345678901234567890]");
    }

    #[test]
    fn test_display_is_compact_json() {
        let value = v(json!([1, "two", null, {"k": [true, 2.5]}]));
        assert_eq!(value.to_string(), r#"[1, "two", null, {"k": [true, 2.5]}]"#);
        assert_eq!(v(json!("quote\"d")).to_string(), r#""quote\"d""#);
    }

    #[test]
    fn test_serde_round_trip_preserves_shape() {
        let raw = r#"{"a":[1,2.5,"s",null,false]}"#;
        let value: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(serde_json::to_string(&value).unwrap(), raw);
    }

    #[test]
    fn test_display_list() {
        assert_eq!(display_list(&[Value::from(1i64), Value::from("a")]), r#"[1, "a"]"#);
        assert_eq!(display_list(&[]), "[]");
    }
}
