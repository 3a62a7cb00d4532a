//! Convert serde_json::Value to values every backend can bind, and coerce textual keys.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// A value that can be bound to a statement on any backend. Converts from serde_json::Value.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    Text(String),
}

impl BindValue {
    pub fn from_json(v: &Value) -> Self {
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::I64(i)
                } else if let Some(f) = n.as_f64() {
                    BindValue::F64(f)
                } else {
                    BindValue::Text(n.to_string())
                }
            }
            Value::String(s) => BindValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => BindValue::Text(v.to_string()),
        }
    }
}

fn integer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+$").expect("static regex"))
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+\.\d+$").expect("static regex"))
}

/// Key text that looks like an integer or decimal becomes a number; anything else stays a string.
/// Integers too large for i64 stay strings so no precision is lost.
pub fn coerce_key(raw: &str) -> Value {
    let s = raw.trim();
    if integer_re().is_match(s) {
        if let Ok(n) = s.parse::<i64>() {
            return Value::Number(n.into());
        }
    } else if decimal_re().is_match(s) {
        if let Some(n) = s.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}

/// Canonical key equality: both sides are rendered as text and coerced with [`coerce_key`];
/// numbers compare numerically (so `"1"`, `1` and `1.0` agree), everything else as strings.
pub fn keys_equal(a: &Value, b: &Value) -> bool {
    match (coerce_key(&key_text(a)), coerce_key(&key_text(b))) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (x, y) => x == y,
    }
}

/// Text form of a key value as it would appear in a URL path.
pub fn key_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
