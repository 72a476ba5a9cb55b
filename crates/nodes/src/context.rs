//! The execution-scoped variable bag.
//!
//! A [`Context`] maps variable names to a small closed value union
//! ([`ContextValue`]). It is persisted as a JSON object alongside the
//! execution row. Executors never mutate a context directly: they return a
//! [`ContextPatch`] which the engine merges after each step.
//!
//! Keys starting with `_` are transient scratch values. The executor that
//! consumes one is responsible for clearing it.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::NodeError;

/// Maximum length of a variable name coming from flow configuration.
pub const MAX_VARIABLE_LEN: usize = 64;

// ---------------------------------------------------------------------------
// ContextValue
// ---------------------------------------------------------------------------

/// A single context value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Arrays, objects and nulls (carts, stock results, orders, …).
    Structured(Value),
}

impl ContextValue {
    /// Serialize any `Serialize` value into a structured context value.
    pub fn structured<T: Serialize>(value: &T) -> Result<Self, NodeError> {
        serde_json::to_value(value)
            .map(Self::from)
            .map_err(|e| NodeError::Config(format!("cannot store value in context: {e}")))
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view. Text is coerced when it parses as a number
    /// (`,` is accepted as decimal separator).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().replace(',', ".").parse().ok(),
            Self::Bool(_) | Self::Structured(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Text(s) => match s.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(s) => Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Bool(b) => Value::Bool(*b),
            Self::Structured(v) => v.clone(),
        }
    }
}

impl fmt::Display for ContextValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Structured(Value::Null) => Ok(()),
            Self::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ContextValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for ContextValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<f64> for ContextValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<u32> for ContextValue {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<bool> for ContextValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<Value> for ContextValue {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => Self::Text(s),
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Self::Number(f),
                None => Self::Structured(Value::Number(n)),
            },
            other => Self::Structured(other),
        }
    }
}

// ---------------------------------------------------------------------------
// ContextPatch
// ---------------------------------------------------------------------------

/// A set of `set` / `clear` operations to be shallow-merged into a context.
///
/// Later operations on the same key replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextPatch {
    ops: BTreeMap<String, Option<ContextValue>>,
}

impl ContextPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style `set`.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Builder-style `clear`.
    pub fn without(mut self, key: impl Into<String>) -> Self {
        self.clear(key);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.ops.insert(key.into(), Some(value.into()));
    }

    pub fn clear(&mut self, key: impl Into<String>) {
        self.ops.insert(key.into(), None);
    }

    /// The pending operation for `key`: `Some(Some(v))` sets, `Some(None)` clears.
    pub fn get(&self, key: &str) -> Option<Option<&ContextValue>> {
        self.ops.get(key).map(Option::as_ref)
    }

    pub fn extend(&mut self, other: ContextPatch) {
        self.ops.extend(other.ops);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.ops.keys().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// The variable bag threaded through one execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context {
    vars: BTreeMap<String, ContextValue>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a context from its persisted JSON object.
    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            other => serde_json::from_value(other),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.vars
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    pub fn get(&self, key: &str) -> Option<&ContextValue> {
        self.vars.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    /// Display form of a value, `None` when absent.
    pub fn text(&self, key: &str) -> Option<String> {
        self.vars.get(key).map(ToString::to_string)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.vars.get(key).and_then(ContextValue::as_f64)
    }

    /// Deserialize a structured value. Returns `None` when the key is absent
    /// or holds something of a different shape.
    pub fn structured<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.vars
            .get(key)
            .and_then(|v| serde_json::from_value(v.to_json()).ok())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ContextValue>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<ContextValue> {
        self.vars.remove(key)
    }

    /// Shallow-merge a patch.
    pub fn apply(&mut self, patch: &ContextPatch) {
        for (key, op) in &patch.ops {
            match op {
                Some(value) => {
                    self.vars.insert(key.clone(), value.clone());
                }
                None => {
                    self.vars.remove(key);
                }
            }
        }
    }

    /// A copy with every transient (`_`-prefixed) key dropped.
    pub fn without_transient(&self) -> Context {
        Context {
            vars: self
                .vars
                .iter()
                .filter(|(k, _)| !is_transient_key(k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContextValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// Transient scratch keys start with an underscore.
pub fn is_transient_key(key: &str) -> bool {
    key.starts_with('_')
}

/// Validate a variable name taken from externally-authored flow configuration.
///
/// Accepted: an ASCII letter followed by letters, digits or `_`, at most
/// [`MAX_VARIABLE_LEN`] characters. Transient names are reserved for
/// executors and therefore rejected here.
pub fn validate_variable_name(name: &str) -> Result<(), NodeError> {
    let mut chars = name.chars();
    let valid_head = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let valid_tail = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid_head && valid_tail && name.len() <= MAX_VARIABLE_LEN {
        Ok(())
    } else {
        Err(NodeError::Config(format!("invalid variable name '{name}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_sets_and_clears_keys() {
        let mut ctx = Context::new();
        ctx.insert("_scratch", "x");
        ctx.insert("keep", 1.0);

        let patch = ContextPatch::new().with("name", "Lucas").without("_scratch");
        ctx.apply(&patch);

        assert_eq!(ctx.text("name").as_deref(), Some("Lucas"));
        assert!(!ctx.contains("_scratch"));
        assert_eq!(ctx.number("keep"), Some(1.0));
    }

    #[test]
    fn json_round_trip_keeps_value_kinds() {
        let raw = json!({ "name": "Ana", "qty": 3, "vip": true, "cart": [{ "id": "p1" }] });
        let ctx = Context::from_json(raw).expect("valid context");

        assert_eq!(ctx.get("name"), Some(&ContextValue::Text("Ana".into())));
        assert_eq!(ctx.get("qty"), Some(&ContextValue::Number(3.0)));
        assert_eq!(ctx.get("vip"), Some(&ContextValue::Bool(true)));
        assert!(matches!(ctx.get("cart"), Some(ContextValue::Structured(_))));
        assert_eq!(ctx.to_json()["qty"], json!(3.0));
    }

    #[test]
    fn whole_numbers_display_without_fraction() {
        assert_eq!(ContextValue::Number(5.0).to_string(), "5");
        assert_eq!(ContextValue::Number(2.5).to_string(), "2.5");
    }

    #[test]
    fn text_is_coerced_to_number() {
        assert_eq!(ContextValue::from("3,5").as_f64(), Some(3.5));
        assert_eq!(ContextValue::from("abc").as_f64(), None);
    }

    #[test]
    fn variable_names_are_validated() {
        assert!(validate_variable_name("nombre").is_ok());
        assert!(validate_variable_name("payment_method2").is_ok());
        assert!(validate_variable_name("_stock_result").is_err());
        assert!(validate_variable_name("1abc").is_err());
        assert!(validate_variable_name("a b").is_err());
        assert!(validate_variable_name("").is_err());
        assert!(validate_variable_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn without_transient_drops_scratch_keys() {
        let mut ctx = Context::new();
        ctx.insert("_available_slots", json!([]));
        ctx.insert("phone", "5491100000000");
        let clean = ctx.without_transient();
        assert_eq!(clean.len(), 1);
        assert!(clean.contains("phone"));
    }
}
