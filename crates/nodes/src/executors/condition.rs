//! `condition`: evaluates a context variable and picks the `true` / `false`
//! branch.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::context::{Context, ContextValue};
use crate::text::normalize;
use crate::traits::{parse_config, NodeExecutor, NodeResult};
use crate::NodeError;

#[derive(Debug, Deserialize)]
struct ConditionConfig {
    variable: String,
    #[serde(default)]
    operator: String,
    #[serde(default)]
    value: Value,
}

fn as_number(raw: &str) -> Option<f64> {
    raw.trim().replace(',', ".").parse().ok()
}

/// Compare a context value against the expected value.
///
/// String operators work on trimmed, lower-cased, diacritic-folded text.
/// Numeric operators coerce both sides and are false when either side is
/// not a number. Unknown operators are false.
pub fn evaluate(actual: Option<&ContextValue>, operator: &str, expected: &str) -> bool {
    let lhs = actual.map(ToString::to_string).unwrap_or_default();

    match operator {
        "equals" => normalize(&lhs) == normalize(expected),
        "not_equals" => normalize(&lhs) != normalize(expected),
        "contains" => normalize(&lhs).contains(&normalize(expected)),
        "greater_than" => match (as_number(&lhs), as_number(expected)) {
            (Some(l), Some(r)) => l > r,
            _ => false,
        },
        "less_than" => match (as_number(&lhs), as_number(expected)) {
            (Some(l), Some(r)) => l < r,
            _ => false,
        },
        other => {
            debug!(operator = %other, "unknown condition operator, evaluating to false");
            false
        }
    }
}

pub struct ConditionExecutor;

#[async_trait]
impl NodeExecutor for ConditionExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: ConditionConfig = parse_config(config)?;
        let expected = match &cfg.value {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };

        let result = evaluate(ctx.get(&cfg.variable), &cfg.operator, &expected);
        debug!(variable = %cfg.variable, operator = %cfg.operator, %expected, result, "condition evaluated");

        Ok(NodeResult::advance().with_condition(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(s: &str) -> ContextValue {
        ContextValue::from(s)
    }

    #[test]
    fn numeric_comparisons_coerce_text() {
        assert!(evaluate(Some(&text("5")), "greater_than", "3"));
        assert!(!evaluate(Some(&text("3")), "greater_than", "5"));
        assert!(evaluate(Some(&ContextValue::Number(2.0)), "less_than", "2,5"));
        assert!(!evaluate(Some(&text("muchos")), "greater_than", "3"));
    }

    #[test]
    fn string_comparisons_ignore_case_and_accents() {
        assert!(evaluate(Some(&text("SI")), "equals", "si"));
        assert!(evaluate(Some(&text(" Sí ")), "equals", "si"));
        assert!(evaluate(Some(&text("efectivo")), "not_equals", "tarjeta"));
        assert!(evaluate(Some(&text("Quiero Delivery")), "contains", "delivery"));
        assert!(evaluate(Some(&ContextValue::Bool(true)), "equals", "true"));
    }

    #[test]
    fn unknown_operator_is_false() {
        assert!(!evaluate(Some(&text("a")), "matches", "a"));
        assert!(!evaluate(Some(&text("a")), "", "a"));
    }

    #[test]
    fn missing_variable_compares_as_empty() {
        assert!(evaluate(None, "equals", ""));
        assert!(!evaluate(None, "greater_than", "0"));
    }

    #[tokio::test]
    async fn executor_emits_condition_result_without_messages() {
        let mut ctx = Context::new();
        ctx.insert("edad", "21");
        let result = ConditionExecutor
            .execute(&json!({ "variable": "edad", "operator": "greater_than", "value": 18 }), &ctx)
            .await
            .unwrap();

        assert_eq!(result.condition_result, Some(true));
        assert!(result.messages.is_empty());
        assert!(!result.wait_for_input);
    }
}
