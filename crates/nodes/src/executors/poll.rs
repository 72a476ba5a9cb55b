//! `poll`: a numbered option menu (or a native poll payload).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::context::{validate_variable_name, Context, ContextPatch};
use crate::text::{numbered_list, render_template, resolve_poll_option};
use crate::traits::{parse_config, InputOutcome, NodeExecutor, NodeResult};
use crate::{NodeError, OutboundMessage};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollConfig {
    #[serde(default, alias = "text")]
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub variable: Option<String>,
    /// Emit a structured poll instead of a numbered text menu.
    #[serde(default)]
    pub native_poll: bool,
}

pub struct PollExecutor;

#[async_trait]
impl NodeExecutor for PollExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: PollConfig = parse_config(config)?;
        if let Some(variable) = cfg.variable.as_deref() {
            validate_variable_name(variable)?;
        }
        let question = render_template(&cfg.question, ctx);

        let message = if cfg.native_poll {
            OutboundMessage::Poll {
                question,
                options: cfg.options,
            }
        } else if cfg.options.is_empty() {
            OutboundMessage::text(question)
        } else {
            OutboundMessage::text(format!("{question}\n\n{}", numbered_list(&cfg.options)))
        };

        Ok(NodeResult::wait().with_message(message))
    }

    async fn capture_input(
        &self,
        config: &Value,
        input: &str,
        _ctx: &Context,
    ) -> Result<InputOutcome, NodeError> {
        let cfg: PollConfig = parse_config(config)?;
        let answer = resolve_poll_option(input, &cfg.options).unwrap_or_else(|| input.to_owned());

        let mut patch = ContextPatch::new();
        if let Some(variable) = cfg.variable.as_deref() {
            validate_variable_name(variable)?;
            patch.set(variable, answer);
        }
        Ok(InputOutcome::advance(patch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Value {
        json!({ "question": "¿Confirmás?", "options": ["Sí", "No"], "variable": "confirma" })
    }

    async fn answer(input: &str) -> String {
        match PollExecutor.capture_input(&config(), input, &Context::new()).await.unwrap() {
            InputOutcome::Advance { patch, .. } => patch
                .get("confirma")
                .flatten()
                .map(ToString::to_string)
                .unwrap_or_default(),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn renders_numbered_menu_and_waits() {
        let result = PollExecutor.execute(&config(), &Context::new()).await.unwrap();
        assert!(result.wait_for_input);
        assert_eq!(
            result.messages,
            vec![OutboundMessage::text("¿Confirmás?\n\n1. Sí\n2. No")]
        );
    }

    #[tokio::test]
    async fn native_poll_emits_structured_payload() {
        let mut cfg = config();
        cfg["nativePoll"] = json!(true);
        let result = PollExecutor.execute(&cfg, &Context::new()).await.unwrap();
        assert_eq!(
            result.messages,
            vec![OutboundMessage::Poll {
                question: "¿Confirmás?".into(),
                options: vec!["Sí".into(), "No".into()],
            }]
        );
    }

    #[tokio::test]
    async fn answers_resolve_to_option_text() {
        assert_eq!(answer("1").await, "Sí");
        assert_eq!(answer("no").await, "No");
    }

    #[tokio::test]
    async fn out_of_range_answer_passes_through_raw() {
        assert_eq!(answer("3").await, "3");
        assert_eq!(answer("tal vez").await, "tal vez");
    }
}
