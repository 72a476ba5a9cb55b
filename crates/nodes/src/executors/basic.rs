//! Entry, message and question nodes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::context::{validate_variable_name, Context};
use crate::text::render_template;
use crate::traits::{parse_config, NodeExecutor, NodeResult};
use crate::{NodeError, OutboundMessage};

/// `input` / `start`: no behaviour, the execution moves straight on.
pub struct PassThroughExecutor;

#[async_trait]
impl NodeExecutor for PassThroughExecutor {
    async fn execute(&self, _config: &Value, _ctx: &Context) -> Result<NodeResult, NodeError> {
        Ok(NodeResult::advance())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageConfig {
    #[serde(default, alias = "message", alias = "content")]
    text: String,
    #[serde(default)]
    image_url: Option<String>,
}

/// `message`: renders a template and auto-advances.
pub struct MessageExecutor;

#[async_trait]
impl NodeExecutor for MessageExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: MessageConfig = parse_config(config)?;
        let body = render_template(&cfg.text, ctx);

        let message = match cfg.image_url {
            Some(url) if !url.trim().is_empty() => OutboundMessage::Image {
                url: render_template(&url, ctx),
                caption: Some(body).filter(|b| !b.is_empty()),
            },
            _ => OutboundMessage::text(body),
        };

        Ok(NodeResult::advance().with_message(message))
    }
}

#[derive(Debug, Deserialize)]
struct QuestionConfig {
    #[serde(default, alias = "question")]
    text: String,
    #[serde(default)]
    variable: Option<String>,
}

/// `question`: sends a prompt and waits. The answer is captured generically
/// into the configured variable.
pub struct QuestionExecutor;

#[async_trait]
impl NodeExecutor for QuestionExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: QuestionConfig = parse_config(config)?;
        if let Some(variable) = cfg.variable.as_deref() {
            validate_variable_name(variable)?;
        }
        Ok(NodeResult::wait().with_text(render_template(&cfg.text, ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::InputOutcome;
    use serde_json::json;

    #[tokio::test]
    async fn message_renders_context_variables() {
        let mut ctx = Context::new();
        ctx.insert("nombre", "Ana");

        let result = MessageExecutor
            .execute(&json!({ "text": "¡Hola {{nombre}}!" }), &ctx)
            .await
            .unwrap();

        assert!(!result.wait_for_input);
        assert_eq!(result.messages, vec![OutboundMessage::text("¡Hola Ana!")]);
    }

    #[tokio::test]
    async fn message_with_image_becomes_image_payload() {
        let result = MessageExecutor
            .execute(&json!({ "text": "Promo", "imageUrl": "https://cdn/x.png" }), &Context::new())
            .await
            .unwrap();

        assert_eq!(
            result.messages,
            vec![OutboundMessage::Image {
                url: "https://cdn/x.png".into(),
                caption: Some("Promo".into()),
            }]
        );
    }

    #[tokio::test]
    async fn question_waits_and_captures_into_variable() {
        let config = json!({ "text": "¿Nombre?", "variable": "nombre" });
        let result = QuestionExecutor.execute(&config, &Context::new()).await.unwrap();
        assert!(result.wait_for_input);
        assert_eq!(result.messages, vec![OutboundMessage::text("¿Nombre?")]);

        let outcome = QuestionExecutor
            .capture_input(&config, "Lucas", &Context::new())
            .await
            .unwrap();
        match outcome {
            InputOutcome::Advance { patch, .. } => {
                assert_eq!(patch.get("nombre"), Some(Some(&"Lucas".into())));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn question_rejects_reserved_variable_names() {
        let config = json!({ "text": "?", "variable": "_secret" });
        let err = QuestionExecutor.execute(&config, &Context::new()).await.unwrap_err();
        assert!(matches!(err, NodeError::Config(_)));
    }
}
