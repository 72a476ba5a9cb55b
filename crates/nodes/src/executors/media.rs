//! `mediaUpload`: captures a file the transport layer injected into the
//! context under `_media_url`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::context::{validate_variable_name, Context, ContextPatch};
use crate::executors::keys;
use crate::text::render_template;
use crate::traits::{parse_config, InputOutcome, NodeExecutor, NodeResult};
use crate::NodeError;

const DEFAULT_PROMPT: &str = "📎 Enviá la foto o el archivo.";
const DEFAULT_VARIABLE: &str = "media_url";

#[derive(Debug, Default, Deserialize)]
struct MediaConfig {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    variable: Option<String>,
}

impl MediaConfig {
    fn variable(&self) -> Result<&str, NodeError> {
        let variable = self.variable.as_deref().unwrap_or(DEFAULT_VARIABLE);
        validate_variable_name(variable)?;
        Ok(variable)
    }
}

/// Move `_media_url` into the configured variable, if present.
fn take_media(ctx: &Context, variable: &str) -> Option<ContextPatch> {
    ctx.text(keys::MEDIA_URL)
        .filter(|url| !url.trim().is_empty())
        .map(|url| ContextPatch::new().with(variable, url).without(keys::MEDIA_URL))
}

pub struct MediaUploadExecutor;

#[async_trait]
impl NodeExecutor for MediaUploadExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: MediaConfig = parse_config(config)?;
        match take_media(ctx, cfg.variable()?) {
            Some(patch) => Ok(NodeResult::advance().with_patch(patch)),
            None => {
                let prompt = render_template(cfg.text.as_deref().unwrap_or(DEFAULT_PROMPT), ctx);
                Ok(NodeResult::wait().with_text(prompt))
            }
        }
    }

    async fn capture_input(
        &self,
        config: &Value,
        _input: &str,
        ctx: &Context,
    ) -> Result<InputOutcome, NodeError> {
        let cfg: MediaConfig = parse_config(config)?;
        match take_media(ctx, cfg.variable()?) {
            Some(patch) => Ok(InputOutcome::advance(patch)),
            None => Ok(InputOutcome::stay(
                render_template(cfg.text.as_deref().unwrap_or(DEFAULT_PROMPT), ctx),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn injected_media_is_captured_on_entry() {
        let mut ctx = Context::new();
        ctx.insert(keys::MEDIA_URL, "https://files/receipt.jpg");

        let result = MediaUploadExecutor
            .execute(&json!({ "variable": "comprobante" }), &ctx)
            .await
            .unwrap();
        ctx.apply(&result.updated_context);

        assert!(!result.wait_for_input);
        assert_eq!(ctx.text("comprobante").as_deref(), Some("https://files/receipt.jpg"));
        assert!(!ctx.contains(keys::MEDIA_URL));
    }

    #[tokio::test]
    async fn prompts_when_nothing_was_injected() {
        let result = MediaUploadExecutor.execute(&json!({}), &Context::new()).await.unwrap();
        assert!(result.wait_for_input);
        assert_eq!(result.messages.len(), 1);
    }

    #[tokio::test]
    async fn plain_text_answer_keeps_waiting() {
        let outcome = MediaUploadExecutor
            .capture_input(&json!({}), "ya te lo mando", &Context::new())
            .await
            .unwrap();
        assert!(matches!(outcome, InputOutcome::Stay { .. }));
    }
}
