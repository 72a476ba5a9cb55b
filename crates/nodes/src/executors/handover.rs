//! `handover`: pauses automated replies and flags the conversation for a
//! human agent.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::context::Context;
use crate::executors::keys;
use crate::services::HandoverService;
use crate::text::render_template;
use crate::traits::{parse_config, NodeExecutor, NodeResult};
use crate::NodeError;

#[derive(Debug, Default, Deserialize)]
struct HandoverConfig {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

pub struct HandoverExecutor {
    desk: Arc<dyn HandoverService>,
}

impl HandoverExecutor {
    pub fn new(desk: Arc<dyn HandoverService>) -> Self {
        Self { desk }
    }
}

#[async_trait]
impl NodeExecutor for HandoverExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: HandoverConfig = parse_config(config)?;
        let phone = ctx.text(keys::PHONE).unwrap_or_default();
        let reason = cfg.reason.as_deref().unwrap_or("handover");

        // The handover still happens if the desk could not be notified.
        match self.desk.request_human(&phone, reason).await {
            Ok(()) => info!(%phone, %reason, "conversation handed over to a human"),
            Err(e) => warn!(%phone, error = %e, "could not flag conversation for human attention"),
        }

        let text = cfg
            .text
            .as_deref()
            .unwrap_or("👤 Te comunico con una persona del equipo. En breve te responden.");

        Ok(NodeResult::wait()
            .with_handover()
            .with_text(render_template(text, ctx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RecordingHandover;
    use serde_json::json;

    #[tokio::test]
    async fn flags_conversation_and_waits() {
        let desk = Arc::new(RecordingHandover::default());
        let mut ctx = Context::new();
        ctx.insert(keys::PHONE, "549111");

        let result = HandoverExecutor::new(desk.clone())
            .execute(&json!({ "reason": "reclamo" }), &ctx)
            .await
            .unwrap();

        assert!(result.handover);
        assert!(result.wait_for_input);
        assert_eq!(desk.requests(), vec![("549111".to_string(), "reclamo".to_string())]);
    }
}
