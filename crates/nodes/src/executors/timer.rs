//! `timer`: delays interpretation for a fixed duration. Not cancellable.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::text::render_template;
use crate::traits::{parse_config, NodeExecutor, NodeResult};
use crate::NodeError;

#[derive(Debug, Default, Deserialize)]
struct TimerConfig {
    #[serde(default, alias = "duration")]
    seconds: f64,
    #[serde(default)]
    text: Option<String>,
}

pub struct TimerExecutor;

#[async_trait]
impl NodeExecutor for TimerExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: TimerConfig = parse_config(config)?;
        let delay = Duration::try_from_secs_f64(cfg.seconds.max(0.0))
            .map_err(|e| NodeError::Config(format!("invalid timer duration {}: {e}", cfg.seconds)))?;
        debug!(?delay, "timer node sleeping");
        tokio::time::sleep(delay).await;

        let mut result = NodeResult::advance();
        if let Some(text) = cfg.text.as_deref().filter(|t| !t.is_empty()) {
            result = result.with_text(render_template(text, ctx));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn sleeps_for_the_configured_duration() {
        let started = Instant::now();
        let result = TimerExecutor
            .execute(&json!({ "seconds": 30 }), &Context::new())
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_secs(30));
        assert!(!result.wait_for_input);
        assert!(result.messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn negative_duration_does_not_sleep() {
        let started = Instant::now();
        TimerExecutor
            .execute(&json!({ "seconds": -5 }), &Context::new())
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn oversized_duration_is_a_config_error() {
        for seconds in [json!(1e20), json!(f64::MAX)] {
            let result = TimerExecutor
                .execute(&json!({ "seconds": seconds }), &Context::new())
                .await;
            assert!(matches!(result, Err(NodeError::Config(_))));
        }
    }
}
