//! `slot`: offers delivery windows and records the chosen one.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::context::{Context, ContextPatch, ContextValue};
use crate::executors::keys;
use crate::services::{SlotOption, SlotService};
use crate::text::{numbered_list, render_template};
use crate::traits::{parse_config, InputOutcome, NodeExecutor, NodeResult};
use crate::{NodeError, OutboundMessage};

const DEFAULT_PROMPT: &str = "📅 Elegí un horario de entrega:";

#[derive(Debug, Default, Deserialize)]
struct SlotConfig {
    #[serde(default)]
    text: Option<String>,
}

pub struct SlotExecutor {
    slots: Arc<dyn SlotService>,
}

impl SlotExecutor {
    pub fn new(slots: Arc<dyn SlotService>) -> Self {
        Self { slots }
    }
}

#[async_trait]
impl NodeExecutor for SlotExecutor {
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError> {
        let cfg: SlotConfig = parse_config(config)?;
        let available = self.slots.get_available_slots().await?;

        if available.is_empty() {
            return Ok(NodeResult::advance()
                .with_text("No hay horarios de entrega disponibles por ahora.")
                .with_patch(ContextPatch::new().without(keys::AVAILABLE_SLOTS)));
        }

        let prompt = render_template(cfg.text.as_deref().unwrap_or(DEFAULT_PROMPT), ctx);
        let labels: Vec<String> = available.iter().map(SlotOption::label).collect();

        Ok(NodeResult::wait()
            .with_text(format!("{prompt}\n\n{}", numbered_list(&labels)))
            .with_patch(
                ContextPatch::new().with(keys::AVAILABLE_SLOTS, ContextValue::structured(&available)?),
            ))
    }

    async fn capture_input(
        &self,
        _config: &Value,
        input: &str,
        ctx: &Context,
    ) -> Result<InputOutcome, NodeError> {
        let offered: Vec<SlotOption> = match ctx.structured(keys::AVAILABLE_SLOTS) {
            Some(list) => list,
            None => self.slots.get_available_slots().await?,
        };

        let choice = input
            .trim()
            .parse::<usize>()
            .ok()
            .filter(|n| (1..=offered.len()).contains(n))
            .map(|n| &offered[n - 1]);

        match choice {
            Some(slot) => {
                let label = slot.label();
                let patch = ContextPatch::new()
                    .with(keys::SLOT_ID, slot.id.clone())
                    .with(keys::SLOT_LABEL, label.clone())
                    .without(keys::AVAILABLE_SLOTS);
                Ok(InputOutcome::Advance {
                    patch,
                    messages: vec![OutboundMessage::text(format!("Horario elegido: {label}"))],
                })
            }
            None if offered.is_empty() => Ok(InputOutcome::stay(
                "No hay horarios de entrega disponibles por ahora.",
            )),
            None => Ok(InputOutcome::stay(format!(
                "Elegí un número del 1 al {}.",
                offered.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{sample_slots, FixedSlots};
    use serde_json::json;

    #[tokio::test]
    async fn lists_slots_and_stashes_them() {
        let executor = SlotExecutor::new(Arc::new(FixedSlots::new(sample_slots())));
        let result = executor.execute(&json!({}), &Context::new()).await.unwrap();

        assert!(result.wait_for_input);
        let text = OutboundMessage::join_text(&result.messages);
        assert!(text.contains("1. 24/10 09:00-12:00"));
        assert!(text.contains("2. 24/10 14:00-18:00"));
        assert!(matches!(
            result.updated_context.get(keys::AVAILABLE_SLOTS),
            Some(Some(ContextValue::Structured(_)))
        ));
    }

    #[tokio::test]
    async fn numeric_choice_selects_slot_and_clears_stash() {
        let executor = SlotExecutor::new(Arc::new(FixedSlots::new(sample_slots())));
        let entered = executor.execute(&json!({}), &Context::new()).await.unwrap();
        let mut ctx = Context::new();
        ctx.apply(&entered.updated_context);

        let outcome = executor.capture_input(&json!({}), " 2 ", &ctx).await.unwrap();
        let InputOutcome::Advance { patch, .. } = outcome else {
            panic!("expected a valid selection");
        };
        ctx.apply(&patch);

        assert_eq!(ctx.text(keys::SLOT_ID).as_deref(), Some("slot-pm"));
        assert_eq!(ctx.text(keys::SLOT_LABEL).as_deref(), Some("24/10 14:00-18:00"));
        assert!(!ctx.contains(keys::AVAILABLE_SLOTS));
    }

    #[tokio::test]
    async fn invalid_choice_keeps_waiting() {
        let executor = SlotExecutor::new(Arc::new(FixedSlots::new(sample_slots())));
        let outcome = executor.capture_input(&json!({}), "7", &Context::new()).await.unwrap();
        assert_eq!(outcome, InputOutcome::stay("Elegí un número del 1 al 2."));
    }

    #[tokio::test]
    async fn no_slots_advances_with_apology() {
        let executor = SlotExecutor::new(Arc::new(FixedSlots::new(Vec::new())));
        let result = executor.execute(&json!({}), &Context::new()).await.unwrap();
        assert!(!result.wait_for_input);
        assert_eq!(result.messages.len(), 1);
    }
}
