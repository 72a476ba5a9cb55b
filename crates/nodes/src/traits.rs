//! The `NodeExecutor` trait, the contract every node type must fulfil.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::{validate_variable_name, Context, ContextPatch};
use crate::{NodeError, OutboundMessage};

/// What an executor produced when its node was entered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeResult {
    /// Messages to send, in order.
    pub messages: Vec<OutboundMessage>,
    /// Stop interpretation and wait for the next inbound message.
    pub wait_for_input: bool,
    /// Changes to merge into the execution context.
    pub updated_context: ContextPatch,
    /// Set by branching nodes; selects the edge whose `sourceHandle` is
    /// `"true"` or `"false"`.
    pub condition_result: Option<bool>,
    /// Pause automated replies and hand the conversation to a human.
    pub handover: bool,
}

impl NodeResult {
    /// Auto-advance to the next node.
    pub fn advance() -> Self {
        Self::default()
    }

    /// Pause on this node until the correspondent answers.
    pub fn wait() -> Self {
        Self {
            wait_for_input: true,
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: OutboundMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_text(self, body: impl Into<String>) -> Self {
        self.with_message(OutboundMessage::text(body))
    }

    pub fn with_patch(mut self, patch: ContextPatch) -> Self {
        self.updated_context.extend(patch);
        self
    }

    pub fn with_condition(mut self, result: bool) -> Self {
        self.condition_result = Some(result);
        self
    }

    pub fn with_handover(mut self) -> Self {
        self.handover = true;
        self
    }
}

/// What an executor decided about an answer delivered to its paused node.
#[derive(Debug, Clone, PartialEq)]
pub enum InputOutcome {
    /// Accept the answer: merge `patch`, send `messages`, move on.
    Advance {
        patch: ContextPatch,
        messages: Vec<OutboundMessage>,
    },
    /// Reject the answer: send `messages` and keep waiting on the same node.
    Stay { messages: Vec<OutboundMessage> },
}

impl InputOutcome {
    pub fn advance(patch: ContextPatch) -> Self {
        Self::Advance {
            patch,
            messages: Vec::new(),
        }
    }

    pub fn stay(body: impl Into<String>) -> Self {
        Self::Stay {
            messages: vec![OutboundMessage::text(body)],
        }
    }
}

/// The core executor trait.
///
/// Executors are stateless with respect to the engine: all context changes
/// flow back through [`NodeResult::updated_context`] or
/// [`InputOutcome::Advance`], and persistence is the engine's job.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Run the node when the execution enters it.
    async fn execute(&self, config: &Value, ctx: &Context) -> Result<NodeResult, NodeError>;

    /// Interpret an answer delivered while the execution is paused on this
    /// node. The default stores the raw text under the node's `variable`.
    async fn capture_input(
        &self,
        config: &Value,
        input: &str,
        _ctx: &Context,
    ) -> Result<InputOutcome, NodeError> {
        capture_into_variable(config, input)
    }
}

/// Generic capture: `config.variable = input`. Nodes without a variable
/// simply advance.
pub fn capture_into_variable(config: &Value, input: &str) -> Result<InputOutcome, NodeError> {
    let variable = config
        .get("variable")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let mut patch = ContextPatch::new();
    if let Some(variable) = variable {
        validate_variable_name(variable)?;
        patch.set(variable, input);
    }
    Ok(InputOutcome::advance(patch))
}

/// Deserialize a node's `data` block into a typed configuration.
/// A `null` block is treated as an empty object.
pub fn parse_config<T: DeserializeOwned>(config: &Value) -> Result<T, NodeError> {
    let value = match config {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(value).map_err(|e| NodeError::Config(e.to_string()))
}
