//! Conversation execution engine.
//!
//! `FlowEngine` is the central orchestrator:
//! 1. Serializes inbound messages per phone.
//! 2. Applies global interrupts, then resolves the phone's open execution or
//!    starts a new one from a matching trigger.
//! 3. Delivers the inbound text to the paused node's executor.
//! 4. Interprets nodes in a bounded loop (auto-advance, branching, sub-flow
//!    links) until a node waits for input or the graph is exhausted.
//! 5. Persists the execution after every step.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use db::{ExecutionRepository, ExecutionStatus, FlowRepository};
use nodes::executors::keys;
use nodes::executors::poll::PollConfig;
use nodes::text::{normalize, poll_hash_matches};
use nodes::traits::parse_config;
use nodes::{
    Context, ContextPatch, ExecutorRegistry, InputOutcome, NodeKind, OutboundMessage,
};

use crate::config::EngineConfig;
use crate::graph;
use crate::locks::PhoneLocks;
use crate::models::{FlowDefinition, FlowExecution, Node};
use crate::EngineError;

// ---------------------------------------------------------------------------
// flowLink configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlowLinkConfig {
    #[serde(default, alias = "targetFlowId", alias = "targetFlow")]
    flow_id: Option<String>,
}

/// Whether a flow's trigger phrase selects `text` (both normalized by the
/// caller): equal, or either containing the other. Empty never matches.
pub fn trigger_matches(trigger: &str, text: &str) -> bool {
    !trigger.is_empty() && !text.is_empty() && (text.contains(trigger) || trigger.contains(text))
}

// ---------------------------------------------------------------------------
// FlowEngine
// ---------------------------------------------------------------------------

/// Drives one persistent execution per phone through its flow graph.
///
/// Construct one engine per process; it is cheap to share behind an `Arc`.
pub struct FlowEngine {
    flows: Arc<dyn FlowRepository>,
    executions: Arc<dyn ExecutionRepository>,
    registry: ExecutorRegistry,
    config: EngineConfig,
    locks: PhoneLocks,
}

impl FlowEngine {
    pub fn new(
        flows: Arc<dyn FlowRepository>,
        executions: Arc<dyn ExecutionRepository>,
        registry: ExecutorRegistry,
        config: EngineConfig,
    ) -> Self {
        Self {
            flows,
            executions,
            registry,
            config,
            locks: PhoneLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle one inbound message and return the replies, in order.
    ///
    /// `inbound` carries transport-provided values (e.g. `_media_url`) that
    /// are merged into the context before the paused node sees the text.
    ///
    /// # Errors
    /// Only repository failures and undecodable stored records. Everything
    /// else is answered with a message.
    #[instrument(skip(self, text, inbound), fields(phone = %phone))]
    pub async fn process_message(
        &self,
        phone: &str,
        text: &str,
        inbound: ContextPatch,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let _guard = self.locks.lock(phone).await;
        let normalized = normalize(text);

        if self.config.is_global_trigger(&normalized) {
            let cancelled = self.executions.cancel_open_for_phone(phone).await?;
            if cancelled > 0 {
                info!(word = %normalized, "global trigger cancelled the open execution");
            }
        } else if let Some(row) = self.executions.find_open_by_phone(phone).await? {
            let execution = FlowExecution::from_row(row)?;
            return self.deliver_input(execution, text, &inbound).await;
        }

        self.start_matching_flow(phone, &normalized, &inbound).await
    }

    /// Map an opaque poll-vote hash to the option text of the poll the
    /// phone's execution is waiting on.
    pub async fn resolve_poll_vote(
        &self,
        phone: &str,
        option_hash: &str,
    ) -> Result<Option<String>, EngineError> {
        let Some(row) = self.executions.find_open_by_phone(phone).await? else {
            return Ok(None);
        };
        let Some(flow_row) = self.flows.get_flow(row.flow_id).await? else {
            return Ok(None);
        };
        let flow = FlowDefinition::from_row(flow_row)?;

        let Some(node) = flow.node(&row.current_node_id) else {
            return Ok(None);
        };
        if node.kind != NodeKind::Poll {
            return Ok(None);
        }
        let Ok(poll) = parse_config::<PollConfig>(&node.data) else {
            return Ok(None);
        };

        Ok(poll
            .options
            .into_iter()
            .find(|option| poll_hash_matches(option, option_hash)))
    }

    /// A human agent hands the conversation back: the paused handover
    /// execution becomes active and continues after the handover node.
    #[instrument(skip(self), fields(phone = %phone))]
    pub async fn resume_from_handover(
        &self,
        phone: &str,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let _guard = self.locks.lock(phone).await;

        let Some(row) = self.executions.find_open_by_phone(phone).await? else {
            return Ok(Vec::new());
        };
        let mut execution = FlowExecution::from_row(row)?;
        if execution.status != ExecutionStatus::Handover {
            return Ok(Vec::new());
        }

        let Some(flow) = self.load_flow(execution.flow_id).await? else {
            return self.fail(execution, Vec::new(), FailureKind::FlowChanged).await;
        };

        info!(execution_id = %execution.id, "resuming after handover");
        execution.status = ExecutionStatus::Active;
        execution.paused_at = None;

        match graph::first_edge(&flow, &execution.current_node_id) {
            Some(edge) => {
                execution.current_node_id = edge.target.clone();
                self.run(flow, execution, Vec::new()).await
            }
            None => self.complete(execution, Vec::new()).await,
        }
    }

    // -----------------------------------------------------------------------
    // Execution resolution
    // -----------------------------------------------------------------------

    async fn start_matching_flow(
        &self,
        phone: &str,
        normalized: &str,
        inbound: &ContextPatch,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let matched = self
            .flows
            .list_active_flows()
            .await?
            .into_iter()
            .find(|f| trigger_matches(&normalize(&f.trigger_word), normalized));

        let Some(row) = matched else {
            debug!("no flow matched, sending fallback");
            return Ok(vec![OutboundMessage::text(&self.config.fallback_message)]);
        };
        let flow = FlowDefinition::from_row(row)?;

        let Some(start) = graph::start_node(&flow) else {
            warn!(flow_id = %flow.id, "matched flow has no nodes");
            return Ok(vec![OutboundMessage::text(&self.config.flow_changed_message)]);
        };

        let mut context = Context::new();
        context.insert(keys::PHONE, phone);
        context.apply(inbound);

        let execution = FlowExecution::new(flow.id, phone, start.id.clone(), context);
        self.executions.insert_execution(&execution.to_row()).await?;
        info!(
            execution_id = %execution.id,
            flow_id = %flow.id,
            flow = %flow.name,
            "execution started"
        );

        self.run(flow, execution, Vec::new()).await
    }

    async fn deliver_input(
        &self,
        mut execution: FlowExecution,
        text: &str,
        inbound: &ContextPatch,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        if execution.status == ExecutionStatus::Handover {
            debug!(execution_id = %execution.id, "execution is with a human, staying quiet");
            return Ok(Vec::new());
        }

        let Some(flow) = self.load_flow(execution.flow_id).await? else {
            warn!(flow_id = %execution.flow_id, "flow vanished under an open execution");
            return self.fail(execution, Vec::new(), FailureKind::FlowChanged).await;
        };
        let Some(node) = flow.node(&execution.current_node_id).cloned() else {
            warn!(node_id = %execution.current_node_id, "current node vanished from the flow");
            return self.fail(execution, Vec::new(), FailureKind::FlowChanged).await;
        };

        execution.context.apply(inbound);

        if node.kind == NodeKind::FlowLink {
            return self.run(flow, execution, Vec::new()).await;
        }

        let Some(executor) = self.registry.get(&node.kind) else {
            warn!(node_id = %node.id, kind = %node.kind, "no executor registered");
            return self.stay(execution, vec![self.node_error()]).await;
        };

        let outcome = match executor.capture_input(&node.data, text, &execution.context).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(node_id = %node.id, error = %e, "input capture failed");
                return self.stay(execution, vec![self.node_error()]).await;
            }
        };

        match outcome {
            InputOutcome::Stay { messages } => {
                debug!(node_id = %node.id, "answer rejected, re-prompting");
                self.stay(execution, messages).await
            }
            InputOutcome::Advance { patch, messages } => {
                execution.context.apply(&patch);
                execution.paused_at = None;

                match graph::first_edge(&flow, &node.id) {
                    Some(edge) => {
                        execution.current_node_id = edge.target.clone();
                        self.run(flow, execution, messages).await
                    }
                    None => self.complete(execution, messages).await,
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Run loop
    // -----------------------------------------------------------------------

    /// Interpret nodes starting at `execution.current_node_id` until one waits
    /// or the graph ends.
    async fn run(
        &self,
        mut flow: FlowDefinition,
        mut execution: FlowExecution,
        mut messages: Vec<OutboundMessage>,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut hops = 0usize;

        loop {
            hops += 1;
            if hops > self.config.max_hops {
                warn!(hops, execution_id = %execution.id, "hop limit exceeded");
                return self.fail(execution, messages, FailureKind::Loop).await;
            }
            if !visited.insert(execution.current_node_id.clone()) {
                warn!(
                    node_id = %execution.current_node_id,
                    execution_id = %execution.id,
                    "node revisited without waiting for input"
                );
                return self.fail(execution, messages, FailureKind::Loop).await;
            }

            let Some(node) = flow.node(&execution.current_node_id).cloned() else {
                warn!(node_id = %execution.current_node_id, "edge points at a vanished node");
                return self.fail(execution, messages, FailureKind::FlowChanged).await;
            };
            debug!(node_id = %node.id, kind = %node.kind, "entering node");

            if node.kind == NodeKind::FlowLink {
                match self.follow_link(&mut execution, &node).await? {
                    Some(target) => {
                        flow = target;
                        visited.clear();
                        continue;
                    }
                    None => return self.fail(execution, messages, FailureKind::FlowChanged).await,
                }
            }

            let Some(executor) = self.registry.get(&node.kind) else {
                warn!(node_id = %node.id, kind = %node.kind, "no executor registered");
                messages.push(self.node_error());
                return self.stay(execution, messages).await;
            };

            let result = match executor.execute(&node.data, &execution.context).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(node_id = %node.id, kind = %node.kind, error = %e, "node failed");
                    messages.push(self.node_error());
                    return self.stay(execution, messages).await;
                }
            };

            messages.extend(result.messages);
            execution.context.apply(&result.updated_context);
            if result.handover {
                info!(execution_id = %execution.id, "execution handed over to a human");
                execution.status = ExecutionStatus::Handover;
            }

            if result.wait_for_input {
                execution.paused_at = Some(Utc::now());
                self.save(&execution).await?;
                return Ok(messages);
            }

            let next = match result.condition_result {
                Some(branch) => graph::branch_edge(&flow, &node.id, branch),
                None => graph::first_edge(&flow, &node.id),
            };
            match next {
                Some(edge) => execution.current_node_id = edge.target.clone(),
                None => return self.complete(execution, messages).await,
            }
            // The stored row always points at the next node to run.
            self.save(&execution).await?;
        }
    }

    /// Close `execution` and open a new one at the start of the linked flow.
    /// `None` when the link target is missing, inactive or empty.
    async fn follow_link(
        &self,
        execution: &mut FlowExecution,
        node: &Node,
    ) -> Result<Option<FlowDefinition>, EngineError> {
        let target_id = parse_config::<FlowLinkConfig>(&node.data)
            .ok()
            .and_then(|c| c.flow_id)
            .and_then(|id| Uuid::parse_str(id.trim()).ok());
        let Some(target_id) = target_id else {
            warn!(node_id = %node.id, "flowLink without a valid target flow");
            return Ok(None);
        };

        let target = match self.load_flow(target_id).await? {
            Some(flow) if flow.is_active => flow,
            _ => {
                warn!(%target_id, "flowLink target is missing or inactive");
                return Ok(None);
            }
        };
        let Some(start) = graph::start_node(&target) else {
            warn!(%target_id, "flowLink target has no nodes");
            return Ok(None);
        };

        let mut finished = execution.clone();
        finished.finish(ExecutionStatus::Completed);
        self.save(&finished).await?;

        let next = FlowExecution::new(
            target.id,
            execution.phone.clone(),
            start.id.clone(),
            execution.context.without_transient(),
        );
        self.executions.insert_execution(&next.to_row()).await?;
        info!(
            from_execution = %execution.id,
            execution_id = %next.id,
            flow_id = %target.id,
            "linked into another flow"
        );

        *execution = next;
        Ok(Some(target))
    }

    // -----------------------------------------------------------------------
    // Persistence helpers
    // -----------------------------------------------------------------------

    async fn load_flow(&self, id: Uuid) -> Result<Option<FlowDefinition>, EngineError> {
        match self.flows.get_flow(id).await? {
            Some(row) => Ok(Some(FlowDefinition::from_row(row)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, execution: &FlowExecution) -> Result<(), EngineError> {
        self.executions
            .update_execution(&execution.to_row())
            .await
            .map_err(|e| {
                error!(execution_id = %execution.id, error = %e, "could not persist execution");
                EngineError::from(e)
            })
    }

    /// Persist the context but keep the execution on its node.
    async fn stay(
        &self,
        execution: FlowExecution,
        messages: Vec<OutboundMessage>,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        self.save(&execution).await?;
        Ok(messages)
    }

    async fn complete(
        &self,
        mut execution: FlowExecution,
        messages: Vec<OutboundMessage>,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        execution.finish(ExecutionStatus::Completed);
        self.save(&execution).await?;
        info!(execution_id = %execution.id, "execution completed");
        Ok(messages)
    }

    async fn fail(
        &self,
        mut execution: FlowExecution,
        mut messages: Vec<OutboundMessage>,
        kind: FailureKind,
    ) -> Result<Vec<OutboundMessage>, EngineError> {
        execution.finish(ExecutionStatus::Error);
        self.save(&execution).await?;
        info!(execution_id = %execution.id, ?kind, "execution ended in error");

        let apology = match kind {
            FailureKind::FlowChanged => &self.config.flow_changed_message,
            FailureKind::Loop => &self.config.loop_message,
        };
        messages.push(OutboundMessage::text(apology));
        Ok(messages)
    }

    fn node_error(&self) -> OutboundMessage {
        OutboundMessage::text(&self.config.node_error_message)
    }
}

#[derive(Debug, Clone, Copy)]
enum FailureKind {
    FlowChanged,
    Loop,
}
