// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use sven_config::{AgentMode, SpecPhase};

use crate::events::ToolEvent;
use crate::policy::ApprovalPolicy;
use crate::tool::{Tool, ToolCall, ToolOutput};

/// Advances `AgentMode::Spec`'s four-phase workflow (requirements → design →
/// tasks → implementation) by one step.
///
/// Only available in `Spec` mode — the phase has no meaning in any other
/// mode, the same rationale `SwitchModeTool` uses for its own mode gating.
pub struct AdvanceSpecPhaseTool {
    phase: Arc<Mutex<SpecPhase>>,
    event_tx: mpsc::Sender<ToolEvent>,
}

impl AdvanceSpecPhaseTool {
    pub fn new(phase: Arc<Mutex<SpecPhase>>, event_tx: mpsc::Sender<ToolEvent>) -> Self {
        Self { phase, event_tx }
    }
}

#[async_trait]
impl Tool for AdvanceSpecPhaseTool {
    fn name(&self) -> &str {
        "advance_spec_phase"
    }

    fn description(&self) -> &str {
        "Advance the current spec-mode phase by one step: \
         requirements -> design -> tasks -> implementation.\n\n\
         Call this only once the current phase's deliverable is complete and \
         the user has confirmed it (e.g. requirements written and approved \
         before moving to design). Calling it while already in the \
         `implementation` phase is a no-op."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        })
    }

    fn default_policy(&self) -> ApprovalPolicy {
        ApprovalPolicy::Auto
    }

    fn modes(&self) -> &[AgentMode] {
        &[AgentMode::Spec]
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let mut phase = self.phase.lock().await;
        let from = *phase;
        let to = from.next();
        *phase = to;
        drop(phase);

        debug!(?from, ?to, "advance_spec_phase tool");
        let _ = self.event_tx.send(ToolEvent::SpecPhaseChanged(to)).await;

        if from == to {
            ToolOutput::ok(&call.id, format!("already in the final '{to}' phase"))
        } else {
            ToolOutput::ok(&call.id, format!("advanced from '{from}' to '{to}' phase"))
        }
    }
}
