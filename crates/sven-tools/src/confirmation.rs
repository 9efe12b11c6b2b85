// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;

use crate::tool::ToolCall;

/// How long a user's "yes" to a confirmation prompt should be remembered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationScope {
    /// Applies to this single tool call only.
    Once,
    /// Applies to every subsequent call to the same tool name for the rest
    /// of the session.
    Session,
}

/// The user's answer to a confirmation prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Approved(ConfirmationScope),
    Denied,
}

/// Asks whatever front-end is attached (terminal, TUI, CI) whether a
/// side-effecting tool call should proceed.
///
/// Implementors decide how the prompt is rendered; the agent loop only
/// cares about the resulting [`ConfirmationDecision`].
#[async_trait]
pub trait ConfirmationHandler: Send + Sync {
    async fn confirm(&self, call: &ToolCall) -> ConfirmationDecision;
}

/// Approves every call without prompting. Used for sub-agents and other
/// unattended contexts where there is nobody to ask.
pub struct AlwaysApprove;

#[async_trait]
impl ConfirmationHandler for AlwaysApprove {
    async fn confirm(&self, _call: &ToolCall) -> ConfirmationDecision {
        ConfirmationDecision::Approved(ConfirmationScope::Session)
    }
}

/// Denies every call without prompting. Useful in tests that assert a
/// write/execute tool never runs without explicit approval wiring.
pub struct AlwaysDeny;

#[async_trait]
impl ConfirmationHandler for AlwaysDeny {
    async fn confirm(&self, _call: &ToolCall) -> ConfirmationDecision {
        ConfirmationDecision::Denied
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
