// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Typed error taxonomy for the Loop Driver's public operations.
//!
//! `Agent::submit*` still returns `anyhow::Result<()>` — callers downcast
//! via `error.downcast_ref::<LoopErrorKind>()` to recover the taxonomy when
//! they need to branch on it (e.g. the CLI deciding what to print). Tool
//! errors never reach this type: they are always packaged into a
//! `ToolOutput` and fed back to the model as content.
use thiserror::Error;

/// Error taxonomy surfaced by the Loop Driver's public operations.
///
/// `permission_denied` is deliberately absent: per the propagation policy,
/// that outcome lives inside a `ToolOutput`/tool-result message, never as a
/// value of this enum.
#[derive(Debug, Error)]
pub enum LoopErrorKind {
    /// The cancellation signal fired before the turn completed. The loop
    /// returns normally (`Ok(())`) with an `AgentEvent::Aborted` instead of
    /// this variant in the current cancellation design (see DESIGN.md); this
    /// variant exists for collaborators that classify a raw model-call error
    /// as a cancellation after the fact.
    #[error("turn aborted")]
    Aborted,
    /// `max_tool_rounds` is configured to zero: the loop cannot make a
    /// single model call.
    #[error("chat is disabled (max_tool_rounds = 0)")]
    ChatDisabled,
    /// The non-interactive turn cap was reached without the model
    /// terminating on its own.
    #[error("maximum turn count exceeded; raise agent.max_tool_rounds in config to continue")]
    MaxTurnsExceeded,
    /// The chat service returned an error that is not a cancellation.
    #[error("model API error: {0}")]
    ApiError(String),
    /// A tool panicked or returned an unrecoverable internal error rather
    /// than a normal `ToolOutput { is_error: true, .. }`.
    #[error("tool execution error: {0}")]
    ExecutionError(String),
}

/// Classify a model-call failure per §7's propagation policy: errors whose
/// message names an abort map to [`LoopErrorKind::Aborted`], everything else
/// maps to [`LoopErrorKind::ApiError`].
pub fn classify_model_error(err: anyhow::Error) -> anyhow::Error {
    let msg = err.to_string();
    if msg.contains("AbortError") || msg.to_lowercase().contains("aborted") {
        anyhow::Error::new(LoopErrorKind::Aborted).context(msg)
    } else {
        anyhow::Error::new(LoopErrorKind::ApiError(msg)).context(err)
    }
}
