// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sven_model::{Message, MessageContent};
use uuid::Uuid;

/// One saved turn in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub role: String,
    pub content: String,
}

/// In-memory conversation session.
#[derive(Debug)]
pub struct Session {
    pub id: String,
    pub messages: Vec<Message>,
    /// Approximate total token count for the current message list
    pub token_count: usize,
    /// Maximum context tokens (set from model config / provider limits)
    pub max_tokens: usize,
    /// Tokens reserved for the model's own response (subtracted from the
    /// input budget so a reply never gets truncated by its own prompt).
    pub max_output_tokens: usize,
    /// Fixed per-request overhead (tool schemas, system prompt boilerplate)
    /// added on top of the message token estimate when checking limits.
    pub schema_overhead: usize,
    /// Running multiplier applied to the chars/4 token estimate, corrected
    /// against the provider's actual reported input token counts over time.
    pub calibration_factor: f32,
    /// Lifetime total of cache-read tokens reported by the provider.
    pub cache_read_total: u64,
    /// Lifetime total of cache-write tokens reported by the provider.
    pub cache_write_total: u64,
}

impl Session {
    pub fn new(max_tokens: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages: Vec::new(),
            token_count: 0,
            max_tokens,
            max_output_tokens: 0,
            schema_overhead: 0,
            calibration_factor: 1.0,
            cache_read_total: 0,
            cache_write_total: 0,
        }
    }

    /// Tokens available for the next request's input: the context window
    /// minus the reply reserve and the fixed per-request schema overhead.
    pub fn input_budget(&self) -> usize {
        self.max_tokens
            .saturating_sub(self.max_output_tokens)
            .saturating_sub(self.schema_overhead)
    }

    /// Record cache usage reported by the provider for the turn just completed.
    pub fn add_cache_usage(&mut self, cache_read_tokens: u32, cache_write_tokens: u32) {
        self.cache_read_total += cache_read_tokens as u64;
        self.cache_write_total += cache_write_tokens as u64;
    }

    /// Nudge `calibration_factor` toward the ratio of actual-to-estimated
    /// input tokens observed on the last request.  A simple exponential
    /// moving average keeps the estimate stable across noisy single turns
    /// while still tracking genuine drift (e.g. switching models).
    pub fn update_calibration(&mut self, actual_input_tokens: u32, estimated_tokens: usize) {
        if estimated_tokens == 0 {
            return;
        }
        let observed = actual_input_tokens as f32 / estimated_tokens as f32;
        const SMOOTHING: f32 = 0.2;
        self.calibration_factor =
            (1.0 - SMOOTHING) * self.calibration_factor + SMOOTHING * observed;
        self.calibration_factor = self.calibration_factor.clamp(0.25, 4.0);
    }

    pub fn push(&mut self, msg: Message) {
        self.token_count += msg.approx_tokens();
        self.messages.push(msg);
    }

    pub fn push_many(&mut self, msgs: impl IntoIterator<Item = Message>) {
        for m in msgs { self.push(m); }
    }

    /// Fraction of the usable input budget consumed (0.0–1.0).
    ///
    /// Measured against `input_budget()`, not the raw context window: the
    /// reply reserve and schema overhead are never available for session
    /// messages, so they must not water down how close to the limit we are.
    pub fn context_fraction(&self) -> f32 {
        let budget = self.input_budget();
        if budget == 0 { return 0.0; }
        (self.token_count as f32) / (budget as f32)
    }

    pub fn is_near_limit(&self, threshold: f32) -> bool {
        self.context_fraction() >= threshold
    }

    /// Recalculate token count from scratch (call after compaction).
    pub fn recalculate_tokens(&mut self) {
        self.token_count = self.messages.iter().map(|m| m.approx_tokens()).sum();
    }

    /// Replace the message list and recalculate token count (for resubmit / edit).
    ///
    /// Runs [`filter_orphan_tool_messages`] first: external callers (TUI
    /// edit-and-resubmit, truncated/compacted history) may hand in a message
    /// list whose tail was cut mid tool-call/tool-result group.
    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = filter_orphan_tool_messages(messages);
        self.recalculate_tokens();
    }
}

/// Drop any tool-result message whose `tool_call_id` has no matching
/// `ToolCall` in a preceding assistant message.
///
/// Grounds spec invariant 1 ("orphans must be filtered before any model
/// call"): providers reject a request whose history contains a tool-result
/// block with no matching tool-use block, which can happen after truncation
/// or a caller-supplied history edit cuts a tool-call/tool-result pair in
/// two. Idempotent: running it twice returns the same history as running it
/// once, since removing a tool-result message can never introduce a new
/// orphan (it only shrinks the history, and IDs are never reused).
pub fn filter_orphan_tool_messages(messages: Vec<Message>) -> Vec<Message> {
    let mut seen_call_ids: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for m in &messages {
        if let MessageContent::ToolCall { tool_call_id, .. } = &m.content {
            seen_call_ids.insert(tool_call_id.as_str());
        }
    }
    messages
        .into_iter()
        .filter(|m| match &m.content {
            MessageContent::ToolResult { tool_call_id, .. } => {
                seen_call_ids.contains(tool_call_id.as_str())
            }
            _ => true,
        })
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
