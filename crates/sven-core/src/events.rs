// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use sven_config::{AgentMode, SpecPhase};
use sven_tools::{events::TodoItem, ToolCall};

/// Events emitted by the agent during a single turn.
/// Consumers (CI runner, TUI) subscribe to these to drive their output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A new turn (one model call plus any tool executions it triggers)
    /// is about to start. Always fires before the model call for that turn
    /// and after the previous turn's `TokenUsage`.
    TurnStarted(u32),
    /// A text chunk streamed from the model
    TextDelta(String),
    /// A complete text response from the model (after streaming finishes)
    TextComplete(String),
    /// A thinking/reasoning chunk from the model (extended thinking API).
    /// Consumers should accumulate deltas and finalise them into a Thinking
    /// segment when the model signals the end of the reasoning block.
    ThinkingDelta(String),
    /// A complete thinking/reasoning block (accumulated from ThinkingDelta events).
    ThinkingComplete(String),
    /// The model has requested a tool call
    ToolCallStarted(ToolCall),
    /// A tool call finished
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        output: String,
        is_error: bool,
    },
    /// Compaction is about to start. Fired before the (possibly slow,
    /// model-calling) compaction work begins, so a UI can show a spinner;
    /// always followed by either `ContextCompacted` or an `Error` if the
    /// turn aborts first.
    Compacting { turn: u32 },
    /// Context was compacted; statistics for the UI
    ContextCompacted {
        tokens_before: usize,
        tokens_after: usize,
        strategy: CompactionStrategyUsed,
        turn: u32,
    },
    /// Current token usage update
    TokenUsage {
        input: u32,
        output: u32,
        /// Tokens served from the provider's prompt cache this turn.
        cache_read: u32,
        /// Tokens written into the provider's prompt cache this turn.
        cache_write: u32,
        /// Running total of cache-read tokens for the session.
        cache_read_total: u64,
        /// Running total of cache-write tokens for the session.
        cache_write_total: u64,
        /// Maximum context tokens for the session (model/provider limit).
        max_tokens: usize,
    },
    /// The agent has finished processing the current user turn
    TurnComplete,
    /// The turn was cancelled before completion. Any text streamed so far
    /// has already been committed to the session as a partial assistant
    /// message.
    Aborted { partial_text: String },
    /// A recoverable error occurred
    Error(String),
    /// The todo list was updated
    TodoUpdate(Vec<TodoItem>),
    /// The agent mode was changed
    ModeChanged(AgentMode),
    /// `AgentMode::Spec`'s four-phase workflow advanced to a new phase
    SpecPhaseChanged(SpecPhase),
    /// The agent is asking the user a question (id links to QuestionAnswer)
    Question { id: String, questions: Vec<String> },
    /// Answer to a previous Question event
    QuestionAnswer { id: String, answer: String },
}

/// Which compaction strategy actually ran for a given [`AgentEvent::ContextCompacted`].
///
/// Mirrors [`sven_config::CompactionStrategy`] but adds the `Emergency` path,
/// which is not a user-selectable strategy — it is the deterministic,
/// model-free fallback `ensure_fits_budget` takes when even the summarization
/// call itself would overflow the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionStrategyUsed {
    /// `CompactionStrategy::Structured` ran and produced a summary.
    Structured,
    /// `CompactionStrategy::Narrative` ran and produced a summary.
    Narrative,
    /// No model call was made; old messages were dropped deterministically.
    Emergency,
}
