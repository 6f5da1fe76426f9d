//! Deterministic context truncation for forked background agent sessions.
//!
//! When an agent host forks a conversation into a background child session,
//! the child needs to know what happened before it was spawned, but the
//! parent's history is unbounded. `fork-context` turns an arbitrary message
//! history into a bounded, delimited context block with zero LLM calls and
//! fully deterministic output.
//!
//! The pipeline runs in four stages over an immutable input:
//!
//! 1. **[`context::boundary`]** finds the latest host compaction and drops
//!    everything its summary already covers.
//! 2. **[`context::truncation`]** assigns each tool result a recency tier and
//!    shortens old results with head-only or head+tail truncation.
//! 3. **[`context::format`]** renders the messages into a single
//!    `<inherited_context>` block with tier-aware parameter previews.
//! 4. **[`context::budget`]** evicts the oldest messages until the rendered
//!    block fits the hard character budget.
//!
//! # Getting started
//!
//! ```
//! use fork_context::{ForkContextConfig, ForkPipeline, Message};
//!
//! let pipeline = ForkPipeline::new(ForkContextConfig::default()).unwrap();
//! let history = vec![
//!     Message::user("Refactor the parser."),
//!     Message::assistant_text("Done, the parser now streams tokens."),
//! ];
//!
//! let fork = pipeline.prepare(history);
//! assert!(fork.text.starts_with("<inherited_context>"));
//! assert_eq!(fork.stats.final_count, 2);
//! assert!(!fork.stats.compaction_detected);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`context`] | Boundary detection, tiering, truncation, formatting, budget enforcement, stats |
//! | [`config`] | [`ForkContextConfig`] with defaults, JSON loading and validation |
//! | [`pipeline`] | [`ForkPipeline`] facade and the [`ForkContext`] result |
//! | [`preamble`] | Human-readable summary of [`ProcessingStats`] |

pub mod config;
pub mod context;
pub mod pipeline;
pub mod preamble;

use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

pub use config::ForkContextConfig;
pub use context::stats::{ProcessingStats, TierDistribution};
pub use pipeline::{ForkContext, ForkPipeline};
pub use preamble::build_preamble;

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
///
/// Deserialized from the host's lowercase role string. Roles this crate
/// doesn't know keep their original name in [`MessageRole::Other`].
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
    Other(String),
}

impl From<String> for MessageRole {
    fn from(role: String) -> Self {
        match role.as_str() {
            "system" => MessageRole::System,
            "user" => MessageRole::User,
            "assistant" => MessageRole::Assistant,
            "tool" => MessageRole::Tool,
            _ => MessageRole::Other(role),
        }
    }
}

impl From<MessageRole> for String {
    fn from(role: MessageRole) -> Self {
        role.to_string()
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::Tool => write!(f, "tool"),
            MessageRole::Other(name) => write!(f, "{name}"),
        }
    }
}

/// A typed fragment of a message.
///
/// Unrecognized `type` tags deserialize to [`Part::Unknown`], which every
/// pipeline stage passes through without rendering. Inside a [`Message`],
/// a part with a known tag but a malformed body degrades to `Unknown` too.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Part {
    /// Free-form text.
    Text { text: String },
    /// Marks the point where the host compacted the conversation. Only
    /// meaningful inside a user message.
    Compaction,
    /// A tool call with its input parameters.
    ToolInvocation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        tool: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    /// Textual output of a tool call.
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool: Option<String>,
        #[serde(default)]
        output: String,
    },
    #[serde(other)]
    Unknown,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn tool_invocation(tool: impl Into<String>, input: serde_json::Value) -> Self {
        Part::ToolInvocation {
            call_id: None,
            tool: tool.into(),
            input,
        }
    }

    /// A tool result that names its producing tool.
    pub fn tool_result(tool: impl Into<String>, output: impl Into<String>) -> Self {
        Part::ToolResult {
            call_id: None,
            tool: Some(tool.into()),
            output: output.into(),
        }
    }

    /// A tool result with no tool name; the name is resolved from the
    /// surrounding invocation parts.
    pub fn anonymous_result(output: impl Into<String>) -> Self {
        Part::ToolResult {
            call_id: None,
            tool: None,
            output: output.into(),
        }
    }

    /// Attach a call identifier to an invocation or result. Other variants
    /// are returned unchanged.
    pub fn with_call_id(mut self, id: impl Into<String>) -> Self {
        match &mut self {
            Part::ToolInvocation { call_id, .. } | Part::ToolResult { call_id, .. } => {
                *call_id = Some(id.into());
            }
            _ => {}
        }
        self
    }

    pub fn is_tool_result(&self) -> bool {
        matches!(self, Part::ToolResult { .. })
    }
}

/// One turn in a conversation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    /// Set only on the assistant message the host produced while compacting.
    /// Anything other than `true` reads as `false`.
    #[serde(default, deserialize_with = "lenient_flag")]
    pub summary: bool,
    #[serde(default, deserialize_with = "lenient_parts")]
    pub parts: Vec<Part>,
}

fn lenient_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = serde_json::Value::deserialize(deserializer)?;
    Ok(raw.as_bool().unwrap_or(false))
}

fn lenient_parts<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Part>, D::Error> {
    let serde_json::Value::Array(items) = serde_json::Value::deserialize(deserializer)? else {
        return Ok(Vec::new());
    };
    Ok(items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).unwrap_or_else(|e| {
                debug!("ignoring malformed message part: {e}");
                Part::Unknown
            })
        })
        .collect())
}

impl Message {
    pub fn new(role: MessageRole, parts: Vec<Part>) -> Self {
        Self {
            role,
            summary: false,
            parts,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, vec![Part::text(text)])
    }

    pub fn assistant_text(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, vec![Part::text(text)])
    }

    /// The assistant message the host writes after compacting history.
    pub fn summary(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            summary: true,
            parts: vec![Part::text(text)],
        }
    }

    /// A user message carrying a compaction marker.
    pub fn compaction_marker() -> Self {
        Self::new(MessageRole::User, vec![Part::Compaction])
    }

    pub fn has_compaction_marker(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, Part::Compaction))
    }

    pub fn is_summary(&self) -> bool {
        self.summary && self.role == MessageRole::Assistant
    }

    pub fn tool_result_count(&self) -> usize {
        self.parts.iter().filter(|p| p.is_tool_result()).count()
    }
}

// ── Character helpers ──────────────────────────────────────────────

/// Length of `s` in characters (not bytes).
pub(crate) fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The first `n` characters of `s`.
pub(crate) fn take_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => s.get(..idx).unwrap_or(s),
        None => s,
    }
}

/// The last `n` characters of `s`.
pub(crate) fn last_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => s.get(idx..).unwrap_or(s),
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_constructors() {
        let user = Message::user("hello");
        assert_eq!(user.role, MessageRole::User);
        assert!(!user.summary);
        assert_eq!(user.parts, vec![Part::text("hello")]);

        let summary = Message::summary("compressed");
        assert!(summary.is_summary());

        let marker = Message::compaction_marker();
        assert!(marker.has_compaction_marker());
        assert!(!marker.is_summary());
    }

    #[test]
    fn summary_flag_on_user_message_is_not_a_summary() {
        let mut msg = Message::user("looks like a summary");
        msg.summary = true;
        assert!(!msg.is_summary());
    }

    #[test]
    fn deserialize_host_message() {
        let raw = json!({
            "role": "assistant",
            "parts": [
                {"type": "text", "text": "Listing files"},
                {"type": "tool_invocation", "call_id": "c1", "tool": "bash", "input": {"command": "ls"}},
                {"type": "tool_result", "call_id": "c1", "output": "src\nCargo.toml"},
                {"type": "step_start"}
            ]
        });
        let msg: Message = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.role, MessageRole::Assistant);
        assert!(!msg.summary);
        assert_eq!(msg.parts.len(), 4);
        assert_eq!(msg.parts[3], Part::Unknown);
        assert_eq!(msg.tool_result_count(), 1);
    }

    #[test]
    fn missing_parts_default_to_empty() {
        let msg: Message = serde_json::from_value(json!({"role": "user"})).unwrap();
        assert!(msg.parts.is_empty());
    }

    #[test]
    fn unknown_role_keeps_its_name() {
        let msg: Message = serde_json::from_value(json!({"role": "developer"})).unwrap();
        assert_eq!(msg.role, MessageRole::Other("developer".into()));
        assert_eq!(msg.role.to_string(), "developer");

        let known: Message = serde_json::from_value(json!({"role": "tool"})).unwrap();
        assert_eq!(known.role, MessageRole::Tool);
    }

    #[test]
    fn role_serializes_as_plain_string() {
        let msg = Message::new(MessageRole::Other("developer".into()), vec![]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "developer");
        assert_eq!(serde_json::to_value(Message::user("x")).unwrap()["role"], "user");
    }

    #[test]
    fn malformed_parts_degrade_to_unknown() {
        let raw = json!([
            {"role": "user", "parts": [{"type": "text", "text": "keep me"}]},
            {"role": "assistant", "summary": null, "parts": [
                {"type": "tool_invocation", "input": {"path": "a"}},
                {"type": "text"},
                {"type": "tool_result", "output": "fine"},
                "not an object"
            ]},
            {"role": "assistant", "parts": null}
        ]);
        let messages: Vec<Message> = serde_json::from_value(raw).unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].parts, vec![Part::text("keep me")]);
        assert!(!messages[1].summary);
        assert_eq!(
            messages[1].parts,
            vec![
                Part::Unknown,
                Part::Unknown,
                Part::anonymous_result("fine"),
                Part::Unknown,
            ]
        );
        assert!(messages[2].parts.is_empty());
    }

    #[test]
    fn with_call_id_sets_both_variants() {
        let inv = Part::tool_invocation("read", json!({})).with_call_id("a");
        let res = Part::anonymous_result("x").with_call_id("a");
        assert!(matches!(inv, Part::ToolInvocation { call_id: Some(ref id), .. } if id == "a"));
        assert!(matches!(res, Part::ToolResult { call_id: Some(ref id), .. } if id == "a"));
        assert_eq!(Part::text("t").with_call_id("a"), Part::text("t"));
    }

    #[test]
    fn char_helpers_respect_boundaries() {
        let s = "héllo wörld";
        assert_eq!(char_len(s), 11);
        assert_eq!(take_chars(s, 2), "hé");
        assert_eq!(last_chars(s, 3), "rld");
        assert_eq!(take_chars(s, 100), s);
        assert_eq!(last_chars(s, 100), s);
        assert_eq!(last_chars(s, 0), "");
    }
}
