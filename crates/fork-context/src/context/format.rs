//! Rendering of processed messages into the injected context block.
//!
//! Output shape:
//!
//! ```text
//! <inherited_context>
//! User:
//! Fix the failing test.
//!
//! Agent:
//! [Tool: bash] {"command":"cargo test"}
//!
//! [Tool result]
//! test result: ok. 12 passed
//! </inherited_context>
//! ```

use serde_json::Value;

use super::stats::ProcessingStats;
use super::tiers::{PartRef, Tier, TierMap};
use crate::config::ForkContextConfig;
use crate::{Message, MessageRole, Part, char_len, take_chars};

/// Opening delimiter of the injected block.
pub const CONTEXT_OPEN: &str = "<inherited_context>";
/// Closing delimiter of the injected block.
pub const CONTEXT_CLOSE: &str = "</inherited_context>";

/// Label that starts each rendered message.
pub fn role_label(role: &MessageRole) -> String {
    match role {
        MessageRole::User => "User:".into(),
        MessageRole::Assistant => "Agent:".into(),
        other => {
            let name = other.to_string();
            let mut chars = name.chars();
            match chars.next() {
                Some(first) => format!("{}{}:", first.to_uppercase(), chars.as_str()),
                None => ":".into(),
            }
        }
    }
}

/// Compact JSON of `input`, cut to `cap` characters with a trailing ellipsis.
pub fn param_preview(input: &Value, cap: usize) -> String {
    let serialized = serde_json::to_string(input).unwrap_or_default();
    if char_len(&serialized) > cap {
        format!("{}...", take_chars(&serialized, cap))
    } else {
        serialized
    }
}

fn render_part(
    part: &Part,
    at: PartRef,
    tiers: &TierMap,
    config: &ForkContextConfig,
) -> Option<String> {
    match part {
        Part::Text { text } if !text.is_empty() => Some(text.clone()),
        Part::ToolInvocation { tool, input, .. } => {
            if input.is_null() {
                return Some(format!("[Tool: {tool}]"));
            }
            // Unpaired invocations get the smallest preview.
            let tier = tiers.invocation_tier(at).unwrap_or(Tier::Minimal);
            Some(format!(
                "[Tool: {tool}] {}",
                param_preview(input, tier.param_cap(config))
            ))
        }
        Part::ToolResult { output, .. } => Some(format!("[Tool result]\n{output}")),
        Part::Text { .. } | Part::Compaction | Part::Unknown => None,
    }
}

fn render_message(
    msg: &Message,
    index: usize,
    tiers: &TierMap,
    config: &ForkContextConfig,
) -> String {
    let parts: Vec<String> = msg
        .parts
        .iter()
        .enumerate()
        .filter_map(|(pi, p)| {
            render_part(
                p,
                PartRef {
                    message: index,
                    part: pi,
                },
                tiers,
                config,
            )
        })
        .collect();
    format!("{}\n{}", role_label(&msg.role), parts.join("\n\n"))
}

/// Render `messages` into a delimited context block.
///
/// Sets `final_count` and `total_chars` on the returned stats. An empty
/// input renders to an empty string.
pub fn format_messages(
    messages: &[Message],
    mut stats: ProcessingStats,
    config: &ForkContextConfig,
) -> (String, ProcessingStats) {
    if messages.is_empty() {
        stats.final_count = 0;
        stats.total_chars = 0;
        return (String::new(), stats);
    }

    let tiers = TierMap::build(messages, config);
    let body: Vec<String> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| render_message(m, i, &tiers, config))
        .collect();

    let text = format!("{CONTEXT_OPEN}\n{}\n{CONTEXT_CLOSE}", body.join("\n\n"));
    stats.final_count = messages.len();
    stats.total_chars = char_len(&text);
    (text, stats)
}
