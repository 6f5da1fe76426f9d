//! Character budget enforcement by evicting whole messages.
//!
//! Graduated truncation already removes most of the bulk, so anything at or
//! below the no-eviction threshold is kept as is. Above it, the oldest
//! messages are dropped one at a time until the rendered block fits the hard
//! budget. A message is never split, and the last message is never dropped.

use tracing::{debug, warn};

use super::format::format_messages;
use super::stats::ProcessingStats;
use crate::config::ForkContextConfig;
use crate::Message;

/// Render `messages`, evicting the oldest ones until the result fits
/// `config.char_budget`.
///
/// Sets `removed_messages`, `final_count` and `total_chars`. When a single
/// remaining message is still over budget the oversized render is returned
/// as is; check [`ProcessingStats::over_budget`].
pub fn enforce_budget(
    messages: &[Message],
    stats: ProcessingStats,
    config: &ForkContextConfig,
) -> (String, ProcessingStats) {
    let (mut text, mut stats) = format_messages(messages, stats, config);
    stats.removed_messages = 0;

    if stats.total_chars <= config.no_eviction_threshold {
        return (text, stats);
    }

    let mut start = 0;
    while stats.total_chars > config.char_budget && messages.len() - start > 1 {
        start += 1;
        (text, stats) = format_messages(&messages[start..], stats, config);
        debug!(
            "evicted oldest message: {} remaining, {} chars",
            stats.final_count, stats.total_chars
        );
    }
    stats.removed_messages = start;

    if stats.over_budget(config.char_budget) {
        warn!(
            "fork context still over budget after eviction: {} chars > {} (single message)",
            stats.total_chars, config.char_budget
        );
    }
    (text, stats)
}
