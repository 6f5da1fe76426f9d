//! Tiered tool result truncation.
//!
//! Recent tool results survive in full; older ones are cut down to a
//! per-tier character cap. Shell-like tools and error output keep both ends
//! of the text (the command echo at the head, the exit status or stack trace
//! at the tail). Everything else keeps only the head.

use tracing::debug;

use super::stats::ProcessingStats;
use super::tiers::{PartRef, TierMap, resolve_tool_name};
use crate::config::ForkContextConfig;
use crate::{Message, Part, char_len, last_chars, take_chars};

/// Word present in every elision marker.
pub const TRUNCATION_MARKER: &str = "truncated";

/// How an over-cap result is shortened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Keep the first `cap` characters.
    HeadOnly,
    /// Keep a head fraction and a tail fraction of `cap`.
    HeadTail,
}

fn elision_marker(elided: usize) -> String {
    format!("[... {elided} characters {TRUNCATION_MARKER} ...]")
}

/// Keep the first `cap` characters of `text` and mark the rest as elided.
pub fn truncate_head(text: &str, cap: usize) -> String {
    let elided = char_len(text).saturating_sub(cap);
    format!("{}\n\n{}", take_chars(text, cap), elision_marker(elided))
}

/// Keep the first `cap * head_ratio` and last `cap * tail_ratio` characters
/// of `text`, joined by an elision marker.
pub fn truncate_head_tail(text: &str, cap: usize, head_ratio: f64, tail_ratio: f64) -> String {
    let len = char_len(text);
    let head_len = (cap as f64 * head_ratio).floor() as usize;
    let tail_len = ((cap as f64 * tail_ratio).floor() as usize).min(len.saturating_sub(head_len));
    let elided = len.saturating_sub(head_len + tail_len);
    format!(
        "{}\n\n{}\n\n{}",
        take_chars(text, head_len),
        elision_marker(elided),
        last_chars(text, tail_len)
    )
}

/// Whether `word` occurs in `haystack` with no letter or digit directly
/// before or after it, so `run` matches `run_command` but not `truncate`.
fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.match_indices(word).any(|(start, _)| {
        let before = haystack.get(..start).and_then(|s| s.chars().next_back());
        let after = haystack.get(start + word.len()..).and_then(|s| s.chars().next());
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

fn name_matches(name: Option<&str>, keywords: &[String]) -> bool {
    let Some(name) = name else {
        return false;
    };
    let name = name.to_lowercase();
    keywords
        .iter()
        .any(|k| !k.is_empty() && contains_word(&name, &k.to_lowercase()))
}

/// Whether results of this tool must never be truncated.
pub fn is_protected(tool_name: Option<&str>, config: &ForkContextConfig) -> bool {
    name_matches(tool_name, &config.never_truncate_tools)
}

/// Pick the truncation strategy for a result.
///
/// Head+tail applies to shell-like tools and to any text containing an error
/// keyword. An unresolved tool name only qualifies through the error check.
pub fn select_strategy(
    tool_name: Option<&str>,
    text: &str,
    config: &ForkContextConfig,
) -> Strategy {
    let shell_like = name_matches(tool_name, &config.head_tail_tools);
    let has_error = config
        .error_keywords
        .iter()
        .any(|k| !k.is_empty() && text.contains(k.as_str()));
    if shell_like || has_error {
        Strategy::HeadTail
    } else {
        Strategy::HeadOnly
    }
}

/// Shorten a single result to `cap` characters if needed.
///
/// Returns `None` when the text is left untouched: it already carries the
/// host's cleared sentinel, the tool is protected, or it fits the cap.
pub fn truncate_result(
    text: &str,
    tool_name: Option<&str>,
    cap: usize,
    config: &ForkContextConfig,
) -> Option<(String, Strategy)> {
    if text.contains(config.cleared_sentinel.as_str()) || is_protected(tool_name, config) {
        return None;
    }
    if char_len(text) <= cap {
        return None;
    }
    let strategy = select_strategy(tool_name, text, config);
    let truncated = match strategy {
        Strategy::HeadOnly => truncate_head(text, cap),
        Strategy::HeadTail => truncate_head_tail(text, cap, config.head_ratio, config.tail_ratio),
    };
    Some((truncated, strategy))
}

/// Apply tiered truncation to every tool result in `messages`.
///
/// Records the tier of every result in `stats.tier_distribution`, and counts
/// shortened results in `truncated_results` / `head_tail_applied`.
pub fn truncate_tool_results(
    mut messages: Vec<Message>,
    mut stats: ProcessingStats,
    config: &ForkContextConfig,
) -> (Vec<Message>, ProcessingStats) {
    let tiers = TierMap::build(&messages, config);

    for (mi, msg) in messages.iter_mut().enumerate() {
        for pi in 0..msg.parts.len() {
            let Some(Part::ToolResult { output, .. }) = msg.parts.get(pi) else {
                continue;
            };
            let tier = tiers.result_tier(PartRef {
                message: mi,
                part: pi,
            });
            stats.tier_distribution.record(tier);

            let Some(cap) = tier.result_cap(config) else {
                continue;
            };
            let tool_name = resolve_tool_name(&msg.parts, pi);
            let Some((truncated, strategy)) = truncate_result(output, tool_name, cap, config)
            else {
                continue;
            };

            stats.truncated_results += 1;
            if strategy == Strategy::HeadTail {
                stats.head_tail_applied += 1;
            }
            if let Some(Part::ToolResult { output, .. }) = msg.parts.get_mut(pi) {
                *output = truncated;
            }
        }
    }

    debug!(
        "tool results: tiers {}/{}/{}, {} truncated ({} head+tail)",
        stats.tier_distribution.tier1,
        stats.tier_distribution.tier2,
        stats.tier_distribution.tier3,
        stats.truncated_results,
        stats.head_tail_applied,
    );
    (messages, stats)
}
