//! Human-readable summary placed ahead of the injected context.

use crate::context::ProcessingStats;

/// Describe how the parent history was reduced, so the child agent knows
/// what it is (and isn't) looking at.
pub fn build_preamble(stats: &ProcessingStats, char_budget: usize) -> String {
    let mut lines = vec![format!(
        "[Forked context] This session inherits {} of {} messages from its parent ({} characters).",
        stats.final_count, stats.original_count, stats.total_chars
    )];

    lines.push(match stats.compaction_slice_index {
        Some(idx) if stats.compaction_detected => format!(
            "- Compaction: detected; history starts at the host summary (message {idx})."
        ),
        _ => "- Compaction: none detected; full history retained.".to_string(),
    });

    let dist = &stats.tier_distribution;
    if dist.total() > 0 {
        lines.push(format!(
            "- Tool results: {} full, {} capped, {} minimal; {} truncated ({} head+tail).",
            dist.tier1, dist.tier2, dist.tier3, stats.truncated_results, stats.head_tail_applied
        ));
    }

    if stats.removed_messages > 0 {
        lines.push(format!(
            "- Evicted: {} oldest message(s) to fit the {char_budget} character budget.",
            stats.removed_messages
        ));
    }

    if stats.over_budget(char_budget) {
        lines.push(format!(
            "- Note: a single remaining message exceeds the {char_budget} character budget."
        ));
    }

    lines.join("\n")
}
