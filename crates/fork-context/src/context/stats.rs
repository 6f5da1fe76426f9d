//! Statistics collected while preparing a fork context.

use serde::Serialize;

use super::tiers::Tier;

/// How many tool results landed in each tier.
#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TierDistribution {
    pub tier1: usize,
    pub tier2: usize,
    pub tier3: usize,
}

impl TierDistribution {
    pub fn record(&mut self, tier: Tier) {
        match tier {
            Tier::Full => self.tier1 += 1,
            Tier::Capped => self.tier2 += 1,
            Tier::Minimal => self.tier3 += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.tier1 + self.tier2 + self.tier3
    }
}

/// Accumulated outcome of one pipeline run.
///
/// Each stage takes the stats by value and returns an updated copy, so the
/// stages stay independent and individually testable.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingStats {
    /// Messages in the history handed to the pipeline.
    pub original_count: usize,
    /// Messages present in the rendered context.
    pub final_count: usize,
    /// Characters in the rendered context.
    pub total_chars: usize,
    /// Tool results whose text was shortened.
    pub truncated_results: usize,
    /// Oldest messages dropped to meet the character budget.
    pub removed_messages: usize,
    /// Whether a complete compaction boundary was found.
    pub compaction_detected: bool,
    /// Index of the summary message the history was sliced at.
    pub compaction_slice_index: Option<usize>,
    pub tier_distribution: TierDistribution,
    /// Truncations that kept both head and tail.
    pub head_tail_applied: usize,
}

impl ProcessingStats {
    pub fn new(original_count: usize) -> Self {
        Self {
            original_count,
            ..Default::default()
        }
    }

    /// True when the rendered context still exceeds `budget`. This only
    /// happens when a single remaining message is larger than the budget.
    pub fn over_budget(&self, budget: usize) -> bool {
        self.total_chars > budget
    }

    /// Short log-friendly summary.
    pub fn to_log_string(&self) -> String {
        format!(
            "fork context: {}/{} messages, {} chars, {} truncated ({} head+tail), {} evicted, tiers {}/{}/{}",
            self.final_count,
            self.original_count,
            self.total_chars,
            self.truncated_results,
            self.head_tail_applied,
            self.removed_messages,
            self.tier_distribution.tier1,
            self.tier_distribution.tier2,
            self.tier_distribution.tier3,
        )
    }
}
