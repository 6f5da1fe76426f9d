//! Configuration for the fork-context pipeline.
//!
//! Every constant the pipeline consumes lives on [`ForkContextConfig`]. The
//! defaults are tuned for forking a long-running coding agent into a child
//! with a ~200K character context block.
//!
//! # Examples
//!
//! Defaults:
//!
//! ```
//! use fork_context::ForkContextConfig;
//!
//! let config = ForkContextConfig::default();
//! assert_eq!(config.char_budget, 200_000);
//! assert!(config.validate().is_ok());
//! ```
//!
//! Builder overrides:
//!
//! ```
//! use fork_context::ForkContextConfig;
//!
//! let config = ForkContextConfig::new()
//!     .with_char_budget(50_000, 30_000)
//!     .with_tier_caps(2000, 400)
//!     .protect_tool("todo_write");
//! assert!(config.validate().is_ok());
//! ```
//!
//! Partial JSON files override only the fields they name:
//!
//! ```json
//! { "char_budget": 100000, "no_eviction_threshold": 60000 }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hard cap on the rendered context, in characters.
pub const DEFAULT_CHAR_BUDGET: usize = 200_000;

/// Below this rendered size no messages are evicted.
pub const DEFAULT_NO_EVICTION_THRESHOLD: usize = 120_000;

/// Substring the host writes in place of tool output it already cleared.
pub const DEFAULT_CLEARED_SENTINEL: &str = "[Old tool result content cleared]";

const DEFAULT_ERROR_KEYWORDS: &[&str] = &[
    "error",
    "Error",
    "ERROR",
    "failed",
    "Failed",
    "FAILED",
    "exception",
    "Exception",
    "panicked",
    "Traceback",
    "fatal:",
];

const DEFAULT_HEAD_TAIL_TOOLS: &[&str] = &["bash", "shell", "exec", "terminal", "command", "run"];

const DEFAULT_NEVER_TRUNCATE_TOOLS: &[&str] = &["question", "ask_user"];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

/// All tunables of the pipeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ForkContextConfig {
    /// Hard character budget for the rendered context. Default: 200 000.
    pub char_budget: usize,
    /// Rendered sizes at or below this skip eviction entirely. Default: 120 000.
    pub no_eviction_threshold: usize,
    /// Number of most recent tool results kept in full. Default: 5.
    pub tier1_count: usize,
    /// Number of tool results after tier 1 capped at `tier2_cap`. Default: 10.
    pub tier2_count: usize,
    /// Character cap for tier-2 results. Default: 3 000.
    pub tier2_cap: usize,
    /// Character cap for all older results. Default: 500.
    pub tier3_cap: usize,
    /// Parameter preview caps for tiers 1, 2 and 3. Default: 500 / 200 / 100.
    pub param_caps: [usize; 3],
    /// Fraction of the cap kept from the start in head+tail mode. Default: 0.8.
    pub head_ratio: f64,
    /// Fraction of the cap kept from the end in head+tail mode. Default: 0.2.
    pub tail_ratio: f64,
    /// Case-sensitive substrings that mark a result as an error.
    pub error_keywords: Vec<String>,
    /// Tool-name keywords (case-insensitive, whole words) that select head+tail
    /// truncation.
    pub head_tail_tools: Vec<String>,
    /// Tool-name keywords (case-insensitive, whole words) whose results are
    /// never truncated.
    pub never_truncate_tools: Vec<String>,
    /// Substring identifying results the host already cleared.
    pub cleared_sentinel: String,
}

impl Default for ForkContextConfig {
    fn default() -> Self {
        Self {
            char_budget: DEFAULT_CHAR_BUDGET,
            no_eviction_threshold: DEFAULT_NO_EVICTION_THRESHOLD,
            tier1_count: 5,
            tier2_count: 10,
            tier2_cap: 3_000,
            tier3_cap: 500,
            param_caps: [500, 200, 100],
            head_ratio: 0.8,
            tail_ratio: 0.2,
            error_keywords: strings(DEFAULT_ERROR_KEYWORDS),
            head_tail_tools: strings(DEFAULT_HEAD_TAIL_TOOLS),
            never_truncate_tools: strings(DEFAULT_NEVER_TRUNCATE_TOOLS),
            cleared_sentinel: DEFAULT_CLEARED_SENTINEL.to_string(),
        }
    }
}

impl ForkContextConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        serde_json::from_str(&raw)
            .map_err(|e| format!("failed to parse config {}: {e}", path.display()))
    }

    /// Set the hard budget and the no-eviction threshold.
    pub fn with_char_budget(mut self, budget: usize, no_eviction_threshold: usize) -> Self {
        self.char_budget = budget;
        self.no_eviction_threshold = no_eviction_threshold;
        self
    }

    /// Set how many results fall into tiers 1 and 2.
    pub fn with_tier_counts(mut self, tier1: usize, tier2: usize) -> Self {
        self.tier1_count = tier1;
        self.tier2_count = tier2;
        self
    }

    /// Set the tier-2 and tier-3 result caps.
    pub fn with_tier_caps(mut self, tier2: usize, tier3: usize) -> Self {
        self.tier2_cap = tier2;
        self.tier3_cap = tier3;
        self
    }

    /// Set the head/tail split used by head+tail truncation.
    pub fn with_head_tail_ratio(mut self, head: f64, tail: f64) -> Self {
        self.head_ratio = head;
        self.tail_ratio = tail;
        self
    }

    /// Never truncate results of tools whose name contains `keyword`.
    pub fn protect_tool(mut self, keyword: impl Into<String>) -> Self {
        self.never_truncate_tools.push(keyword.into());
        self
    }

    /// Use head+tail truncation for tools whose name contains `keyword`.
    pub fn head_tail_tool(mut self, keyword: impl Into<String>) -> Self {
        self.head_tail_tools.push(keyword.into());
        self
    }

    /// Treat results containing `keyword` as errors.
    pub fn error_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.error_keywords.push(keyword.into());
        self
    }

    /// Check that the constants are mutually consistent.
    pub fn validate(&self) -> Result<(), String> {
        if self.char_budget == 0 {
            return Err("char_budget must be greater than zero".into());
        }
        if self.no_eviction_threshold > self.char_budget {
            return Err(format!(
                "no_eviction_threshold ({}) exceeds char_budget ({})",
                self.no_eviction_threshold, self.char_budget
            ));
        }
        if self.tier2_cap < self.tier3_cap {
            return Err(format!(
                "tier2_cap ({}) is smaller than tier3_cap ({})",
                self.tier2_cap, self.tier3_cap
            ));
        }
        let [p1, p2, p3] = self.param_caps;
        if p1 < p2 || p2 < p3 {
            return Err(format!(
                "param_caps must be non-increasing by tier, got {p1}/{p2}/{p3}"
            ));
        }
        for (name, ratio) in [("head_ratio", self.head_ratio), ("tail_ratio", self.tail_ratio)] {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(format!("{name} must be within [0, 1], got {ratio}"));
            }
        }
        if self.head_ratio + self.tail_ratio > 1.0 {
            return Err(format!(
                "head_ratio + tail_ratio must not exceed 1, got {}",
                self.head_ratio + self.tail_ratio
            ));
        }
        if self.cleared_sentinel.is_empty() {
            return Err("cleared_sentinel must not be empty".into());
        }
        Ok(())
    }
}
