//! The fork-context pipeline stages.
//!
//! Stages in the order they run:
//!
//! 1. **[`boundary`]**: [`detect_boundary`] finds the latest host compaction
//!    and returns the index of its summary message; history before it is
//!    dropped.
//! 2. **[`truncation`]**: [`truncate_tool_results`] caps old tool results per
//!    recency tier ([`tiers`]), choosing head-only or head+tail truncation.
//! 3. **[`format`]**: [`format_messages`] renders the messages into an
//!    `<inherited_context>` block with tier-aware parameter previews.
//! 4. **[`budget`]**: [`enforce_budget`] re-renders while evicting the
//!    oldest messages until the block fits the character budget.
//!
//! Every stage takes [`ProcessingStats`] by value and returns it updated.

pub mod boundary;
pub mod budget;
pub mod format;
pub mod stats;
pub mod tiers;
pub mod truncation;

pub use boundary::detect_boundary;
pub use budget::enforce_budget;
pub use format::{CONTEXT_CLOSE, CONTEXT_OPEN, format_messages};
pub use stats::{ProcessingStats, TierDistribution};
pub use tiers::{Tier, TierMap};
pub use truncation::{Strategy, TRUNCATION_MARKER, truncate_tool_results};
