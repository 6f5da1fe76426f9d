//! Compaction boundary detection.
//!
//! When the host compacts a conversation it inserts a user message carrying a
//! compaction marker, then writes an assistant summary of everything before
//! it. Only the latest compaction matters: its summary already subsumes any
//! earlier ones.

use crate::Message;
use tracing::debug;

/// Find the index the history should be sliced at.
///
/// Returns the index of the summary message that follows the latest
/// compaction marker. Everything from that index onward is kept. Returns
/// `None` when there is no marker, or when the latest marker has no summary
/// after it; an incomplete compaction never drops real history.
pub fn detect_boundary(messages: &[Message]) -> Option<usize> {
    let marker = messages.iter().rposition(Message::has_compaction_marker)?;

    let summary = messages
        .iter()
        .enumerate()
        .skip(marker + 1)
        .find(|(_, m)| m.is_summary())
        .map(|(i, _)| i);

    match summary {
        Some(idx) => debug!("compaction boundary: marker at {marker}, summary at {idx}"),
        None => debug!("compaction marker at {marker} has no summary, keeping full history"),
    }
    summary
}
