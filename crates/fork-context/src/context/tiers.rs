//! Recency tiers for tool results, and pairing of tool invocations with
//! their results.
//!
//! Tool results are numbered in document order. A result's tier depends only
//! on how many results come after it, so dropping the oldest messages never
//! changes the tier of the results that remain. The formatter relies on this
//! to recompute tiers on an evicted suffix.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::config::ForkContextConfig;
use crate::{Message, Part};

/// Truncation severity of a tool result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Most recent results, kept in full.
    Full,
    /// Middle-aged results, capped at `tier2_cap`.
    Capped,
    /// Everything older, capped at `tier3_cap`.
    Minimal,
}

impl Tier {
    /// Tier of a result with `distance` results after it.
    pub fn for_distance(distance: usize, config: &ForkContextConfig) -> Self {
        if distance < config.tier1_count {
            Tier::Full
        } else if distance < config.tier1_count.saturating_add(config.tier2_count) {
            Tier::Capped
        } else {
            Tier::Minimal
        }
    }

    /// Character cap for a result in this tier, `None` when unlimited.
    pub fn result_cap(self, config: &ForkContextConfig) -> Option<usize> {
        match self {
            Tier::Full => None,
            Tier::Capped => Some(config.tier2_cap),
            Tier::Minimal => Some(config.tier3_cap),
        }
    }

    /// Character cap for an invocation's parameter preview in this tier.
    pub fn param_cap(self, config: &ForkContextConfig) -> usize {
        let [full, capped, minimal] = config.param_caps;
        match self {
            Tier::Full => full,
            Tier::Capped => capped,
            Tier::Minimal => minimal,
        }
    }
}

/// Location of a part: message index and part index within that message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PartRef {
    pub message: usize,
    pub part: usize,
}

impl PartRef {
    fn new(message: usize, part: usize) -> Self {
        Self { message, part }
    }
}

fn parts_in_order(messages: &[Message]) -> impl Iterator<Item = (PartRef, &Part)> {
    messages.iter().enumerate().flat_map(|(mi, m)| {
        m.parts
            .iter()
            .enumerate()
            .map(move |(pi, p)| (PartRef::new(mi, pi), p))
    })
}

/// Tiers of every tool result in a message sequence, plus the tier of each
/// tool invocation that could be paired with a result.
#[derive(Debug, Default)]
pub struct TierMap {
    results: HashMap<PartRef, Tier>,
    invocations: HashMap<PartRef, Tier>,
    unpaired: usize,
}

impl TierMap {
    pub fn build(messages: &[Message], config: &ForkContextConfig) -> Self {
        let result_refs: Vec<PartRef> = parts_in_order(messages)
            .filter(|(_, p)| p.is_tool_result())
            .map(|(at, _)| at)
            .collect();
        let total = result_refs.len();

        let results: HashMap<PartRef, Tier> = result_refs
            .iter()
            .enumerate()
            .map(|(i, at)| (*at, Tier::for_distance(total - 1 - i, config)))
            .collect();

        let pairs = pair_invocations(messages);
        let invocation_count = parts_in_order(messages)
            .filter(|(_, p)| matches!(p, Part::ToolInvocation { .. }))
            .count();
        let invocations: HashMap<PartRef, Tier> = pairs
            .into_iter()
            .filter_map(|(inv, res)| results.get(&res).map(|tier| (inv, *tier)))
            .collect();
        let unpaired = invocation_count - invocations.len();
        if unpaired > 0 {
            debug!("{unpaired} tool invocation(s) have no matching result, using smallest preview");
        }

        Self {
            results,
            invocations,
            unpaired,
        }
    }

    /// Tier of the tool result at `at`. Parts that are not tool results get
    /// the most conservative tier.
    pub fn result_tier(&self, at: PartRef) -> Tier {
        self.results.get(&at).copied().unwrap_or(Tier::Minimal)
    }

    /// Tier of the tool invocation at `at`, `None` if it has no result.
    pub fn invocation_tier(&self, at: PartRef) -> Option<Tier> {
        self.invocations.get(&at).copied()
    }

    /// Number of invocations without a paired result.
    pub fn unpaired_invocations(&self) -> usize {
        self.unpaired
    }
}

/// Pair each tool invocation with the tool result it produced.
///
/// Invocations and results that share a `call_id` are paired directly. The
/// rest are paired first-in first-out, but only across strictly adjacent
/// parts: a result takes the oldest pending invocation of its own message,
/// and failing that the oldest one left over from the message right before
/// it when that message had no results of its own. Invocations left pending
/// past that point stay unpaired, so a call that never got a result cannot
/// claim the result of a later call.
pub fn pair_invocations(messages: &[Message]) -> HashMap<PartRef, PartRef> {
    let mut result_ids: HashMap<&str, PartRef> = HashMap::new();
    for (at, part) in parts_in_order(messages) {
        if let Part::ToolResult {
            call_id: Some(id), ..
        } = part
        {
            result_ids.entry(id.as_str()).or_insert(at);
        }
    }

    let mut pairs = HashMap::new();
    let mut claimed: HashSet<PartRef> = HashSet::new();
    let mut carried: VecDeque<PartRef> = VecDeque::new();

    for (mi, msg) in messages.iter().enumerate() {
        let mut pending: VecDeque<PartRef> = VecDeque::new();
        let mut saw_result = false;

        for (pi, part) in msg.parts.iter().enumerate() {
            let at = PartRef::new(mi, pi);
            match part {
                Part::ToolInvocation { call_id, .. } => {
                    let by_id = call_id
                        .as_deref()
                        .and_then(|id| result_ids.get(id))
                        .filter(|res| !claimed.contains(*res))
                        .copied();
                    match by_id {
                        Some(res) => {
                            claimed.insert(res);
                            pairs.insert(at, res);
                        }
                        None => pending.push_back(at),
                    }
                }
                Part::ToolResult { .. } => {
                    saw_result = true;
                    if claimed.contains(&at) {
                        continue;
                    }
                    if let Some(inv) = pending.pop_front().or_else(|| carried.pop_front()) {
                        claimed.insert(at);
                        pairs.insert(inv, at);
                    }
                }
                _ => {}
            }
        }

        carried = if saw_result { VecDeque::new() } else { pending };
    }

    pairs
}

/// Resolve the name of the tool that produced the result at `index`.
///
/// Uses the result's own `tool` field when present. Otherwise scans backward
/// through the same message for an invocation with the same `call_id`, and
/// failing that for the nearest preceding invocation.
pub fn resolve_tool_name(parts: &[Part], index: usize) -> Option<&str> {
    let Some(Part::ToolResult { call_id, tool, .. }) = parts.get(index) else {
        return None;
    };
    if let Some(name) = tool.as_deref().filter(|n| !n.is_empty()) {
        return Some(name);
    }

    let preceding = parts.get(..index).unwrap_or_default();
    let invocations = || {
        preceding.iter().rev().filter_map(|p| match p {
            Part::ToolInvocation { call_id, tool, .. } => Some((call_id.as_deref(), tool.as_str())),
            _ => None,
        })
    };

    if let Some(id) = call_id.as_deref()
        && let Some((_, name)) = invocations().find(|(cid, _)| *cid == Some(id))
    {
        return Some(name);
    }
    invocations().next().map(|(_, name)| name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MessageRole;
    use serde_json::json;

    fn results(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                Message::new(
                    MessageRole::Assistant,
                    vec![Part::tool_result("read", format!("result {i}"))],
                )
            })
            .collect()
    }

    #[test]
    fn tier_boundaries_follow_config() {
        let config = ForkContextConfig::default();
        assert_eq!(Tier::for_distance(0, &config), Tier::Full);
        assert_eq!(Tier::for_distance(4, &config), Tier::Full);
        assert_eq!(Tier::for_distance(5, &config), Tier::Capped);
        assert_eq!(Tier::for_distance(14, &config), Tier::Capped);
        assert_eq!(Tier::for_distance(15, &config), Tier::Minimal);
    }

    #[test]
    fn caps_per_tier() {
        let config = ForkContextConfig::default();
        assert_eq!(Tier::Full.result_cap(&config), None);
        assert_eq!(Tier::Capped.result_cap(&config), Some(3_000));
        assert_eq!(Tier::Minimal.result_cap(&config), Some(500));
        assert_eq!(Tier::Full.param_cap(&config), 500);
        assert_eq!(Tier::Capped.param_cap(&config), 200);
        assert_eq!(Tier::Minimal.param_cap(&config), 100);
    }

    #[test]
    fn tiers_counted_from_the_end() {
        let config = ForkContextConfig::default();
        let messages = results(16);
        let map = TierMap::build(&messages, &config);
        assert_eq!(map.result_tier(PartRef::new(0, 0)), Tier::Minimal);
        assert_eq!(map.result_tier(PartRef::new(1, 0)), Tier::Capped);
        assert_eq!(map.result_tier(PartRef::new(10, 0)), Tier::Capped);
        assert_eq!(map.result_tier(PartRef::new(11, 0)), Tier::Full);
        assert_eq!(map.result_tier(PartRef::new(15, 0)), Tier::Full);
    }

    #[test]
    fn tiers_stable_when_oldest_dropped() {
        let config = ForkContextConfig::default();
        let messages = results(16);
        let full = TierMap::build(&messages, &config);
        let suffix = TierMap::build(&messages[3..], &config);
        for i in 3..16 {
            assert_eq!(
                full.result_tier(PartRef::new(i, 0)),
                suffix.result_tier(PartRef::new(i - 3, 0))
            );
        }
    }

    #[test]
    fn pairs_by_call_id_across_messages() {
        let messages = vec![
            Message::new(
                MessageRole::Assistant,
                vec![
                    Part::tool_invocation("read", json!({"path": "a"})).with_call_id("a"),
                    Part::tool_invocation("read", json!({"path": "b"})).with_call_id("b"),
                ],
            ),
            Message::new(
                MessageRole::Tool,
                vec![
                    Part::anonymous_result("B").with_call_id("b"),
                    Part::anonymous_result("A").with_call_id("a"),
                ],
            ),
        ];
        let pairs = pair_invocations(&messages);
        assert_eq!(pairs[&PartRef::new(0, 0)], PartRef::new(1, 1));
        assert_eq!(pairs[&PartRef::new(0, 1)], PartRef::new(1, 0));
    }

    #[test]
    fn pairs_without_ids_in_order() {
        let messages = vec![Message::new(
            MessageRole::Assistant,
            vec![
                Part::tool_invocation("a", json!({})),
                Part::tool_invocation("b", json!({})),
                Part::anonymous_result("A"),
                Part::anonymous_result("B"),
                Part::tool_invocation("c", json!({})),
            ],
        )];
        let pairs = pair_invocations(&messages);
        assert_eq!(pairs[&PartRef::new(0, 0)], PartRef::new(0, 2));
        assert_eq!(pairs[&PartRef::new(0, 1)], PartRef::new(0, 3));
        assert!(!pairs.contains_key(&PartRef::new(0, 4)));

        let map = TierMap::build(&messages, &ForkContextConfig::default());
        assert_eq!(map.unpaired_invocations(), 1);
        assert_eq!(map.invocation_tier(PartRef::new(0, 0)), Some(Tier::Full));
        assert_eq!(map.invocation_tier(PartRef::new(0, 4)), None);
    }

    #[test]
    fn pairs_invocation_message_with_following_results() {
        let messages = vec![
            Message::new(
                MessageRole::Assistant,
                vec![
                    Part::tool_invocation("a", json!({})),
                    Part::tool_invocation("b", json!({})),
                ],
            ),
            Message::new(
                MessageRole::Tool,
                vec![Part::anonymous_result("A"), Part::anonymous_result("B")],
            ),
        ];
        let pairs = pair_invocations(&messages);
        assert_eq!(pairs[&PartRef::new(0, 0)], PartRef::new(1, 0));
        assert_eq!(pairs[&PartRef::new(0, 1)], PartRef::new(1, 1));
    }

    #[test]
    fn dangling_invocation_does_not_steal_later_result() {
        let messages = vec![
            Message::new(
                MessageRole::Assistant,
                vec![Part::tool_invocation("bash", json!({"command": "sleep 600"}))],
            ),
            Message::new(
                MessageRole::Assistant,
                vec![
                    Part::tool_invocation("write", json!({"path": "a"})),
                    Part::anonymous_result("ok"),
                ],
            ),
        ];
        let pairs = pair_invocations(&messages);
        assert_eq!(pairs[&PartRef::new(1, 0)], PartRef::new(1, 1));
        assert!(!pairs.contains_key(&PartRef::new(0, 0)));

        let map = TierMap::build(&messages, &ForkContextConfig::default());
        assert_eq!(map.invocation_tier(PartRef::new(1, 0)), Some(Tier::Full));
        assert_eq!(map.unpaired_invocations(), 1);
    }

    #[test]
    fn leftover_invocations_expire_after_one_message() {
        let messages = vec![
            Message::new(MessageRole::Assistant, vec![Part::tool_invocation("x", json!({}))]),
            Message::user("never mind"),
            Message::new(MessageRole::Tool, vec![Part::anonymous_result("late")]),
        ];
        assert!(pair_invocations(&messages).is_empty());
    }

    #[test]
    fn huge_tier_counts_do_not_overflow() {
        let config = ForkContextConfig::default().with_tier_counts(usize::MAX, usize::MAX);
        assert_eq!(Tier::for_distance(usize::MAX - 1, &config), Tier::Full);
        let config = ForkContextConfig::default().with_tier_counts(1, usize::MAX);
        assert_eq!(Tier::for_distance(usize::MAX - 1, &config), Tier::Capped);
    }

    #[test]
    fn invocation_inherits_result_tier() {
        let config = ForkContextConfig::default();
        let mut messages = vec![Message::new(
            MessageRole::Assistant,
            vec![
                Part::tool_invocation("grep", json!({"pattern": "x"})),
                Part::anonymous_result("old"),
            ],
        )];
        messages.extend(results(15));
        let map = TierMap::build(&messages, &config);
        assert_eq!(map.invocation_tier(PartRef::new(0, 0)), Some(Tier::Minimal));
    }

    #[test]
    fn resolve_uses_own_name_first() {
        let parts = vec![
            Part::tool_invocation("bash", json!({})),
            Part::tool_result("read", "x"),
        ];
        assert_eq!(resolve_tool_name(&parts, 1), Some("read"));
    }

    #[test]
    fn resolve_scans_backward_for_nearest_invocation() {
        let parts = vec![
            Part::tool_invocation("read", json!({})),
            Part::text("thinking"),
            Part::tool_invocation("bash", json!({})),
            Part::anonymous_result("x"),
        ];
        assert_eq!(resolve_tool_name(&parts, 3), Some("bash"));
    }

    #[test]
    fn resolve_prefers_matching_call_id() {
        let parts = vec![
            Part::tool_invocation("bash", json!({})).with_call_id("1"),
            Part::tool_invocation("read", json!({})).with_call_id("2"),
            Part::anonymous_result("x").with_call_id("1"),
        ];
        assert_eq!(resolve_tool_name(&parts, 2), Some("bash"));
    }

    #[test]
    fn resolve_unknown_degrades_to_none() {
        let parts = vec![Part::text("no tools"), Part::anonymous_result("x")];
        assert_eq!(resolve_tool_name(&parts, 1), None);
        assert_eq!(resolve_tool_name(&parts, 0), None);
        assert_eq!(resolve_tool_name(&parts, 9), None);
    }
}
