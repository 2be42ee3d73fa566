//! Timing window resolution
//!
//! Resolves a start/due window for every node of an issue tree. The strategy
//! chain selects one merge strategy per hierarchy depth; once the chain is
//! exhausted, deeper levels fall back to `ParentOnly`.
//!
//! Strategies are evaluated with structural laziness: an arm only computes
//! the own-window or children-window it actually needs, and computing the
//! children window is what recurses into the subtree. `ResolveStats` counts
//! the evaluations so the laziness contract is observable in tests.
//!
//! A node with no timing anywhere in its subtree resolves to an empty
//! window. That is a valid "unknown timing" result, not an error.

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use thiserror::Error;
use trackline_core::{
    ChildWindows, DateData, IssueKey, IssueNode, RollupNode, StreamWindow, TimingWindow,
};

use crate::forest::Forest;

/// How a node's own window and its children's merged window combine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Own window wins when closed; otherwise children fill the gaps
    ParentFirstThenChildren,
    /// Only the children's merged window; own window is never computed
    ChildrenOnly,
    /// Children's window wins when closed; otherwise own fills the gaps
    ChildrenFirstThenParent,
    /// Earliest start and latest due across both sources; never narrows
    WidestRange,
    /// Own window only; children are still resolved so the subtree is
    /// populated for display
    ParentOnly,
}

impl MergeStrategy {
    /// Canonical strategy name
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::ParentFirstThenChildren => "parentFirstThenChildren",
            MergeStrategy::ChildrenOnly => "childrenOnly",
            MergeStrategy::ChildrenFirstThenParent => "childrenFirstThenParent",
            MergeStrategy::WidestRange => "widestRange",
            MergeStrategy::ParentOnly => "parentOnly",
        }
    }

    /// All strategies, for help text and validation
    pub fn all() -> &'static [MergeStrategy] {
        &[
            MergeStrategy::ParentFirstThenChildren,
            MergeStrategy::ChildrenOnly,
            MergeStrategy::ChildrenFirstThenParent,
            MergeStrategy::WidestRange,
            MergeStrategy::ParentOnly,
        ]
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown strategy name in a chain; a programming/configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown merge strategy '{0}'")]
pub struct UnknownStrategy(pub String);

impl FromStr for MergeStrategy {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parentFirstThenChildren" | "parent-first-then-children" => {
                Ok(Self::ParentFirstThenChildren)
            }
            "childrenOnly" | "children-only" => Ok(Self::ChildrenOnly),
            "childrenFirstThenParent" | "children-first-then-parent" => {
                Ok(Self::ChildrenFirstThenParent)
            }
            "widestRange" | "widest-range" => Ok(Self::WidestRange),
            "parentOnly" | "parent-only" => Ok(Self::ParentOnly),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Parse a comma-separated strategy chain (one entry per hierarchy level)
pub fn parse_chain(chain: &str) -> Result<Vec<MergeStrategy>, UnknownStrategy> {
    chain
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(MergeStrategy::from_str)
        .collect()
}

/// Evaluation counters for one resolver run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResolveStats {
    /// Nodes visited
    pub nodes_visited: usize,
    /// Own-window evaluations
    pub own_windows_computed: usize,
    /// Children-window evaluations (each one recurses)
    pub children_windows_computed: usize,
}

/// Resolves timing windows over a forest.
///
/// Each `resolve*` call builds a fresh immutable tree; nothing on the forest
/// or on previous results is mutated.
pub struct TimingMergeResolver<'f> {
    forest: &'f Forest,
}

impl<'f> TimingMergeResolver<'f> {
    pub fn new(forest: &'f Forest) -> Self {
        Self { forest }
    }

    /// Resolve a single node (and its subtree). Returns `None` when the key
    /// is not in the forest.
    pub fn resolve(&self, key: &str, chain: &[MergeStrategy]) -> Option<RollupNode> {
        self.resolve_with_stats(key, chain).map(|(node, _)| node)
    }

    /// Resolve a single node, returning the run's evaluation counters
    pub fn resolve_with_stats(
        &self,
        key: &str,
        chain: &[MergeStrategy],
    ) -> Option<(RollupNode, ResolveStats)> {
        let node = self.forest.node(key)?;
        let mut stats = ResolveStats::default();
        let mut visited = BTreeSet::new();
        visited.insert(node.key.clone());
        Some((self.resolve_node(node, chain, 0, &mut visited, &mut stats), stats))
    }

    /// Resolve every root of the forest
    pub fn resolve_forest(&self, chain: &[MergeStrategy]) -> Vec<RollupNode> {
        self.forest
            .roots()
            .iter()
            .filter_map(|key| self.resolve(key, chain))
            .collect()
    }

    fn resolve_node(
        &self,
        node: &IssueNode,
        chain: &[MergeStrategy],
        depth: usize,
        visited: &mut BTreeSet<IssueKey>,
        stats: &mut ResolveStats,
    ) -> RollupNode {
        stats.nodes_visited += 1;
        let strategy = chain.get(depth).copied().unwrap_or(MergeStrategy::ParentOnly);

        let mut date_data = DateData::default();

        match strategy {
            MergeStrategy::ParentFirstThenChildren => {
                let own = own_window(node, stats);
                if own.is_closed() {
                    date_data.rollup = own.clone();
                } else {
                    let children = self.children_windows(node, chain, depth, visited, stats);
                    date_data.rollup = own.clone().or_else_from(&children.window);
                    date_data.children = children;
                }
                date_data.own = own;
            }
            MergeStrategy::ChildrenOnly => {
                let children = self.children_windows(node, chain, depth, visited, stats);
                date_data.rollup = children.window.clone();
                date_data.children = children;
            }
            MergeStrategy::ChildrenFirstThenParent => {
                let children = self.children_windows(node, chain, depth, visited, stats);
                if children.window.is_closed() {
                    date_data.rollup = children.window.clone();
                } else {
                    let own = own_window(node, stats);
                    date_data.rollup = children.window.clone().or_else_from(&own);
                    date_data.own = own;
                }
                date_data.children = children;
            }
            MergeStrategy::WidestRange => {
                let own = own_window(node, stats);
                let children = self.children_windows(node, chain, depth, visited, stats);
                date_data.rollup = TimingWindow::widest([&own, &children.window]);
                date_data.own = own;
                date_data.children = children;
            }
            MergeStrategy::ParentOnly => {
                // Children are resolved for subtree population but do not
                // contribute to the rollup window.
                let children = self.children_windows(node, chain, depth, visited, stats);
                let own = own_window(node, stats);
                date_data.rollup = own.clone();
                date_data.own = own;
                date_data.children = children;
            }
        }

        RollupNode {
            issue: node.clone(),
            date_data,
        }
    }

    fn children_windows(
        &self,
        node: &IssueNode,
        chain: &[MergeStrategy],
        depth: usize,
        visited: &mut BTreeSet<IssueKey>,
        stats: &mut ResolveStats,
    ) -> ChildWindows {
        stats.children_windows_computed += 1;
        let mut issues = Vec::new();
        for child_key in self.forest.children_of(&node.key) {
            // Re-entry guard: a shared or cyclic link is resolved once per run
            if !visited.insert(child_key.clone()) {
                continue;
            }
            if let Some(child) = self.forest.node(child_key) {
                issues.push(self.resolve_node(child, chain, depth + 1, visited, stats));
            }
        }
        let window = TimingWindow::widest(issues.iter().map(|child| &child.date_data.rollup));
        ChildWindows { window, issues }
    }
}

/// A node's own window: explicit start/due merged with the union of its
/// sprint windows. Explicit fields win where present.
fn own_window(node: &IssueNode, stats: &mut ResolveStats) -> TimingWindow {
    stats.own_windows_computed += 1;
    node.explicit_window().or_else_from(&node.sprint_window())
}

// ============================================================================
// Work-Stream Breakdown
// ============================================================================

/// Labels recognized as work-stream markers on issues
const STREAM_LABELS: [&str; 3] = ["dev", "qa", "uat"];

/// Derive the dev/qa/uat stream windows for a resolved tree.
///
/// A node's stream window is the widest rollup window over itself and its
/// descendants carrying that label (matched case-insensitively). Nodes whose
/// subtree has no labeled issue for a stream keep that stream `None`.
pub fn attach_streams(node: &mut RollupNode) {
    for child in &mut node.date_data.children.issues {
        attach_streams(child);
    }
    let [dev, qa, uat] = STREAM_LABELS.map(|stream| stream_window(node, stream));
    node.date_data.dev = dev;
    node.date_data.qa = qa;
    node.date_data.uat = uat;
}

fn stream_window(node: &RollupNode, stream: &str) -> Option<StreamWindow> {
    let mut windows = Vec::new();
    node.walk(&mut |n| {
        if n.issue.labels.iter().any(|label| label.eq_ignore_ascii_case(stream)) {
            windows.push(n.date_data.rollup.clone());
        }
    });
    if windows.is_empty() {
        return None;
    }
    Some(StreamWindow {
        window: TimingWindow::widest(windows.iter()),
        last_period: None,
    })
}

// ============================================================================
// Prior-Period Linking
// ============================================================================

/// Prior-period windows kept for one issue: the rollup plus whichever stream
/// breakdowns the prior tree carried
#[derive(Clone, Debug, Default)]
pub struct PriorWindows {
    pub rollup: TimingWindow,
    pub dev: Option<TimingWindow>,
    pub qa: Option<TimingWindow>,
    pub uat: Option<TimingWindow>,
}

/// Index a prior-period resolved tree by key, keeping each node's rollup and
/// stream windows. The prior tree itself is left untouched.
pub fn prior_window_index(prior_roots: &[RollupNode]) -> BTreeMap<IssueKey, PriorWindows> {
    let mut index = BTreeMap::new();
    for root in prior_roots {
        root.walk(&mut |node| {
            let data = &node.date_data;
            index
                .entry(node.issue.key.clone())
                .or_insert_with(|| PriorWindows {
                    rollup: data.rollup.clone(),
                    dev: data.dev.as_ref().map(|s| s.window.clone()),
                    qa: data.qa.as_ref().map(|s| s.window.clone()),
                    uat: data.uat.as_ref().map(|s| s.window.clone()),
                });
        });
    }
    index
}

/// Attach prior-period windows onto a freshly resolved tree, matching by key.
/// Streams link only where the current tree has the breakdown; nodes absent
/// from the prior snapshot keep `last_period = None` everywhere.
pub fn link_prior(node: &mut RollupNode, prior: &BTreeMap<IssueKey, PriorWindows>) {
    match prior.get(&node.issue.key) {
        Some(windows) => {
            node.date_data.last_period = Some(windows.rollup.clone());
            let slots = [
                (&mut node.date_data.dev, &windows.dev),
                (&mut node.date_data.qa, &windows.qa),
                (&mut node.date_data.uat, &windows.uat),
            ];
            for (slot, prior_stream) in slots {
                if let Some(stream) = slot {
                    stream.last_period = prior_stream.clone();
                }
            }
        }
        None => node.date_data.last_period = None,
    }
    for child in &mut node.date_data.children.issues {
        link_prior(child, prior);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use trackline_core::IssueNode;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn strategy_round_trip_names() {
        for strategy in MergeStrategy::all() {
            assert_eq!(strategy.as_str().parse::<MergeStrategy>().unwrap(), *strategy);
        }
    }

    #[test]
    fn strategy_kebab_aliases() {
        assert_eq!(
            "children-first-then-parent".parse::<MergeStrategy>().unwrap(),
            MergeStrategy::ChildrenFirstThenParent
        );
    }

    #[test]
    fn unknown_strategy_is_an_error() {
        let err = "bogus".parse::<MergeStrategy>().unwrap_err();
        assert_eq!(err, UnknownStrategy("bogus".into()));
        assert!(parse_chain("parentOnly,bogus").is_err());
    }

    #[test]
    fn parse_chain_splits_and_trims() {
        let chain = parse_chain("widestRange, childrenOnly").unwrap();
        assert_eq!(chain, vec![MergeStrategy::WidestRange, MergeStrategy::ChildrenOnly]);
    }

    #[test]
    fn chain_exhaustion_falls_back_to_parent_only() {
        // Level 0 uses childrenOnly; the chain is exhausted below, so the
        // leaf (depth 1) uses parentOnly and returns its explicit window.
        let forest = Forest::from_issues(vec![
            IssueNode::new("P"),
            IssueNode::new("C")
                .parent("P")
                .start(date(2026, 3, 2))
                .due(date(2026, 3, 13)),
        ]);

        let resolver = TimingMergeResolver::new(&forest);
        let root = resolver.resolve("P", &[MergeStrategy::ChildrenOnly]).unwrap();

        assert_eq!(root.date_data.rollup.start, Some(date(2026, 3, 2)));
        assert_eq!(root.date_data.rollup.due, Some(date(2026, 3, 13)));
    }

    #[test]
    fn unknown_key_resolves_to_none() {
        let forest = Forest::from_issues(vec![IssueNode::new("A")]);
        let resolver = TimingMergeResolver::new(&forest);
        assert!(resolver.resolve("missing", &[]).is_none());
    }

    #[test]
    fn stream_windows_come_from_labeled_descendants() {
        let forest = Forest::from_issues(vec![
            IssueNode::new("E1"),
            IssueNode::new("S1")
                .parent("E1")
                .label("dev")
                .start(date(2026, 1, 5))
                .due(date(2026, 1, 30)),
            IssueNode::new("S2").parent("E1").label("Dev").due(date(2026, 2, 13)),
            IssueNode::new("S3").parent("E1").label("qa").due(date(2026, 3, 6)),
        ]);
        let resolver = TimingMergeResolver::new(&forest);
        let mut root = resolver
            .resolve("E1", &[MergeStrategy::ChildrenFirstThenParent])
            .unwrap();
        attach_streams(&mut root);

        // dev spans both labeled stories, case-insensitively
        let dev = root.date_data.dev.as_ref().unwrap();
        assert_eq!(dev.window.start, Some(date(2026, 1, 5)));
        assert_eq!(dev.window.due, Some(date(2026, 2, 13)));
        assert_eq!(
            root.date_data.qa.as_ref().unwrap().window.due,
            Some(date(2026, 3, 6))
        );
        assert!(root.date_data.uat.is_none());
        // The labeled leaf carries its own breakdown too
        let s1 = root.find("S1").unwrap();
        assert_eq!(
            s1.date_data.dev.as_ref().unwrap().window.due,
            Some(date(2026, 1, 30))
        );
    }

    #[test]
    fn prior_linking_carries_stream_windows() {
        let resolve_streamed = |issues: Vec<IssueNode>| {
            let forest = Forest::from_issues(issues);
            let resolver = TimingMergeResolver::new(&forest);
            let mut roots = resolver.resolve_forest(&[MergeStrategy::ChildrenFirstThenParent]);
            for root in &mut roots {
                attach_streams(root);
            }
            roots
        };

        let prior_roots = resolve_streamed(vec![
            IssueNode::new("E1"),
            IssueNode::new("S1").parent("E1").label("dev").due(date(2026, 1, 30)),
        ]);
        let mut roots = resolve_streamed(vec![
            IssueNode::new("E1"),
            IssueNode::new("S1").parent("E1").label("dev").due(date(2026, 2, 13)),
        ]);

        let index = prior_window_index(&prior_roots);
        for root in &mut roots {
            link_prior(root, &index);
        }

        let dev = roots[0].date_data.dev.as_ref().unwrap();
        assert_eq!(dev.window.due, Some(date(2026, 2, 13)));
        assert_eq!(
            dev.last_period.as_ref().unwrap().due,
            Some(date(2026, 1, 30))
        );
    }

    #[test]
    fn prior_linking_matches_by_key() {
        let forest = Forest::from_issues(vec![
            IssueNode::new("E1").start(date(2026, 1, 5)).due(date(2026, 1, 30)),
        ]);
        let resolver = TimingMergeResolver::new(&forest);
        let prior_roots = resolver.resolve_forest(&[MergeStrategy::ParentOnly]);

        let later = Forest::from_issues(vec![
            IssueNode::new("E1").start(date(2026, 1, 5)).due(date(2026, 2, 13)),
            IssueNode::new("E2").start(date(2026, 2, 2)).due(date(2026, 2, 27)),
        ]);
        let resolver = TimingMergeResolver::new(&later);
        let mut roots = resolver.resolve_forest(&[MergeStrategy::ParentOnly]);

        let index = prior_window_index(&prior_roots);
        for root in &mut roots {
            link_prior(root, &index);
        }

        let e1 = roots.iter().find(|r| r.issue.key == "E1").unwrap();
        assert_eq!(
            e1.date_data.last_period.as_ref().unwrap().due,
            Some(date(2026, 1, 30))
        );
        let e2 = roots.iter().find(|r| r.issue.key == "E2").unwrap();
        assert!(e2.date_data.last_period.is_none());
    }
}
