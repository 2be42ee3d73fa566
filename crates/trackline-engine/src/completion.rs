//! Percent-complete rollup
//!
//! Aggregates total/completed/remaining working days bottom-up through the
//! forest. Two independent policies are supported:
//!
//! - `Cascade`: strict children-first resolution. A node uses its own
//!   estimate when it has one, otherwise sums its children, tracking which
//!   descendants lack estimates.
//! - `LevelAverage`: the legacy percent-complete path. Unestimated leaves
//!   borrow the arithmetic mean of their hierarchy level's estimates, with a
//!   constant fallback when an entire level has none.
//!
//! Policies are selected per hierarchy depth through a policy chain, the
//! same shape as the timing strategy chain: entry `N` governs depth `N`, and
//! once the chain is exhausted the final entry repeats for all deeper
//! levels. The policies are intentionally not reconciled; they answer the
//! same question with different assumptions.
//!
//! Rollups are memoized in a `CompletionCache` keyed by issue key. A cache
//! belongs to exactly one computation run; shared subtrees are computed once
//! per cache, and no node is visited twice.

use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;
use trackline_core::{
    BusinessCalendar, CompletionRollup, CompletionSource, IssueKey, IssueNode,
};

use crate::forest::Forest;

/// Working-day estimate assigned when an entire hierarchy level has no
/// estimated siblings under the level-average policy.
pub const FALLBACK_ESTIMATE_DAYS: f64 = 30.0;

/// Which rollup policy governs one hierarchy depth
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Strict children-first cascade
    #[default]
    Cascade,
    /// Level-mean fallback for unestimated siblings
    LevelAverage,
}

impl CompletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionPolicy::Cascade => "cascade",
            CompletionPolicy::LevelAverage => "level-average",
        }
    }
}

impl std::fmt::Display for CompletionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown policy name; a configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown completion policy '{0}' (expected 'cascade' or 'level-average')")]
pub struct UnknownPolicy(pub String);

impl FromStr for CompletionPolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cascade" => Ok(Self::Cascade),
            "level-average" | "levelAverage" => Ok(Self::LevelAverage),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// Parse a comma-separated policy chain (one entry per hierarchy depth)
pub fn parse_policy_chain(chain: &str) -> Result<Vec<CompletionPolicy>, UnknownPolicy> {
    chain
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(CompletionPolicy::from_str)
        .collect()
}

/// Per-run memoization cache, keyed by issue key.
///
/// Create one per computation and discard it afterwards; never share a cache
/// between runs over different inputs.
#[derive(Clone, Debug, Default)]
pub struct CompletionCache {
    entries: BTreeMap<IssueKey, CompletionRollup>,
}

impl CompletionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&CompletionRollup> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consume the cache, yielding every memoized rollup
    pub fn into_map(self) -> BTreeMap<IssueKey, CompletionRollup> {
        self.entries
    }
}

/// Computes completion rollups over a forest
pub struct CompletionCalculator {
    calendar: BusinessCalendar,
    policies: Vec<CompletionPolicy>,
}

impl CompletionCalculator {
    /// One policy governing every hierarchy depth
    pub fn new(policy: CompletionPolicy) -> Self {
        Self::with_chain(vec![policy])
    }

    /// A policy per hierarchy depth. Depth `N` uses entry `N`; once the
    /// chain is exhausted the final entry repeats. An empty chain means
    /// `Cascade` everywhere.
    pub fn with_chain(policies: Vec<CompletionPolicy>) -> Self {
        Self {
            calendar: BusinessCalendar::standard(),
            policies,
        }
    }

    pub fn with_calendar(mut self, calendar: BusinessCalendar) -> Self {
        self.calendar = calendar;
        self
    }

    fn policy_at(&self, depth: usize) -> CompletionPolicy {
        self.policies
            .get(depth)
            .or_else(|| self.policies.last())
            .copied()
            .unwrap_or_default()
    }

    /// Roll up every node in the forest, children before parents
    pub fn rollup_forest(&self, forest: &Forest) -> BTreeMap<IssueKey, CompletionRollup> {
        let means = self.level_means(forest);
        let mut cache = CompletionCache::new();
        for root in forest.roots() {
            if let Some(node) = forest.node(root) {
                self.resolve(forest, node, 0, &means, &mut cache);
            }
        }
        cache.into_map()
    }

    /// Roll up a single subtree against a caller-owned cache.
    ///
    /// Returns `None` when the key is not in the forest. Shared subtrees hit
    /// the cache and are computed once.
    pub fn rollup_node(
        &self,
        forest: &Forest,
        key: &str,
        cache: &mut CompletionCache,
    ) -> Option<CompletionRollup> {
        let node = forest.node(key)?;
        let means = self.level_means(forest);
        Some(self.resolve(forest, node, 0, &means, cache))
    }

    fn resolve(
        &self,
        forest: &Forest,
        node: &IssueNode,
        depth: usize,
        means: &BTreeMap<u32, f64>,
        cache: &mut CompletionCache,
    ) -> CompletionRollup {
        if let Some(hit) = cache.get(&node.key) {
            return hit.clone();
        }

        // Children before parents
        let children: Vec<CompletionRollup> = forest
            .children_of(&node.key)
            .iter()
            .filter_map(|child_key| {
                forest
                    .node(child_key)
                    .map(|child| self.resolve(forest, child, depth + 1, means, cache))
            })
            .collect();

        let own_total = self.own_total_days(node);
        let own_completed = own_completed_days(node, own_total);

        let rollup = if let Some(total) = own_total {
            CompletionRollup {
                total_working_days: total,
                completed_working_days: own_completed,
                user_specified_values: true,
                source: CompletionSource::Own,
                issues_without_estimates: Vec::new(),
            }
        } else {
            match self.policy_at(depth) {
                CompletionPolicy::Cascade => cascade(node, forest, &children, own_completed),
                CompletionPolicy::LevelAverage => level_borrow(node, &children, means),
            }
        };

        cache.entries.insert(node.key.clone(), rollup.clone());
        rollup
    }

    /// A node's own valid numeric total: the explicit estimate, or the
    /// business-day count of an explicit, non-inverted start/due pair.
    fn own_total_days(&self, node: &IssueNode) -> Option<f64> {
        if let Some(days) = node.total_days_of_work {
            return Some(days);
        }
        match (node.start_date, node.due_date) {
            (Some(start), Some(due)) if due >= start => {
                Some(self.calendar.working_days_between(start, due) as f64)
            }
            _ => None,
        }
    }

    /// Mean of explicit totals per hierarchy level, for level-average borrow
    fn level_means(&self, forest: &Forest) -> BTreeMap<u32, f64> {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for node in forest.iter() {
            if let Some(total) = self.own_total_days(node) {
                let entry = sums.entry(node.hierarchy_level).or_insert((0.0, 0));
                entry.0 += total;
                entry.1 += 1;
            }
        }
        sums.into_iter()
            .map(|(level, (sum, count))| (level, sum / count as f64))
            .collect()
    }
}

/// Cascade resolution for a node without an own total: sum user-specified
/// children, fall back to partial real data, then register as empty.
fn cascade(
    node: &IssueNode,
    forest: &Forest,
    children: &[CompletionRollup],
    own_completed: f64,
) -> CompletionRollup {
    if !children.is_empty() && children.iter().all(|c| c.user_specified_values) {
        let mut missing = Vec::new();
        for child in children {
            merge_missing(&mut missing, &child.issues_without_estimates);
        }
        return CompletionRollup {
            total_working_days: children.iter().map(|c| c.total_working_days).sum(),
            completed_working_days: children
                .iter()
                .map(|c| c.completed_working_days)
                .sum::<f64>()
                + own_completed,
            user_specified_values: true,
            source: CompletionSource::Children,
            issues_without_estimates: missing,
        };
    }

    if children.iter().any(|c| c.source != CompletionSource::Empty) {
        // Sum only children with real data; empty children have already
        // registered themselves in their own missing lists.
        let real: Vec<&CompletionRollup> = children
            .iter()
            .filter(|c| c.source != CompletionSource::Empty)
            .collect();
        let mut missing = Vec::new();
        for child in children {
            merge_missing(&mut missing, &child.issues_without_estimates);
        }
        return CompletionRollup {
            total_working_days: real.iter().map(|c| c.total_working_days).sum(),
            completed_working_days: real
                .iter()
                .map(|c| c.completed_working_days)
                .sum::<f64>()
                + own_completed,
            user_specified_values: false,
            source: CompletionSource::Children,
            issues_without_estimates: missing,
        };
    }

    // Nothing usable anywhere: register this node itself, or its direct
    // children when it has any.
    let missing: Vec<IssueKey> = if children.is_empty() {
        vec![node.key.clone()]
    } else {
        let mut merged: Vec<IssueKey> = forest.children_of(&node.key).to_vec();
        for child in children {
            merge_missing(&mut merged, &child.issues_without_estimates);
        }
        merged
    };
    CompletionRollup {
        total_working_days: own_completed,
        completed_working_days: own_completed,
        user_specified_values: false,
        source: CompletionSource::Empty,
        issues_without_estimates: missing,
    }
}

/// Level-average resolution for a node without an own total: a leaf borrows
/// its hierarchy level's mean estimate, a parent sums its children.
fn level_borrow(
    node: &IssueNode,
    children: &[CompletionRollup],
    means: &BTreeMap<u32, f64>,
) -> CompletionRollup {
    if children.is_empty() {
        let total = means
            .get(&node.hierarchy_level)
            .copied()
            .unwrap_or(FALLBACK_ESTIMATE_DAYS);
        let completed = own_completed_days(node, Some(total));
        return CompletionRollup {
            total_working_days: total,
            completed_working_days: completed,
            user_specified_values: false,
            source: CompletionSource::Own,
            issues_without_estimates: vec![node.key.clone()],
        };
    }

    let mut missing = Vec::new();
    for child in children {
        merge_missing(&mut missing, &child.issues_without_estimates);
    }
    CompletionRollup {
        total_working_days: children.iter().map(|c| c.total_working_days).sum(),
        completed_working_days: children.iter().map(|c| c.completed_working_days).sum(),
        user_specified_values: children.iter().all(|c| c.user_specified_values),
        source: CompletionSource::Children,
        issues_without_estimates: missing,
    }
}

/// The node's own completed-day count. Explicit field wins; a node whose
/// lifecycle status is done counts its whole known total as completed.
fn own_completed_days(node: &IssueNode, own_total: Option<f64>) -> f64 {
    if let Some(days) = node.completed_days_of_work {
        return days;
    }
    if node.status_category().is_done() {
        return own_total.unwrap_or(0.0);
    }
    0.0
}

/// Append keys not already present, preserving first-seen order
fn merge_missing(into: &mut Vec<IssueKey>, from: &[IssueKey]) {
    for key in from {
        if !into.contains(key) {
            into.push(key.clone());
        }
    }
}
