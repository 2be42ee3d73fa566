//! Issue forest construction and validation
//!
//! This module turns the ingestion layer's flat issue list into the
//! parent/child index the resolvers consume. Data-quality problems never
//! abort construction: an orphaned node becomes a root, a duplicate key is
//! replaced last-wins, and a parent cycle is cut at a deterministic edge.
//! Every repair is recorded as a `Diagnostic` the caller can surface.

use std::collections::{BTreeMap, BTreeSet};
use trackline_core::{IssueKey, IssueNode};

/// A data-quality finding recorded while building the forest.
///
/// Diagnostics are informational: the forest is always usable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// `key` references a parent that does not exist; treated as a root
    OrphanedParent { key: IssueKey, missing_parent: IssueKey },
    /// Two issues shared a key; the later one replaced the earlier
    DuplicateKey { key: IssueKey },
    /// A parent-link cycle was cut; `keys` lists the members, sorted
    CycleDetected { keys: Vec<IssueKey> },
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Diagnostic::OrphanedParent { key, missing_parent } => {
                write!(
                    f,
                    "issue '{}' references missing parent '{}'; treating as root",
                    key, missing_parent
                )
            }
            Diagnostic::DuplicateKey { key } => {
                write!(f, "duplicate issue key '{}'; last occurrence wins", key)
            }
            Diagnostic::CycleDetected { keys } => {
                write!(f, "parent cycle involving {:?}; cycle edge dropped", keys)
            }
        }
    }
}

/// Normalized issue hierarchy: nodes, parent/child index, roots, diagnostics
#[derive(Clone, Debug, Default)]
pub struct Forest {
    nodes: BTreeMap<IssueKey, IssueNode>,
    children: BTreeMap<IssueKey, Vec<IssueKey>>,
    roots: Vec<IssueKey>,
    diagnostics: Vec<Diagnostic>,
}

impl Forest {
    /// Build a forest from a flat issue list.
    ///
    /// Children keep input order under each parent. Roots are issues with no
    /// parent, issues whose parent is missing, and cycle cut points.
    pub fn from_issues(issues: Vec<IssueNode>) -> Self {
        let mut forest = Self::default();

        for issue in issues {
            if forest.nodes.contains_key(&issue.key) {
                forest
                    .diagnostics
                    .push(Diagnostic::DuplicateKey { key: issue.key.clone() });
            }
            forest.nodes.insert(issue.key.clone(), issue);
        }

        // Parent/child edges; orphans become roots
        let keys: Vec<IssueKey> = forest.nodes.keys().cloned().collect();
        for key in &keys {
            let parent = forest.nodes[key].parent_key.clone();
            match parent {
                Some(parent) if forest.nodes.contains_key(&parent) => {
                    forest.children.entry(parent).or_default().push(key.clone());
                }
                Some(missing_parent) => {
                    forest.diagnostics.push(Diagnostic::OrphanedParent {
                        key: key.clone(),
                        missing_parent,
                    });
                    forest.roots.push(key.clone());
                }
                None => forest.roots.push(key.clone()),
            }
        }

        forest.cut_cycles();

        for diagnostic in &forest.diagnostics {
            tracing::warn!(%diagnostic, "issue data-quality finding");
        }

        forest
    }

    /// Detect parent-link cycles and cut each at its smallest-key member.
    ///
    /// Cycle members are unreachable from any root (no root can sit inside a
    /// cycle), so repeated reachability sweeps find them all.
    fn cut_cycles(&mut self) {
        let mut reachable = BTreeSet::new();
        self.sweep(&self.roots.clone(), &mut reachable);

        loop {
            let seed = match self.nodes.keys().find(|k| !reachable.contains(*k)) {
                Some(seed) => seed.clone(),
                None => break,
            };

            // Walk the parent chain from the seed until it loops
            let mut path: Vec<IssueKey> = Vec::new();
            let mut cursor = seed.clone();
            let cycle: Vec<IssueKey> = loop {
                if let Some(pos) = path.iter().position(|k| *k == cursor) {
                    break path[pos..].to_vec();
                }
                path.push(cursor.clone());
                match self.nodes[&cursor].parent_key.clone() {
                    Some(parent) if self.nodes.contains_key(&parent) => cursor = parent,
                    _ => break Vec::new(),
                }
            };

            if cycle.is_empty() {
                // Chain exited without looping; root the seed so the sweep
                // can make progress.
                self.roots.push(seed.clone());
                self.sweep(&[seed], &mut reachable);
                continue;
            }

            let cut = cycle.iter().min().cloned().unwrap_or(seed);
            let mut sorted = cycle;
            sorted.sort();
            self.diagnostics.push(Diagnostic::CycleDetected { keys: sorted });

            // Drop the edge parent(cut) -> cut and promote cut to a root
            if let Some(parent) = self.nodes[&cut].parent_key.clone() {
                if let Some(siblings) = self.children.get_mut(&parent) {
                    siblings.retain(|k| *k != cut);
                }
            }
            self.roots.push(cut.clone());
            self.sweep(&[cut], &mut reachable);
        }
    }

    /// Mark everything reachable from `seeds` through child edges
    fn sweep(&self, seeds: &[IssueKey], reachable: &mut BTreeSet<IssueKey>) {
        let mut stack: Vec<IssueKey> = seeds.to_vec();
        while let Some(key) = stack.pop() {
            if !reachable.insert(key.clone()) {
                continue;
            }
            if let Some(children) = self.children.get(&key) {
                stack.extend(children.iter().cloned());
            }
        }
    }

    /// Look up an issue by key
    pub fn node(&self, key: &str) -> Option<&IssueNode> {
        self.nodes.get(key)
    }

    /// Direct children of a node, in input order
    pub fn children_of(&self, key: &str) -> &[IssueKey] {
        self.children.get(key).map_or(&[], Vec::as_slice)
    }

    /// Root keys, in input order
    pub fn roots(&self) -> &[IssueKey] {
        &self.roots
    }

    /// Data-quality findings recorded during construction
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// All issue keys, sorted
    pub fn keys(&self) -> impl Iterator<Item = &IssueKey> {
        self.nodes.keys()
    }

    /// All issues, sorted by key
    pub fn iter(&self) -> impl Iterator<Item = &IssueNode> {
        self.nodes.values()
    }

    /// Number of issues
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builds_parent_child_index() {
        let forest = Forest::from_issues(vec![
            IssueNode::new("E1").level(1),
            IssueNode::new("S1").parent("E1"),
            IssueNode::new("S2").parent("E1"),
        ]);

        assert_eq!(forest.roots(), ["E1"]);
        assert_eq!(forest.children_of("E1"), ["S1", "S2"]);
        assert!(forest.children_of("S1").is_empty());
        assert!(forest.diagnostics().is_empty());
    }

    #[test]
    fn orphaned_parent_becomes_root() {
        let forest = Forest::from_issues(vec![IssueNode::new("S1").parent("GONE")]);

        assert_eq!(forest.roots(), ["S1"]);
        assert_eq!(
            forest.diagnostics(),
            [Diagnostic::OrphanedParent {
                key: "S1".into(),
                missing_parent: "GONE".into(),
            }]
        );
    }

    #[test]
    fn duplicate_key_last_wins() {
        let forest = Forest::from_issues(vec![
            IssueNode::new("A").summary("first"),
            IssueNode::new("A").summary("second"),
        ]);

        assert_eq!(forest.len(), 1);
        assert_eq!(forest.node("A").unwrap().summary, "second");
        assert_eq!(forest.diagnostics(), [Diagnostic::DuplicateKey { key: "A".into() }]);
    }

    #[test]
    fn two_cycle_is_cut_and_still_traversable() {
        let forest = Forest::from_issues(vec![
            IssueNode::new("A").parent("B"),
            IssueNode::new("B").parent("A"),
        ]);

        assert_eq!(
            forest.diagnostics(),
            [Diagnostic::CycleDetected { keys: vec!["A".into(), "B".into()] }]
        );
        // Smallest key was cut loose and became a root
        assert_eq!(forest.roots(), ["A"]);
        assert_eq!(forest.children_of("A"), ["B"]);
        // The back-edge B -> A was dropped
        assert!(forest.children_of("B").is_empty());
    }

    #[test]
    fn self_cycle_is_cut() {
        let forest = Forest::from_issues(vec![IssueNode::new("A").parent("A")]);

        assert_eq!(forest.roots(), ["A"]);
        assert!(forest.children_of("A").is_empty());
        assert!(matches!(forest.diagnostics()[0], Diagnostic::CycleDetected { .. }));
    }

    #[test]
    fn cycle_hanging_off_valid_tree() {
        let forest = Forest::from_issues(vec![
            IssueNode::new("R"),
            IssueNode::new("X").parent("Y"),
            IssueNode::new("Y").parent("X"),
        ]);

        let mut roots = forest.roots().to_vec();
        roots.sort();
        assert_eq!(roots, ["R", "X"]);
        assert_eq!(forest.children_of("X"), ["Y"]);
    }

    #[test]
    fn empty_input_yields_empty_forest() {
        let forest = Forest::from_issues(Vec::new());
        assert!(forest.is_empty());
        assert!(forest.roots().is_empty());
        assert!(forest.diagnostics().is_empty());
    }
}
