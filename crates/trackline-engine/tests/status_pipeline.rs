//! Integration tests: full report pipeline
//!
//! Resolves two snapshots of the same issue set, links the prior-period
//! windows, and runs the status board over the result — the same flow the
//! dashboard performs per report.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use trackline_core::IssueNode;
use trackline_engine::{
    attach_streams, link_prior, prior_window_index, DeliveryStatus, Forest, MergeStrategy,
    StatusBoard, TimingMergeResolver,
};

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

const CHAIN: &[MergeStrategy] = &[
    MergeStrategy::ChildrenFirstThenParent,
    MergeStrategy::ParentOnly,
];

fn resolve_linked(
    current: Vec<IssueNode>,
    prior: Vec<IssueNode>,
) -> Vec<trackline_core::RollupNode> {
    let prior_forest = Forest::from_issues(prior);
    let mut prior_roots = TimingMergeResolver::new(&prior_forest).resolve_forest(CHAIN);
    for root in &mut prior_roots {
        attach_streams(root);
    }
    let index = prior_window_index(&prior_roots);

    let forest = Forest::from_issues(current);
    let mut roots = TimingMergeResolver::new(&forest).resolve_forest(CHAIN);
    for root in &mut roots {
        attach_streams(root);
        link_prior(root, &index);
    }
    roots
}

#[test]
fn slipped_epic_classifies_behind() {
    let prior = vec![
        IssueNode::new("E1").level(1),
        IssueNode::new("S1")
            .parent("E1")
            .status("In Progress")
            .start(date(2026, 7, 1))
            .due(date(2026, 8, 14)),
    ];
    let current = vec![
        IssueNode::new("E1").level(1).status("In Progress"),
        IssueNode::new("S1")
            .parent("E1")
            .status("In Progress")
            .start(date(2026, 7, 1))
            .due(date(2026, 9, 4)), // slipped three weeks
    ];

    let roots = resolve_linked(current, prior);
    let board = StatusBoard::new(date(2026, 7, 15));
    let statuses = board.assess_tree(&roots[0]);

    let e1 = statuses.iter().find(|s| s.key == "E1").unwrap();
    let s1 = statuses.iter().find(|s| s.key == "S1").unwrap();
    assert_eq!(s1.overall.status, DeliveryStatus::Behind);
    // The epic's rollup window slipped with its child
    assert_eq!(e1.overall.status, DeliveryStatus::Behind);
}

#[test]
fn unchanged_epic_stays_on_track() {
    let snapshot = vec![
        IssueNode::new("E1").level(1).status("In Progress"),
        IssueNode::new("S1")
            .parent("E1")
            .status("In Progress")
            .start(date(2026, 7, 1))
            .due(date(2026, 8, 14)),
    ];

    let roots = resolve_linked(snapshot.clone(), snapshot);
    let board = StatusBoard::new(date(2026, 7, 15));
    let statuses = board.assess_tree(&roots[0]);

    assert_eq!(statuses[0].overall.status, DeliveryStatus::OnTrack);
}

#[test]
fn slipped_dev_stream_drives_the_aggregate() {
    // Only the dev-labeled story slips; the epic's dev stream goes behind
    // and drags the initiative aggregate with it.
    let prior = vec![
        IssueNode::new("E1").level(1).status("In Progress"),
        IssueNode::new("S1")
            .parent("E1")
            .label("dev")
            .status("In Progress")
            .start(date(2026, 7, 1))
            .due(date(2026, 8, 14)),
        IssueNode::new("S2")
            .parent("E1")
            .label("qa")
            .status("To Do")
            .start(date(2026, 8, 17))
            .due(date(2026, 9, 11)),
    ];
    let mut current = prior.clone();
    current[1] = IssueNode::new("S1")
        .parent("E1")
        .label("dev")
        .status("In Progress")
        .start(date(2026, 7, 1))
        .due(date(2026, 9, 4));

    let roots = resolve_linked(current, prior);
    let board = StatusBoard::new(date(2026, 7, 15));
    let statuses = board.assess_tree(&roots[0]);

    let e1 = statuses.iter().find(|s| s.key == "E1").unwrap();
    assert_eq!(e1.dev.as_ref().unwrap().status, DeliveryStatus::Behind);
    assert_eq!(e1.qa.as_ref().unwrap().status, DeliveryStatus::NotStarted);
    assert!(e1.uat.is_none());
    assert_eq!(e1.aggregate, DeliveryStatus::Behind);
}

#[test]
fn node_added_since_prior_is_new() {
    let prior = vec![IssueNode::new("E1").level(1).due(date(2026, 8, 14))];
    let current = vec![
        IssueNode::new("E1").level(1).due(date(2026, 8, 14)),
        IssueNode::new("E2").level(1).due(date(2026, 9, 30)),
    ];

    let roots = resolve_linked(current, prior);
    let board = StatusBoard::new(date(2026, 7, 15));

    let e2 = roots.iter().find(|r| r.issue.key == "E2").unwrap();
    assert_eq!(board.assess(e2).overall.status, DeliveryStatus::New);
}

#[test]
fn runs_share_nothing_across_snapshots() {
    // Each resolution builds a fresh tree; mutating one run's output must
    // not leak into a re-resolution of the same forest.
    let forest = Forest::from_issues(vec![IssueNode::new("E1").due(date(2026, 8, 14))]);
    let resolver = TimingMergeResolver::new(&forest);

    let mut first = resolver.resolve_forest(&[MergeStrategy::ParentOnly]);
    first[0].date_data.rollup.due = Some(date(2030, 1, 1));

    let second = resolver.resolve_forest(&[MergeStrategy::ParentOnly]);
    assert_eq!(second[0].date_data.rollup.due, Some(date(2026, 8, 14)));
}

#[test]
fn past_due_epic_warns_but_does_not_fail() {
    let snapshot = vec![IssueNode::new("E1")
        .status("In Progress")
        .start(date(2026, 1, 5))
        .due(date(2026, 2, 27))];

    let forest = Forest::from_issues(snapshot);
    let roots = TimingMergeResolver::new(&forest).resolve_forest(CHAIN);
    let board = StatusBoard::new(date(2026, 7, 15));
    let status = board.assess(&roots[0]);

    assert_eq!(status.overall.status, DeliveryStatus::Complete);
    assert!(status.overall.past_due_unfinished);
    assert_eq!(status.warnings.len(), 1);
}
