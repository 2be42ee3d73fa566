//! Subcommand implementations.
//!
//! Every command loads a JSON snapshot (an array of issues), builds a forest,
//! and renders its result as text or JSON.

use std::path::Path;
use std::process;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde_json::json;
use trackline_core::{IssueNode, RollupNode, TimingWindow};
use trackline_engine::{
    attach_streams, link_prior, prior_window_index, CompletionCalculator, CompletionPolicy,
    Forest, MergeStrategy, StatusBoard, TimingMergeResolver,
};
use trackline_report::{
    group_and_aggregate, months_spanned,
    reducers::{CollectKeys, Count, SumDays},
    GroupBy, Reducer,
};

/// Load a snapshot file: a JSON array of issues
pub fn load_snapshot(path: &Path) -> Result<Vec<IssueNode>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read snapshot {}", path.display()))?;
    let issues: Vec<IssueNode> = serde_json::from_str(&text)
        .with_context(|| format!("invalid snapshot {}", path.display()))?;
    tracing::debug!(path = %path.display(), issues = issues.len(), "snapshot loaded");
    Ok(issues)
}

fn resolve(forest: &Forest, chain: &[MergeStrategy]) -> Vec<RollupNode> {
    TimingMergeResolver::new(forest).resolve_forest(chain)
}

// ============================================================================
// check
// ============================================================================

pub fn check(file: &Path, strict: bool) -> Result<process::ExitCode> {
    let issues = load_snapshot(file)?;
    let count = issues.len();
    let forest = Forest::from_issues(issues);

    println!(
        "{}: {} issues, {} roots",
        file.display(),
        count,
        forest.roots().len()
    );
    for diagnostic in forest.diagnostics() {
        eprintln!("warning: {diagnostic}");
    }

    if strict && !forest.diagnostics().is_empty() {
        eprintln!("error: {} diagnostics in strict mode", forest.diagnostics().len());
        return Ok(process::ExitCode::FAILURE);
    }
    Ok(process::ExitCode::SUCCESS)
}

// ============================================================================
// timeline
// ============================================================================

pub fn timeline(file: &Path, chain: &[MergeStrategy], format: &str) -> Result<()> {
    let forest = Forest::from_issues(load_snapshot(file)?);
    let roots = resolve(&forest, chain);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&roots)?),
        "text" => {
            for root in &roots {
                render_tree(root, 0);
            }
        }
        other => anyhow::bail!("unknown output format '{other}'"),
    }
    Ok(())
}

fn render_tree(node: &RollupNode, depth: usize) {
    println!(
        "{:indent$}{}  {}",
        "",
        node.issue.key,
        render_window(&node.date_data.rollup),
        indent = depth * 2
    );
    for child in &node.date_data.children.issues {
        render_tree(child, depth + 1);
    }
}

fn render_window(window: &TimingWindow) -> String {
    let date = |d: Option<NaiveDate>| d.map_or_else(|| "?".to_string(), |d| d.to_string());
    if window.is_empty() {
        "(no timing)".to_string()
    } else {
        format!("{} .. {}", date(window.start), date(window.due))
    }
}

// ============================================================================
// status
// ============================================================================

pub fn status(
    file: &Path,
    prior: Option<&Path>,
    as_of: NaiveDate,
    chain: &[MergeStrategy],
    format: &str,
) -> Result<()> {
    let forest = Forest::from_issues(load_snapshot(file)?);
    let mut roots = resolve(&forest, chain);
    for root in &mut roots {
        attach_streams(root);
    }

    if let Some(prior) = prior {
        let prior_forest = Forest::from_issues(load_snapshot(prior)?);
        let mut prior_roots = resolve(&prior_forest, chain);
        for root in &mut prior_roots {
            attach_streams(root);
        }
        let index = prior_window_index(&prior_roots);
        for root in &mut roots {
            link_prior(root, &index);
        }
    }

    let board = StatusBoard::new(as_of);
    let statuses: Vec<_> = roots.iter().flat_map(|root| board.assess_tree(root)).collect();

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&statuses)?),
        "text" => {
            for status in &statuses {
                println!(
                    "{:<12} {:<11} aggregate: {}",
                    status.key,
                    status.overall.status.as_str(),
                    status.aggregate.as_str()
                );
                for warning in &status.warnings {
                    println!("  warning: {warning}");
                }
            }
        }
        other => anyhow::bail!("unknown output format '{other}'"),
    }
    Ok(())
}

// ============================================================================
// completion
// ============================================================================

pub fn completion(file: &Path, policies: Vec<CompletionPolicy>, format: &str) -> Result<()> {
    let forest = Forest::from_issues(load_snapshot(file)?);
    let rollups = CompletionCalculator::with_chain(policies).rollup_forest(&forest);

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&rollups)?),
        "text" => {
            println!(
                "{:<12} {:>8} {:>10} {:>10} {:>6}  source",
                "key", "total", "completed", "remaining", "%"
            );
            for (key, rollup) in &rollups {
                let percent = rollup
                    .percent_complete()
                    .map_or_else(|| "-".to_string(), |p| format!("{p}%"));
                println!(
                    "{:<12} {:>8.1} {:>10.1} {:>10.1} {:>6}  {}",
                    key,
                    rollup.total_working_days,
                    rollup.completed_working_days,
                    rollup.remaining_working_days(),
                    percent,
                    rollup.source.as_str()
                );
                if !rollup.issues_without_estimates.is_empty() {
                    println!(
                        "{:<12} missing estimates: {}",
                        "",
                        rollup.issues_without_estimates.join(", ")
                    );
                }
            }
        }
        other => anyhow::bail!("unknown output format '{other}'"),
    }
    Ok(())
}

// ============================================================================
// pivot
// ============================================================================

pub fn pivot(file: &Path, by: &str) -> Result<()> {
    let issues = load_snapshot(file)?;

    let mut group_bys = Vec::new();
    for dimension in by.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        group_bys.push(group_by_dimension(dimension)?);
    }

    let reducers: Vec<Box<dyn Reducer<IssueNode>>> = vec![
        Box::new(Count),
        Box::new(SumDays::new("estimated_days", |issue: &IssueNode| {
            issue.total_days_of_work.unwrap_or(0.0)
        })),
        Box::new(CollectKeys::new("keys", |issue: &IssueNode| issue.key.clone())),
    ];

    let table = group_and_aggregate(&issues, &group_bys, &reducers)?;
    let flat: Vec<_> = table.into_iter().map(trackline_report::ReportRow::flatten).collect();
    println!("{}", serde_json::to_string_pretty(&flat)?);
    Ok(())
}

fn group_by_dimension(dimension: &str) -> Result<GroupBy<IssueNode>> {
    match dimension {
        "team" => Ok(GroupBy::new("team", |issue: &IssueNode| {
            issue
                .team
                .as_ref()
                .map_or(serde_json::Value::Null, |t| json!(t.name))
        })),
        "level" => Ok(GroupBy::new("level", |issue: &IssueNode| {
            json!(issue.hierarchy_level)
        })),
        "status" => Ok(GroupBy::new("status", |issue: &IssueNode| {
            json!(issue.status_category().as_str())
        })),
        // An issue belongs to every month its window spans
        "month" => Ok(GroupBy::multi("month", |issue: &IssueNode| {
            match (issue.start_date, issue.due_date) {
                (Some(start), Some(due)) => months_spanned(start, due),
                _ => Vec::new(),
            }
        })),
        other => anyhow::bail!("unknown pivot dimension '{other}'"),
    }
}
