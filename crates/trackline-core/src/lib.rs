//! # trackline-core
//!
//! Core domain model for the trackline rollup engine.
//!
//! This crate provides:
//! - Input types: `IssueNode`, `SprintWindow`, `Team`
//! - Derived types: `TimingWindow`, `RollupNode`, `CompletionRollup`
//! - The `StatusCategory` lifecycle table
//! - `BusinessCalendar` for working-day arithmetic
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use trackline_core::IssueNode;
//!
//! let epic = IssueNode::new("E1")
//!     .summary("Checkout rewrite")
//!     .level(1)
//!     .start(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap())
//!     .due(NaiveDate::from_ymd_opt(2026, 3, 27).unwrap());
//! let story = IssueNode::new("S1").parent("E1").estimate(8.0);
//!
//! assert_eq!(story.parent_key.as_deref(), Some("E1"));
//! assert!(epic.explicit_window().is_closed());
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub mod calendar;

pub use calendar::{BusinessCalendar, Holiday};

// ============================================================================
// Type Aliases
// ============================================================================

/// Stable identifier for an issue (e.g. "PROJ-142")
pub type IssueKey = String;

// ============================================================================
// Input Model
// ============================================================================

/// A sprint the issue was scheduled into, with its timing bounds
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SprintWindow {
    /// Sprint name (e.g. "2026-03 Sprint 2")
    pub name: String,
    /// Sprint start date
    pub start: NaiveDate,
    /// Sprint end date
    pub due: NaiveDate,
}

/// Delivery team metadata carried on an issue
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Team {
    /// Team name
    pub name: String,
    /// Velocity in story points per sprint
    pub velocity: f64,
    /// Number of parallel work tracks
    pub tracks: u32,
}

impl Team {
    pub fn new(name: impl Into<String>, velocity: f64, tracks: u32) -> Self {
        Self {
            name: name.into(),
            velocity,
            tracks,
        }
    }
}

/// A single issue as delivered by the ingestion layer.
///
/// Field names are already canonical: the ingestion layer has resolved the
/// tracker's raw attribute names before the engine sees the data. The engine
/// treats every `IssueNode` as read-only input.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssueNode {
    /// Stable issue key
    pub key: IssueKey,
    /// One-line summary
    #[serde(default)]
    pub summary: String,
    /// Key of the parent issue, if any
    #[serde(default)]
    pub parent_key: Option<IssueKey>,
    /// Hierarchy level (0 = leaf-most)
    #[serde(default)]
    pub hierarchy_level: u32,
    /// Raw lifecycle status label (e.g. "In Progress")
    #[serde(default)]
    pub status: String,
    /// Free-form labels
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// Explicit start date, if set
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    /// Explicit due date, if set
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// Sprints the issue is scheduled into, in order
    #[serde(default)]
    pub sprints: Vec<SprintWindow>,
    /// Story point estimate
    #[serde(default)]
    pub story_points: Option<f64>,
    /// Median story point estimate across refinement rounds
    #[serde(default)]
    pub story_points_median: Option<f64>,
    /// Estimate confidence (0.0 - 1.0)
    #[serde(default)]
    pub confidence: Option<f64>,
    /// Explicit total working-day estimate
    #[serde(default)]
    pub total_days_of_work: Option<f64>,
    /// Working days already completed
    #[serde(default)]
    pub completed_days_of_work: Option<f64>,
    /// Owning team
    #[serde(default)]
    pub team: Option<Team>,
}

impl IssueNode {
    /// Create a new issue with the given key
    pub fn new(key: impl Into<IssueKey>) -> Self {
        Self {
            key: key.into(),
            summary: String::new(),
            parent_key: None,
            hierarchy_level: 0,
            status: String::new(),
            labels: BTreeSet::new(),
            start_date: None,
            due_date: None,
            sprints: Vec::new(),
            story_points: None,
            story_points_median: None,
            confidence: None,
            total_days_of_work: None,
            completed_days_of_work: None,
            team: None,
        }
    }

    /// Set the summary
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the parent key
    pub fn parent(mut self, parent: impl Into<IssueKey>) -> Self {
        self.parent_key = Some(parent.into());
        self
    }

    /// Set the hierarchy level (0 = leaf-most)
    pub fn level(mut self, level: u32) -> Self {
        self.hierarchy_level = level;
        self
    }

    /// Set the raw status label
    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    /// Add a label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.labels.insert(label.into());
        self
    }

    /// Set the explicit start date
    pub fn start(mut self, date: NaiveDate) -> Self {
        self.start_date = Some(date);
        self
    }

    /// Set the explicit due date
    pub fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    /// Add a sprint window
    pub fn sprint(mut self, name: impl Into<String>, start: NaiveDate, due: NaiveDate) -> Self {
        self.sprints.push(SprintWindow {
            name: name.into(),
            start,
            due,
        });
        self
    }

    /// Set the explicit working-day estimate
    pub fn estimate(mut self, days: f64) -> Self {
        self.total_days_of_work = Some(days);
        self
    }

    /// Set the completed working-day count
    pub fn completed(mut self, days: f64) -> Self {
        self.completed_days_of_work = Some(days);
        self
    }

    /// Set the story point estimate
    pub fn points(mut self, points: f64) -> Self {
        self.story_points = Some(points);
        self
    }

    /// Set the owning team
    pub fn team(mut self, team: Team) -> Self {
        self.team = Some(team);
        self
    }

    /// Lifecycle category for this issue's raw status label
    pub fn status_category(&self) -> StatusCategory {
        StatusCategory::of(&self.status)
    }

    /// Window formed by the explicit start/due fields alone
    pub fn explicit_window(&self) -> TimingWindow {
        let mut window = TimingWindow::empty();
        if let Some(start) = self.start_date {
            window.start = Some(start);
            window.start_from = Some(Provenance::new("explicit start date", &self.key));
        }
        if let Some(due) = self.due_date {
            window.due = Some(due);
            window.due_to = Some(Provenance::new("explicit due date", &self.key));
        }
        window
    }

    /// Window spanned by the issue's sprints: earliest sprint start to
    /// latest sprint due. Empty when the issue has no sprints.
    pub fn sprint_window(&self) -> TimingWindow {
        let mut window = TimingWindow::empty();
        for sprint in &self.sprints {
            if window.start.map_or(true, |s| sprint.start < s) {
                window.start = Some(sprint.start);
                window.start_from =
                    Some(Provenance::new(format!("sprint '{}'", sprint.name), &self.key));
            }
            if window.due.map_or(true, |d| sprint.due > d) {
                window.due = Some(sprint.due);
                window.due_to =
                    Some(Provenance::new(format!("sprint '{}'", sprint.name), &self.key));
            }
        }
        window
    }
}

// ============================================================================
// Status Category Table
// ============================================================================

/// Fixed lifecycle category for a raw status label.
///
/// The table is deliberately small: unrecognized labels fall through to
/// `Todo`, which the classifier treats as "not done, not blocked".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCategory {
    /// Work has not begun
    Todo,
    /// Work is underway
    InProgress,
    /// Work is finished
    Done,
    /// Work cannot proceed
    Blocked,
}

impl StatusCategory {
    /// Classify a raw status label (case-insensitive)
    pub fn of(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "done" | "closed" | "resolved" | "complete" | "released" => Self::Done,
            "blocked" | "on hold" | "impediment" => Self::Blocked,
            "in progress" | "in review" | "in qa" | "in uat" | "in development" => {
                Self::InProgress
            }
            _ => Self::Todo,
        }
    }

    pub fn is_done(self) -> bool {
        self == Self::Done
    }

    pub fn is_blocked(self) -> bool {
        self == Self::Blocked
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Todo => "todo",
            Self::InProgress => "inProgress",
            Self::Done => "done",
            Self::Blocked => "blocked",
        }
    }
}

// ============================================================================
// Timing Window
// ============================================================================

/// Where a window boundary came from, for UI explainability.
///
/// The reference is the contributing issue's stable key rather than a node
/// pointer, so provenance survives across report runs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Human-readable explanation (e.g. "earliest child start")
    pub message: String,
    /// Key of the contributing issue
    pub reference: IssueKey,
}

impl Provenance {
    pub fn new(message: impl Into<String>, reference: impl Into<IssueKey>) -> Self {
        Self {
            message: message.into(),
            reference: reference.into(),
        }
    }
}

/// A start/due timing window with provenance on each populated side.
///
/// `start <= due` is not enforced: a window with `start > due` is valid
/// output and means "timing unknown" at the presentation layer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingWindow {
    /// Earliest known start
    pub start: Option<NaiveDate>,
    /// Where `start` came from
    pub start_from: Option<Provenance>,
    /// Latest known due date
    pub due: Option<NaiveDate>,
    /// Where `due` came from
    pub due_to: Option<Provenance>,
}

impl TimingWindow {
    /// A window with no timing on either side
    pub fn empty() -> Self {
        Self::default()
    }

    /// Both start and due are present
    pub fn is_closed(&self) -> bool {
        self.start.is_some() && self.due.is_some()
    }

    /// Neither start nor due is present
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.due.is_none()
    }

    /// Widen this window by another candidate: earliest non-null start wins,
    /// latest non-null due wins. Ties keep the value already held, so merge
    /// order is deterministic and stable.
    pub fn widen(&mut self, other: &TimingWindow) {
        if let Some(start) = other.start {
            if self.start.map_or(true, |s| start < s) {
                self.start = Some(start);
                self.start_from = other.start_from.clone();
            }
        }
        if let Some(due) = other.due {
            if self.due.map_or(true, |d| due > d) {
                self.due = Some(due);
                self.due_to = other.due_to.clone();
            }
        }
    }

    /// Widest window over a set of candidates
    pub fn widest<'a>(candidates: impl IntoIterator<Item = &'a TimingWindow>) -> Self {
        let mut merged = Self::empty();
        for candidate in candidates {
            merged.widen(candidate);
        }
        merged
    }

    /// Fill whichever sides are missing from `fallback`; present values on
    /// `self` always win.
    pub fn or_else_from(mut self, fallback: &TimingWindow) -> Self {
        if self.start.is_none() {
            self.start = fallback.start;
            self.start_from = fallback.start_from.clone();
        }
        if self.due.is_none() {
            self.due = fallback.due;
            self.due_to = fallback.due_to.clone();
        }
        self
    }
}

// ============================================================================
// Rollup Tree (Output)
// ============================================================================

/// Windows merged from a node's direct children, plus the resolved subtree
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChildWindows {
    /// Merged window over the children's rollups
    pub window: TimingWindow,
    /// Recursively resolved children
    pub issues: Vec<RollupNode>,
}

/// Per-work-stream window with its prior-period counterpart
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamWindow {
    /// Current window for the stream
    pub window: TimingWindow,
    /// Same stream's window in the prior snapshot, when linked
    pub last_period: Option<TimingWindow>,
}

/// Derived date data attached to each resolved node
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DateData {
    /// Window from the node's own fields (explicit dates merged with sprints)
    pub own: TimingWindow,
    /// Windows contributed by children
    pub children: ChildWindows,
    /// The window the selected strategy settled on
    pub rollup: TimingWindow,
    /// Prior-period rollup window, when a prior snapshot was linked
    pub last_period: Option<TimingWindow>,
    /// Development stream breakdown
    pub dev: Option<StreamWindow>,
    /// QA stream breakdown
    pub qa: Option<StreamWindow>,
    /// UAT stream breakdown
    pub uat: Option<StreamWindow>,
}

/// An issue decorated with resolved timing data.
///
/// Built fresh on every report computation: a run never mutates the tree of a
/// previous run, and prior snapshots are linked only through `last_period`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RollupNode {
    /// The underlying issue
    pub issue: IssueNode,
    /// Resolved timing data
    pub date_data: DateData,
}

impl RollupNode {
    /// Wrap an issue with empty date data
    pub fn new(issue: IssueNode) -> Self {
        Self {
            issue,
            date_data: DateData::default(),
        }
    }

    /// Depth-first iteration over this node and all descendants
    pub fn walk(&self, visit: &mut impl FnMut(&RollupNode)) {
        visit(self);
        for child in &self.date_data.children.issues {
            child.walk(visit);
        }
    }

    /// Find a descendant (or self) by key
    pub fn find(&self, key: &str) -> Option<&RollupNode> {
        if self.issue.key == key {
            return Some(self);
        }
        self.date_data
            .children
            .issues
            .iter()
            .find_map(|child| child.find(key))
    }
}

// ============================================================================
// Completion Rollup (Output)
// ============================================================================

/// Where a node's completion numbers came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionSource {
    /// The node carried its own valid estimate
    #[serde(rename = "self")]
    Own,
    /// Summed from children
    Children,
    /// No usable data anywhere in the subtree
    Empty,
}

impl CompletionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionSource::Own => "self",
            CompletionSource::Children => "children",
            CompletionSource::Empty => "empty",
        }
    }
}

impl std::fmt::Display for CompletionSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Percent-complete rollup for one node.
///
/// Computed once per node per report run and memoized in a per-run cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionRollup {
    /// Total working days of work in this subtree
    pub total_working_days: f64,
    /// Working days already completed
    pub completed_working_days: f64,
    /// True when every contributing number was user-specified
    pub user_specified_values: bool,
    /// Where the numbers came from
    pub source: CompletionSource,
    /// Issues in this subtree that lack estimates, deduplicated
    pub issues_without_estimates: Vec<IssueKey>,
}

impl CompletionRollup {
    /// An empty rollup carrying only a completed-day count
    pub fn empty(completed: f64) -> Self {
        Self {
            total_working_days: completed,
            completed_working_days: completed,
            user_specified_values: false,
            source: CompletionSource::Empty,
            issues_without_estimates: Vec::new(),
        }
    }

    /// Derived: total minus completed, floored at zero
    pub fn remaining_working_days(&self) -> f64 {
        (self.total_working_days - self.completed_working_days).max(0.0)
    }

    /// Percent complete (0-100), or None when the total is zero
    pub fn percent_complete(&self) -> Option<u8> {
        if self.total_working_days <= 0.0 {
            return None;
        }
        let pct = self.completed_working_days / self.total_working_days * 100.0;
        Some(pct.round().clamp(0.0, 100.0) as u8)
    }
}

// ============================================================================
// Tests
// ============================================================================
