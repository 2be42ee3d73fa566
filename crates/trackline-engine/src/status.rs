//! Delivery status classification
//!
//! Derives a delivery status per node by comparing its current timing window
//! to the prior-period window, evaluated against an as-of date. The
//! `StatusBoard` additionally runs the classifier per work-stream
//! (dev/qa/uat) and derives the initiative-level aggregate.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use trackline_core::{RollupNode, StatusCategory, StreamWindow, TimingWindow};

/// Tolerance, in days, before a due-date shift against the prior period
/// counts as ahead/behind.
pub const WIGGLE_ROOM_DAYS: i64 = 0;

/// Delivery status for a node or a work-stream
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// No due date anywhere; timing cannot be judged
    Unknown,
    /// First time this node is seen (no prior-period window)
    New,
    /// Start is in the future
    NotStarted,
    /// Holding steady against the prior period
    OnTrack,
    /// Due date moved earlier than the prior period
    Ahead,
    /// Due date slipped past the prior period
    Behind,
    /// Work cannot proceed
    Blocked,
    /// Done, or the window closed in the past
    Complete,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Unknown => "unknown",
            DeliveryStatus::New => "new",
            DeliveryStatus::NotStarted => "notstarted",
            DeliveryStatus::OnTrack => "ontrack",
            DeliveryStatus::Ahead => "ahead",
            DeliveryStatus::Behind => "behind",
            DeliveryStatus::Blocked => "blocked",
            DeliveryStatus::Complete => "complete",
        }
    }

    /// Severity rank used when folding stream statuses into an aggregate.
    /// Higher means worse.
    fn severity(self) -> u8 {
        match self {
            DeliveryStatus::Complete => 0,
            DeliveryStatus::Ahead => 1,
            DeliveryStatus::Unknown => 2,
            DeliveryStatus::OnTrack => 3,
            DeliveryStatus::NotStarted => 4,
            DeliveryStatus::New => 5,
            DeliveryStatus::Behind => 6,
            DeliveryStatus::Blocked => 7,
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification outcome with its informational flags
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub status: DeliveryStatus,
    /// The window closed in the past but the lifecycle status is not done.
    /// Informational; surfaced to the UI, never fatal.
    pub past_due_unfinished: bool,
}

impl Classification {
    fn of(status: DeliveryStatus) -> Self {
        Self {
            status,
            past_due_unfinished: false,
        }
    }
}

/// Classifies timing windows against an as-of date
#[derive(Clone, Copy, Debug)]
pub struct StatusClassifier {
    /// The "now" all comparisons run against
    pub now: NaiveDate,
}

impl StatusClassifier {
    pub fn new(now: NaiveDate) -> Self {
        Self { now }
    }

    /// Classify one window against its optional prior-period window.
    ///
    /// Precedence (first match wins):
    /// 1. lifecycle status maps to done -> `Complete`
    /// 2. no due date -> `Unknown`
    /// 3. due in the past -> `Complete` (flagged when not marked done)
    /// 4. no prior window -> `New`
    /// 5. due slipped past prior due beyond the wiggle room -> `Behind`
    /// 6. due moved earlier beyond the wiggle room -> `Ahead`
    /// 7. start in the future -> `NotStarted`
    /// 8. otherwise -> `OnTrack`
    pub fn classify(
        &self,
        category: StatusCategory,
        window: &TimingWindow,
        prior: Option<&TimingWindow>,
    ) -> Classification {
        if category.is_done() {
            return Classification::of(DeliveryStatus::Complete);
        }

        let due = match window.due {
            Some(due) => due,
            None => return Classification::of(DeliveryStatus::Unknown),
        };

        if due < self.now {
            return Classification {
                status: DeliveryStatus::Complete,
                past_due_unfinished: true,
            };
        }

        let prior_due = match prior.and_then(|p| p.due) {
            Some(prior_due) => prior_due,
            None => return Classification::of(DeliveryStatus::New),
        };

        let shift = (due - prior_due).num_days();
        if shift > WIGGLE_ROOM_DAYS {
            return Classification::of(DeliveryStatus::Behind);
        }
        if shift < -WIGGLE_ROOM_DAYS {
            return Classification::of(DeliveryStatus::Ahead);
        }

        if window.start.map_or(false, |start| start > self.now) {
            return Classification::of(DeliveryStatus::NotStarted);
        }

        Classification::of(DeliveryStatus::OnTrack)
    }
}

// ============================================================================
// Status Board
// ============================================================================

/// Full status assessment for one node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeStatus {
    /// Issue key
    pub key: String,
    /// Timed status of the node's rollup window
    pub overall: Classification,
    /// Development stream status, when the tree carries a dev breakdown
    pub dev: Option<Classification>,
    /// QA stream status
    pub qa: Option<Classification>,
    /// UAT stream status
    pub uat: Option<Classification>,
    /// Initiative-level aggregate across the streams
    pub aggregate: DeliveryStatus,
    /// Informational warnings for the UI
    pub warnings: Vec<String>,
}

/// Runs the classifier across a resolved tree.
///
/// Aggregate rules: blocked short-circuits everything (own status text or
/// any stream); complete requires every stream to independently report
/// complete; otherwise the worst stream status wins. Nodes without stream
/// breakdowns aggregate to their overall timed status.
pub struct StatusBoard {
    classifier: StatusClassifier,
}

impl StatusBoard {
    pub fn new(now: NaiveDate) -> Self {
        Self {
            classifier: StatusClassifier::new(now),
        }
    }

    /// Assess a single node
    pub fn assess(&self, node: &RollupNode) -> NodeStatus {
        let category = node.issue.status_category();
        let data = &node.date_data;

        let overall =
            self.classifier
                .classify(category, &data.rollup, data.last_period.as_ref());

        let dev = self.assess_stream(category, data.dev.as_ref());
        let qa = self.assess_stream(category, data.qa.as_ref());
        let uat = self.assess_stream(category, data.uat.as_ref());

        let streams: Vec<&Classification> =
            [dev.as_ref(), qa.as_ref(), uat.as_ref()].into_iter().flatten().collect();

        let aggregate = if category.is_blocked()
            || streams.iter().any(|c| c.status == DeliveryStatus::Blocked)
        {
            DeliveryStatus::Blocked
        } else if streams.is_empty() {
            overall.status
        } else if streams.iter().all(|c| c.status == DeliveryStatus::Complete) {
            DeliveryStatus::Complete
        } else {
            streams
                .iter()
                .map(|c| c.status)
                .max_by_key(|s| s.severity())
                .unwrap_or(overall.status)
        };

        let mut warnings = Vec::new();
        if overall.past_due_unfinished {
            warnings.push(format!(
                "{}: window closed in the past but status is '{}'",
                node.issue.key, node.issue.status
            ));
        }
        for (name, classification) in [("dev", &dev), ("qa", &qa), ("uat", &uat)] {
            if classification.as_ref().is_some_and(|c| c.past_due_unfinished) {
                warnings.push(format!(
                    "{}: {} stream timed out as complete but child statuses disagree",
                    node.issue.key, name
                ));
            }
        }

        NodeStatus {
            key: node.issue.key.clone(),
            overall,
            dev,
            qa,
            uat,
            aggregate,
            warnings,
        }
    }

    /// Assess the whole tree, depth-first
    pub fn assess_tree(&self, root: &RollupNode) -> Vec<NodeStatus> {
        let mut statuses = Vec::new();
        root.walk(&mut |node| statuses.push(self.assess(node)));
        statuses
    }

    fn assess_stream(
        &self,
        category: StatusCategory,
        stream: Option<&StreamWindow>,
    ) -> Option<Classification> {
        stream.map(|s| {
            self.classifier
                .classify(category, &s.window, s.last_period.as_ref())
        })
    }
}
