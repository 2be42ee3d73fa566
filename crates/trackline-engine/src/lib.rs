//! # trackline-engine
//!
//! The pure-data computations behind trackline reports:
//!
//! - `forest`: normalizes a flat issue list into a parent/child index with
//!   caller-visible data-quality diagnostics
//! - `timing`: resolves a start/due window per node under one of five merge
//!   strategies, recursing top-down
//! - `status`: classifies delivery status per node (and per work-stream)
//!   against an optional prior-period snapshot
//! - `completion`: rolls up total/completed/remaining working days bottom-up
//!   under two policies, selectable per hierarchy depth through a policy
//!   chain
//!
//! Every computation here is synchronous and side-effect-free: each run
//! builds fresh output trees and uses its own caches, so concurrent report
//! runs over different inputs never share mutable state.
//!
//! ## Example
//!
//! ```rust
//! use trackline_core::IssueNode;
//! use trackline_engine::{Forest, MergeStrategy, TimingMergeResolver};
//! use chrono::NaiveDate;
//!
//! let date = |d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap();
//! let forest = Forest::from_issues(vec![
//!     IssueNode::new("E1").level(1).start(date("2026-01-05")).due(date("2026-02-27")),
//!     IssueNode::new("S1").parent("E1"),
//! ]);
//!
//! let resolver = TimingMergeResolver::new(&forest);
//! let roots = resolver.resolve_forest(&[MergeStrategy::ChildrenFirstThenParent]);
//! assert_eq!(roots[0].date_data.rollup.start, Some(date("2026-01-05")));
//! ```

pub mod completion;
pub mod forest;
pub mod status;
pub mod timing;

pub use completion::{
    parse_policy_chain, CompletionCache, CompletionCalculator, CompletionPolicy, UnknownPolicy,
    FALLBACK_ESTIMATE_DAYS,
};
pub use forest::{Diagnostic, Forest};
pub use status::{
    Classification, DeliveryStatus, NodeStatus, StatusBoard, StatusClassifier, WIGGLE_ROOM_DAYS,
};
pub use timing::{
    attach_streams, link_prior, parse_chain, prior_window_index, MergeStrategy, PriorWindows,
    ResolveStats, TimingMergeResolver, UnknownStrategy,
};
