//! # trackline-report
//!
//! Grouping and aggregation for pivot-style report tables.
//!
//! This crate provides:
//! - `GroupBy`: a named key function over report items, scalar or
//!   multi-membership (an item may belong to several buckets at once)
//! - `Reducer`: an initial/update/finalize fold applied per bucket
//! - `group_and_aggregate`: the composed flat reporting table
//!
//! Bucket identity is a deterministic, key-sorted JSON rendering of the
//! composite group key: two keys with the same fields in any property order
//! land in the same bucket, and `null` values are valid group keys.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::{json, Value};
//! use trackline_report::{group_and_aggregate, reducers::Count, GroupBy, Reducer};
//!
//! struct Row { team: &'static str }
//! let rows = [Row { team: "alpha" }, Row { team: "alpha" }, Row { team: "beta" }];
//!
//! let group_bys = [GroupBy::new("team", |r: &Row| json!(r.team))];
//! let reducers: Vec<Box<dyn Reducer<Row>>> = vec![Box::new(Count)];
//! let table = group_and_aggregate(&rows, &group_bys, &reducers).unwrap();
//!
//! assert_eq!(table.len(), 2);
//! assert_eq!(table[0].aggregates["count"], json!(2));
//! ```

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

pub mod reducers;

pub use reducers::Reducer;

// ============================================================================
// Errors
// ============================================================================

/// Malformed report definitions. These are programming errors, reported
/// immediately; data-quality issues never raise here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error("group-by definition has an empty name")]
    EmptyGroupByName,

    #[error("duplicate group-by name '{0}'")]
    DuplicateGroupBy(String),

    #[error("duplicate reducer name '{0}'")]
    DuplicateReducer(String),

    #[error("no group-by definitions supplied")]
    NoGroupBys,
}

// ============================================================================
// Group Keys
// ============================================================================

/// The value(s) a grouper derives from one item
#[derive(Clone, Debug, PartialEq)]
pub enum GroupValue {
    /// Membership in exactly one bucket
    One(Value),
    /// Membership in one bucket per element (e.g. every month an issue
    /// spans). An empty list means the item joins no bucket for this
    /// grouping.
    Many(Vec<Value>),
}

/// A named group-key function over report items
pub struct GroupBy<T> {
    name: String,
    key_fn: Box<dyn Fn(&T) -> GroupValue>,
}

impl<T> GroupBy<T> {
    /// Scalar grouper: every item maps to exactly one value
    pub fn new(name: impl Into<String>, key_fn: impl Fn(&T) -> Value + 'static) -> Self {
        Self {
            name: name.into(),
            key_fn: Box::new(move |item| GroupValue::One(key_fn(item))),
        }
    }

    /// Multi-membership grouper: an item may map to several values and is
    /// placed into one bucket per value
    pub fn multi(name: impl Into<String>, key_fn: impl Fn(&T) -> Vec<Value> + 'static) -> Self {
        Self {
            name: name.into(),
            key_fn: Box::new(move |item| GroupValue::Many(key_fn(item))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Stable string form of a composite key. `serde_json::Map` is BTree-backed,
/// so serialization is key-sorted and independent of property order.
fn stable_key(fields: &Map<String, Value>) -> String {
    Value::Object(fields.clone()).to_string()
}

fn validate_group_bys<T>(group_bys: &[GroupBy<T>]) -> Result<(), ReportError> {
    if group_bys.is_empty() {
        return Err(ReportError::NoGroupBys);
    }
    let mut seen = BTreeMap::new();
    for group_by in group_bys {
        if group_by.name.is_empty() {
            return Err(ReportError::EmptyGroupByName);
        }
        if seen.insert(group_by.name.clone(), ()).is_some() {
            return Err(ReportError::DuplicateGroupBy(group_by.name.clone()));
        }
    }
    Ok(())
}

/// A bucket of items sharing one composite key
#[derive(Debug)]
pub struct Bucket<'a, T> {
    /// The composite key fields, one per grouper
    pub key: Map<String, Value>,
    /// Items in this bucket, in input order
    pub items: Vec<&'a T>,
}

/// Group items by the composite key of all groupers.
///
/// Multi-membership values expand as a cross-product: an item whose grouper
/// returns N values joins N buckets per combination with the other groupers'
/// values. Buckets come back keyed by the stable key string, sorted.
pub fn group_by_keys<'a, T>(
    items: &'a [T],
    group_bys: &[GroupBy<T>],
) -> Result<BTreeMap<String, Bucket<'a, T>>, ReportError> {
    validate_group_bys(group_bys)?;

    let mut buckets: BTreeMap<String, Bucket<'a, T>> = BTreeMap::new();
    for item in items {
        // Cross-product of every grouper's value list
        let mut combos: Vec<Map<String, Value>> = vec![Map::new()];
        for group_by in group_bys {
            let values = match (group_by.key_fn)(item) {
                GroupValue::One(value) => vec![value],
                GroupValue::Many(values) => values,
            };
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for value in &values {
                    let mut fields = combo.clone();
                    fields.insert(group_by.name.clone(), value.clone());
                    next.push(fields);
                }
            }
            combos = next;
        }

        for fields in combos {
            let key = stable_key(&fields);
            buckets
                .entry(key)
                .or_insert_with(|| Bucket {
                    key: fields,
                    items: Vec::new(),
                })
                .items
                .push(item);
        }
    }
    Ok(buckets)
}

// ============================================================================
// Aggregation
// ============================================================================

/// Fold every reducer over one bucket.
///
/// Each reducer gets a fresh `initial()` accumulator; reducers never observe
/// each other's state.
pub fn aggregate_group<T>(
    items: &[&T],
    reducers: &[Box<dyn Reducer<T>>],
) -> Result<Map<String, Value>, ReportError> {
    let mut seen = BTreeMap::new();
    for reducer in reducers {
        if seen.insert(reducer.name().to_string(), ()).is_some() {
            return Err(ReportError::DuplicateReducer(reducer.name().to_string()));
        }
    }

    let mut results = Map::new();
    for reducer in reducers {
        let mut acc = reducer.initial();
        for item in items {
            acc = reducer.update(acc, item);
        }
        results.insert(reducer.name().to_string(), reducer.finalize(acc));
    }
    Ok(results)
}

/// One row of a report table: the bucket's key fields plus every reducer's
/// named result
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReportRow {
    /// Group key fields, one per grouper
    pub group: Map<String, Value>,
    /// Reducer results, one per reducer
    pub aggregates: Map<String, Value>,
}

impl ReportRow {
    /// Merge key fields and aggregates into one flat record. A reducer named
    /// like a grouper overwrites the key field, so keep names distinct.
    pub fn flatten(self) -> Map<String, Value> {
        let mut flat = self.group;
        flat.extend(self.aggregates);
        flat
    }
}

/// Group then aggregate: one row per bucket, sorted by stable key
pub fn group_and_aggregate<T>(
    items: &[T],
    group_bys: &[GroupBy<T>],
    reducers: &[Box<dyn Reducer<T>>],
) -> Result<Vec<ReportRow>, ReportError> {
    let buckets = group_by_keys(items, group_bys)?;
    let mut rows = Vec::with_capacity(buckets.len());
    for bucket in buckets.into_values() {
        let aggregates = aggregate_group(&bucket.items, reducers)?;
        rows.push(ReportRow {
            group: bucket.key,
            aggregates,
        });
    }
    Ok(rows)
}

// ============================================================================
// Calendar Helpers
// ============================================================================

/// Months ("YYYY-MM") a window spans, inclusive on both ends. Used by
/// monthly pivot reports: an issue spanning several months belongs to every
/// one of them.
pub fn months_spanned(start: NaiveDate, due: NaiveDate) -> Vec<Value> {
    let mut months = Vec::new();
    if due < start {
        return months;
    }
    let (mut year, mut month) = (start.year(), start.month());
    loop {
        months.push(Value::String(format!("{:04}-{:02}", year, month)));
        if (year, month) >= (due.year(), due.month()) {
            break;
        }
        month += 1;
        if month > 12 {
            month = 1;
            year += 1;
        }
    }
    months
}

// ============================================================================
// Tests
// ============================================================================
