//! Built-in reducers.
//!
//! A reducer folds a bucket of items into one JSON value. Accumulators are
//! plain `serde_json::Value`s so reducers compose into heterogeneous report
//! rows without a shared accumulator type.

use chrono::NaiveDate;
use serde_json::{json, Value};

/// A per-bucket fold. `initial` seeds the accumulator, `update` folds one
/// item in, `finalize` turns the accumulator into the reported value.
pub trait Reducer<T> {
    /// Column name in the report row
    fn name(&self) -> &str;

    fn initial(&self) -> Value;

    fn update(&self, acc: Value, item: &T) -> Value;

    fn finalize(&self, acc: Value) -> Value {
        acc
    }
}

// ============================================================================
// Count
// ============================================================================

/// Number of items in the bucket
pub struct Count;

impl<T> Reducer<T> for Count {
    fn name(&self) -> &str {
        "count"
    }

    fn initial(&self) -> Value {
        json!(0)
    }

    fn update(&self, acc: Value, _item: &T) -> Value {
        json!(acc.as_u64().unwrap_or(0) + 1)
    }
}

// ============================================================================
// SumDays
// ============================================================================

/// Sum of a per-item day count (estimates, remaining effort, velocity)
pub struct SumDays<T> {
    name: String,
    get: Box<dyn Fn(&T) -> f64>,
}

impl<T> SumDays<T> {
    pub fn new(name: impl Into<String>, get: impl Fn(&T) -> f64 + 'static) -> Self {
        Self {
            name: name.into(),
            get: Box::new(get),
        }
    }
}

impl<T> Reducer<T> for SumDays<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial(&self) -> Value {
        json!(0.0)
    }

    fn update(&self, acc: Value, item: &T) -> Value {
        json!(acc.as_f64().unwrap_or(0.0) + (self.get)(item))
    }
}

// ============================================================================
// MinDate / MaxDate
// ============================================================================

/// Earliest date in the bucket, `null` when no item carries one. Dates are
/// kept as ISO strings, which order the same as the dates themselves.
pub struct MinDate<T> {
    name: String,
    get: Box<dyn Fn(&T) -> Option<NaiveDate>>,
}

impl<T> MinDate<T> {
    pub fn new(name: impl Into<String>, get: impl Fn(&T) -> Option<NaiveDate> + 'static) -> Self {
        Self {
            name: name.into(),
            get: Box::new(get),
        }
    }
}

impl<T> Reducer<T> for MinDate<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial(&self) -> Value {
        Value::Null
    }

    fn update(&self, acc: Value, item: &T) -> Value {
        fold_date(acc, (self.get)(item), |candidate, best| candidate < best)
    }
}

/// Latest date in the bucket, `null` when no item carries one
pub struct MaxDate<T> {
    name: String,
    get: Box<dyn Fn(&T) -> Option<NaiveDate>>,
}

impl<T> MaxDate<T> {
    pub fn new(name: impl Into<String>, get: impl Fn(&T) -> Option<NaiveDate> + 'static) -> Self {
        Self {
            name: name.into(),
            get: Box::new(get),
        }
    }
}

impl<T> Reducer<T> for MaxDate<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial(&self) -> Value {
        Value::Null
    }

    fn update(&self, acc: Value, item: &T) -> Value {
        fold_date(acc, (self.get)(item), |candidate, best| candidate > best)
    }
}

fn fold_date(acc: Value, date: Option<NaiveDate>, better: impl Fn(&str, &str) -> bool) -> Value {
    let Some(date) = date else { return acc };
    let candidate = date.format("%Y-%m-%d").to_string();
    match acc.as_str() {
        Some(best) if !better(&candidate, best) => acc,
        _ => Value::String(candidate),
    }
}

// ============================================================================
// CollectKeys
// ============================================================================

/// Sorted, de-duplicated list of a per-item key (issue keys, team names)
pub struct CollectKeys<T> {
    name: String,
    get: Box<dyn Fn(&T) -> String>,
}

impl<T> CollectKeys<T> {
    pub fn new(name: impl Into<String>, get: impl Fn(&T) -> String + 'static) -> Self {
        Self {
            name: name.into(),
            get: Box::new(get),
        }
    }
}

impl<T> Reducer<T> for CollectKeys<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn initial(&self) -> Value {
        json!([])
    }

    fn update(&self, mut acc: Value, item: &T) -> Value {
        if let Some(list) = acc.as_array_mut() {
            list.push(Value::String((self.get)(item)));
        }
        acc
    }

    fn finalize(&self, mut acc: Value) -> Value {
        if let Some(list) = acc.as_array_mut() {
            list.sort_by(|a, b| a.as_str().cmp(&b.as_str()));
            list.dedup();
        }
        acc
    }
}
