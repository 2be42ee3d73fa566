//! Working-day arithmetic
//!
//! A `BusinessCalendar` decides which calendar days count as working days and
//! counts them over date ranges. The default calendar works Monday through
//! Friday with no holidays; reports that need regional holidays add them.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Working-day definitions used for estimate and completion counting
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessCalendar {
    /// Working days of the week (0 = Sunday, 6 = Saturday)
    pub working_days: Vec<u8>,
    /// Holiday date ranges
    pub holidays: Vec<Holiday>,
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self {
            working_days: vec![1, 2, 3, 4, 5], // Mon-Fri
            holidays: Vec::new(),
        }
    }
}

impl BusinessCalendar {
    /// Standard Monday-Friday calendar with no holidays
    pub fn standard() -> Self {
        Self::default()
    }

    /// Add a holiday range
    pub fn holiday(mut self, holiday: Holiday) -> Self {
        self.holidays.push(holiday);
        self
    }

    /// Check whether a date is a working day
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        if !self.working_days.contains(&weekday) {
            return false;
        }
        !self.holidays.iter().any(|h| h.contains(date))
    }

    /// Count working days in `[start, end]`, both endpoints inclusive.
    ///
    /// Returns 0 when `end < start`.
    pub fn working_days_between(&self, start: NaiveDate, end: NaiveDate) -> i64 {
        if end < start {
            return 0;
        }
        let mut count = 0;
        let mut day = start;
        while day <= end {
            if self.is_working_day(day) {
                count += 1;
            }
            day = day.succ_opt().expect("date overflow");
        }
        count
    }
}

/// Holiday definition (an inclusive date range)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Holiday {
    /// Single-day holiday
    pub fn on(name: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            name: name.into(),
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
