//! Accrual periods and run reports

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Calendar month an accrual run covers
///
/// The period ID ("2026-08") keys the idempotency marks in storage, so a
/// run interrupted mid-way resumes where it stopped and a finished period
/// can never be applied twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccrualPeriod {
    year: i32,
    month: u32,
}

impl AccrualPeriod {
    /// Period containing the given instant
    pub fn containing(at: DateTime<Utc>) -> Self {
        Self {
            year: at.year(),
            month: at.month(),
        }
    }

    /// Period containing now
    pub fn current() -> Self {
        Self::containing(Utc::now())
    }

    /// Stable period ID used in storage keys
    pub fn id(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

impl fmt::Display for AccrualPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Outcome of one accrual run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Period the run covered
    pub period: String,

    /// Accounts inspected
    pub seen: usize,

    /// Accounts credited (or marked with zero interest)
    pub accrued: usize,

    /// Inactive or zero-rate accounts skipped
    pub skipped: usize,

    /// Accounts that errored and were left for the next run
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_period_id_format() {
        let at = Utc.with_ymd_and_hms(2026, 8, 30, 12, 0, 0).unwrap();
        assert_eq!(AccrualPeriod::containing(at).id(), "2026-08");
    }

    #[test]
    fn test_period_changes_at_month_boundary() {
        let last = Utc.with_ymd_and_hms(2026, 8, 31, 23, 59, 59).unwrap();
        let next = Utc.with_ymd_and_hms(2026, 9, 1, 0, 0, 0).unwrap();
        assert_ne!(
            AccrualPeriod::containing(last),
            AccrualPeriod::containing(next)
        );
        assert!(AccrualPeriod::containing(last) < AccrualPeriod::containing(next));
    }
}
