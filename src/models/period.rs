//! Payroll period model.
//!
//! A payroll period is one calendar month. This module knows how to count
//! the days in it under either pay basis.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

use super::PayCalculationBasis;

/// A payroll period identified by year and month.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{PayCalculationBasis, PayrollPeriod};
///
/// let period = PayrollPeriod::new(2025, 9).unwrap();
/// assert_eq!(period.to_string(), "2025-09");
/// assert_eq!(period.total_days(PayCalculationBasis::CalendarDays).unwrap(), 30);
/// assert_eq!(period.total_days(PayCalculationBasis::WorkingDays).unwrap(), 22);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PayrollPeriod {
    /// The calendar year.
    pub year: i32,
    /// The calendar month (1-12).
    pub month: u32,
}

impl PayrollPeriod {
    /// Creates a period, rejecting months outside 1-12.
    pub fn new(year: i32, month: u32) -> Result<Self, ConfigurationError> {
        let period = Self { year, month };
        period.first_day()?;
        Ok(period)
    }

    /// Returns the first day of the month.
    pub fn first_day(&self) -> Result<NaiveDate, ConfigurationError> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).ok_or(ConfigurationError::InvalidPeriod {
            year: self.year,
            month: self.month,
        })
    }

    /// Returns every calendar day of the month, in order.
    pub fn days(&self) -> Result<Vec<NaiveDate>, ConfigurationError> {
        let first = self.first_day()?;
        let next_month = first
            .checked_add_months(Months::new(1))
            .ok_or(ConfigurationError::InvalidPeriod {
                year: self.year,
                month: self.month,
            })?;
        Ok(first.iter_days().take_while(|day| *day < next_month).collect())
    }

    /// Returns the number of calendar days in the month.
    pub fn calendar_days(&self) -> Result<u32, ConfigurationError> {
        Ok(self.days()?.len() as u32)
    }

    /// Returns the number of Monday-to-Friday days in the month.
    pub fn working_days(&self) -> Result<u32, ConfigurationError> {
        Ok(self
            .days()?
            .iter()
            .filter(|day| !matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
            .count() as u32)
    }

    /// Returns the total days in the month under the given pay basis.
    pub fn total_days(&self, basis: PayCalculationBasis) -> Result<u32, ConfigurationError> {
        match basis {
            PayCalculationBasis::CalendarDays => self.calendar_days(),
            PayCalculationBasis::WorkingDays => self.working_days(),
        }
    }
}

impl std::fmt::Display for PayrollPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
