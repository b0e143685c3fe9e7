//! Attendance models.
//!
//! Attendance is supplied by an external ingestion collaborator as a batch
//! for one period. The derived [`AttendanceContext`] is never stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{PayCalculationBasis, PayrollPeriod};

/// Days worked by one staff member in one payroll period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    /// The staff member.
    pub staff_id: String,
    /// Days worked; fractional values represent half days.
    pub days_worked: Decimal,
    /// The period the attendance belongs to.
    pub period: PayrollPeriod,
}

/// One staff line in an attendance batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffAttendance {
    /// The staff member.
    pub staff_id: String,
    /// Days worked in the batch period.
    pub days_worked: Decimal,
}

/// All attendance for one client and one payroll period.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{AttendanceBatch, PayrollPeriod};
/// use rust_decimal::Decimal;
///
/// let batch = AttendanceBatch::new(
///     PayrollPeriod::new(2025, 9).unwrap(),
///     vec![("staff_001", Decimal::new(24, 0)), ("staff_002", Decimal::new(30, 0))],
/// );
/// let records = batch.records();
/// assert_eq!(records.len(), 2);
/// assert_eq!(records[1].staff_id, "staff_002");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceBatch {
    /// The period covered by the batch.
    pub period: PayrollPeriod,
    /// Attendance per staff member, in ingestion order.
    pub entries: Vec<StaffAttendance>,
}

impl AttendanceBatch {
    /// Builds a batch from `(staff_id, days_worked)` pairs.
    pub fn new<S: Into<String>>(period: PayrollPeriod, entries: Vec<(S, Decimal)>) -> Self {
        Self {
            period,
            entries: entries
                .into_iter()
                .map(|(staff_id, days_worked)| StaffAttendance {
                    staff_id: staff_id.into(),
                    days_worked,
                })
                .collect(),
        }
    }

    /// Expands the batch into per-staff records carrying the batch period.
    pub fn records(&self) -> Vec<AttendanceRecord> {
        self.entries
            .iter()
            .map(|entry| AttendanceRecord {
                staff_id: entry.staff_id.clone(),
                days_worked: entry.days_worked,
                period: self.period,
            })
            .collect()
    }

    /// Returns the number of staff in the batch.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the batch has no staff.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The attendance facts a component resolution runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceContext {
    /// The staff member.
    pub staff_id: String,
    /// The basis the total days were counted under.
    pub basis: PayCalculationBasis,
    /// Total days in the period under `basis`.
    pub total_days: u32,
    /// Days worked after capping at `total_days`.
    pub days_worked: Decimal,
    /// The clamped ratio used for proration.
    pub attendance_factor: Decimal,
}

impl AttendanceContext {
    /// A context with full attendance, for callers that bypass attendance.
    pub fn full(staff_id: impl Into<String>, basis: PayCalculationBasis, total_days: u32) -> Self {
        Self {
            staff_id: staff_id.into(),
            basis,
            total_days,
            days_worked: Decimal::from(total_days),
            attendance_factor: Decimal::ONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_batch_records_carry_batch_period() {
        let period = PayrollPeriod::new(2025, 9).unwrap();
        let batch = AttendanceBatch::new(period, vec![("a", dec("20")), ("b", dec("15.5"))]);

        let records = batch.records();
        assert!(records.iter().all(|r| r.period == period));
        assert_eq!(records[1].days_worked, dec("15.5"));
    }

    #[test]
    fn test_batch_deserializes_from_json() {
        let json = r#"{
            "period": {"year": 2025, "month": 9},
            "entries": [{"staff_id": "s1", "days_worked": "24"}]
        }"#;
        let batch: AttendanceBatch = serde_json::from_str(json).unwrap();
        assert_eq!(batch.len(), 1);
        assert!(!batch.is_empty());
        assert_eq!(batch.entries[0].days_worked, dec("24"));
    }

    #[test]
    fn test_full_context_has_factor_one() {
        let context = AttendanceContext::full("s1", PayCalculationBasis::CalendarDays, 30);
        assert_eq!(context.attendance_factor, Decimal::ONE);
        assert_eq!(context.days_worked, dec("30"));
    }
}
