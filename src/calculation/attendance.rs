//! Attendance context construction.
//!
//! Turns one staff member's attendance record into the attendance factor
//! that prorated components are scaled by.

use rust_decimal::Decimal;
use tracing::warn;

use crate::error::{ComputationError, ConfigurationError, EngineError, EngineResult};
use crate::models::{
    AttendanceContext, AttendanceRecord, AuditStep, AuditWarning, ClientConfiguration,
    ComponentTemplate, PayCalculationBasis, PayrollPeriod,
};

/// The attendance settings in force for one run.
///
/// Combines the client's basis and proration switch with the template's
/// calculation method and minimum factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttendancePolicy {
    /// The day count attendance is measured against.
    pub basis: PayCalculationBasis,
    /// Floor for the attendance factor.
    pub minimum_factor: Decimal,
    /// When false every staff member gets a factor of 1.
    pub prorate: bool,
}

impl AttendancePolicy {
    /// Derives the policy for a client and component template.
    ///
    /// An explicit template `attendance_calculation_method` overrides the
    /// client's `pay_calculation_basis`.
    pub fn from_configuration(client: &ClientConfiguration, template: &ComponentTemplate) -> Self {
        Self {
            basis: template
                .attendance_calculation_method
                .basis(client.pay_calculation_basis),
            minimum_factor: template.minimum_attendance_factor,
            prorate: client.prorate_salary,
        }
    }

    /// Returns the total days of `period` under this policy's basis.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::ZeroTotalDays`] if the basis yields no
    /// days for the period.
    pub fn total_days(&self, period: PayrollPeriod) -> Result<u32, ConfigurationError> {
        let total_days = period.total_days(self.basis)?;
        if total_days == 0 {
            return Err(ConfigurationError::ZeroTotalDays {
                basis: self.basis.to_string(),
                period: period.to_string(),
            });
        }
        Ok(total_days)
    }
}

/// The result of building an attendance context.
#[derive(Debug, Clone)]
pub struct AttendanceContextResult {
    /// The derived context.
    pub context: AttendanceContext,
    /// The audit step recording the derivation.
    pub audit_step: AuditStep,
    /// Capping and minimum-factor warnings.
    pub warnings: Vec<AuditWarning>,
}

/// Builds the attendance context for one staff member.
///
/// `days_worked` above the period's total is capped (with an
/// `ATTENDANCE_CAPPED` warning). The factor is `days_worked / total_days`,
/// raised to the policy's minimum if lower (with a
/// `BELOW_MINIMUM_ATTENDANCE` warning).
///
/// # Errors
///
/// - [`ConfigurationError::PeriodMismatch`] if the record is for another period
/// - [`ConfigurationError::ZeroTotalDays`] if the basis yields no days
/// - [`EngineError::StaffComputation`] wrapping
///   [`ComputationError::NegativeDaysWorked`] for negative attendance
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::{AttendancePolicy, build_attendance_context};
/// use payroll_engine::models::{AttendanceRecord, PayCalculationBasis, PayrollPeriod};
/// use rust_decimal::Decimal;
///
/// let period = PayrollPeriod::new(2025, 9).unwrap();
/// let policy = AttendancePolicy {
///     basis: PayCalculationBasis::CalendarDays,
///     minimum_factor: Decimal::ZERO,
///     prorate: true,
/// };
/// let record = AttendanceRecord {
///     staff_id: "staff_001".to_string(),
///     days_worked: Decimal::new(24, 0),
///     period,
/// };
///
/// let result = build_attendance_context(&policy, &record, period, 1).unwrap();
/// assert_eq!(result.context.total_days, 30);
/// assert_eq!(result.context.attendance_factor, Decimal::new(8, 1));
/// ```
pub fn build_attendance_context(
    policy: &AttendancePolicy,
    record: &AttendanceRecord,
    period: PayrollPeriod,
    step_number: u32,
) -> EngineResult<AttendanceContextResult> {
    if record.period != period {
        return Err(ConfigurationError::PeriodMismatch {
            staff_id: record.staff_id.clone(),
            expected: period.to_string(),
            actual: record.period.to_string(),
        }
        .into());
    }

    if record.days_worked < Decimal::ZERO {
        return Err(EngineError::StaffComputation {
            staff_id: record.staff_id.clone(),
            source: ComputationError::NegativeDaysWorked {
                staff_id: record.staff_id.clone(),
                days_worked: record.days_worked,
            },
        });
    }

    let total_days = policy.total_days(period)?;
    let total = Decimal::from(total_days);
    let mut warnings = Vec::new();

    let days_worked = if record.days_worked > total {
        warn!(
            staff_id = %record.staff_id,
            days_worked = %record.days_worked,
            total_days,
            "Days worked exceed total days; capping"
        );
        warnings.push(AuditWarning::new(
            "ATTENDANCE_CAPPED",
            format!(
                "Staff '{}' reported {} days worked; capped at {} {}",
                record.staff_id, record.days_worked, total_days, policy.basis
            ),
            "medium",
        ));
        total
    } else {
        record.days_worked
    };

    // days_worked <= total, so the ratio never exceeds 1
    let ratio = days_worked / total;

    let (attendance_factor, reasoning) = if !policy.prorate {
        (
            Decimal::ONE,
            "Proration disabled for client; attendance factor fixed at 1".to_string(),
        )
    } else if ratio < policy.minimum_factor {
        warn!(
            staff_id = %record.staff_id,
            ratio = %ratio,
            minimum_factor = %policy.minimum_factor,
            "Attendance below minimum factor"
        );
        warnings.push(AuditWarning::new(
            "BELOW_MINIMUM_ATTENDANCE",
            format!(
                "Staff '{}' attendance ratio {} is below the minimum factor {}",
                record.staff_id,
                ratio.normalize(),
                policy.minimum_factor
            ),
            "low",
        ));
        (
            policy.minimum_factor,
            format!(
                "{} / {} days is below the minimum; raised to {}",
                days_worked, total_days, policy.minimum_factor
            ),
        )
    } else {
        (
            ratio,
            format!("{} / {} days = {}", days_worked, total_days, ratio.normalize()),
        )
    };

    let audit_step = AuditStep {
        step_number,
        rule_id: "attendance_context".to_string(),
        rule_name: "Attendance Proration".to_string(),
        subject_id: record.staff_id.clone(),
        input: serde_json::json!({
            "days_worked": record.days_worked.to_string(),
            "basis": policy.basis.to_string(),
            "period": period.to_string(),
            "minimum_factor": policy.minimum_factor.to_string(),
            "prorate": policy.prorate
        }),
        output: serde_json::json!({
            "total_days": total_days,
            "days_worked": days_worked.to_string(),
            "attendance_factor": attendance_factor.normalize().to_string()
        }),
        reasoning,
    };

    Ok(AttendanceContextResult {
        context: AttendanceContext {
            staff_id: record.staff_id.clone(),
            basis: policy.basis,
            total_days,
            days_worked,
            attendance_factor,
        },
        audit_step,
        warnings,
    })
}
