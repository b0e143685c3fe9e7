//! Client configuration model.
//!
//! A client configuration is owned and mutated by an external administration
//! collaborator; the engine only ever reads it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How the total number of days in a payroll period is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayCalculationBasis {
    /// Every calendar day in the month counts.
    CalendarDays,
    /// Only Monday to Friday count (no holiday calendar).
    WorkingDays,
}

impl std::fmt::Display for PayCalculationBasis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayCalculationBasis::CalendarDays => write!(f, "calendar_days"),
            PayCalculationBasis::WorkingDays => write!(f, "working_days"),
        }
    }
}

/// Per-client settings consumed by the engine.
///
/// Rates are expressed in percent units, so a VAT rate of `7.5` means 7.5%.
///
/// # Example
///
/// ```
/// use payroll_engine::models::{ClientConfiguration, PayCalculationBasis};
/// use rust_decimal::Decimal;
///
/// let client = ClientConfiguration {
///     client_id: "acme".to_string(),
///     pay_calculation_basis: PayCalculationBasis::CalendarDays,
///     service_fee_percentage: Decimal::new(10, 0),
///     vat_rate: Decimal::new(75, 1),
///     wht_rate: Decimal::new(5, 0),
///     use_credit_to_bank_model: false,
///     prorate_salary: true,
/// };
/// assert_eq!(client.vat_rate.to_string(), "7.5");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfiguration {
    /// Unique identifier for the client.
    pub client_id: String,
    /// How total days in a period are counted.
    pub pay_calculation_basis: PayCalculationBasis,
    /// Management/service fee charged on the invoice's total cost, in percent.
    pub service_fee_percentage: Decimal,
    /// VAT charged on the management fee, in percent.
    pub vat_rate: Decimal,
    /// Withholding tax deducted on the management fee, in percent.
    #[serde(default)]
    pub wht_rate: Decimal,
    /// Whether the invoice's cost basis is the credit-to-bank figure
    /// (gross plus remitted deductions) rather than gross pay.
    #[serde(default)]
    pub use_credit_to_bank_model: bool,
    /// Whether salaries are prorated by attendance at all.
    #[serde(default = "default_prorate_salary")]
    pub prorate_salary: bool,
}

fn default_prorate_salary() -> bool {
    true
}
