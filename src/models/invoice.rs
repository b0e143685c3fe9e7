//! Generated invoice models.
//!
//! This module contains the [`GeneratedInvoice`] type and its associated
//! structures: the per-staff breakdown, the resolved line items, and the
//! conventional summary totals. The engine produces these values; persisting
//! them belongs to an external storage collaborator.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ComputationError;

use super::{AttendanceContext, AuditStep, AuditTrace, PayrollPeriod};

/// Identifies the exact template version an invoice was generated with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateRef {
    /// The template id.
    pub id: String,
    /// The template version.
    pub version: u32,
}

impl std::fmt::Display for TemplateRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@v{}", self.id, self.version)
    }
}

/// One staff member's resolved components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffBreakdown {
    /// The staff member.
    pub staff_id: String,
    /// The attendance context the components were resolved against.
    pub attendance: AttendanceContext,
    /// Component id to resolved value, rounded to 2 decimal places.
    pub components: BTreeMap<String, Decimal>,
    /// The per-component resolution steps.
    pub audit_steps: Vec<AuditStep>,
}

/// One resolved invoice line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLineItem {
    /// The line-item id.
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    /// The resolved value.
    pub value: Decimal,
}

/// The totals conventionally required downstream of the engine.
///
/// Every figure is read from a line item named by the template's
/// summary mapping; absent optional entries are zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummary {
    /// Total staff cost.
    pub total_cost: Decimal,
    /// Management/service fee.
    pub management_fee: Decimal,
    /// VAT.
    pub vat: Decimal,
    /// Withholding tax.
    pub wht: Decimal,
    /// Amount invoiced to the client.
    pub net_invoice: Decimal,
}

/// The complete output of one invoice-generation run.
///
/// All monetary figures are rounded to 2 decimal places (round-half-up);
/// every intermediate value behind them was computed at full precision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedInvoice {
    /// Deterministic identifier derived from client, templates and period.
    pub invoice_id: Uuid,
    /// The client invoiced.
    pub client_id: String,
    /// The payroll period.
    pub period: PayrollPeriod,
    /// The component template version used.
    pub component_template: TemplateRef,
    /// The line-item template version used.
    pub line_item_template: TemplateRef,
    /// Per-staff breakdown, in attendance batch order.
    pub staff: Vec<StaffBreakdown>,
    /// Component id to batch total.
    pub aggregate_totals: BTreeMap<String, Decimal>,
    /// Resolved line items, in resolution order.
    pub line_items: Vec<ResolvedLineItem>,
    /// Conventional totals read from the line items.
    pub summary: InvoiceSummary,
    /// Batch-level audit trace.
    pub audit_trace: AuditTrace,
}

impl GeneratedInvoice {
    /// Looks up a resolved line item's value by id.
    pub fn line_item(&self, id: &str) -> Option<Decimal> {
        self.line_items
            .iter()
            .find(|item| item.id == id)
            .map(|item| item.value)
    }

    /// Looks up one staff member's breakdown.
    pub fn staff_breakdown(&self, staff_id: &str) -> Option<&StaffBreakdown> {
        self.staff.iter().find(|s| s.staff_id == staff_id)
    }
}

/// A staff record that failed during a diagnostic run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffFailure {
    /// The staff member.
    pub staff_id: String,
    /// Why the record failed.
    pub error: ComputationError,
}

/// The output of a diagnostic (dry) run.
///
/// The invoice is computed from the records that succeeded; `failures` lists
/// every record that did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DryRunReport {
    /// Invoice over the successfully computed records.
    pub invoice: GeneratedInvoice,
    /// Every per-staff failure, in batch order.
    pub failures: Vec<StaffFailure>,
}

impl DryRunReport {
    /// Returns true if every staff record computed successfully.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}
