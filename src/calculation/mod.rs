//! Calculation logic for the payroll engine.
//!
//! This module contains the stages of a payroll run, in evaluation order:
//! template validation, attendance context construction, per-staff
//! component resolution, batch aggregation, and line-item resolution. The
//! invoice pipeline chains them; the formula parser, the standard invoice
//! template builder and formula preview are available on their own.

mod aggregate;
mod attendance;
mod component_resolver;
mod formula;
mod graph;
mod invoice;
mod line_item_resolver;
mod standard_template;
mod validator;

pub use aggregate::{
    AGGREGATION_SCALE, ComponentTotals, combine_totals, reduce_totals, reduce_totals_parallel,
};
pub use attendance::{AttendanceContextResult, AttendancePolicy, build_attendance_context};
pub use component_resolver::{ComponentResolution, resolve_components};
pub use formula::{
    EvalError, Formula, FormulaError, MAX_FORMULA_DEPTH, MAX_FORMULA_LENGTH, preview_formula,
};
pub use invoice::{dry_run, generate_invoice, invoice_id};
pub use line_item_resolver::{LineItemResolution, resolve_line_items, round_money};
pub use standard_template::{
    GROSS_INVOICE, MANAGEMENT_FEE, TOTAL_COST, TOTAL_INVOICE, VAT, WHT,
    standard_line_item_template,
};
pub use validator::{
    ValidatedComponentTemplate, ValidatedLineItemTemplate, validate_component_template,
    validate_line_item_template, validate_templates,
};
