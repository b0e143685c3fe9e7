//! Core data models for the payroll calculation engine.
//!
//! This module contains all the domain models used throughout the engine:
//! the inputs supplied by collaborators (client configuration, templates,
//! attendance) and the outputs the engine produces (generated invoices and
//! their audit trail).

mod attendance;
mod audit;
mod client;
mod component;
mod invoice;
mod line_item;
mod period;

pub use attendance::{AttendanceBatch, AttendanceContext, AttendanceRecord, StaffAttendance};
pub use audit::{AuditStep, AuditTrace, AuditWarning};
pub use client::{ClientConfiguration, PayCalculationBasis};
pub use component::{
    AttendanceCalculationMethod, ComponentDefinition, ComponentKind, ComponentTemplate,
};
pub use invoice::{
    DryRunReport, GeneratedInvoice, InvoiceSummary, ResolvedLineItem, StaffBreakdown,
    StaffFailure, TemplateRef,
};
pub use line_item::{InvoiceSummaryMapping, LineItemDefinition, LineItemFormula, LineItemTemplate};
pub use period::PayrollPeriod;
