//! Template-driven payroll and invoice calculation engine.
//!
//! This crate evaluates a client's declarative pay structure (a component
//! template) for every staff member in an attendance batch, prorating by
//! attendance, aggregates the results, and resolves the client's invoice
//! line items (total cost, management fee, VAT, withholding tax) from the
//! batch totals. Every run is deterministic and fully audited.

#![warn(missing_docs)]

pub mod calculation;
pub mod config;
pub mod error;
pub mod models;
