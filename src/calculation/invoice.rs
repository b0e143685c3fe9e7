//! Invoice generation pipeline.
//!
//! Runs the five stages in order: template validation, attendance context,
//! per-staff component resolution, aggregation, and line-item resolution.
//! Per-staff work runs on the rayon pool; results keep the batch order.
//!
//! Two modes are offered. [`generate_invoice`] is the production mode and
//! aborts on the first staff record that fails. [`dry_run`] is the
//! diagnostic mode and reports every failing record next to an invoice over
//! the records that succeeded.

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};
use crate::models::{
    AttendanceBatch, AttendanceRecord, AuditTrace, AuditWarning, ClientConfiguration,
    ComponentTemplate, DryRunReport, GeneratedInvoice, InvoiceSummary, LineItemTemplate,
    PayrollPeriod, ResolvedLineItem, StaffBreakdown, StaffFailure, TemplateRef,
};

use super::aggregate::{ComponentTotals, reduce_totals_parallel};
use super::attendance::{AttendancePolicy, build_attendance_context};
use super::component_resolver::resolve_components;
use super::line_item_resolver::{resolve_line_items, round_money};
use super::validator::{ValidatedComponentTemplate, ValidatedLineItemTemplate, validate_templates};

/// Everything validated up front, shared read-only by the per-staff workers.
struct PreparedRun<'a> {
    client: &'a ClientConfiguration,
    components: ValidatedComponentTemplate,
    line_items: ValidatedLineItemTemplate,
    policy: AttendancePolicy,
    period: PayrollPeriod,
}

/// One staff member's full-precision result.
struct StaffOutcome {
    breakdown: StaffBreakdown,
    values: ComponentTotals,
    warnings: Vec<AuditWarning>,
}

fn prepare<'a>(
    client: &'a ClientConfiguration,
    components: &ComponentTemplate,
    line_items: &LineItemTemplate,
    period: PayrollPeriod,
) -> EngineResult<PreparedRun<'a>> {
    let (components, line_items) = validate_templates(components, line_items)?;
    let policy = AttendancePolicy::from_configuration(client, components.template());

    // Surfaces invalid periods and zero-day bases before any staff is touched.
    policy.total_days(period)?;

    Ok(PreparedRun {
        client,
        components,
        line_items,
        policy,
        period,
    })
}

fn compute_staff(run: &PreparedRun<'_>, record: &AttendanceRecord) -> EngineResult<StaffOutcome> {
    let attendance = build_attendance_context(&run.policy, record, run.period, 1)?;
    let resolution = resolve_components(&run.components, &attendance.context, 2).map_err(
        |source| EngineError::StaffComputation {
            staff_id: record.staff_id.clone(),
            source,
        },
    )?;

    let mut audit_steps = Vec::with_capacity(resolution.audit_steps.len() + 1);
    audit_steps.push(attendance.audit_step);
    audit_steps.extend(resolution.audit_steps);

    Ok(StaffOutcome {
        breakdown: StaffBreakdown {
            staff_id: record.staff_id.clone(),
            attendance: attendance.context,
            components: resolution
                .values
                .iter()
                .map(|(id, value)| (id.clone(), round_money(*value)))
                .collect(),
            audit_steps,
        },
        values: resolution.values,
        warnings: attendance.warnings,
    })
}

fn compute_batch(run: &PreparedRun<'_>, batch: &AttendanceBatch) -> Vec<EngineResult<StaffOutcome>> {
    batch
        .records()
        .par_iter()
        .map(|record| compute_staff(run, record))
        .collect()
}

/// Derives the invoice id from client, template versions and period.
///
/// The same inputs always produce the same id.
pub fn invoice_id(
    client_id: &str,
    component_template: &TemplateRef,
    line_item_template: &TemplateRef,
    period: PayrollPeriod,
) -> Uuid {
    let name = format!(
        "{}|{}|{}|{}",
        client_id, component_template, line_item_template, period
    );
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes())
}

fn summary_value(items: &[ResolvedLineItem], id: Option<&str>) -> Decimal {
    id.and_then(|id| items.iter().find(|item| item.id == id))
        .map(|item| item.value)
        .unwrap_or_default()
}

fn assemble(run: &PreparedRun<'_>, outcomes: Vec<StaffOutcome>) -> EngineResult<GeneratedInvoice> {
    let per_staff: Vec<&ComponentTotals> = outcomes.iter().map(|o| &o.values).collect();
    let totals = reduce_totals_parallel(&per_staff).map_err(EngineError::LineItemComputation)?;

    let resolution =
        resolve_line_items(&run.line_items, &totals, 1).map_err(EngineError::LineItemComputation)?;
    let line_items = resolution.rounded();

    let mapping = &run.line_items.template().summary;
    let summary = InvoiceSummary {
        total_cost: summary_value(&line_items, Some(mapping.total_cost.as_str())),
        management_fee: summary_value(&line_items, mapping.management_fee.as_deref()),
        vat: summary_value(&line_items, mapping.vat.as_deref()),
        wht: summary_value(&line_items, mapping.wht.as_deref()),
        net_invoice: summary_value(&line_items, Some(mapping.net_invoice.as_str())),
    };

    let mut warnings: Vec<AuditWarning> = run
        .components
        .warnings()
        .iter()
        .chain(run.line_items.warnings())
        .cloned()
        .collect();
    let mut staff = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        warnings.extend(outcome.warnings);
        staff.push(outcome.breakdown);
    }

    let component_template = TemplateRef {
        id: run.components.template().id.clone(),
        version: run.components.template().version,
    };
    let line_item_template = TemplateRef {
        id: run.line_items.template().id.clone(),
        version: run.line_items.template().version,
    };

    Ok(GeneratedInvoice {
        invoice_id: invoice_id(
            &run.client.client_id,
            &component_template,
            &line_item_template,
            run.period,
        ),
        client_id: run.client.client_id.clone(),
        period: run.period,
        component_template,
        line_item_template,
        staff,
        aggregate_totals: totals
            .into_iter()
            .map(|(id, value)| (id, round_money(value)))
            .collect::<BTreeMap<_, _>>(),
        line_items,
        summary,
        audit_trace: AuditTrace {
            steps: resolution.audit_steps,
            warnings,
        },
    })
}

/// Generates an invoice for one client, one period, one attendance batch.
///
/// Production mode: the run fails as a whole on the first staff record (in
/// batch order) that cannot be computed.
///
/// # Errors
///
/// - [`EngineError::Validation`] if one template is structurally invalid
/// - [`EngineError::TemplatesInvalid`] if both are
/// - [`EngineError::Configuration`] for an invalid period, a zero-day basis,
///   or a record from another period
/// - [`EngineError::StaffComputation`] for the first failing staff record
/// - [`EngineError::LineItemComputation`] if aggregation or line items overflow
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::{generate_invoice, standard_line_item_template};
/// use payroll_engine::models::{
///     AttendanceBatch, ClientConfiguration, ComponentDefinition, ComponentTemplate,
///     PayCalculationBasis, PayrollPeriod,
/// };
/// use rust_decimal::Decimal;
///
/// let client = ClientConfiguration {
///     client_id: "acme".to_string(),
///     pay_calculation_basis: PayCalculationBasis::CalendarDays,
///     service_fee_percentage: Decimal::new(10, 0),
///     vat_rate: Decimal::new(75, 1),
///     wht_rate: Decimal::ZERO,
///     use_credit_to_bank_model: false,
///     prorate_salary: true,
/// };
/// let components = ComponentTemplate::new(
///     "acme-components",
///     vec![ComponentDefinition::fixed("GROSS", Decimal::new(300_000, 0)).prorated()],
/// );
/// let line_items = standard_line_item_template(&client, &["GROSS"]);
/// let batch = AttendanceBatch::new(
///     PayrollPeriod::new(2025, 9).unwrap(),
///     vec![("staff_001", Decimal::new(15, 0))],
/// );
///
/// let invoice = generate_invoice(&client, &components, &line_items, &batch).unwrap();
/// assert_eq!(invoice.summary.total_cost, Decimal::new(150_000, 0));
/// assert_eq!(invoice.summary.net_invoice, Decimal::new(166_125, 0));
/// ```
pub fn generate_invoice(
    client: &ClientConfiguration,
    components: &ComponentTemplate,
    line_items: &LineItemTemplate,
    batch: &AttendanceBatch,
) -> EngineResult<GeneratedInvoice> {
    let started = Instant::now();
    info!(
        client_id = %client.client_id,
        period = %batch.period,
        staff_count = batch.len(),
        "Generating invoice"
    );

    let run = prepare(client, components, line_items, batch.period)?;

    let mut outcomes = Vec::with_capacity(batch.len());
    for result in compute_batch(&run, batch) {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(error) => {
                warn!(
                    client_id = %client.client_id,
                    period = %batch.period,
                    error = %error,
                    "Invoice generation aborted"
                );
                return Err(error);
            }
        }
    }

    let invoice = assemble(&run, outcomes)?;

    info!(
        client_id = %client.client_id,
        invoice_id = %invoice.invoice_id,
        staff_count = invoice.staff.len(),
        net_invoice = %invoice.summary.net_invoice,
        duration_us = started.elapsed().as_micros() as u64,
        "Invoice generated"
    );

    Ok(invoice)
}

/// Runs the pipeline in diagnostic mode.
///
/// Per-staff computation errors are collected instead of aborting the run;
/// the returned invoice covers only the records that succeeded. Template
/// validation and configuration errors are still fatal.
///
/// # Errors
///
/// The same fatal errors as [`generate_invoice`], except
/// [`EngineError::StaffComputation`], which is reported in
/// [`DryRunReport::failures`] instead.
pub fn dry_run(
    client: &ClientConfiguration,
    components: &ComponentTemplate,
    line_items: &LineItemTemplate,
    batch: &AttendanceBatch,
) -> EngineResult<DryRunReport> {
    let started = Instant::now();
    let run = prepare(client, components, line_items, batch.period)?;

    let mut outcomes = Vec::with_capacity(batch.len());
    let mut failures = Vec::new();
    for result in compute_batch(&run, batch) {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(EngineError::StaffComputation { staff_id, source }) => {
                warn!(staff_id = %staff_id, error = %source, "Staff record failed in dry run");
                failures.push(StaffFailure {
                    staff_id,
                    error: source,
                });
            }
            Err(error) => return Err(error),
        }
    }

    let invoice = assemble(&run, outcomes)?;

    info!(
        client_id = %client.client_id,
        period = %batch.period,
        staff_count = batch.len(),
        failures = failures.len(),
        duration_us = started.elapsed().as_micros() as u64,
        "Dry run complete"
    );

    Ok(DryRunReport { invoice, failures })
}
