//! Integration tests for the payroll calculation engine.
//!
//! This test suite runs the full pipeline through the public API:
//! - The two-staff acceptance scenario (from YAML and from code)
//! - Deterministic, byte-identical output
//! - Cycle rejection before any computation
//! - Proration happening exactly once
//! - Full attendance
//! - Production vs dry-run error handling
//! - Template versioning through the registry

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

use payroll_engine::calculation::{
    dry_run, generate_invoice, preview_formula, standard_line_item_template,
};
use payroll_engine::config::{ConfigLoader, TemplateRegistry};
use payroll_engine::error::{ComputationError, ConfigurationError, EngineError, ValidationIssue};
use payroll_engine::models::{
    AttendanceBatch, AttendanceCalculationMethod, ClientConfiguration, ComponentDefinition,
    ComponentTemplate, GeneratedInvoice, LineItemFormula, LineItemTemplate, PayCalculationBasis,
    PayrollPeriod,
};

// =============================================================================
// Test Helpers
// =============================================================================

fn load_sample() -> (ClientConfiguration, ComponentTemplate, LineItemTemplate) {
    ConfigLoader::load("./config/acme_staffing")
        .expect("Failed to load config")
        .into_parts()
}

fn decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn september(entries: &[(&str, &str)]) -> AttendanceBatch {
    AttendanceBatch::new(
        PayrollPeriod::new(2025, 9).unwrap(),
        entries.iter().map(|(id, days)| (*id, decimal(days))).collect(),
    )
}

fn run(entries: &[(&str, &str)]) -> GeneratedInvoice {
    let (client, components, line_items) = load_sample();
    generate_invoice(&client, &components, &line_items, &september(entries))
        .expect("Invoice generation failed")
}

fn assert_money(actual: Decimal, expected: &str) {
    assert_eq!(
        actual.normalize(),
        decimal(expected).normalize(),
        "Expected {}, got {}",
        expected,
        actual
    );
}

// =============================================================================
// SECTION 1: Acceptance Scenario
// =============================================================================

#[test]
fn test_acceptance_per_staff_values() {
    // 24 of 30 calendar days => factor 0.8
    let invoice = run(&[("staff_001", "24"), ("staff_002", "24")]);

    for staff in &invoice.staff {
        assert_money(staff.attendance.attendance_factor, "0.8");
        assert_money(staff.components["BASIC"], "80000");
        assert_money(staff.components["HOUSING"], "40000");
        assert_money(staff.components["GROSS"], "120000");
        assert_money(staff.components["PENSION"], "12000");
    }
}

#[test]
fn test_acceptance_batch_totals() {
    let invoice = run(&[("staff_001", "24"), ("staff_002", "24")]);

    assert_money(invoice.aggregate_totals["BASIC"], "160000");
    assert_money(invoice.aggregate_totals["HOUSING"], "80000");
    assert_money(invoice.aggregate_totals["GROSS"], "240000");
    assert_money(invoice.aggregate_totals["PENSION"], "24000");
}

#[test]
fn test_acceptance_invoice_figures() {
    let invoice = run(&[("staff_001", "24"), ("staff_002", "24")]);

    assert_money(invoice.summary.total_cost, "264000");
    assert_money(invoice.summary.management_fee, "26400");
    assert_money(invoice.summary.vat, "1980");
    assert_money(invoice.summary.net_invoice, "292380");
    assert_money(invoice.line_item("TOTAL_INVOICE").unwrap(), "292380");

    let ids: Vec<&str> = invoice.line_items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["TOTAL_COST", "MANAGEMENT_FEE", "VAT", "TOTAL_INVOICE"]);
}

#[test]
fn test_acceptance_references_template_versions() {
    let invoice = run(&[("staff_001", "24")]);

    assert_eq!(invoice.client_id, "acme_staffing");
    assert_eq!(invoice.component_template.to_string(), "acme_staffing-components@v1");
    assert_eq!(invoice.line_item_template.to_string(), "acme_staffing-invoice@v1");
    assert_eq!(invoice.period.to_string(), "2025-09");
}

// =============================================================================
// SECTION 2: Determinism
// =============================================================================

#[test]
fn test_repeated_runs_serialize_identically() {
    let entries: Vec<(String, String)> = (0..250)
        .map(|i| (format!("staff_{:03}", i), format!("{}.5", i % 30)))
        .collect();
    let entries: Vec<(&str, &str)> = entries
        .iter()
        .map(|(id, days)| (id.as_str(), days.as_str()))
        .collect();

    let first = serde_json::to_string(&run(&entries)).unwrap();
    for _ in 0..5 {
        assert_eq!(serde_json::to_string(&run(&entries)).unwrap(), first);
    }
}

#[test]
fn test_staff_order_does_not_change_totals() {
    let forward = run(&[("a", "7"), ("b", "13.5"), ("c", "29"), ("d", "1")]);
    let backward = run(&[("d", "1"), ("c", "29"), ("b", "13.5"), ("a", "7")]);

    assert_eq!(forward.aggregate_totals, backward.aggregate_totals);
    assert_eq!(forward.line_items, backward.line_items);
    assert_eq!(forward.summary, backward.summary);
    assert_eq!(forward.invoice_id, backward.invoice_id);
}

#[test]
fn test_invoice_json_shape() {
    let invoice = run(&[("staff_001", "24")]);
    let json: Value = serde_json::to_value(&invoice).unwrap();

    assert_eq!(json["client_id"], "acme_staffing");
    assert_eq!(json["period"]["year"], 2025);
    assert!(json["invoice_id"].as_str().is_some());
    assert_eq!(json["audit_trace"]["steps"].as_array().unwrap().len(), 4);
    assert_eq!(json["staff"][0]["audit_steps"][0]["rule_id"], "attendance_context");
}

// =============================================================================
// SECTION 3: Template Validation
// =============================================================================

#[test]
fn test_cycle_rejected_naming_both_components() {
    let (client, _, line_items) = load_sample();
    let components = ComponentTemplate::new(
        "acme_staffing-components",
        vec![
            ComponentDefinition::formula("GROSS", "BASIC + PENSION"),
            ComponentDefinition::fixed("BASIC", decimal("100000")),
            ComponentDefinition::percentage_of("PENSION", "GROSS", decimal("10")),
        ],
    );

    let result = generate_invoice(&client, &components, &line_items, &september(&[("s", "30")]));

    match result {
        Err(EngineError::Validation(error)) => {
            assert_eq!(error.cycles().len(), 1);
            assert!(error.mentions("GROSS"));
            assert!(error.mentions("PENSION"));
            assert!(error.to_string().contains("GROSS -> PENSION -> GROSS"));
        }
        other => panic!("Expected Validation error, got {:?}", other),
    }
}

#[test]
fn test_line_items_must_reference_known_components() {
    let (client, components, mut line_items) = load_sample();
    line_items.id = "broken".to_string();
    line_items.line_items[0].formula_type = LineItemFormula::ComponentSum {
        components: vec!["GROSS".to_string(), "NHF".to_string()],
    };

    let result = generate_invoice(&client, &components, &line_items, &september(&[]));

    match result {
        Err(EngineError::Validation(error)) => {
            assert_eq!(error.template_id, "broken");
            assert_eq!(
                error.issues,
                vec![ValidationIssue::DanglingReference {
                    id: "TOTAL_COST".to_string(),
                    reference: "NHF".to_string()
                }]
            );
        }
        other => panic!("Expected Validation error, got {:?}", other),
    }
}

// =============================================================================
// SECTION 4: Proration
// =============================================================================

#[test]
fn test_full_attendance_gives_full_values() {
    let invoice = run(&[("staff_001", "30")]);
    let staff = invoice.staff_breakdown("staff_001").unwrap();

    assert_money(staff.components["BASIC"], "100000");
    assert_money(staff.components["HOUSING"], "50000");
    assert_money(staff.components["GROSS"], "150000");
    assert_money(staff.components["PENSION"], "15000");
}

#[test]
fn test_no_double_proration_through_derived_components() {
    // PENSION is marked prorated too; it must still equal 10% of the
    // already-prorated GROSS.
    let (client, mut components, line_items) = load_sample();
    for component in &mut components.components {
        component.is_prorated = true;
    }

    let batch = september(&[("staff_001", "15")]);
    let invoice = generate_invoice(&client, &components, &line_items, &batch).unwrap();
    let staff = invoice.staff_breakdown("staff_001").unwrap();

    assert_money(staff.components["GROSS"], "75000");
    assert_money(staff.components["PENSION"], "7500");
}

#[test]
fn test_working_days_method_overrides_client_basis() {
    // September 2025 has 22 weekdays; 11 days => factor 0.5
    let (client, mut components, line_items) = load_sample();
    components.attendance_calculation_method = AttendanceCalculationMethod::WorkingDays;

    let batch = september(&[("staff_001", "11")]);
    let invoice = generate_invoice(&client, &components, &line_items, &batch).unwrap();
    let staff = invoice.staff_breakdown("staff_001").unwrap();

    assert_eq!(staff.attendance.basis, PayCalculationBasis::WorkingDays);
    assert_eq!(staff.attendance.total_days, 22);
    assert_money(staff.components["GROSS"], "75000");
}

#[test]
fn test_unprorated_client_pays_full_salary() {
    let (mut client, components, line_items) = load_sample();
    client.prorate_salary = false;

    let batch = september(&[("staff_001", "3")]);
    let invoice = generate_invoice(&client, &components, &line_items, &batch).unwrap();

    assert_money(invoice.aggregate_totals["GROSS"], "150000");
}

#[test]
fn test_minimum_attendance_factor_floor() {
    let (client, mut components, line_items) = load_sample();
    components.minimum_attendance_factor = decimal("0.5");

    let batch = september(&[("staff_001", "3")]);
    let invoice = generate_invoice(&client, &components, &line_items, &batch).unwrap();

    assert_money(invoice.aggregate_totals["GROSS"], "75000");
    assert!(invoice
        .audit_trace
        .warnings
        .iter()
        .any(|w| w.code == "BELOW_MINIMUM_ATTENDANCE"));
}

// =============================================================================
// SECTION 5: Error Handling
// =============================================================================

#[test]
fn test_production_mode_aborts_on_negative_attendance() {
    let (client, components, line_items) = load_sample();
    let batch = september(&[("good", "24"), ("bad", "-2")]);

    match generate_invoice(&client, &components, &line_items, &batch) {
        Err(EngineError::StaffComputation { staff_id, source }) => {
            assert_eq!(staff_id, "bad");
            assert_eq!(
                source,
                ComputationError::NegativeDaysWorked {
                    staff_id: "bad".to_string(),
                    days_worked: decimal("-2"),
                }
            );
        }
        other => panic!("Expected StaffComputation error, got {:?}", other),
    }
}

#[test]
fn test_dry_run_reports_failures_and_partial_invoice() {
    let (client, mut components, line_items) = load_sample();
    components
        .components
        .push(ComponentDefinition::formula("RATIO", "GROSS / BASIC"));

    let batch = september(&[("staff_001", "24"), ("absent", "0"), ("staff_002", "24")]);
    let report = dry_run(&client, &components, &line_items, &batch).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].staff_id, "absent");
    assert_eq!(
        report.failures[0].error,
        ComputationError::DivisionByZero {
            id: "RATIO".to_string()
        }
    );
    assert_money(report.invoice.summary.net_invoice, "292380");
}

#[test]
fn test_invalid_period_is_fatal() {
    let (client, components, line_items) = load_sample();
    let batch = AttendanceBatch {
        period: PayrollPeriod { year: 2025, month: 0 },
        entries: vec![],
    };

    assert!(matches!(
        generate_invoice(&client, &components, &line_items, &batch),
        Err(EngineError::Configuration(ConfigurationError::InvalidPeriod { month: 0, .. }))
    ));
}

// =============================================================================
// SECTION 6: Standard Template, Registry, Preview
// =============================================================================

#[test]
fn test_standard_template_with_withholding_tax() {
    let (mut client, components, _) = load_sample();
    client.wht_rate = decimal("5");
    let line_items = standard_line_item_template(&client, &["GROSS", "PENSION"]);

    let batch = september(&[("staff_001", "24"), ("staff_002", "24")]);
    let invoice = generate_invoice(&client, &components, &line_items, &batch).unwrap();

    assert_money(invoice.summary.total_cost, "264000");
    assert_money(invoice.summary.wht, "1320");
    assert_money(invoice.line_item("GROSS_INVOICE").unwrap(), "292380");
    assert_money(invoice.summary.net_invoice, "291060");
}

#[test]
fn test_registry_reproduces_old_versions() {
    let (client, components, line_items) = load_sample();
    let mut registry = TemplateRegistry::new();
    let v1 = registry.publish(components.clone()).unwrap();

    let mut raised = components;
    raised.components[0].value = Some(decimal("200000"));
    let v2 = registry.publish_revision(raised).unwrap();

    let batch = september(&[("staff_001", "30")]);
    let old = generate_invoice(&client, &registry.get(&v1.id, 1).unwrap(), &line_items, &batch)
        .unwrap();
    let new = generate_invoice(&client, &v2, &line_items, &batch).unwrap();

    assert_money(old.aggregate_totals["BASIC"], "100000");
    assert_money(new.aggregate_totals["BASIC"], "200000");
    assert_ne!(old.invoice_id, new.invoice_id);
}

#[test]
fn test_formula_preview() {
    let variables = [
        ("BASIC".to_string(), decimal("80000")),
        ("HOUSING".to_string(), decimal("40000")),
    ]
    .into_iter()
    .collect();

    assert_money(preview_formula("(BASIC + HOUSING) * 8%", &variables).unwrap(), "9600");
    assert!(matches!(
        preview_formula("BASIC + TRANSPORT", &variables),
        Err(ComputationError::UnknownVariable { .. })
    ));
    assert!(matches!(
        preview_formula("BASIC +", &variables),
        Err(ComputationError::InvalidFormula { .. })
    ));
}
