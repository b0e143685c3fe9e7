//! Component graph resolution.
//!
//! Evaluates a validated component template for one staff member. Components
//! are visited in the topological order fixed at validation time, so every
//! reference is resolved before it is read.
//!
//! Proration happens exactly once, at `FixedAmount` leaves. Derived
//! components (`PercentageOf`, `Formula`, `SumOf`) read already-prorated
//! values and are never scaled again.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::ComputationError;
use crate::models::{AttendanceContext, AuditStep};

use super::validator::{CompiledComponent, ValidatedComponentTemplate};

/// The resolved components of one staff member.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentResolution {
    /// The staff member.
    pub staff_id: String,
    /// Component id to full-precision value; disabled components are zero.
    pub values: BTreeMap<String, Decimal>,
    /// One step per enabled component, in evaluation order.
    pub audit_steps: Vec<AuditStep>,
}

fn overflow(id: &str) -> ComputationError {
    ComputationError::Overflow { id: id.to_string() }
}

/// Resolves every component of `template` for one staff member.
///
/// # Arguments
///
/// * `template` - The validated component template
/// * `attendance` - The staff member's attendance context
/// * `first_step` - The step number of the first audit step produced
///
/// # Errors
///
/// Returns a [`ComputationError`] naming the failing component on division
/// by zero or decimal overflow.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::{resolve_components, validate_component_template};
/// use payroll_engine::models::{
///     AttendanceContext, ComponentDefinition, ComponentTemplate, PayCalculationBasis,
/// };
/// use rust_decimal::Decimal;
///
/// let template = ComponentTemplate::new(
///     "acme",
///     vec![
///         ComponentDefinition::fixed("BASIC", Decimal::new(100_000, 0)).prorated(),
///         ComponentDefinition::percentage_of("PENSION", "BASIC", Decimal::new(10, 0)),
///     ],
/// );
/// let validated = validate_component_template(&template).unwrap();
///
/// let mut attendance = AttendanceContext::full("staff_001", PayCalculationBasis::CalendarDays, 30);
/// attendance.attendance_factor = Decimal::new(8, 1);
///
/// let resolution = resolve_components(&validated, &attendance, 1).unwrap();
/// assert_eq!(resolution.values["BASIC"], Decimal::new(80_000, 0));
/// assert_eq!(resolution.values["PENSION"], Decimal::new(8_000, 0));
/// ```
pub fn resolve_components(
    template: &ValidatedComponentTemplate,
    attendance: &AttendanceContext,
    first_step: u32,
) -> Result<ComponentResolution, ComputationError> {
    let definitions = &template.template().components;
    let compiled = template.compiled();
    let division_factor = template.template().annual_division_factor;
    let factor = attendance.attendance_factor;

    let mut values = vec![Decimal::ZERO; definitions.len()];
    let mut audit_steps = Vec::with_capacity(template.order().len());

    for (offset, &position) in template.order().iter().enumerate() {
        let definition = &definitions[position];
        let id = definition.id.as_str();

        let (value, input, reasoning) = match &compiled[position] {
            CompiledComponent::Fixed {
                value,
                is_annual,
                is_prorated,
            } => {
                let base = if *is_annual {
                    value.checked_div(division_factor).ok_or_else(|| overflow(id))?
                } else {
                    *value
                };
                let result = if *is_prorated {
                    base.checked_mul(factor).ok_or_else(|| overflow(id))?
                } else {
                    base
                };
                let reasoning = match (*is_annual, *is_prorated) {
                    (true, true) => format!(
                        "{} / {} x attendance {} = {}",
                        value, division_factor, factor.normalize(), result
                    ),
                    (true, false) => format!("{} / {} = {}", value, division_factor, result),
                    (false, true) => format!(
                        "{} x attendance {} = {}",
                        value, factor.normalize(), result
                    ),
                    (false, false) => format!("Fixed amount {}", result),
                };
                let input = serde_json::json!({
                    "value": value.to_string(),
                    "is_annual": is_annual,
                    "is_prorated": is_prorated,
                    "attendance_factor": factor.normalize().to_string()
                });
                (result, input, reasoning)
            }
            CompiledComponent::Percentage { rate, reference } => {
                let base = values[*reference];
                let result = rate
                    .checked_mul(base)
                    .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
                    .ok_or_else(|| overflow(id))?;
                let reference_id = &definitions[*reference].id;
                let input = serde_json::json!({
                    "rate": rate.to_string(),
                    "reference": reference_id,
                    "base": base.to_string()
                });
                let reasoning = format!("{}% of {} ({}) = {}", rate, reference_id, base, result);
                (result, input, reasoning)
            }
            CompiledComponent::Formula {
                formula,
                references,
            } => {
                let result = formula
                    .evaluate(|name| references.get(name).map(|&i| values[i]))
                    .map_err(|e| e.into_computation_error(id))?;
                let operands: BTreeMap<&str, String> = references
                    .iter()
                    .map(|(name, &i)| (name.as_str(), values[i].to_string()))
                    .collect();
                let input = serde_json::json!({
                    "expression": formula.source(),
                    "operands": operands
                });
                let reasoning = format!("{} = {}", formula.source(), result);
                (result, input, reasoning)
            }
            CompiledComponent::Sum { references } => {
                let result = references
                    .iter()
                    .try_fold(Decimal::ZERO, |acc, &i| acc.checked_add(values[i]))
                    .ok_or_else(|| overflow(id))?;
                let operands: Vec<&str> = references
                    .iter()
                    .map(|&i| definitions[i].id.as_str())
                    .collect();
                let input = serde_json::json!({ "references": operands });
                let reasoning = format!("Sum of {} = {}", operands.join(" + "), result);
                (result, input, reasoning)
            }
            // Disabled components never appear in the evaluation order.
            CompiledComponent::Disabled => continue,
        };

        values[position] = value;
        audit_steps.push(AuditStep {
            step_number: first_step + offset as u32,
            rule_id: format!("component_{}", definition.kind.name()),
            rule_name: definition.display_name.clone(),
            subject_id: id.to_string(),
            input,
            output: serde_json::json!({ "value": value.to_string() }),
            reasoning,
        });
    }

    debug!(
        staff_id = %attendance.staff_id,
        components = definitions.len(),
        attendance_factor = %attendance.attendance_factor,
        "Resolved components"
    );

    Ok(ComponentResolution {
        staff_id: attendance.staff_id.clone(),
        values: definitions
            .iter()
            .zip(values)
            .map(|(definition, value)| (definition.id.clone(), value))
            .collect(),
        audit_steps,
    })
}
