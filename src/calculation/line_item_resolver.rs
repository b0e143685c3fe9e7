//! Line-item resolution against batch totals.
//!
//! Line items are evaluated once per batch, in the topological order fixed
//! at validation. Intermediate values keep full precision; [`round_money`]
//! is applied only to the figures that leave the engine.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};
use tracing::debug;

use crate::error::ComputationError;
use crate::models::{AuditStep, LineItemFormula, ResolvedLineItem};

use super::aggregate::ComponentTotals;
use super::validator::ValidatedLineItemTemplate;

/// Rounds a monetary figure to 2 decimal places, half away from zero.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::round_money;
/// use rust_decimal::Decimal;
///
/// assert_eq!(round_money(Decimal::new(10_005, 3)), Decimal::new(1_001, 2));
/// assert_eq!(round_money(Decimal::new(-10_005, 3)), Decimal::new(-1_001, 2));
/// ```
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The resolved line items of one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItemResolution {
    /// Full-precision line items, in resolution order.
    pub items: Vec<ResolvedLineItem>,
    /// One step per line item, in resolution order.
    pub audit_steps: Vec<AuditStep>,
}

impl LineItemResolution {
    /// Looks up a full-precision value by line-item id.
    pub fn get(&self, id: &str) -> Option<Decimal> {
        self.items.iter().find(|item| item.id == id).map(|item| item.value)
    }

    /// Returns the line items rounded for output.
    pub fn rounded(&self) -> Vec<ResolvedLineItem> {
        self.items
            .iter()
            .map(|item| ResolvedLineItem {
                value: round_money(item.value),
                ..item.clone()
            })
            .collect()
    }
}

/// Resolves every line item of `template` against aggregated totals.
///
/// `ComponentSum` reads from `totals`, treating absent ids as zero (an empty
/// batch has no totals). Every other kind reads already-resolved line items.
///
/// # Errors
///
/// Returns [`ComputationError::Overflow`] naming the line item whose
/// arithmetic overflowed.
pub fn resolve_line_items(
    template: &ValidatedLineItemTemplate,
    totals: &ComponentTotals,
    first_step: u32,
) -> Result<LineItemResolution, ComputationError> {
    let definitions = &template.template().line_items;
    let mut values: Vec<Decimal> = vec![Decimal::ZERO; definitions.len()];
    let mut items = Vec::with_capacity(definitions.len());
    let mut audit_steps = Vec::with_capacity(definitions.len());

    // Every reference was checked by the validator.
    let lookup = |values: &[Decimal], id: &str| -> Decimal {
        template.index_of(id).map(|i| values[i]).unwrap_or_default()
    };

    for (offset, &position) in template.order().iter().enumerate() {
        let definition = &definitions[position];
        let id = definition.id.as_str();
        let overflow = || ComputationError::Overflow { id: id.to_string() };

        let (value, input, reasoning) = match &definition.formula_type {
            LineItemFormula::ComponentSum { components } => {
                let operands: Vec<(&str, Decimal)> = components
                    .iter()
                    .map(|c| (c.as_str(), totals.get(c).copied().unwrap_or_default()))
                    .collect();
                let value = operands
                    .iter()
                    .try_fold(Decimal::ZERO, |acc, (_, v)| acc.checked_add(*v))
                    .ok_or_else(overflow)?;
                let operand_values: BTreeMap<&str, String> =
                    operands.iter().map(|(c, v)| (*c, v.to_string())).collect();
                let input = serde_json::json!({ "components": operand_values });
                let reasoning = format!("Sum of component totals {} = {}", components.join(" + "), value);
                (value, input, reasoning)
            }
            LineItemFormula::PercentageOf { line_item, rate } => {
                let base = lookup(&values, line_item);
                let value = base
                    .checked_mul(*rate)
                    .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
                    .ok_or_else(overflow)?;
                let input = serde_json::json!({
                    "line_item": line_item,
                    "base": base.to_string(),
                    "rate": rate.to_string()
                });
                let reasoning = format!("{}% of {} ({}) = {}", rate, line_item, base, value);
                (value, input, reasoning)
            }
            LineItemFormula::FixedAmount { value } => (
                *value,
                serde_json::json!({ "value": value.to_string() }),
                format!("Fixed amount {}", value),
            ),
            LineItemFormula::Sum { line_items } => {
                let value = line_items
                    .iter()
                    .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(lookup(&values, item)))
                    .ok_or_else(overflow)?;
                let input = serde_json::json!({ "line_items": line_items });
                let reasoning = format!("Sum of {} = {}", line_items.join(" + "), value);
                (value, input, reasoning)
            }
            LineItemFormula::Subtraction {
                minuend,
                subtrahend,
            } => {
                let left = lookup(&values, minuend);
                let right = lookup(&values, subtrahend);
                let value = left.checked_sub(right).ok_or_else(overflow)?;
                let input = serde_json::json!({
                    "minuend": minuend,
                    "subtrahend": subtrahend
                });
                let reasoning = format!(
                    "{} ({}) - {} ({}) = {}",
                    minuend, left, subtrahend, right, value
                );
                (value, input, reasoning)
            }
        };

        values[position] = value;
        items.push(ResolvedLineItem {
            id: definition.id.clone(),
            display_name: definition.display_name.clone(),
            value,
        });
        audit_steps.push(AuditStep {
            step_number: first_step + offset as u32,
            rule_id: format!("line_item_{}", definition.formula_type.name()),
            rule_name: definition.display_name.clone(),
            subject_id: definition.id.clone(),
            input,
            output: serde_json::json!({
                "value": value.to_string(),
                "rounded": round_money(value).to_string()
            }),
            reasoning,
        });
    }

    debug!(
        template_id = %template.template().id,
        line_items = items.len(),
        "Resolved line items"
    );

    Ok(LineItemResolution { items, audit_steps })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::{validate_component_template, validate_line_item_template};
    use crate::models::{
        ComponentDefinition, ComponentTemplate, InvoiceSummaryMapping, LineItemDefinition,
        LineItemTemplate,
    };
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn components() -> ComponentTemplate {
        ComponentTemplate::new(
            "acme",
            vec![
                ComponentDefinition::fixed("BASIC", dec("100000")).prorated(),
                ComponentDefinition::fixed("HOUSING", dec("50000")).prorated(),
                ComponentDefinition::sum_of("GROSS", vec!["BASIC", "HOUSING"]),
                ComponentDefinition::percentage_of("PENSION", "GROSS", dec("10")),
            ],
        )
    }

    fn invoice_template() -> LineItemTemplate {
        LineItemTemplate {
            id: "acme-invoice".to_string(),
            version: 1,
            line_items: vec![
                LineItemDefinition::new(
                    "TOTAL_INVOICE",
                    LineItemFormula::Sum {
                        line_items: vec![
                            "TOTAL_COST".to_string(),
                            "MANAGEMENT_FEE".to_string(),
                            "VAT".to_string(),
                        ],
                    },
                ),
                LineItemDefinition::new(
                    "VAT",
                    LineItemFormula::PercentageOf {
                        line_item: "MANAGEMENT_FEE".to_string(),
                        rate: dec("7.5"),
                    },
                ),
                LineItemDefinition::new(
                    "MANAGEMENT_FEE",
                    LineItemFormula::PercentageOf {
                        line_item: "TOTAL_COST".to_string(),
                        rate: dec("10"),
                    },
                ),
                LineItemDefinition::new(
                    "TOTAL_COST",
                    LineItemFormula::ComponentSum {
                        components: vec!["GROSS".to_string(), "PENSION".to_string()],
                    },
                ),
            ],
            summary: InvoiceSummaryMapping {
                total_cost: "TOTAL_COST".to_string(),
                management_fee: Some("MANAGEMENT_FEE".to_string()),
                vat: Some("VAT".to_string()),
                wht: None,
                net_invoice: "TOTAL_INVOICE".to_string(),
            },
        }
    }

    fn validated(template: &LineItemTemplate) -> ValidatedLineItemTemplate {
        let components = validate_component_template(&components()).unwrap();
        validate_line_item_template(template, &components).unwrap()
    }

    fn scenario_totals() -> ComponentTotals {
        ComponentTotals::from([
            ("BASIC".to_string(), dec("160000")),
            ("HOUSING".to_string(), dec("80000")),
            ("GROSS".to_string(), dec("240000")),
            ("PENSION".to_string(), dec("24000")),
        ])
    }

    #[test]
    fn test_scenario_invoice_chain() {
        let resolution = resolve_line_items(&validated(&invoice_template()), &scenario_totals(), 1)
            .unwrap();

        assert_eq!(resolution.get("TOTAL_COST"), Some(dec("264000")));
        assert_eq!(resolution.get("MANAGEMENT_FEE"), Some(dec("26400")));
        assert_eq!(resolution.get("VAT"), Some(dec("1980")));
        assert_eq!(resolution.get("TOTAL_INVOICE"), Some(dec("292380")));
    }

    #[test]
    fn test_items_in_resolution_order() {
        let resolution = resolve_line_items(&validated(&invoice_template()), &scenario_totals(), 1)
            .unwrap();
        let ids: Vec<&str> = resolution.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["TOTAL_COST", "MANAGEMENT_FEE", "VAT", "TOTAL_INVOICE"]);
        assert_eq!(resolution.audit_steps.len(), 4);
        assert_eq!(resolution.audit_steps[0].rule_id, "line_item_component_sum");
    }

    #[test]
    fn test_empty_totals_resolve_to_zero() {
        let resolution =
            resolve_line_items(&validated(&invoice_template()), &ComponentTotals::new(), 1)
                .unwrap();
        assert!(resolution.items.iter().all(|item| item.value.is_zero()));
    }

    #[test]
    fn test_intermediates_keep_full_precision() {
        let totals = ComponentTotals::from([
            ("GROSS".to_string(), dec("1000.005")),
            ("PENSION".to_string(), dec("0")),
        ]);
        let resolution =
            resolve_line_items(&validated(&invoice_template()), &totals, 1).unwrap();

        // 10% of 1000.005 is 100.0005; 7.5% of that is 7.5000375
        assert_eq!(resolution.get("MANAGEMENT_FEE"), Some(dec("100.0005")));
        assert_eq!(resolution.get("VAT"), Some(dec("7.5000375")));

        let rounded = resolution.rounded();
        let value = |id: &str| rounded.iter().find(|i| i.id == id).unwrap().value;
        assert_eq!(value("TOTAL_COST"), dec("1000.01"));
        assert_eq!(value("MANAGEMENT_FEE"), dec("100.00"));
        assert_eq!(value("VAT"), dec("7.50"));
        assert_eq!(value("TOTAL_INVOICE"), dec("1107.51"));
    }

    #[test]
    fn test_subtraction_and_fixed_amount() {
        let template = LineItemTemplate {
            id: "acme-invoice".to_string(),
            version: 1,
            line_items: vec![
                LineItemDefinition::new(
                    "TOTAL_COST",
                    LineItemFormula::ComponentSum {
                        components: vec!["GROSS".to_string()],
                    },
                ),
                LineItemDefinition::new("ADMIN", LineItemFormula::FixedAmount { value: dec("500") }),
                LineItemDefinition::new(
                    "NET",
                    LineItemFormula::Subtraction {
                        minuend: "TOTAL_COST".to_string(),
                        subtrahend: "ADMIN".to_string(),
                    },
                ),
            ],
            summary: InvoiceSummaryMapping {
                total_cost: "TOTAL_COST".to_string(),
                management_fee: None,
                vat: None,
                wht: None,
                net_invoice: "NET".to_string(),
            },
        };

        let resolution = resolve_line_items(&validated(&template), &scenario_totals(), 1).unwrap();
        assert_eq!(resolution.get("NET"), Some(dec("239500")));
    }

    #[test]
    fn test_round_money_half_away_from_zero() {
        assert_eq!(round_money(dec("2.345")), dec("2.35"));
        assert_eq!(round_money(dec("2.344")), dec("2.34"));
        assert_eq!(round_money(dec("-2.345")), dec("-2.35"));
    }
}
