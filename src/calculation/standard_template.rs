//! The conventional invoice line-item chain.
//!
//! Most clients invoice the same way: staff cost, a management fee on that
//! cost, VAT on the fee, and withholding tax deducted from the fee. This
//! module builds that chain from a client's rates so it does not have to be
//! authored by hand.

use crate::models::{
    ClientConfiguration, InvoiceSummaryMapping, LineItemDefinition, LineItemFormula,
    LineItemTemplate,
};

/// Line-item id holding the total staff cost.
pub const TOTAL_COST: &str = "TOTAL_COST";
/// Line-item id holding the management fee.
pub const MANAGEMENT_FEE: &str = "MANAGEMENT_FEE";
/// Line-item id holding VAT on the management fee.
pub const VAT: &str = "VAT";
/// Line-item id holding withholding tax on the management fee.
pub const WHT: &str = "WHT";
/// Line-item id holding cost plus fee plus VAT.
pub const GROSS_INVOICE: &str = "GROSS_INVOICE";
/// Line-item id holding the amount invoiced.
pub const TOTAL_INVOICE: &str = "TOTAL_INVOICE";

/// Builds the standard invoice template for a client.
///
/// `cost_components` are the component ids whose totals make up the cost
/// base. Under the credit-to-bank model the caller passes the components that
/// are paid out to staff and remitted on their behalf; otherwise the gross
/// pay component. The chain is:
///
/// ```text
/// TOTAL_COST     = sum(cost_components)
/// MANAGEMENT_FEE = service_fee_percentage% of TOTAL_COST
/// VAT            = vat_rate% of MANAGEMENT_FEE
/// WHT            = wht_rate% of MANAGEMENT_FEE
/// GROSS_INVOICE  = TOTAL_COST + MANAGEMENT_FEE + VAT
/// TOTAL_INVOICE  = GROSS_INVOICE - WHT
/// ```
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::standard_line_item_template;
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
///
/// let template = standard_line_item_template(&client, &["GROSS"]);
/// assert_eq!(template.id, "acme-standard-invoice");
/// assert_eq!(template.line_items.len(), 6);
/// assert_eq!(template.summary.net_invoice, "TOTAL_INVOICE");
/// ```
pub fn standard_line_item_template<S: AsRef<str>>(
    client: &ClientConfiguration,
    cost_components: &[S],
) -> LineItemTemplate {
    let cost_label = if client.use_credit_to_bank_model {
        "Total Cost (Credit to Bank)"
    } else {
        "Total Cost"
    };

    let line_items = vec![
        LineItemDefinition::new(
            TOTAL_COST,
            LineItemFormula::ComponentSum {
                components: cost_components
                    .iter()
                    .map(|c| c.as_ref().to_string())
                    .collect(),
            },
        )
        .named(cost_label),
        LineItemDefinition::new(
            MANAGEMENT_FEE,
            LineItemFormula::PercentageOf {
                line_item: TOTAL_COST.to_string(),
                rate: client.service_fee_percentage,
            },
        )
        .named("Management Fee"),
        LineItemDefinition::new(
            VAT,
            LineItemFormula::PercentageOf {
                line_item: MANAGEMENT_FEE.to_string(),
                rate: client.vat_rate,
            },
        )
        .named("VAT on Management Fee"),
        LineItemDefinition::new(
            WHT,
            LineItemFormula::PercentageOf {
                line_item: MANAGEMENT_FEE.to_string(),
                rate: client.wht_rate,
            },
        )
        .named("Withholding Tax on Management Fee"),
        LineItemDefinition::new(
            GROSS_INVOICE,
            LineItemFormula::Sum {
                line_items: vec![
                    TOTAL_COST.to_string(),
                    MANAGEMENT_FEE.to_string(),
                    VAT.to_string(),
                ],
            },
        )
        .named("Gross Invoice"),
        LineItemDefinition::new(
            TOTAL_INVOICE,
            LineItemFormula::Subtraction {
                minuend: GROSS_INVOICE.to_string(),
                subtrahend: WHT.to_string(),
            },
        )
        .named("Total Invoice"),
    ];

    LineItemTemplate {
        id: format!("{}-standard-invoice", client.client_id),
        version: 1,
        line_items,
        summary: InvoiceSummaryMapping {
            total_cost: TOTAL_COST.to_string(),
            management_fee: Some(MANAGEMENT_FEE.to_string()),
            vat: Some(VAT.to_string()),
            wht: Some(WHT.to_string()),
            net_invoice: TOTAL_INVOICE.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculation::{
        ComponentTotals, resolve_line_items, validate_component_template,
        validate_line_item_template,
    };
    use crate::models::{ComponentDefinition, ComponentTemplate, PayCalculationBasis};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn client(wht_rate: &str, credit_to_bank: bool) -> ClientConfiguration {
        ClientConfiguration {
            client_id: "acme".to_string(),
            pay_calculation_basis: PayCalculationBasis::CalendarDays,
            service_fee_percentage: dec("10"),
            vat_rate: dec("7.5"),
            wht_rate: dec(wht_rate),
            use_credit_to_bank_model: credit_to_bank,
            prorate_salary: true,
        }
    }

    fn components() -> ComponentTemplate {
        ComponentTemplate::new(
            "acme",
            vec![
                ComponentDefinition::fixed("GROSS", dec("1")),
                ComponentDefinition::fixed("PENSION", dec("1")),
            ],
        )
    }

    #[test]
    fn test_standard_chain_with_withholding_tax() {
        let components = validate_component_template(&components()).unwrap();
        let template = standard_line_item_template(&client("5", false), &["GROSS", "PENSION"]);
        let validated = validate_line_item_template(&template, &components).unwrap();

        let totals = ComponentTotals::from([
            ("GROSS".to_string(), dec("240000")),
            ("PENSION".to_string(), dec("24000")),
        ]);
        let resolution = resolve_line_items(&validated, &totals, 1).unwrap();

        // fee 26400, VAT 1980, WHT 1320: 264000 + 26400 + 1980 - 1320
        assert_eq!(resolution.get(TOTAL_COST), Some(dec("264000")));
        assert_eq!(resolution.get(WHT), Some(dec("1320")));
        assert_eq!(resolution.get(GROSS_INVOICE), Some(dec("292380")));
        assert_eq!(resolution.get(TOTAL_INVOICE), Some(dec("291060")));
    }

    #[test]
    fn test_zero_wht_leaves_total_equal_to_gross() {
        let components = validate_component_template(&components()).unwrap();
        let template = standard_line_item_template(&client("0", false), &["GROSS"]);
        let validated = validate_line_item_template(&template, &components).unwrap();

        let totals = ComponentTotals::from([("GROSS".to_string(), dec("1000"))]);
        let resolution = resolve_line_items(&validated, &totals, 1).unwrap();
        assert_eq!(resolution.get(TOTAL_INVOICE), resolution.get(GROSS_INVOICE));
    }

    #[test]
    fn test_credit_to_bank_label() {
        let template = standard_line_item_template(&client("0", true), &["NET_PAY", "PENSION"]);
        let total_cost = template.get(TOTAL_COST).unwrap();
        assert_eq!(total_cost.display_name, "Total Cost (Credit to Bank)");
        assert_eq!(
            total_cost.formula_type.component_references(),
            vec!["NET_PAY", "PENSION"]
        );
    }

    #[test]
    fn test_summary_maps_every_field() {
        let template = standard_line_item_template(&client("5", false), &["GROSS"]);
        assert_eq!(template.summary.fields().len(), 5);
    }
}
