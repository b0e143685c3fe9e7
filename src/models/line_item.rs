//! Export/invoice line-item template models.
//!
//! Line items are evaluated once per batch against the aggregated component
//! totals. They form their own dependency chain (total cost, then management
//! fee, then VAT, then the invoice total).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a line item's value is derived.
///
/// Serialized as an internally tagged object, e.g.
/// `{"type": "percentage_of", "line_item": "TOTAL_COST", "rate": "10"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LineItemFormula {
    /// The sum of one or more aggregated component totals.
    ComponentSum {
        /// The component ids to sum.
        components: Vec<String>,
    },
    /// `rate` percent of another line item.
    PercentageOf {
        /// The line item the percentage applies to.
        line_item: String,
        /// The rate, in percent.
        rate: Decimal,
    },
    /// A constant amount.
    FixedAmount {
        /// The amount.
        value: Decimal,
    },
    /// The sum of other line items.
    Sum {
        /// The summed line items.
        line_items: Vec<String>,
    },
    /// One line item minus another.
    Subtraction {
        /// The line item subtracted from.
        minuend: String,
        /// The line item subtracted.
        subtrahend: String,
    },
}

impl LineItemFormula {
    /// Returns the line items this formula reads.
    pub fn line_item_references(&self) -> Vec<&str> {
        match self {
            LineItemFormula::ComponentSum { .. } | LineItemFormula::FixedAmount { .. } => vec![],
            LineItemFormula::PercentageOf { line_item, .. } => vec![line_item.as_str()],
            LineItemFormula::Sum { line_items } => line_items.iter().map(String::as_str).collect(),
            LineItemFormula::Subtraction {
                minuend,
                subtrahend,
            } => vec![minuend.as_str(), subtrahend.as_str()],
        }
    }

    /// Returns the aggregated components this formula reads.
    pub fn component_references(&self) -> Vec<&str> {
        match self {
            LineItemFormula::ComponentSum { components } => {
                components.iter().map(String::as_str).collect()
            }
            _ => vec![],
        }
    }

    /// Returns the snake_case name of the formula type.
    pub fn name(&self) -> &'static str {
        match self {
            LineItemFormula::ComponentSum { .. } => "component_sum",
            LineItemFormula::PercentageOf { .. } => "percentage_of",
            LineItemFormula::FixedAmount { .. } => "fixed_amount",
            LineItemFormula::Sum { .. } => "sum",
            LineItemFormula::Subtraction { .. } => "subtraction",
        }
    }
}

/// One named figure in an invoice template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemDefinition {
    /// Unique id within the template.
    pub id: String,
    /// Human-readable name, e.g. "VAT on Management Fee".
    #[serde(default)]
    pub display_name: String,
    /// How the value is derived.
    pub formula_type: LineItemFormula,
    /// Optional explicit dependency list, checked against `formula_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
}

impl LineItemDefinition {
    /// Creates a line item whose display name equals its id.
    pub fn new(id: impl Into<String>, formula_type: LineItemFormula) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            formula_type,
            depends_on: None,
        }
    }

    /// Sets the display name.
    pub fn named(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    /// Sets an explicit dependency list.
    pub fn depending_on<S: Into<String>>(mut self, ids: Vec<S>) -> Self {
        self.depends_on = Some(ids.into_iter().map(Into::into).collect());
        self
    }
}

/// Names the line items that hold the totals every consumer needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceSummaryMapping {
    /// Line item holding the total staff cost.
    pub total_cost: String,
    /// Line item holding the management/service fee.
    #[serde(default)]
    pub management_fee: Option<String>,
    /// Line item holding VAT.
    #[serde(default)]
    pub vat: Option<String>,
    /// Line item holding withholding tax.
    #[serde(default)]
    pub wht: Option<String>,
    /// Line item holding the amount the client is invoiced.
    pub net_invoice: String,
}

impl InvoiceSummaryMapping {
    /// Returns `(field, line_item_id)` for every mapped field.
    pub fn fields(&self) -> Vec<(&'static str, &str)> {
        let mut fields = vec![("total_cost", self.total_cost.as_str())];
        if let Some(id) = &self.management_fee {
            fields.push(("management_fee", id.as_str()));
        }
        if let Some(id) = &self.vat {
            fields.push(("vat", id.as_str()));
        }
        if let Some(id) = &self.wht {
            fields.push(("wht", id.as_str()));
        }
        fields.push(("net_invoice", self.net_invoice.as_str()));
        fields
    }
}

/// A client's versioned export/invoice template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItemTemplate {
    /// Template id, stable across versions.
    pub id: String,
    /// Version number.
    #[serde(default = "default_version")]
    pub version: u32,
    /// The line items, in template order.
    pub line_items: Vec<LineItemDefinition>,
    /// Which line items feed the invoice summary.
    pub summary: InvoiceSummaryMapping,
}

fn default_version() -> u32 {
    1
}

impl LineItemTemplate {
    /// Looks up a line item by id.
    pub fn get(&self, id: &str) -> Option<&LineItemDefinition> {
        self.line_items.iter().find(|item| item.id == id)
    }
}
