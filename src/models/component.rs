//! Component template models.
//!
//! A component template is a client's declarative pay structure: an ordered
//! list of salary and deduction components that may reference each other.
//! Templates are versioned snapshots; a new version never mutates an old one.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PayCalculationBasis;

/// How a component's value is derived.
///
/// Serialized as an internally tagged object, e.g.
/// `{"type": "percentage_of", "reference": "GROSS"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ComponentKind {
    /// A fixed monthly (or annual) amount taken from `value`.
    FixedAmount,
    /// `value` percent of another component.
    PercentageOf {
        /// The id of the component the percentage applies to.
        reference: String,
    },
    /// An arithmetic expression over other components.
    Formula {
        /// The expression, e.g. `(BASIC + HOUSING) * 8%`.
        expression: String,
    },
    /// The sum of other components.
    SumOf {
        /// The ids of the summed components.
        references: Vec<String>,
    },
}

impl ComponentKind {
    /// Returns the snake_case name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            ComponentKind::FixedAmount => "fixed_amount",
            ComponentKind::PercentageOf { .. } => "percentage_of",
            ComponentKind::Formula { .. } => "formula",
            ComponentKind::SumOf { .. } => "sum_of",
        }
    }
}

/// One named entry in a component template.
///
/// # Example
///
/// ```
/// use payroll_engine::models::ComponentDefinition;
/// use rust_decimal::Decimal;
///
/// let basic = ComponentDefinition::fixed("BASIC", Decimal::new(100_000, 0)).prorated();
/// let pension = ComponentDefinition::percentage_of("PENSION", "GROSS", Decimal::new(10, 0));
///
/// assert!(basic.is_prorated);
/// assert_eq!(pension.value, Some(Decimal::new(10, 0)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Unique id within the template; used in references and formulas.
    pub id: String,
    /// Human-readable name.
    #[serde(default)]
    pub display_name: String,
    /// How the value is derived.
    pub kind: ComponentKind,
    /// Fixed amount or percentage rate, depending on `kind`.
    #[serde(default)]
    pub value: Option<Decimal>,
    /// `value` is annual and is divided by the template's division factor.
    #[serde(default)]
    pub is_annual: bool,
    /// The base value is scaled by the staff member's attendance factor.
    #[serde(default)]
    pub is_prorated: bool,
    /// Disabled components evaluate to zero.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ComponentDefinition {
    fn new(id: impl Into<String>, kind: ComponentKind, value: Option<Decimal>) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            kind,
            value,
            is_annual: false,
            is_prorated: false,
            enabled: true,
        }
    }

    /// A fixed monthly amount.
    pub fn fixed(id: impl Into<String>, value: Decimal) -> Self {
        Self::new(id, ComponentKind::FixedAmount, Some(value))
    }

    /// `rate` percent of `reference`.
    pub fn percentage_of(id: impl Into<String>, reference: impl Into<String>, rate: Decimal) -> Self {
        Self::new(
            id,
            ComponentKind::PercentageOf {
                reference: reference.into(),
            },
            Some(rate),
        )
    }

    /// An arithmetic expression over other components.
    pub fn formula(id: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::new(
            id,
            ComponentKind::Formula {
                expression: expression.into(),
            },
            None,
        )
    }

    /// The sum of other components.
    pub fn sum_of<S: Into<String>>(id: impl Into<String>, references: Vec<S>) -> Self {
        Self::new(
            id,
            ComponentKind::SumOf {
                references: references.into_iter().map(Into::into).collect(),
            },
            None,
        )
    }

    /// Marks the component as prorated by attendance.
    pub fn prorated(mut self) -> Self {
        self.is_prorated = true;
        self
    }

    /// Marks the component's value as an annual figure.
    pub fn annual(mut self) -> Self {
        self.is_annual = true;
        self
    }

    /// Disables the component.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Sets the display name.
    pub fn named(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }
}

/// Which day count the attendance factor is computed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceCalculationMethod {
    /// Use the client's `pay_calculation_basis`.
    #[default]
    ClientBasis,
    /// Always count calendar days.
    CalendarDays,
    /// Always count Monday-to-Friday days.
    WorkingDays,
}

impl AttendanceCalculationMethod {
    /// Resolves the method against a client's basis.
    pub fn basis(self, client_basis: PayCalculationBasis) -> PayCalculationBasis {
        match self {
            AttendanceCalculationMethod::ClientBasis => client_basis,
            AttendanceCalculationMethod::CalendarDays => PayCalculationBasis::CalendarDays,
            AttendanceCalculationMethod::WorkingDays => PayCalculationBasis::WorkingDays,
        }
    }
}

/// A client's versioned component template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentTemplate {
    /// Template id, stable across versions.
    pub id: String,
    /// Version number; each edit publishes a new one.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Divisor applied to annual components (commonly 12).
    #[serde(default = "default_annual_division_factor")]
    pub annual_division_factor: Decimal,
    /// Floor applied to the attendance factor.
    #[serde(default)]
    pub minimum_attendance_factor: Decimal,
    /// Which day count attendance is measured against.
    #[serde(default)]
    pub attendance_calculation_method: AttendanceCalculationMethod,
    /// The component definitions, in template order.
    pub components: Vec<ComponentDefinition>,
}

fn default_version() -> u32 {
    1
}

fn default_annual_division_factor() -> Decimal {
    Decimal::new(12, 0)
}

impl ComponentTemplate {
    /// Creates a version-1 template with default settings.
    pub fn new(id: impl Into<String>, components: Vec<ComponentDefinition>) -> Self {
        Self {
            id: id.into(),
            version: default_version(),
            annual_division_factor: default_annual_division_factor(),
            minimum_attendance_factor: Decimal::ZERO,
            attendance_calculation_method: AttendanceCalculationMethod::default(),
            components,
        }
    }

    /// Looks up a definition by id.
    pub fn get(&self, id: &str) -> Option<&ComponentDefinition> {
        self.components.iter().find(|c| c.id == id)
    }
}
