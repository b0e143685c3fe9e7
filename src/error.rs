//! Error types for the payroll calculation engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate.
//! Three kinds of failure are distinguished:
//!
//! - [`ValidationError`]: a template is structurally broken (missing field,
//!   dangling reference, cycle). Always fatal to the run, detected before any
//!   computation starts, and lists every issue found.
//! - [`ComputationError`]: a single staff record (or the invoice line items)
//!   could not be evaluated. Fatal to that record.
//! - [`ConfigurationError`]: the calling collaborator supplied an impossible
//!   setup (invalid period, zero total days). Always fatal.
//!
//! [`EngineError`] wraps all of them together with configuration-file and
//! template-registry failures.

use rust_decimal::Decimal;
use thiserror::Error;

/// A single structural problem found while validating a template.
///
/// Every variant carries the id of the offending definition so that an
/// administrator can be pointed at the exact entry to fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    /// A definition has an empty id.
    #[error("Definition at position {position} has an empty id")]
    MissingId {
        /// Zero-based position of the definition within the template.
        position: usize,
    },

    /// Two or more definitions share the same id.
    #[error("Duplicate id '{id}'")]
    DuplicateId {
        /// The repeated id.
        id: String,
    },

    /// A field required by the definition's kind is absent.
    #[error("'{id}' is missing required field '{field}'")]
    MissingField {
        /// The id of the incomplete definition.
        id: String,
        /// The name of the missing field.
        field: String,
    },

    /// A `Formula`/`SumOf`/`Sum`/`ComponentSum` definition references nothing.
    #[error("'{id}' must reference at least one other entry")]
    EmptyReferences {
        /// The id of the definition.
        id: String,
    },

    /// A reference names an id that does not exist.
    #[error("'{id}' references unknown id '{reference}'")]
    DanglingReference {
        /// The id of the referencing definition.
        id: String,
        /// The unknown id.
        reference: String,
    },

    /// A formula reference is missing from an explicit `depends_on` list.
    #[error("'{id}' uses '{reference}' but does not declare it in depends_on")]
    UndeclaredDependency {
        /// The id of the line item.
        id: String,
        /// The reference absent from `depends_on`.
        reference: String,
    },

    /// A formula expression could not be parsed.
    #[error("Invalid formula for '{id}': {message}")]
    InvalidFormula {
        /// The id of the formula component.
        id: String,
        /// A description of the parse failure.
        message: String,
    },

    /// The reference graph contains a cycle.
    #[error("Cyclic reference: {}", .path.join(" -> "))]
    CyclicReference {
        /// The cycle, starting and ending with the same id.
        path: Vec<String>,
    },

    /// The invoice summary mapping names a line item that does not exist.
    #[error("Summary field '{field}' references unknown line item '{reference}'")]
    UnknownSummaryLineItem {
        /// The summary field (e.g. "total_cost").
        field: String,
        /// The unknown line-item id.
        reference: String,
    },

    /// A template-level setting is out of range.
    #[error("Invalid template setting '{field}': {message}")]
    InvalidSetting {
        /// The setting name.
        field: String,
        /// Why the value was rejected.
        message: String,
    },
}

impl ValidationIssue {
    /// Returns every definition id this issue points at.
    pub fn ids(&self) -> Vec<&str> {
        match self {
            ValidationIssue::MissingId { .. } | ValidationIssue::InvalidSetting { .. } => vec![],
            ValidationIssue::DuplicateId { id }
            | ValidationIssue::MissingField { id, .. }
            | ValidationIssue::EmptyReferences { id }
            | ValidationIssue::InvalidFormula { id, .. } => vec![id.as_str()],
            ValidationIssue::DanglingReference { id, reference }
            | ValidationIssue::UndeclaredDependency { id, reference } => {
                vec![id.as_str(), reference.as_str()]
            }
            ValidationIssue::CyclicReference { path } => path.iter().map(String::as_str).collect(),
            ValidationIssue::UnknownSummaryLineItem { reference, .. } => vec![reference.as_str()],
        }
    }
}

/// All structural problems found in one template.
///
/// Validation always runs to completion, so `issues` holds every problem in
/// the template rather than just the first one encountered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "Template '{template_id}' failed validation with {} issue(s): {}",
    .issues.len(),
    join_issues(.issues)
)]
pub struct ValidationError {
    /// The id of the template that failed validation.
    pub template_id: String,
    /// Every issue found, in check order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    /// Returns true if any issue points at the given id.
    pub fn mentions(&self, id: &str) -> bool {
        self.issues.iter().any(|issue| issue.ids().contains(&id))
    }

    /// Returns the cycle paths reported by this error.
    pub fn cycles(&self) -> Vec<&[String]> {
        self.issues
            .iter()
            .filter_map(|issue| match issue {
                ValidationIssue::CyclicReference { path } => Some(path.as_slice()),
                _ => None,
            })
            .collect()
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A failure while evaluating one staff record or the invoice line items.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComputationError {
    /// A formula divided by zero.
    #[error("Division by zero while evaluating '{id}'")]
    DivisionByZero {
        /// The id of the component or line item being evaluated.
        id: String,
    },

    /// A formula expression could not be parsed.
    #[error("Unparseable formula for '{id}': {message}")]
    InvalidFormula {
        /// The id of the component being evaluated.
        id: String,
        /// A description of the parse failure.
        message: String,
    },

    /// A formula referenced a name that has no value.
    #[error("'{id}' references '{name}' which has no value")]
    UnknownVariable {
        /// The id of the expression being evaluated.
        id: String,
        /// The unresolved name.
        name: String,
    },

    /// An attendance record reported negative days worked.
    #[error("Staff '{staff_id}' has negative days worked: {days_worked}")]
    NegativeDaysWorked {
        /// The staff member.
        staff_id: String,
        /// The reported value.
        days_worked: Decimal,
    },

    /// A decimal operation exceeded the representable range.
    #[error("Arithmetic overflow while evaluating '{id}'")]
    Overflow {
        /// The id of the component or line item being evaluated.
        id: String,
    },
}

/// A defect in the configuration supplied by the calling collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The payroll period does not name a real month.
    #[error("Invalid payroll period: year {year}, month {month}")]
    InvalidPeriod {
        /// The year supplied.
        year: i32,
        /// The month supplied.
        month: u32,
    },

    /// The pay basis produced zero total days for the period.
    #[error("Pay basis '{basis}' yields zero total days for period {period}")]
    ZeroTotalDays {
        /// The pay basis in use.
        basis: String,
        /// The period, formatted as YYYY-MM.
        period: String,
    },

    /// An attendance record belongs to a different period than the run.
    #[error("Attendance for staff '{staff_id}' is for period {actual}, expected {expected}")]
    PeriodMismatch {
        /// The staff member.
        staff_id: String,
        /// The period of the run.
        expected: String,
        /// The period on the record.
        actual: String,
    },
}

/// The main error type for the payroll calculation engine.
///
/// # Example
///
/// ```
/// use payroll_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/client.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/client.yaml");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path (or snapshot name) that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// A template failed structural validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Both templates of a run failed structural validation.
    #[error("{components}; {line_items}")]
    TemplatesInvalid {
        /// Issues in the component template.
        components: ValidationError,
        /// Issues in the line-item template.
        line_items: ValidationError,
    },

    /// The calling collaborator supplied an impossible configuration.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Evaluation of one staff member's record failed.
    #[error("Computation failed for staff '{staff_id}': {source}")]
    StaffComputation {
        /// The staff member whose record failed.
        staff_id: String,
        /// The underlying failure.
        #[source]
        source: ComputationError,
    },

    /// Evaluation of the invoice line items failed.
    #[error("Line item resolution failed: {0}")]
    LineItemComputation(#[source] ComputationError),

    /// A template version was published twice.
    #[error("Template '{template_id}' version {version} already exists")]
    TemplateVersionExists {
        /// The template id.
        template_id: String,
        /// The version that already exists.
        version: u32,
    },

    /// No version of the requested template exists.
    #[error("Template not found: {template_id}")]
    TemplateNotFound {
        /// The template id.
        template_id: String,
    },

    /// The requested version of a template does not exist.
    #[error("Template '{template_id}' has no version {version}")]
    TemplateVersionNotFound {
        /// The template id.
        template_id: String,
        /// The missing version.
        version: u32,
    },

    /// A template already holds the highest representable version.
    #[error("Template '{template_id}' has no version after {latest}")]
    VersionsExhausted {
        /// The template id.
        template_id: String,
        /// The highest published version.
        latest: u32,
    },
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
