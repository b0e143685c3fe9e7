//! Audit trail models.
//!
//! Every stage of a payroll run records the decisions it made as
//! [`AuditStep`]s, and flags suspicious-but-legal input as
//! [`AuditWarning`]s, so a generated invoice can be explained line by line.

use serde::{Deserialize, Serialize};

/// A single step in the audit trace recording a calculation decision.
///
/// Each step captures the input, output, and reasoning for one evaluated
/// node (an attendance context, a component, or a line item).
///
/// # Example
///
/// ```
/// use payroll_engine::models::AuditStep;
///
/// let step = AuditStep {
///     step_number: 1,
///     rule_id: "component_resolution".to_string(),
///     rule_name: "Basic Salary".to_string(),
///     subject_id: "BASIC".to_string(),
///     input: serde_json::json!({ "value": "100000" }),
///     output: serde_json::json!({ "result": "80000" }),
///     reasoning: "100000 x 0.8 = 80000".to_string(),
/// };
/// assert_eq!(step.subject_id, "BASIC");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditStep {
    /// The sequential step number.
    pub step_number: u32,
    /// The identifier of the rule that was applied.
    pub rule_id: String,
    /// The human-readable name of the rule or node.
    pub rule_name: String,
    /// The id of the component, line item, or staff member this step is about.
    pub subject_id: String,
    /// The input data for this step.
    pub input: serde_json::Value,
    /// The output data from this step.
    pub output: serde_json::Value,
    /// Human-readable explanation of the decision.
    pub reasoning: String,
}

/// A warning generated during calculation.
///
/// Warnings indicate potential issues that don't prevent calculation
/// but may require attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditWarning {
    /// A code identifying the type of warning.
    pub code: String,
    /// A human-readable description of the warning.
    pub message: String,
    /// The severity level (e.g., "low", "medium", "high").
    pub severity: String,
}

impl AuditWarning {
    /// Creates a new warning.
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        severity: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            severity: severity.into(),
        }
    }
}

/// The batch-level audit trace for a generated invoice.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuditTrace {
    /// The sequence of batch-level calculation steps.
    pub steps: Vec<AuditStep>,
    /// Any warnings generated during validation or calculation.
    pub warnings: Vec<AuditWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_step_serializes_all_fields() {
        let step = AuditStep {
            step_number: 3,
            rule_id: "line_item_resolution".to_string(),
            rule_name: "Management Fee".to_string(),
            subject_id: "MANAGEMENT_FEE".to_string(),
            input: serde_json::json!({ "base": "264000" }),
            output: serde_json::json!({ "result": "26400" }),
            reasoning: "10% of 264000".to_string(),
        };

        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["step_number"], 3);
        assert_eq!(json["subject_id"], "MANAGEMENT_FEE");
        assert_eq!(json["output"]["result"], "26400");
    }

    #[test]
    fn test_audit_warning_new() {
        let warning = AuditWarning::new("ATTENDANCE_CAPPED", "capped to 30 days", "medium");
        assert_eq!(warning.code, "ATTENDANCE_CAPPED");
        assert_eq!(warning.severity, "medium");
    }

    #[test]
    fn test_audit_trace_default_is_empty() {
        let trace = AuditTrace::default();
        assert!(trace.steps.is_empty());
        assert!(trace.warnings.is_empty());
    }
}
