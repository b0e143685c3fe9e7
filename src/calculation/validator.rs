//! Template validation.
//!
//! Validation is the gate in front of both resolvers: the resolvers only
//! accept [`ValidatedComponentTemplate`] and [`ValidatedLineItemTemplate`],
//! which can only be obtained from the functions in this module. Each check
//! runs against the whole template so that every structural problem is
//! reported at once:
//!
//! 1. every definition has a non-empty, unique id;
//! 2. kind-specific required fields are present (formulas are parsed here);
//! 3. every reference resolves to a known id;
//! 4. the reference graph over enabled definitions is acyclic.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::{EngineError, EngineResult, ValidationError, ValidationIssue};
use crate::models::{
    AuditWarning, ComponentDefinition, ComponentKind, ComponentTemplate, LineItemFormula,
    LineItemTemplate,
};

use super::formula::Formula;
use super::graph::DependencyGraph;

/// A component after validation, ready to evaluate.
#[derive(Debug, Clone)]
pub(crate) enum CompiledComponent {
    Fixed {
        value: Decimal,
        is_annual: bool,
        is_prorated: bool,
    },
    Percentage {
        rate: Decimal,
        reference: usize,
    },
    Formula {
        formula: Formula,
        references: HashMap<String, usize>,
    },
    Sum {
        references: Vec<usize>,
    },
    Disabled,
}

/// A component template that passed validation.
///
/// Holds an immutable copy of the template, the compiled form of every
/// definition, and the evaluation order.
#[derive(Debug, Clone)]
pub struct ValidatedComponentTemplate {
    template: ComponentTemplate,
    index: HashMap<String, usize>,
    compiled: Vec<CompiledComponent>,
    order: Vec<usize>,
    warnings: Vec<AuditWarning>,
}

impl ValidatedComponentTemplate {
    /// Returns the underlying template.
    pub fn template(&self) -> &ComponentTemplate {
        &self.template
    }

    /// Returns the enabled component ids in evaluation order.
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.template.components[i].id.as_str())
            .collect()
    }

    /// Returns true if the template defines `id`.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Returns true if `id` is defined and enabled.
    pub fn is_enabled(&self, id: &str) -> bool {
        self.index
            .get(id)
            .is_some_and(|&i| self.template.components[i].enabled)
    }

    /// Returns non-fatal findings, e.g. references to disabled components.
    pub fn warnings(&self) -> &[AuditWarning] {
        &self.warnings
    }

    pub(crate) fn compiled(&self) -> &[CompiledComponent] {
        &self.compiled
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }
}

/// A line-item template that passed validation against a component template.
#[derive(Debug, Clone)]
pub struct ValidatedLineItemTemplate {
    template: LineItemTemplate,
    index: HashMap<String, usize>,
    order: Vec<usize>,
    warnings: Vec<AuditWarning>,
}

impl ValidatedLineItemTemplate {
    /// Returns the underlying template.
    pub fn template(&self) -> &LineItemTemplate {
        &self.template
    }

    /// Returns the line-item ids in evaluation order.
    pub fn evaluation_order(&self) -> Vec<&str> {
        self.order
            .iter()
            .map(|&i| self.template.line_items[i].id.as_str())
            .collect()
    }

    /// Returns non-fatal findings.
    pub fn warnings(&self) -> &[AuditWarning] {
        &self.warnings
    }

    pub(crate) fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub(crate) fn order(&self) -> &[usize] {
        &self.order
    }
}

/// Checks ids for emptiness and uniqueness; returns the first-occurrence index.
fn index_ids<'a>(
    ids: impl Iterator<Item = &'a str>,
    issues: &mut Vec<ValidationIssue>,
) -> HashMap<String, usize> {
    let mut index = HashMap::new();
    let mut reported = HashSet::new();

    for (position, id) in ids.enumerate() {
        if id.trim().is_empty() {
            issues.push(ValidationIssue::MissingId { position });
            continue;
        }
        if index.contains_key(id) {
            if reported.insert(id.to_string()) {
                issues.push(ValidationIssue::DuplicateId { id: id.to_string() });
            }
            continue;
        }
        index.insert(id.to_string(), position);
    }

    index
}

fn disabled_reference_warning(id: &str, reference: &str) -> AuditWarning {
    warn!(component = %id, reference = %reference, "Reference to disabled component resolves to zero");
    AuditWarning::new(
        "DISABLED_REFERENCE",
        format!("'{}' references disabled component '{}', which resolves to zero", id, reference),
        "low",
    )
}

/// Validates a component template.
///
/// # Returns
///
/// A [`ValidatedComponentTemplate`] on success, or a [`ValidationError`]
/// listing every issue found.
///
/// # Example
///
/// ```
/// use payroll_engine::calculation::validate_component_template;
/// use payroll_engine::models::{ComponentDefinition, ComponentTemplate};
/// use rust_decimal::Decimal;
///
/// let template = ComponentTemplate::new(
///     "acme",
///     vec![
///         ComponentDefinition::formula("A", "B + 1"),
///         ComponentDefinition::formula("B", "A + 1"),
///     ],
/// );
///
/// let error = validate_component_template(&template).unwrap_err();
/// assert!(error.mentions("A") && error.mentions("B"));
/// ```
pub fn validate_component_template(
    template: &ComponentTemplate,
) -> Result<ValidatedComponentTemplate, ValidationError> {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    if template.annual_division_factor <= Decimal::ZERO {
        issues.push(ValidationIssue::InvalidSetting {
            field: "annual_division_factor".to_string(),
            message: format!("must be positive, got {}", template.annual_division_factor),
        });
    }
    if template.minimum_attendance_factor < Decimal::ZERO
        || template.minimum_attendance_factor > Decimal::ONE
    {
        issues.push(ValidationIssue::InvalidSetting {
            field: "minimum_attendance_factor".to_string(),
            message: format!(
                "must lie between 0 and 1, got {}",
                template.minimum_attendance_factor
            ),
        });
    }

    // (a) ids
    let index = index_ids(template.components.iter().map(|c| c.id.as_str()), &mut issues);

    // (b) kind-specific fields
    let mut parsed_formulas: HashMap<usize, Formula> = HashMap::new();
    for (position, component) in template.components.iter().enumerate() {
        let id = component.id.as_str();
        match &component.kind {
            ComponentKind::FixedAmount => {
                if component.value.is_none() {
                    issues.push(ValidationIssue::MissingField {
                        id: id.to_string(),
                        field: "value".to_string(),
                    });
                }
            }
            ComponentKind::PercentageOf { reference } => {
                if component.value.is_none() {
                    issues.push(ValidationIssue::MissingField {
                        id: id.to_string(),
                        field: "value".to_string(),
                    });
                }
                if reference.trim().is_empty() {
                    issues.push(ValidationIssue::MissingField {
                        id: id.to_string(),
                        field: "reference".to_string(),
                    });
                }
            }
            ComponentKind::Formula { expression } => match Formula::parse(expression) {
                Ok(formula) if formula.references().is_empty() => {
                    issues.push(ValidationIssue::EmptyReferences { id: id.to_string() });
                }
                Ok(formula) => {
                    parsed_formulas.insert(position, formula);
                }
                Err(e) => issues.push(ValidationIssue::InvalidFormula {
                    id: id.to_string(),
                    message: e.to_string(),
                }),
            },
            ComponentKind::SumOf { references } => {
                if references.is_empty() {
                    issues.push(ValidationIssue::EmptyReferences { id: id.to_string() });
                }
            }
        }
    }

    // (c) references among enabled components
    let mut graph = DependencyGraph::new(template.components.iter().map(|c| c.id.clone()).collect());
    for (position, component) in template.components.iter().enumerate() {
        if !component.enabled {
            continue;
        }
        let references: Vec<&str> = match &component.kind {
            ComponentKind::FixedAmount => vec![],
            ComponentKind::PercentageOf { reference } if reference.trim().is_empty() => vec![],
            ComponentKind::PercentageOf { reference } => vec![reference.as_str()],
            ComponentKind::Formula { .. } => parsed_formulas
                .get(&position)
                .map(|f| f.references().iter().map(String::as_str).collect())
                .unwrap_or_default(),
            ComponentKind::SumOf { references } => references.iter().map(String::as_str).collect(),
        };

        for reference in references {
            match index.get(reference) {
                None => issues.push(ValidationIssue::DanglingReference {
                    id: component.id.clone(),
                    reference: reference.to_string(),
                }),
                Some(&target) if !template.components[target].enabled => {
                    warnings.push(disabled_reference_warning(&component.id, reference));
                }
                Some(&target) => graph.add_dependency(position, target),
            }
        }
    }

    // (d) cycles
    for path in graph.find_cycles() {
        issues.push(ValidationIssue::CyclicReference { path });
    }

    if !issues.is_empty() {
        warn!(
            template_id = %template.id,
            version = template.version,
            issues = issues.len(),
            "Component template failed validation"
        );
        return Err(ValidationError {
            template_id: template.id.clone(),
            issues,
        });
    }

    let order: Vec<usize> = graph
        .topological_order()
        .map_err(|remaining| ValidationError {
            template_id: template.id.clone(),
            issues: vec![ValidationIssue::CyclicReference { path: remaining }],
        })?
        .into_iter()
        .filter(|&i| template.components[i].enabled)
        .collect();

    let compiled = template
        .components
        .iter()
        .enumerate()
        .map(|(position, component)| {
            compile_component(position, component, &index, &mut parsed_formulas)
        })
        .collect();

    debug!(
        template_id = %template.id,
        version = template.version,
        components = template.components.len(),
        "Component template validated"
    );

    Ok(ValidatedComponentTemplate {
        template: template.clone(),
        index,
        compiled,
        order,
        warnings,
    })
}

fn compile_component(
    position: usize,
    component: &ComponentDefinition,
    index: &HashMap<String, usize>,
    parsed_formulas: &mut HashMap<usize, Formula>,
) -> CompiledComponent {
    if !component.enabled {
        return CompiledComponent::Disabled;
    }
    // Validation guarantees `value` and every reference exist below.
    let value = component.value.unwrap_or_default();
    match &component.kind {
        ComponentKind::FixedAmount => CompiledComponent::Fixed {
            value,
            is_annual: component.is_annual,
            is_prorated: component.is_prorated,
        },
        ComponentKind::PercentageOf { reference } => CompiledComponent::Percentage {
            rate: value,
            reference: index[reference.as_str()],
        },
        ComponentKind::Formula { .. } => {
            let formula = parsed_formulas
                .remove(&position)
                .unwrap_or_else(|| unreachable!("formula parsed during validation"));
            let references = formula
                .references()
                .iter()
                .map(|name| (name.clone(), index[name.as_str()]))
                .collect();
            CompiledComponent::Formula {
                formula,
                references,
            }
        }
        ComponentKind::SumOf { references } => CompiledComponent::Sum {
            references: references.iter().map(|r| index[r.as_str()]).collect(),
        },
    }
}

/// Validates a line-item template against a validated component template.
///
/// `ComponentSum` operands must name components of `components`; every other
/// reference, every `depends_on` entry, and every summary field must name a
/// line item of this template.
pub fn validate_line_item_template(
    template: &LineItemTemplate,
    components: &ValidatedComponentTemplate,
) -> Result<ValidatedLineItemTemplate, ValidationError> {
    check_line_item_template(template, |id| {
        components.contains(id).then(|| components.is_enabled(id))
    })
}

/// Validates both templates of a run, reporting the issues of each.
///
/// The line-item template is checked even when the component template is
/// invalid; its component references are then resolved against the raw
/// component definitions.
///
/// # Errors
///
/// - [`EngineError::Validation`] if exactly one template is invalid
/// - [`EngineError::TemplatesInvalid`] if both are
pub fn validate_templates(
    components: &ComponentTemplate,
    line_items: &LineItemTemplate,
) -> EngineResult<(ValidatedComponentTemplate, ValidatedLineItemTemplate)> {
    match validate_component_template(components) {
        Ok(validated) => {
            let line_items = validate_line_item_template(line_items, &validated)?;
            Ok((validated, line_items))
        }
        Err(component_error) => {
            let line_item_result = check_line_item_template(line_items, |id| {
                components.get(id).map(|component| component.enabled)
            });
            match line_item_result {
                Ok(_) => Err(EngineError::Validation(component_error)),
                Err(line_item_error) => Err(EngineError::TemplatesInvalid {
                    components: component_error,
                    line_items: line_item_error,
                }),
            }
        }
    }
}

/// Line-item checks; `component_status` yields `Some(enabled)` for known
/// component ids.
fn check_line_item_template<F>(
    template: &LineItemTemplate,
    component_status: F,
) -> Result<ValidatedLineItemTemplate, ValidationError>
where
    F: Fn(&str) -> Option<bool>,
{
    let mut issues = Vec::new();
    let mut warnings = Vec::new();

    // (a) ids
    let index = index_ids(template.line_items.iter().map(|item| item.id.as_str()), &mut issues);

    // (b) kind-specific fields
    for item in &template.line_items {
        let id = item.id.as_str();
        match &item.formula_type {
            LineItemFormula::ComponentSum { components } if components.is_empty() => {
                issues.push(ValidationIssue::EmptyReferences { id: id.to_string() });
            }
            LineItemFormula::Sum { line_items } if line_items.is_empty() => {
                issues.push(ValidationIssue::EmptyReferences { id: id.to_string() });
            }
            LineItemFormula::PercentageOf { line_item, .. } if line_item.trim().is_empty() => {
                issues.push(ValidationIssue::MissingField {
                    id: id.to_string(),
                    field: "line_item".to_string(),
                });
            }
            LineItemFormula::Subtraction {
                minuend,
                subtrahend,
            } => {
                for (field, value) in [("minuend", minuend), ("subtrahend", subtrahend)] {
                    if value.trim().is_empty() {
                        issues.push(ValidationIssue::MissingField {
                            id: id.to_string(),
                            field: field.to_string(),
                        });
                    }
                }
            }
            _ => {}
        }
    }

    // (c) references
    let mut graph =
        DependencyGraph::new(template.line_items.iter().map(|item| item.id.clone()).collect());
    for (position, item) in template.line_items.iter().enumerate() {
        for component in item.formula_type.component_references() {
            match component_status(component) {
                None => issues.push(ValidationIssue::DanglingReference {
                    id: item.id.clone(),
                    reference: component.to_string(),
                }),
                Some(false) => warnings.push(disabled_reference_warning(&item.id, component)),
                Some(true) => {}
            }
        }

        for reference in item.formula_type.line_item_references() {
            if reference.trim().is_empty() {
                continue;
            }
            match index.get(reference) {
                Some(&target) => graph.add_dependency(position, target),
                None => issues.push(ValidationIssue::DanglingReference {
                    id: item.id.clone(),
                    reference: reference.to_string(),
                }),
            }
        }

        if let Some(depends_on) = &item.depends_on {
            for dependency in depends_on {
                match index.get(dependency.as_str()) {
                    Some(&target) => graph.add_dependency(position, target),
                    None if component_status(dependency).is_some() => {}
                    None => issues.push(ValidationIssue::DanglingReference {
                        id: item.id.clone(),
                        reference: dependency.clone(),
                    }),
                }
            }

            let used = item
                .formula_type
                .line_item_references()
                .into_iter()
                .chain(item.formula_type.component_references());
            for reference in used {
                if !reference.trim().is_empty() && !depends_on.iter().any(|d| d == reference) {
                    issues.push(ValidationIssue::UndeclaredDependency {
                        id: item.id.clone(),
                        reference: reference.to_string(),
                    });
                }
            }
        }
    }

    for (field, reference) in template.summary.fields() {
        if !index.contains_key(reference) {
            issues.push(ValidationIssue::UnknownSummaryLineItem {
                field: field.to_string(),
                reference: reference.to_string(),
            });
        }
    }

    // (d) cycles
    for path in graph.find_cycles() {
        issues.push(ValidationIssue::CyclicReference { path });
    }

    if !issues.is_empty() {
        warn!(
            template_id = %template.id,
            version = template.version,
            issues = issues.len(),
            "Line-item template failed validation"
        );
        return Err(ValidationError {
            template_id: template.id.clone(),
            issues,
        });
    }

    let order = graph.topological_order().map_err(|remaining| ValidationError {
        template_id: template.id.clone(),
        issues: vec![ValidationIssue::CyclicReference { path: remaining }],
    })?;

    debug!(
        template_id = %template.id,
        version = template.version,
        line_items = template.line_items.len(),
        "Line-item template validated"
    );

    Ok(ValidatedLineItemTemplate {
        template: template.clone(),
        index,
        order,
        warnings,
    })
}
