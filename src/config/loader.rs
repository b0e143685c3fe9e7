//! Configuration loading functionality.
//!
//! This module provides the [`ConfigLoader`] type for loading a client's
//! configuration snapshot (client settings plus both templates) from YAML
//! files or JSON documents.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::calculation::{ValidatedComponentTemplate, ValidatedLineItemTemplate, validate_templates};
use crate::error::{EngineError, EngineResult};
use crate::models::{ClientConfiguration, ComponentTemplate, LineItemTemplate};

/// Loads and provides access to one client's configuration snapshot.
///
/// # Directory Structure
///
/// ```text
/// config/acme_staffing/
/// ├── client.yaml      # Client settings (basis, fee, VAT, WHT)
/// ├── components.yaml  # Component template
/// └── line_items.yaml  # Invoice line-item template
/// ```
///
/// # Example
///
/// ```no_run
/// use payroll_engine::config::ConfigLoader;
///
/// let loader = ConfigLoader::load("./config/acme_staffing").unwrap();
/// println!("Client: {}", loader.client().client_id);
/// println!("Components: {}", loader.components().components.len());
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    client: ClientConfiguration,
    components: ComponentTemplate,
    line_items: LineItemTemplate,
}

impl ConfigLoader {
    /// Loads configuration from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the client directory (e.g., "./config/acme_staffing")
    ///
    /// # Returns
    ///
    /// Returns a `ConfigLoader` on success, or an error if:
    /// - Any required file is missing (`ConfigNotFound`)
    /// - Any file contains invalid YAML or misses a required field
    ///   (`ConfigParseError`)
    ///
    /// Loading does not validate the templates; see [`ConfigLoader::validate`].
    pub fn load<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let path = path.as_ref();

        let client = Self::load_yaml::<ClientConfiguration>(&path.join("client.yaml"))?;
        let components = Self::load_yaml::<ComponentTemplate>(&path.join("components.yaml"))?;
        let line_items = Self::load_yaml::<LineItemTemplate>(&path.join("line_items.yaml"))?;

        debug!(
            path = %path.display(),
            client_id = %client.client_id,
            component_template = %components.id,
            line_item_template = %line_items.id,
            "Loaded client configuration"
        );

        Ok(Self {
            client,
            components,
            line_items,
        })
    }

    /// Builds a loader from JSON snapshots, as handed over by a storage
    /// collaborator.
    ///
    /// # Example
    ///
    /// ```
    /// use payroll_engine::config::ConfigLoader;
    ///
    /// let loader = ConfigLoader::from_json(
    ///     r#"{"client_id": "acme", "pay_calculation_basis": "working_days",
    ///         "service_fee_percentage": "10", "vat_rate": "7.5"}"#,
    ///     r#"{"id": "acme-components", "components": [
    ///         {"id": "BASIC", "kind": {"type": "fixed_amount"}, "value": "100000"}]}"#,
    ///     r#"{"id": "acme-invoice", "line_items": [
    ///         {"id": "TOTAL", "formula_type": {"type": "component_sum", "components": ["BASIC"]}}],
    ///         "summary": {"total_cost": "TOTAL", "net_invoice": "TOTAL"}}"#,
    /// )?;
    /// assert_eq!(loader.client().client_id, "acme");
    /// assert!(loader.validate().is_ok());
    /// # Ok::<(), payroll_engine::error::EngineError>(())
    /// ```
    pub fn from_json(client: &str, components: &str, line_items: &str) -> EngineResult<Self> {
        Ok(Self {
            client: Self::parse_json(client, "client.json")?,
            components: Self::parse_json(components, "components.json")?,
            line_items: Self::parse_json(line_items, "line_items.json")?,
        })
    }

    /// Loads and parses a YAML file.
    fn load_yaml<T: DeserializeOwned>(path: &Path) -> EngineResult<T> {
        let path_str = path.display().to_string();

        let content = fs::read_to_string(path).map_err(|_| EngineError::ConfigNotFound {
            path: path_str.clone(),
        })?;

        serde_yaml::from_str(&content).map_err(|e| EngineError::ConfigParseError {
            path: path_str,
            message: e.to_string(),
        })
    }

    fn parse_json<T: DeserializeOwned>(content: &str, name: &str) -> EngineResult<T> {
        serde_json::from_str(content).map_err(|e| EngineError::ConfigParseError {
            path: name.to_string(),
            message: e.to_string(),
        })
    }

    /// Returns the client settings.
    pub fn client(&self) -> &ClientConfiguration {
        &self.client
    }

    /// Returns the component template.
    pub fn components(&self) -> &ComponentTemplate {
        &self.components
    }

    /// Returns the line-item template.
    pub fn line_items(&self) -> &LineItemTemplate {
        &self.line_items
    }

    /// Validates both templates, the line items against the components.
    pub fn validate(&self) -> EngineResult<(ValidatedComponentTemplate, ValidatedLineItemTemplate)> {
        validate_templates(&self.components, &self.line_items)
    }

    /// Consumes the loader, returning its parts.
    pub fn into_parts(self) -> (ClientConfiguration, ComponentTemplate, LineItemTemplate) {
        (self.client, self.components, self.line_items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ComponentKind, LineItemFormula, PayCalculationBasis};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn config_path() -> &'static str {
        "./config/acme_staffing"
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_load_valid_configuration() {
        let result = ConfigLoader::load(config_path());
        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());

        let loader = result.unwrap();
        assert_eq!(loader.client().client_id, "acme_staffing");
        assert_eq!(
            loader.client().pay_calculation_basis,
            PayCalculationBasis::CalendarDays
        );
        assert_eq!(loader.client().service_fee_percentage, dec("10"));
        assert_eq!(loader.client().vat_rate, dec("7.5"));
    }

    #[test]
    fn test_component_template_loaded_correctly() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let components = loader.components();

        assert_eq!(components.id, "acme_staffing-components");
        assert_eq!(components.annual_division_factor, dec("12"));

        let pension = components.get("PENSION").unwrap();
        assert_eq!(
            pension.kind,
            ComponentKind::PercentageOf {
                reference: "GROSS".to_string()
            }
        );
        assert_eq!(pension.value, Some(dec("10")));
        assert!(components.get("BASIC").unwrap().is_prorated);
    }

    #[test]
    fn test_line_item_template_loaded_correctly() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let line_items = loader.line_items();

        assert_eq!(line_items.summary.net_invoice, "TOTAL_INVOICE");
        assert_eq!(
            line_items.get("VAT").unwrap().formula_type,
            LineItemFormula::PercentageOf {
                line_item: "MANAGEMENT_FEE".to_string(),
                rate: dec("7.5"),
            }
        );
    }

    #[test]
    fn test_sample_configuration_validates() {
        let loader = ConfigLoader::load(config_path()).unwrap();
        let (components, line_items) = loader.validate().unwrap();
        assert_eq!(components.evaluation_order().last(), Some(&"PENSION"));
        assert_eq!(line_items.evaluation_order().last(), Some(&"TOTAL_INVOICE"));
    }

    #[test]
    fn test_load_missing_directory_returns_error() {
        let result = ConfigLoader::load("/nonexistent/path");

        match result {
            Err(EngineError::ConfigNotFound { path }) => {
                assert!(path.contains("client.yaml"));
            }
            _ => panic!("Expected ConfigNotFound error"),
        }
    }

    #[test]
    fn test_from_json_reports_snapshot_name_on_parse_error() {
        let result = ConfigLoader::from_json(
            r#"{"client_id": "acme", "pay_calculation_basis": "fortnightly",
                "service_fee_percentage": "10", "vat_rate": "7.5"}"#,
            "{}",
            "{}",
        );

        match result {
            Err(EngineError::ConfigParseError { path, .. }) => {
                assert_eq!(path, "client.json");
            }
            _ => panic!("Expected ConfigParseError"),
        }
    }

    #[test]
    fn test_from_json_applies_defaults() {
        let loader = ConfigLoader::from_json(
            r#"{"client_id": "acme", "pay_calculation_basis": "calendar_days",
                "service_fee_percentage": "12.5", "vat_rate": "7.5"}"#,
            r#"{"id": "c", "components": []}"#,
            r#"{"id": "l", "line_items": [],
                "summary": {"total_cost": "T", "net_invoice": "T"}}"#,
        )
        .unwrap();

        assert!(loader.client().prorate_salary);
        assert!(!loader.client().use_credit_to_bank_model);
        assert_eq!(loader.client().wht_rate, Decimal::ZERO);
        assert_eq!(loader.components().version, 1);
        assert!(loader.line_items().summary.vat.is_none());
    }
}
