//! Versioned template registry.
//!
//! Templates are immutable snapshots keyed by id and version. Editing a
//! template means publishing a new version; an invoice generated against an
//! older version can always be reproduced from the snapshot it referenced.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::models::{ComponentTemplate, LineItemTemplate};

/// A template that carries its own id and version.
pub trait VersionedTemplate {
    /// The template id, stable across versions.
    fn template_id(&self) -> &str;
    /// The version number.
    fn version(&self) -> u32;
    /// Replaces the version number.
    fn set_version(&mut self, version: u32);
}

impl VersionedTemplate for ComponentTemplate {
    fn template_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

impl VersionedTemplate for LineItemTemplate {
    fn template_id(&self) -> &str {
        &self.id
    }

    fn version(&self) -> u32 {
        self.version
    }

    fn set_version(&mut self, version: u32) {
        self.version = version;
    }
}

/// An in-memory store of immutable template versions.
///
/// Lookups hand out `Arc` snapshots, so a run keeps using the version it
/// started with even if newer versions are published meanwhile.
///
/// # Example
///
/// ```
/// use payroll_engine::config::TemplateRegistry;
/// use payroll_engine::models::{ComponentDefinition, ComponentTemplate};
/// use rust_decimal::Decimal;
///
/// let mut registry = TemplateRegistry::new();
/// let template = ComponentTemplate::new(
///     "acme",
///     vec![ComponentDefinition::fixed("BASIC", Decimal::new(100_000, 0))],
/// );
///
/// registry.publish(template.clone())?;
/// let revised = registry.publish_revision(template)?;
///
/// assert_eq!(revised.version, 2);
/// assert_eq!(registry.versions("acme"), vec![1, 2]);
/// assert_eq!(registry.latest("acme")?.version, 2);
/// # Ok::<(), payroll_engine::error::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TemplateRegistry<T> {
    templates: BTreeMap<(String, u32), Arc<T>>,
}

impl<T> Default for TemplateRegistry<T> {
    fn default() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }
}

impl<T: VersionedTemplate> TemplateRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes a template under its own id and version.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TemplateVersionExists`] if that version was
    /// already published; published versions are never replaced.
    pub fn publish(&mut self, template: T) -> EngineResult<Arc<T>> {
        let key = (template.template_id().to_string(), template.version());
        if self.templates.contains_key(&key) {
            return Err(EngineError::TemplateVersionExists {
                template_id: key.0,
                version: key.1,
            });
        }

        info!(template_id = %key.0, version = key.1, "Published template version");

        let snapshot = Arc::new(template);
        self.templates.insert(key, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Publishes a template as the next version of its id.
    pub fn publish_revision(&mut self, mut template: T) -> EngineResult<Arc<T>> {
        template.set_version(self.next_version(template.template_id())?);
        self.publish(template)
    }

    /// Returns one exact version.
    ///
    /// # Errors
    ///
    /// - [`EngineError::TemplateNotFound`] if no version of `id` exists
    /// - [`EngineError::TemplateVersionNotFound`] if `version` does not
    pub fn get(&self, id: &str, version: u32) -> EngineResult<Arc<T>> {
        if let Some(template) = self.templates.get(&(id.to_string(), version)) {
            return Ok(Arc::clone(template));
        }
        if self.versions(id).is_empty() {
            return Err(EngineError::TemplateNotFound {
                template_id: id.to_string(),
            });
        }
        Err(EngineError::TemplateVersionNotFound {
            template_id: id.to_string(),
            version,
        })
    }

    /// Returns the highest published version of `id`.
    pub fn latest(&self, id: &str) -> EngineResult<Arc<T>> {
        self.templates
            .iter()
            .rev()
            .find(|((template_id, _), _)| template_id == id)
            .map(|(_, template)| Arc::clone(template))
            .ok_or_else(|| EngineError::TemplateNotFound {
                template_id: id.to_string(),
            })
    }

    /// Returns every published version of `id`, ascending.
    pub fn versions(&self, id: &str) -> Vec<u32> {
        self.templates
            .keys()
            .filter(|(template_id, _)| template_id == id)
            .map(|(_, version)| *version)
            .collect()
    }

    /// Returns the version number the next revision of `id` will get.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VersionsExhausted`] once `u32::MAX` is taken.
    pub fn next_version(&self, id: &str) -> EngineResult<u32> {
        match self.versions(id).last() {
            None => Ok(1),
            Some(&latest) => latest.checked_add(1).ok_or_else(|| EngineError::VersionsExhausted {
                template_id: id.to_string(),
                latest,
            }),
        }
    }

    /// Returns the number of stored versions across all ids.
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Returns true if nothing has been published.
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
