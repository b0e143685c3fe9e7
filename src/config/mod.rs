//! Configuration loading and template versioning.
//!
//! This module provides functionality to load a client's configuration
//! snapshot (client settings, component template, line-item template) from
//! YAML files or JSON documents, and a registry of immutable template
//! versions.
//!
//! # Example
//!
//! ```no_run
//! use payroll_engine::config::ConfigLoader;
//!
//! let config = ConfigLoader::load("./config/acme_staffing").unwrap();
//! println!("Loaded client: {}", config.client().client_id);
//! ```

mod loader;
mod registry;

pub use loader::ConfigLoader;
pub use registry::{TemplateRegistry, VersionedTemplate};
