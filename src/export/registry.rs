//! Exporter factory with feature-based registration.
use std::collections::HashMap;

use crate::error::{BatconError, Result};
use crate::export::{Exporter, JsonExporter};

#[cfg(feature = "storage_csv")]
use crate::export::CsvExporter;

type ExporterFactory = Box<dyn Fn() -> Box<dyn Exporter> + Send + Sync>;

/// Maps format names to exporter constructors.
///
/// Built-in exporters are registered according to enabled Cargo features;
/// callers may add their own at runtime.
///
/// # Examples
///
/// ```
/// use batcon::export::ExporterRegistry;
///
/// let registry = ExporterRegistry::new();
/// assert!(registry.is_available("json"));
/// let exporter = registry.create("json")?;
/// assert_eq!(exporter.format_name(), "json");
/// # Ok::<(), batcon::BatconError>(())
/// ```
pub struct ExporterRegistry {
    factories: HashMap<String, ExporterFactory>,
}

impl Default for ExporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExporterRegistry {
    /// Registry pre-populated with every exporter compiled into this build.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register("json", || Box::new(JsonExporter::new()));

        #[cfg(feature = "storage_csv")]
        {
            registry.register("csv", || Box::new(CsvExporter::new()));
            registry.register("tsv", || Box::new(CsvExporter::tsv()));
        }

        registry
    }

    /// Add or replace the factory for `format`.
    pub fn register<F>(&mut self, format: &str, factory: F)
    where
        F: Fn() -> Box<dyn Exporter> + Send + Sync + 'static,
    {
        self.factories.insert(format.to_string(), Box::new(factory));
    }

    /// Instantiate the exporter registered for `format`.
    pub fn create(&self, format: &str) -> Result<Box<dyn Exporter>> {
        self.factories
            .get(format)
            .map(|factory| factory())
            .ok_or_else(|| {
                BatconError::Export(format!(
                    "Unsupported export format: '{}'. Available formats: [{}]",
                    format,
                    self.list_formats().join(", ")
                ))
            })
    }

    /// Registered format names, sorted.
    pub fn list_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.factories.keys().cloned().collect();
        formats.sort();
        formats
    }

    /// Whether `format` is registered.
    pub fn is_available(&self, format: &str) -> bool {
        self.factories.contains_key(format)
    }
}
