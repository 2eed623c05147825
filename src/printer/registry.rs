//! # Printer Registry
//!
//! Name-keyed lookup of every compiled-in backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::warn;
use serde::Serialize;

use super::Printer;
use crate::error::{PrintError, Result};

/// Name and help text of a registered backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PrinterDescriptor {
    pub name: String,
    pub description: String,
}

/// Backends by name.
#[derive(Default, Clone)]
pub struct PrinterRegistry {
    printers: HashMap<String, Arc<dyn Printer>>,
}

impl PrinterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every backend available on this platform.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(super::UsbPrinter::new()));
        registry.register(Arc::new(super::SerialPrinter));
        registry.register(Arc::new(super::CupsPrinter));
        registry.register(Arc::new(super::CupsImagePrinter));
        registry.register(Arc::new(super::IppPrinter::new()));
        registry.register(Arc::new(super::RemotePrinter::new()));
        registry.register(Arc::new(super::RelayPrinter::new()));
        registry.register(Arc::new(super::DumpPrinter));
        registry.register(Arc::new(super::PreviewPrinter));
        #[cfg(windows)]
        {
            registry.register(Arc::new(super::WindowsDirectPrinter));
            registry.register(Arc::new(super::WindowsImagePrinter));
        }
        registry
    }

    /// Add a backend, replacing any existing one with the same name.
    pub fn register(&mut self, printer: Arc<dyn Printer>) {
        self.printers.insert(printer.name().to_string(), printer);
    }

    /// Look up a backend by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Printer>> {
        self.printers
            .get(name)
            .cloned()
            .ok_or_else(|| PrintError::PrinterNotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.printers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.printers.is_empty()
    }

    /// All backends, sorted by name.
    pub fn descriptors(&self) -> Vec<PrinterDescriptor> {
        let mut list: Vec<_> = self
            .printers
            .values()
            .map(|p| PrinterDescriptor {
                name: p.name().to_string(),
                description: p.description().to_string(),
            })
            .collect();
        list.sort();
        list
    }

    /// Discovery results of every backend.
    ///
    /// A backend whose discovery fails is logged and reported with an empty
    /// map so one broken transport doesn't hide the others.
    pub fn available_endpoints(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.printers
            .iter()
            .map(|(name, printer)| {
                let endpoints = printer.available_endpoints().unwrap_or_else(|e| {
                    warn!("Endpoint discovery failed for '{}': {}", name, e);
                    BTreeMap::new()
                });
                (name.clone(), endpoints)
            })
            .collect()
    }
}

impl std::fmt::Debug for PrinterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.printers.keys().collect();
        names.sort();
        f.debug_struct("PrinterRegistry")
            .field("printers", &names)
            .finish()
    }
}

// ============================================================================
// TESTS
// ============================================================================
