//! Configuration module for SLA print settings.
//!
//! Printer, material and object settings, loaded from JSON.

mod print_config;

pub use print_config::{
    changed_keys, MaterialPrintSpeed, PrintConfig, SlaMaterialConfig, SlaPrintObjectConfig,
    SlaPrinterConfig,
};
