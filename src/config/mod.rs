//! Session configuration loading.
//!
//! The schema lives in `biocalm-core`; this module reads YAML files into it
//! and checks the values make sense together.

pub mod loader;
pub mod validation;

pub use biocalm_core::config as schema;
pub use loader::{ConfigLimits, ConfigLoader, LoadResult, LoadWarning};
pub use validation::{ValidationResult, Validator};
