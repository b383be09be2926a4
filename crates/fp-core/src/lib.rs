//! fp-core: shared errors, ids, configuration and media enums.
//!
//! This crate is the foundational dependency for the other fp-* crates. It
//! defines the error taxonomy every fatal failure is reported through, the
//! typed job identifier, the TOML configuration (including the dependency
//! manifest) and the small enums shared by the probe and provisioner.

pub mod config;
pub mod error;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use config::{Config, DependencySpec};
pub use error::{Error, Result};
pub use ids::JobId;
pub use media::{Platform, PostProcess, StreamType};
