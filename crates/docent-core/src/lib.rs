//! # docent-core
//!
//! Core types, errors, and configuration for the docent governance layer.
//!
//! This crate provides the foundational error taxonomy, environment
//! configuration, and shared constants that the governance crates
//! depend on.

pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;

// Re-export commonly used types at crate root
pub use config::GovernanceConfig;
pub use error::{Error, Result};
