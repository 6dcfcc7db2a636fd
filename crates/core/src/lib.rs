//! Core types and storage for Keepsake
//!
//! This crate provides:
//! - Configuration model and TOML loading
//! - Version tokens (creation-ordered identifiers)
//! - The version store (atomic copy-to-version writes)

pub mod config;
pub mod error;
pub mod store;
pub mod token;

pub use config::{Configuration, WatchTarget};
pub use error::{ConfigError, StoreError};
pub use store::{VersionRef, VersionStore};
pub use token::VersionToken;
