//! Foundry Local model management.
//!
//! Starts or discovers the local Foundry service, resolves model aliases
//! against its catalog, downloads and loads models.

mod catalog;
mod error;
mod manager;
mod service;

pub use catalog::print_catalog;
pub use error::FoundryError;
pub use manager::FoundryLocalManager;
