//! # packslip-core
//!
//! Core types, traits, and defaults for packslip.
//!
//! This crate provides the data model shared by the pipeline and the job
//! manager, plus the collaborator traits that hide document formats and
//! archive packing from the rest of the system.

pub mod defaults;
pub mod error;
pub mod file_safety;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use file_safety::{archive_stem, sanitize_filename, sanitize_item_id};
pub use models::*;
pub use traits::*;
