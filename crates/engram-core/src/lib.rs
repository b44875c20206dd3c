//! # engram-core
//!
//! Foundation crate for the Engram memory system.
//! Defines all types, models, traits, errors, config, and constants.
//! Every other crate in the workspace depends on this.

pub mod config;
pub mod constants;
pub mod deadline;
pub mod errors;
pub mod memory;
pub mod models;
pub mod traits;
pub mod vector;

// Re-export the most commonly used types at the crate root.
pub use config::EngineConfig;
pub use deadline::Deadline;
pub use errors::{EngramError, EngramResult};
pub use memory::{Entry, EntryPatch, Importance, Source};
