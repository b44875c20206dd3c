//! # engram-engine
//!
//! The public surface of the Engram memory core. A [`MemoryEngine`] owns
//! the store, index, compression manager, enhancer, and write queue.
//! Lifecycle: construct → [`MemoryEngine::initialize`] → operations →
//! [`MemoryEngine::close`].

mod engine;

pub use engine::MemoryEngine;
