//! Feynman Core - Shared error handling and logging foundation
//!
//! This crate defines the error and observability building blocks used by the
//! rest of the Feynman platform.

pub mod error;
pub mod logging;

pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tokio;
pub use tracing;
