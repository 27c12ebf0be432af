//! # studia-core
//!
//! Core types, traits, and abstractions for the studia study assistant.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other studia crates depend on.

pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod progress;
pub mod traits;

// Re-export commonly used types at crate root
pub use error::{Error, Result};
pub use models::*;
pub use progress::{compute_streak, update_running_mean};
pub use traits::*;
