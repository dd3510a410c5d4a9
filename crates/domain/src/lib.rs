//! # Timekeep Domain
//!
//! Domain types for the offline activity store and its sync engine.
//!
//! This crate contains:
//! - Record types for timers, intervals, keyboard/mouse activity,
//!   screenshots and the audit queue
//! - The domain error type and `Result` alias
//! - Configuration structures
//! - Domain constants
//!
//! ## Architecture
//! - No dependencies on other Timekeep crates
//! - Pure data structures and validation rules

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
