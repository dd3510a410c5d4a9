//! Error conversions from infrastructure crates into domain errors

pub mod conversions;

pub use conversions::InfraError;
