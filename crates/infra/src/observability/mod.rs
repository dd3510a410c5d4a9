//! Observability: tracing subscriber setup
//!
//! Library code only emits `tracing` events; the host process decides where
//! they go by calling [`init_tracing`] once at startup.

pub mod logging;

pub use logging::init_tracing;
