//! Configuration loading
//!
//! Builds a validated [`timekeep_domain::Config`] from the environment, a
//! `.env` file or a TOML/JSON file.

pub mod loader;

pub use loader::{find_config_path, load, load_from_env, load_from_file};
