//! Engine Configuration Module
//!
//! Capture, calibration, classification and storage settings plus the
//! per-indicator default boundaries, loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `EWIM_CONFIG` environment variable (path to TOML file)
//! 2. `ewim_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The config is loaded once at startup and handed to the monitor:
//!
//! ```ignore
//! let config = EngineConfig::load();
//! let monitor = Monitor::from_config(&config);
//! ```

mod engine_config;
pub mod validation;

pub use engine_config::*;
