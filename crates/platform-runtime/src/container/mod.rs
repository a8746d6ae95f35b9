//! # Service Container
//!
//! Holds every store, cache and service, wired once at startup.
//!
//! - `config`: `PlatformConfig` and its environment overrides
//! - `services`: construction in dependency order

pub mod config;
pub mod services;

pub use config::{BusConfig, ConfigError, PlatformConfig};
pub use services::ServiceContainer;
