//! # Photon Config
//!
//! Process-wide tunables for the Photon hub, following the single-config
//! philosophy: every deploy-wide knob lives in one TOML file, parsed into
//! one [`GlobalConfig`] value constructed once and passed down. There are
//! no mutable statics; the hub owns its config and admin entry points
//! replace it wholesale after validation.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod error;

pub use config::{GlobalConfig, RATE_DENOMINATOR};
pub use error::{ConfigError, ConfigResult};
