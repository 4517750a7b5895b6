//! Infrastructure layer: config, logging, credentials, clock, and the
//! background poll driver.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod poll_driver;
pub mod secrets;
pub mod storage_layout;

/// Returns the infra module name for smoke checks.
pub fn module_name() -> &'static str {
    "infra"
}
