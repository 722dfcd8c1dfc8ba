//! Host-side glue for the web search router.
//!
//! [`router_core`] holds the routing engine itself. This crate supplies what
//! a process embedding it needs: default directories, a TOML settings file
//! with environment overrides, and tracing setup.

pub mod logging;
pub mod router_dirs;
pub mod settings;

pub use router_core;
pub use settings::RouterSettings;

use router_core::{RegisteredProvider, RouterError, RoutingEngine};
use std::path::Path;

/// Load settings (see [`RouterSettings::load`]) and build an engine over
/// `providers`.
///
/// # Errors
///
/// Returns [`RouterError::Io`] when the settings file cannot be read and
/// [`RouterError::Config`] when its contents or the resulting engine
/// configuration are invalid.
pub fn engine_from_settings(
    config_path: Option<&Path>,
    providers: Vec<RegisteredProvider>,
) -> Result<RoutingEngine, RouterError> {
    let config = RouterSettings::load(config_path)?.into_engine_config()?;
    RoutingEngine::new(config, providers)
}
