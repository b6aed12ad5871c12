pub mod client;
pub mod sandbox;

use std::sync::Arc;

use thiserror::Error;

use loadline_core::config::{RegistryConfig, RegistryMode};
use loadline_core::CarrierRegistry;

pub use client::FmcsaClient;
pub use sandbox::{FallbackRegistry, SandboxRegistry};

#[derive(Debug, Error)]
pub enum RegistryBuildError {
    #[error("http client initialization failed: {0}")]
    ClientInit(#[from] reqwest::Error),
}

/// Wire up the registry the configuration asks for.
pub fn build_registry(
    config: &RegistryConfig,
) -> Result<Arc<dyn CarrierRegistry>, RegistryBuildError> {
    let registry: Arc<dyn CarrierRegistry> = match config.mode {
        RegistryMode::Sandbox => Arc::new(SandboxRegistry),
        RegistryMode::Live => Arc::new(FmcsaClient::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.timeout_secs,
        )?),
        RegistryMode::LiveWithSandboxFallback => Arc::new(FallbackRegistry::new(FmcsaClient::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.timeout_secs,
        )?)),
    };
    Ok(registry)
}
