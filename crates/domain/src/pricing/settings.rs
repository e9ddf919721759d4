//! Read access to the current pricing configuration.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{PricingConfig, PricingError};

/// Source of the current [`PricingConfig`].
///
/// The core only reads settings; changing them belongs to whoever owns the
/// provider.
#[async_trait]
pub trait SettingsProvider: Send + Sync {
    async fn pricing_config(&self) -> Result<PricingConfig, PricingError>;
}

/// Settings held in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySettings {
    config: Arc<RwLock<PricingConfig>>,
}

impl InMemorySettings {
    pub fn new(config: PricingConfig) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Loads settings from a JSON document and validates them.
    pub fn from_json(json: &str) -> Result<Self, PricingError> {
        let config: PricingConfig = serde_json::from_str(json)
            .map_err(|e| PricingError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Swaps in a new configuration after validating it.
    pub async fn replace(&self, config: PricingConfig) -> Result<(), PricingError> {
        config.validate()?;
        *self.config.write().await = config;
        Ok(())
    }
}

#[async_trait]
impl SettingsProvider for InMemorySettings {
    async fn pricing_config(&self) -> Result<PricingConfig, PricingError> {
        Ok(self.config.read().await.clone())
    }
}
