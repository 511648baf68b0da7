//! Provider registry: stored configurations, exactly one of them active

use crate::error::{GenerationError, Result};
use crate::model::{NewProviderConfig, ProviderConfig};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    store: Store,
}

impl ProviderRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// The configuration currently serving generation requests
    pub fn active(&self) -> Result<Option<ProviderConfig>> {
        Ok(self
            .store
            .find::<ProviderConfig>(|c| c.is_active)?
            .into_iter()
            .max_by_key(|c| c.created_at))
    }

    /// Like [`active`](Self::active), but a missing configuration is an error
    pub fn require_active(&self) -> Result<ProviderConfig> {
        self.active()?.ok_or(GenerationError::NoActiveProvider)
    }

    /// Store `new` as the only active configuration.
    ///
    /// Deactivating the others and inserting the new record happen in one
    /// locked write, so readers never observe zero or two active configs.
    pub fn activate(&self, new: NewProviderConfig) -> Result<ProviderConfig> {
        let config = new.into_config();
        config.kind()?;

        let stored = config.clone();
        self.store.modify(move |configs: &mut Vec<ProviderConfig>| {
            for existing in configs.iter_mut() {
                existing.is_active = false;
            }
            configs.push(stored);
        })?;

        tracing::info!(
            provider = %config.provider,
            model = %config.model,
            id = %config.id,
            "activated AI provider"
        );
        Ok(config)
    }

    /// All stored configurations, newest first
    pub fn list(&self) -> Result<Vec<ProviderConfig>> {
        let mut configs = self.store.all::<ProviderConfig>()?;
        configs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(configs)
    }
}
