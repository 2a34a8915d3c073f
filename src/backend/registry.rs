//! Registry of remote model variants

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::gemini::GeminiGenerator;
use crate::backend::traits::{GeneratorStatus, ImageGenerator};
use crate::config::ModelConfig;
use crate::error::{AppError, Result};

/// Registry for managing model variants by label
pub struct GeneratorRegistry {
    generators: DashMap<String, Arc<dyn ImageGenerator>>,
    default_variant: String,
}

impl GeneratorRegistry {
    /// Create a new empty registry
    pub fn new(default_variant: impl Into<String>) -> Self {
        Self {
            generators: DashMap::new(),
            default_variant: default_variant.into(),
        }
    }

    /// Initialize the registry from configuration
    pub fn initialize_from_config(&self, configs: &[ModelConfig], harm_block_threshold: &str) -> Result<()> {
        for config in configs {
            if !config.enabled {
                info!(name = %config.name, "Skipping disabled model variant");
                continue;
            }

            match GeminiGenerator::new(config, harm_block_threshold) {
                Ok(generator) => {
                    if config.resolve_api_key().is_none() {
                        warn!(name = %config.name, "Model variant has no API key configured");
                    }
                    self.generators.insert(config.name.clone(), Arc::new(generator));
                    info!(name = %config.name, model = %config.model, "Registered model variant");
                }
                Err(e) => {
                    warn!(name = %config.name, error = %e, "Failed to create model variant");
                }
            }
        }

        Ok(())
    }

    /// Register a generator under its own name
    pub fn register(&self, generator: Arc<dyn ImageGenerator>) -> Result<()> {
        let name = generator.name().to_string();
        if self.generators.contains_key(&name) {
            return Err(AppError::InvalidRequest(format!(
                "Model variant '{}' already exists",
                name
            )));
        }

        self.generators.insert(name.clone(), generator);
        info!(name = %name, "Added model variant");
        Ok(())
    }

    /// Resolve a variant by label, falling back to the default
    pub fn resolve(&self, name: Option<&str>) -> Result<Arc<dyn ImageGenerator>> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(self.default_variant.as_str());

        match self.generators.get(name) {
            Some(entry) if entry.value().is_enabled() => Ok(entry.value().clone()),
            _ => Err(AppError::ModelNotFound(name.to_string())),
        }
    }

    /// List all variants with their status
    pub fn list(&self) -> Vec<GeneratorStatus> {
        let mut statuses: Vec<GeneratorStatus> = self
            .generators
            .iter()
            .map(|entry| entry.value().status())
            .collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn default_variant(&self) -> &str {
        &self.default_variant
    }

    pub fn len(&self) -> usize {
        self.generators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.generators.contains_key(name)
    }
}
