//! World configuration
//!
//! Sizing knobs for a [`World`](crate::World). Loadable from any serde format;
//! missing fields fall back to the defaults.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Maximum number of simultaneously live entities.
    pub max_entities: usize,
    /// Byte budget of each archetype block (entity ids plus component columns).
    pub block_budget: usize,
}

impl WorldConfig {
    pub const DEFAULT_MAX_ENTITIES: usize = 10_000;
    pub const DEFAULT_BLOCK_BUDGET: usize = 64 * 1024;

    pub fn with_max_entities(mut self, max_entities: usize) -> Self {
        self.max_entities = max_entities;
        self
    }

    pub fn with_block_budget(mut self, block_budget: usize) -> Self {
        self.block_budget = block_budget;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_entities == 0 {
            return Err(ConfigError::NoEntities);
        }
        // Index u32::MAX is reserved for the null entity.
        if self.max_entities >= u32::MAX as usize {
            return Err(ConfigError::TooManyEntities {
                requested: self.max_entities,
            });
        }
        if self.block_budget == 0 {
            return Err(ConfigError::EmptyBlocks);
        }
        Ok(())
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            max_entities: Self::DEFAULT_MAX_ENTITIES,
            block_budget: Self::DEFAULT_BLOCK_BUDGET,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_entities must be at least 1")]
    NoEntities,
    #[error("max_entities of {requested} exceeds the entity index range")]
    TooManyEntities { requested: usize },
    #[error("block_budget must be at least 1 byte")]
    EmptyBlocks,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.max_entities, 10_000);
        assert_eq!(config.block_budget, 65_536);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let config: WorldConfig = serde_json::from_str(r#"{ "max_entities": 64 }"#).unwrap();
        assert_eq!(config.max_entities, 64);
        assert_eq!(config.block_budget, WorldConfig::DEFAULT_BLOCK_BUDGET);
    }

    #[test]
    fn serializes_both_fields() {
        let json = serde_json::to_value(WorldConfig::default().with_block_budget(4096)).unwrap();
        assert_eq!(json["block_budget"], 4096);
        assert_eq!(json["max_entities"], 10_000);
    }

    #[test]
    fn zero_values_are_rejected() {
        assert_eq!(
            WorldConfig::default().with_max_entities(0).validate(),
            Err(ConfigError::NoEntities)
        );
        assert_eq!(
            WorldConfig::default().with_block_budget(0).validate(),
            Err(ConfigError::EmptyBlocks)
        );
    }
}
