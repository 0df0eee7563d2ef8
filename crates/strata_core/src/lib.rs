//! Strata Core
//!
//! Archetype-based Entity Component System:
//! - Runtime component registry with stable ids and type-erased metadata
//! - Fixed-budget archetype blocks with columnar component storage
//! - Generational entity handles that survive archetype migration
//! - Systems dispatched over every entity whose archetype matches

pub mod config;
pub mod ecs;

pub use config::WorldConfig;
pub use ecs::{
    Archetype, Component, ComponentMask, ComponentMeta, Entity, System, World, WorldError,
};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
