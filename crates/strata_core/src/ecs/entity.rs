//! Entity handle with generational index
//!
//! Entities are lightweight handles (8 bytes) that reference data in the World.
//! The generation counter prevents use-after-free bugs: destroying an entity
//! bumps the generation stored in the table, so every handle minted before
//! the destruction stops resolving even after the index is recycled.

use std::fmt;

use thiserror::Error;

use super::storage::{ArchetypeBlock, BlockError, BlockRef};

/// Entity handle (generation-indexed for safety)
///
/// Format: [32-bit index | 32-bit generation]
/// - Index: Position in the entity table
/// - Generation: Incremented on entity destruction
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entity {
    index: u32,
    generation: u32,
}

impl Entity {
    /// Sentinel marking an empty block slot. Never handed out by a table.
    pub const NULL: Entity = Entity {
        index: u32::MAX,
        generation: u32::MAX,
    };

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Serialize to 64-bit integer (for logs and external handles)
    pub fn to_bits(&self) -> u64 {
        ((self.generation as u64) << 32) | (self.index as u64)
    }

    /// Deserialize from 64-bit integer
    pub fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            f.write_str("Entity(null)")
        } else {
            write!(f, "Entity({}v{})", self.index, self.generation)
        }
    }
}

/// Errors raised while resolving or allocating entity identities.
#[derive(Debug, Error)]
pub enum EntityError {
    #[error("{entity} is stale or has been removed")]
    Stale { entity: Entity },
    #[error("{entity} does not index the entity table ({len} entries)")]
    Unknown { entity: Entity, len: usize },
    #[error("entity table exhausted: {max} entities already live")]
    Exhausted { max: usize },
    #[error(transparent)]
    Block(#[from] BlockError),
}

/// Where an identity currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityEntry {
    /// Block holding the entity, `None` while the identity is free.
    pub location: Option<BlockRef>,
    pub slot: usize,
    pub generation: u32,
}

/// Maps entity identities to block slots.
///
/// Identities are handed out from the most recently freed index first, then
/// from a monotonic counter. At most `max_entities` are live at once.
#[derive(Debug)]
pub struct EntityTable {
    entries: Vec<EntityEntry>,
    free: Vec<u32>,
    max_entities: usize,
    live: usize,
}

impl EntityTable {
    pub fn new(max_entities: usize) -> Self {
        Self {
            entries: Vec::new(),
            free: Vec::new(),
            max_entities,
            live: 0,
        }
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entities
    }

    pub fn is_full(&self) -> bool {
        self.live >= self.max_entities
    }

    /// Reserve an identity and insert it into `block`.
    ///
    /// Nothing is committed unless the block insert succeeds.
    pub fn add(
        &mut self,
        location: BlockRef,
        block: &mut ArchetypeBlock,
    ) -> Result<Entity, EntityError> {
        if self.is_full() {
            return Err(EntityError::Exhausted {
                max: self.max_entities,
            });
        }

        let (index, generation) = match self.free.last() {
            Some(&index) => (index, self.entries[index as usize].generation),
            None => (self.entries.len() as u32, 0),
        };
        let entity = Entity::new(index, generation);
        let slot = block.insert(entity)?;

        let entry = EntityEntry {
            location: Some(location),
            slot,
            generation,
        };
        if self.free.last() == Some(&index) {
            self.free.pop();
            self.entries[index as usize] = entry;
        } else {
            self.entries.push(entry);
        }
        self.live += 1;
        Ok(entity)
    }

    /// Insert an existing identity into `block` and point it there.
    ///
    /// Used by migration: the identity and generation are kept, only the
    /// location changes. Returns the new slot.
    pub fn insert_to_block(
        &mut self,
        index: u32,
        location: BlockRef,
        block: &mut ArchetypeBlock,
    ) -> Result<usize, EntityError> {
        let entry = self.entry_at(index)?;
        let entity = Entity::new(index, entry.generation);
        let slot = block.insert(entity)?;
        self.set_slot(index, location, slot);
        Ok(slot)
    }

    /// Repoint a live identity at `location`/`slot`.
    pub fn set_slot(&mut self, index: u32, location: BlockRef, slot: usize) {
        if let Some(entry) = self.entries.get_mut(index as usize) {
            entry.location = Some(location);
            entry.slot = slot;
        }
    }

    /// Destroy `entity`, recycling its identity. Stale handles are ignored.
    pub fn remove(&mut self, entity: Entity) -> bool {
        let Some(entry) = self.entries.get_mut(entity.index as usize) else {
            return false;
        };
        if entry.generation != entity.generation || entry.location.is_none() {
            return false;
        }
        entry.generation = entry.generation.wrapping_add(1);
        entry.location = None;
        entry.slot = 0;
        self.free.push(entity.index);
        self.live -= 1;
        true
    }

    /// Resolve a handle to its entry, validating the generation.
    pub fn lookup(&self, entity: Entity) -> Result<&EntityEntry, EntityError> {
        let entry = self
            .entries
            .get(entity.index as usize)
            .ok_or(EntityError::Unknown {
                entity,
                len: self.entries.len(),
            })?;
        if entry.generation != entity.generation || entry.location.is_none() {
            return Err(EntityError::Stale { entity });
        }
        Ok(entry)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.lookup(entity).is_ok()
    }

    fn entry_at(&self, index: u32) -> Result<EntityEntry, EntityError> {
        self.entries
            .get(index as usize)
            .copied()
            .ok_or(EntityError::Unknown {
                entity: Entity::new(index, 0),
                len: self.entries.len(),
            })
    }
}
