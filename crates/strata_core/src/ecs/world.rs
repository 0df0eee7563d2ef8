// world.rs - ECS World with entity management, migration and dispatch
//
// The world owns one block pool per archetype, the entity table and the
// registered systems. Entities move between pools when components are added
// or removed; their handles stay valid across moves.

use std::any::type_name;
use std::collections::HashMap;

use strata_metrics::{Counter, SystemProfiler};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::config::{ConfigError, WorldConfig};
use crate::ecs::storage::{ArchetypeBlock, ArchetypeBlockStorage, BlockError, BlockRef};
use crate::ecs::system_param::ParamItem;
use crate::ecs::system_registry::SystemRegistry;
use crate::ecs::{
    Archetype, Component, ComponentMask, ComponentSet, Entity, EntityError, EntityTable, System,
    SystemDescriptor, SystemHandle, SystemParam, SystemRegistrationError,
};

#[derive(Debug, Error)]
pub enum WorldError {
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Block(#[from] BlockError),
    #[error(transparent)]
    System(#[from] SystemRegistrationError),
    #[error("invalid world configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl WorldError {
    /// True for handles that no longer (or never did) name a live entity.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            WorldError::Entity(EntityError::Stale { .. } | EntityError::Unknown { .. })
        )
    }
}

/// The main ECS world containing all entities and components.
pub struct World {
    config: WorldConfig,
    storages: Vec<ArchetypeBlockStorage>,
    storage_lookup: HashMap<ComponentMask, usize>,
    /// Every block ever allocated, in creation order. Dispatch walks this.
    block_order: Vec<BlockRef>,
    entities: EntityTable,
    systems: SystemRegistry,
    ticks: u64,
    counters: Counter,
    profiler: SystemProfiler,
}

impl World {
    /// Create a world with the default configuration.
    pub fn new() -> Self {
        Self::build(WorldConfig::default())
    }

    /// Create a world with explicit capacities.
    pub fn with_config(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        debug!(
            max_entities = config.max_entities,
            block_budget = config.block_budget,
            "created world"
        );
        Self {
            config,
            storages: Vec::new(),
            storage_lookup: HashMap::new(),
            block_order: Vec::new(),
            entities: EntityTable::new(config.max_entities),
            systems: SystemRegistry::new(),
            ticks: 0,
            counters: Counter::new(),
            profiler: SystemProfiler::new(),
        }
    }

    // ---------------------------------------------------------------------
    // Entity lifecycle
    // ---------------------------------------------------------------------

    /// Create an entity holding default values of every component in `S`.
    pub fn create<S: ComponentSet>(&mut self) -> Result<Entity, WorldError> {
        self.create_with(&Archetype::of::<S>())
    }

    /// Create an entity with the given archetype.
    pub fn create_with(&mut self, archetype: &Archetype) -> Result<Entity, WorldError> {
        if self.entities.is_full() {
            warn!(
                max_entities = self.config.max_entities,
                "entity creation refused: table exhausted"
            );
            return Err(EntityError::Exhausted {
                max: self.config.max_entities,
            }
            .into());
        }

        let storage = self.storage_for(archetype);
        let at = self.alloc_slot(storage)?;
        let block = &mut self.storages[at.storage].blocks_mut()[at.block];
        let entity = self.entities.add(at, block)?;

        self.counters.increment("entities.created", 1);
        trace!(%entity, archetype = %archetype, "created entity");
        Ok(entity)
    }

    /// Create `count` entities of one archetype.
    ///
    /// Stops at the first failure; entities created before it stay alive.
    pub fn batch(
        &mut self,
        count: usize,
        archetype: &Archetype,
    ) -> Result<Vec<Entity>, WorldError> {
        let mut created = Vec::with_capacity(count);
        for _ in 0..count {
            created.push(self.create_with(archetype)?);
        }
        Ok(created)
    }

    /// Destroy an entity, dropping its components and recycling its identity.
    pub fn remove(&mut self, entity: Entity) -> Result<(), WorldError> {
        let (at, slot) = self.locate(entity)?;
        let pool = &mut self.storages[at.storage];
        pool.blocks_mut()[at.block].remove(slot)?;
        pool.note_vacancy(at.block);
        self.entities.remove(entity);

        self.counters.increment("entities.removed", 1);
        trace!(%entity, "removed entity");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Component access
    // ---------------------------------------------------------------------

    /// Mutable access to one component.
    pub fn get_comp<T: Component>(&mut self, entity: Entity) -> Result<&mut T, WorldError> {
        let (at, slot) = self.locate(entity)?;
        Ok(self.block_mut(at).get_entry_mut::<T>(slot)?)
    }

    /// Shared access to one component.
    pub fn read_comp<T: Component>(&self, entity: Entity) -> Result<&T, WorldError> {
        let (at, slot) = self.locate(entity)?;
        Ok(self.block(at).get_entry::<T>(slot)?)
    }

    /// Borrow several components of one entity at once.
    ///
    /// ```ignore
    /// world.mod_comp::<(&mut Position, &Velocity), _>(e, |(pos, vel)| {
    ///     pos.x += vel.x;
    /// })?;
    /// ```
    pub fn mod_comp<'w, P, R>(
        &'w mut self,
        entity: Entity,
        f: impl FnOnce(ParamItem<'w, P>) -> R,
    ) -> Result<R, WorldError>
    where
        P: SystemParam,
    {
        let mut access = Vec::new();
        P::access(&mut access);
        SystemDescriptor::from_access(type_name::<P>(), &access)?;

        let (at, slot) = self.locate(entity)?;
        let block = self.block_mut(at);
        let columns = P::columns(block)?;
        // SAFETY: the slot belongs to a live entity, the parameter list was
        // checked for aliasing and `&'w mut self` keeps every other access out.
        let params = unsafe { P::fetch(columns, slot) };
        Ok(f(params))
    }

    /// Whether the entity currently has every component in `S`.
    pub fn has_comp<S: ComponentSet>(&self, entity: Entity) -> Result<bool, WorldError> {
        Ok(self.archetype_of(entity)?.mask().contains(&S::mask()))
    }

    /// Add the components of `S`, default-constructed. Components the entity
    /// already has keep their values.
    pub fn add_comp<S: ComponentSet>(&mut self, entity: Entity) -> Result<(), WorldError> {
        let mut target = self.archetype_of(entity)?.clone();
        target.add_set::<S>();
        self.migrate(entity, target)
    }

    /// Remove (and drop) the components of `S`.
    pub fn del_comp<S: ComponentSet>(&mut self, entity: Entity) -> Result<(), WorldError> {
        let mut target = self.archetype_of(entity)?.clone();
        target.remove_set::<S>();
        self.migrate(entity, target)
    }

    // ---------------------------------------------------------------------
    // Systems
    // ---------------------------------------------------------------------

    /// Register a system. Systems run in registration order.
    pub fn insert<S: System>(&mut self, system: S) -> Result<SystemHandle, WorldError> {
        Ok(self.systems.register(system)?)
    }

    /// Run every system once over every matching entity.
    pub fn tick(&mut self) -> Result<(), WorldError> {
        let Self {
            storages,
            block_order,
            systems,
            counters,
            profiler,
            ..
        } = self;

        let mut blocks_visited = 0usize;
        for system in systems.iter_mut() {
            let name = system.descriptor.name();
            let mask = *system.descriptor.mask();
            let runner = &mut system.runner;

            let invocations = profiler.time_system(name, || -> Result<u64, BlockError> {
                let mut invocations = 0;
                for at in block_order.iter() {
                    let pool = &mut storages[at.storage];
                    if !pool.archetype().mask().contains(&mask) {
                        continue;
                    }
                    blocks_visited += 1;
                    invocations += runner.run_block(&mut pool.blocks_mut()[at.block])?;
                }
                Ok(invocations)
            })?;
            counters.increment("systems.invocations", invocations);
        }

        self.ticks += 1;
        trace!(
            tick = self.ticks,
            systems = self.systems.len(),
            blocks_visited,
            "tick complete"
        );
        Ok(())
    }

    pub fn system_descriptor(&self, handle: SystemHandle) -> Option<&SystemDescriptor> {
        self.systems.descriptor(handle)
    }

    /// Registered systems in tick order.
    pub fn systems(&self) -> impl Iterator<Item = (SystemHandle, &SystemDescriptor)> {
        self.systems.iter()
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(entity)
    }

    /// Number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The entity's current archetype.
    pub fn archetype_of(&self, entity: Entity) -> Result<&Archetype, WorldError> {
        let (at, _) = self.locate(entity)?;
        Ok(self.storages[at.storage].archetype())
    }

    /// Distinct archetypes seen so far.
    pub fn archetype_count(&self) -> usize {
        self.storages.len()
    }

    /// Blocks allocated across all archetypes.
    pub fn block_count(&self) -> usize {
        self.block_order.len()
    }

    pub fn system_count(&self) -> usize {
        self.systems.len()
    }

    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Event counters (all zero when the `metrics` feature is off).
    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    /// Per-system timings (empty when the `metrics` feature is off).
    pub fn profiler(&self) -> &SystemProfiler {
        &self.profiler
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn locate(&self, entity: Entity) -> Result<(BlockRef, usize), WorldError> {
        let entry = self.entities.lookup(entity)?;
        let at = entry.location.ok_or(EntityError::Stale { entity })?;
        Ok((at, entry.slot))
    }

    fn block(&self, at: BlockRef) -> &ArchetypeBlock {
        &self.storages[at.storage].blocks()[at.block]
    }

    fn block_mut(&mut self, at: BlockRef) -> &mut ArchetypeBlock {
        &mut self.storages[at.storage].blocks_mut()[at.block]
    }

    /// Pool index for `archetype`, creating an empty pool on first sight.
    fn storage_for(&mut self, archetype: &Archetype) -> usize {
        if let Some(&index) = self.storage_lookup.get(archetype.mask()) {
            return index;
        }
        let index = self.storages.len();
        self.storages.push(ArchetypeBlockStorage::new(
            archetype.clone(),
            self.config.block_budget,
        ));
        self.storage_lookup.insert(*archetype.mask(), index);
        debug!(archetype = %archetype, pool = index, "created archetype pool");
        index
    }

    /// A block in pool `storage` with a free slot.
    fn alloc_slot(&mut self, storage: usize) -> Result<BlockRef, WorldError> {
        let (block, created) = self.storages[storage].find_free()?;
        let at = BlockRef { storage, block };
        if created {
            self.block_order.push(at);
        }
        Ok(at)
    }

    /// Move `entity` into `target`'s pool, keeping shared component values.
    ///
    /// Order: insert into the destination (which rebinds the table entry),
    /// move shared values across, then vacate the source slot.
    fn migrate(&mut self, entity: Entity, target: Archetype) -> Result<(), WorldError> {
        let (from, source_slot) = self.locate(entity)?;
        if target.mask() == self.storages[from.storage].archetype().mask() {
            return Ok(());
        }

        let dest_storage = self.storage_for(&target);
        let to = self.alloc_slot(dest_storage)?;

        let (src_pool, dst_pool) = pair_mut(&mut self.storages, from.storage, to.storage);
        let source = &mut src_pool.blocks_mut()[from.block];
        let dest = &mut dst_pool.blocks_mut()[to.block];

        // Every fallible step is behind us once the destination slot exists:
        // `source_slot` is occupied by `entity` and `dest_slot` was just filled,
        // so neither the transfer nor the vacate can reject a slot.
        let dest_slot = self.entities.insert_to_block(entity.index(), to, dest)?;
        let moved = dest.transfer_from(source, source_slot, dest_slot)?;
        source.vacate(source_slot, &moved)?;
        src_pool.note_vacancy(from.block);

        self.counters.increment("entities.migrated", 1);
        debug!(
            %entity,
            from = %src_pool.archetype(),
            to = %target,
            "migrated entity"
        );
        Ok(())
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

/// Mutable references to two distinct elements.
fn pair_mut<T>(items: &mut [T], a: usize, b: usize) -> (&mut T, &mut T) {
    assert_ne!(a, b, "pair_mut needs two distinct indices");
    if a < b {
        let (low, high) = items.split_at_mut(b);
        (&mut low[a], &mut high[0])
    } else {
        let (low, high) = items.split_at_mut(a);
        (&mut high[0], &mut low[b])
    }
}
