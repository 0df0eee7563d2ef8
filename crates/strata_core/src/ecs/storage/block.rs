// block.rs - Fixed-capacity columnar storage for one archetype
//
// A block is a single heap arena sized from a byte budget. Inside it every
// component of the archetype gets one contiguous column of `capacity`
// elements, laid out back to back in ascending component id order. Entity
// ids live in a separate column; a slot is occupied iff its entity id is not
// `Entity::NULL`.
//
// Removal never compacts. Vacated slots go on a free list and are reused
// before the untouched tail, so slot indices held by the entity table stay
// valid until the entity itself moves.

use std::alloc::{self, Layout};
use std::any::type_name;
use std::fmt;
use std::mem::size_of;
use std::ptr::{self, NonNull};

use thiserror::Error;
use tracing::debug;

use crate::ecs::{Archetype, Component, ComponentId, ComponentMask, ComponentMeta, Entity};

#[derive(Debug, Error)]
pub enum BlockError {
    #[error("block for {archetype} is full ({capacity} slots)")]
    Full { archetype: String, capacity: usize },
    #[error("component {requested} is not part of archetype {archetype}")]
    TypeMismatch {
        requested: &'static str,
        archetype: String,
    },
    #[error("slot {slot} is vacant")]
    VacantSlot { slot: usize },
    #[error("slot {slot} is out of range for a block of {capacity} slots")]
    SlotOutOfRange { slot: usize, capacity: usize },
    #[error("failed to allocate a {bytes}-byte archetype block")]
    AllocationFailed { bytes: usize },
    #[error("block budget of {budget} bytes cannot hold one {row_bytes}-byte row")]
    BudgetTooSmall { budget: usize, row_bytes: usize },
}

#[derive(Debug, Clone, Copy)]
struct BlockColumn {
    meta: ComponentMeta,
    /// Byte offset of element 0 from the arena base.
    offset: usize,
}

/// Capacity and column offsets that fit a budget.
struct BlockPlan {
    capacity: usize,
    offsets: Vec<usize>,
    arena_bytes: usize,
    align: usize,
}

#[inline]
fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

fn lay_out(metas: &[ComponentMeta], capacity: usize) -> (Vec<usize>, usize) {
    let mut cursor = 0;
    let mut offsets = Vec::with_capacity(metas.len());
    for meta in metas {
        cursor = align_up(cursor, meta.align);
        offsets.push(cursor);
        cursor += meta.size * capacity;
    }
    (offsets, cursor)
}

impl BlockPlan {
    /// Largest capacity whose entity column plus padded component columns
    /// fit in `budget` bytes.
    fn compute(metas: &[ComponentMeta], budget: usize) -> Result<Self, BlockError> {
        let entity_bytes = size_of::<Entity>();
        let row_bytes = entity_bytes + metas.iter().map(|m| m.size).sum::<usize>();
        let align = metas.iter().map(|m| m.align).max().unwrap_or(1);

        let mut capacity = budget / row_bytes;
        while capacity > 0 {
            let (offsets, arena_bytes) = lay_out(metas, capacity);
            let total = arena_bytes + entity_bytes * capacity;
            if total <= budget {
                return Ok(Self {
                    capacity,
                    offsets,
                    arena_bytes,
                    align,
                });
            }
            // Padding pushed us over; shed enough rows to cover the excess.
            let shed = (total - budget).div_ceil(row_bytes).max(1);
            capacity = capacity.saturating_sub(shed);
        }
        Err(BlockError::BudgetTooSmall { budget, row_bytes })
    }
}

/// Columnar storage for up to `capacity` entities of a single archetype.
pub struct ArchetypeBlock {
    archetype: Archetype,
    columns: Vec<BlockColumn>,
    entities: Box<[Entity]>,
    free: Vec<usize>,
    /// Slots `[0, high_water)` have been handed out at least once.
    high_water: usize,
    len: usize,
    arena: NonNull<u8>,
    /// `None` when every component is zero-sized and nothing was allocated.
    layout: Option<Layout>,
}

impl ArchetypeBlock {
    /// Allocate a block for `archetype` within `budget` bytes.
    pub fn new(archetype: Archetype, budget: usize) -> Result<Self, BlockError> {
        let plan = BlockPlan::compute(archetype.metas(), budget)?;

        // The id column comes first so a failed arena allocation leaks nothing.
        let mut entities = Vec::new();
        entities
            .try_reserve_exact(plan.capacity)
            .map_err(|_| BlockError::AllocationFailed {
                bytes: plan.capacity.saturating_mul(size_of::<Entity>()),
            })?;
        entities.resize(plan.capacity, Entity::NULL);

        let (arena, layout) = if plan.arena_bytes == 0 {
            // Zero-sized columns only need a non-null, aligned address.
            let dangling = NonNull::new(plan.align as *mut u8)
                .ok_or(BlockError::AllocationFailed { bytes: 0 })?;
            (dangling, None)
        } else {
            let bytes = plan.arena_bytes;
            let layout = Layout::from_size_align(bytes, plan.align)
                .map_err(|_| BlockError::AllocationFailed { bytes })?;
            // SAFETY: layout has a non-zero size.
            let raw = unsafe { alloc::alloc(layout) };
            let arena = NonNull::new(raw).ok_or(BlockError::AllocationFailed { bytes })?;
            (arena, Some(layout))
        };

        let columns = archetype
            .metas()
            .iter()
            .zip(plan.offsets)
            .map(|(&meta, offset)| BlockColumn { meta, offset })
            .collect();

        debug!(
            archetype = %archetype,
            capacity = plan.capacity,
            arena_bytes = plan.arena_bytes,
            "allocated archetype block"
        );

        Ok(Self {
            archetype,
            columns,
            entities: entities.into_boxed_slice(),
            free: Vec::new(),
            high_water: 0,
            len: 0,
            arena,
            layout,
        })
    }

    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    pub fn mask(&self) -> &ComponentMask {
        self.archetype.mask()
    }

    pub fn capacity(&self) -> usize {
        self.entities.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free slots remaining.
    pub fn space(&self) -> usize {
        self.capacity() - self.len
    }

    pub fn is_full(&self) -> bool {
        self.space() == 0
    }

    /// Entity stored at `slot`, if occupied.
    pub fn entity_at(&self, slot: usize) -> Option<Entity> {
        self.entities.get(slot).copied().filter(|e| !e.is_null())
    }

    pub fn is_occupied(&self, slot: usize) -> bool {
        self.entity_at(slot).is_some()
    }

    /// Occupied slots in ascending order.
    pub fn occupied_slots(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.high_water).filter(move |&slot| !self.entities[slot].is_null())
    }

    /// `(slot, entity)` for every occupied slot, ascending.
    pub fn entities(&self) -> impl Iterator<Item = (usize, Entity)> + '_ {
        self.occupied_slots().map(move |slot| (slot, self.entities[slot]))
    }

    /// Claim a free slot for `entity` and default-construct its components.
    pub fn insert(&mut self, entity: Entity) -> Result<usize, BlockError> {
        let slot = match self.free.pop() {
            Some(slot) => slot,
            None if self.high_water < self.capacity() => {
                self.high_water += 1;
                self.high_water - 1
            }
            None => {
                return Err(BlockError::Full {
                    archetype: self.archetype.to_string(),
                    capacity: self.capacity(),
                })
            }
        };

        self.entities[slot] = entity;
        for column in &self.columns {
            // SAFETY: slot < capacity and the slot was vacant.
            unsafe { column.meta.construct(self.element_ptr(column, slot)) };
        }
        self.len += 1;
        Ok(slot)
    }

    /// Destroy every component at `slot` and free it.
    pub fn remove(&mut self, slot: usize) -> Result<Entity, BlockError> {
        let entity = self.check_slot(slot)?;
        for column in &self.columns {
            // SAFETY: the slot is occupied, so every column holds a live value.
            unsafe { column.meta.destruct(self.element_ptr(column, slot)) };
        }
        self.release(slot);
        Ok(entity)
    }

    /// Free `slot` after a migration, destroying only the components that
    /// were not byte-copied out (those absent from `moved`).
    pub fn vacate(&mut self, slot: usize, moved: &ComponentMask) -> Result<Entity, BlockError> {
        let entity = self.check_slot(slot)?;
        for column in &self.columns {
            if moved.has(column.meta.id) {
                continue;
            }
            // SAFETY: occupied slot, value was not moved out.
            unsafe { column.meta.destruct(self.element_ptr(column, slot)) };
        }
        self.release(slot);
        Ok(entity)
    }

    /// Move every component shared with `source` from `source_slot` into
    /// `dest_slot`, replacing the default values `insert` put there.
    ///
    /// Returns the mask of moved components. The caller must follow up with
    /// `source.vacate(source_slot, &moved)`: until then the moved values are
    /// owned twice.
    pub fn transfer_from(
        &mut self,
        source: &ArchetypeBlock,
        source_slot: usize,
        dest_slot: usize,
    ) -> Result<ComponentMask, BlockError> {
        source.check_slot(source_slot)?;
        self.check_slot(dest_slot)?;

        let mut moved = ComponentMask::new();
        for column in &self.columns {
            let Some(from) = source.column(column.meta.id) else {
                continue;
            };
            // SAFETY: both slots are occupied and the columns describe the
            // same type. Source and destination are distinct arenas.
            unsafe {
                let dst = self.element_ptr(column, dest_slot);
                column.meta.destruct(dst);
                ptr::copy_nonoverlapping(
                    source.element_ptr(from, source_slot),
                    dst,
                    column.meta.size,
                );
            }
            moved.insert(column.meta.id);
        }
        Ok(moved)
    }

    pub fn get_entry<T: Component>(&self, slot: usize) -> Result<&T, BlockError> {
        self.check_slot(slot)?;
        let column = self.typed_column::<T>()?;
        // SAFETY: occupied slot in T's column; the shared borrow of self
        // keeps mutation out for the returned lifetime.
        Ok(unsafe { &*self.element_ptr(column, slot).cast::<T>() })
    }

    pub fn get_entry_mut<T: Component>(&mut self, slot: usize) -> Result<&mut T, BlockError> {
        self.check_slot(slot)?;
        let column = self.typed_column::<T>()?;
        // SAFETY: as above, with exclusivity from &mut self.
        Ok(unsafe { &mut *self.element_ptr(column, slot).cast::<T>() })
    }

    /// Pointer to element 0 of T's column.
    pub(crate) fn column_base<T: Component>(&mut self) -> Result<NonNull<T>, BlockError> {
        let column = *self.typed_column::<T>()?;
        let base = self.element_ptr(&column, 0).cast::<T>();
        // SAFETY: derived from the non-null arena pointer.
        Ok(unsafe { NonNull::new_unchecked(base) })
    }

    fn column(&self, id: ComponentId) -> Option<&BlockColumn> {
        self.columns.iter().find(|column| column.meta.id == id)
    }

    fn typed_column<T: Component>(&self) -> Result<&BlockColumn, BlockError> {
        self.column(T::id()).ok_or_else(|| BlockError::TypeMismatch {
            requested: type_name::<T>(),
            archetype: self.archetype.to_string(),
        })
    }

    #[inline]
    fn element_ptr(&self, column: &BlockColumn, slot: usize) -> *mut u8 {
        // SAFETY: offset + slot * size stays within the arena for any
        // slot < capacity; zero-sized columns never advance.
        unsafe {
            self.arena
                .as_ptr()
                .add(column.offset + slot * column.meta.size)
        }
    }

    fn check_slot(&self, slot: usize) -> Result<Entity, BlockError> {
        match self.entities.get(slot) {
            None => Err(BlockError::SlotOutOfRange {
                slot,
                capacity: self.capacity(),
            }),
            Some(entity) if entity.is_null() => Err(BlockError::VacantSlot { slot }),
            Some(&entity) => Ok(entity),
        }
    }

    fn release(&mut self, slot: usize) {
        self.entities[slot] = Entity::NULL;
        self.free.push(slot);
        self.len -= 1;
    }
}

impl Drop for ArchetypeBlock {
    fn drop(&mut self) {
        for slot in 0..self.high_water {
            if self.entities[slot].is_null() {
                continue;
            }
            for column in &self.columns {
                // SAFETY: occupied slot, each value dropped exactly once.
                unsafe { column.meta.destruct(self.element_ptr(column, slot)) };
            }
        }
        if let Some(layout) = self.layout {
            // SAFETY: allocated in `new` with this exact layout.
            unsafe { alloc::dealloc(self.arena.as_ptr(), layout) };
        }
    }
}

impl fmt::Debug for ArchetypeBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArchetypeBlock")
            .field("archetype", &self.archetype.to_string())
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use std::cell::Cell;
    use std::rc::Rc;

    #[derive(Default, Debug, PartialEq, Clone, Copy)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Default, Debug, PartialEq)]
    struct Wide(u64);

    #[derive(Default)]
    struct Flag(u8);

    #[derive(Default)]
    struct Empty;

    #[derive(Default)]
    struct Tracked(Option<Rc<Cell<u32>>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            if let Some(count) = &self.0 {
                count.set(count.get() + 1);
            }
        }
    }

    define_component!(Pos, Wide, Flag, Empty, Tracked);

    fn entity(i: u32) -> Entity {
        Entity::new(i, 0)
    }

    #[test]
    fn capacity_accounts_for_entity_column_and_padding() {
        let block = ArchetypeBlock::new(Archetype::of::<(Flag, Wide)>(), 1024).unwrap();
        // 8 (entity) + 1 + 8 bytes per row, plus up to 7 bytes of padding.
        let cap = block.capacity();
        assert_eq!(cap, 1024 / 17);
        let (_, arena) = lay_out(block.archetype().metas(), cap);
        assert!(arena + cap * size_of::<Entity>() <= 1024);
    }

    #[test]
    fn budget_too_small_for_one_row() {
        let err = ArchetypeBlock::new(Archetype::of::<(Wide,)>(), 12).unwrap_err();
        assert!(matches!(err, BlockError::BudgetTooSmall { row_bytes: 16, .. }));
    }

    #[test]
    fn oversized_budget_is_an_allocation_error() {
        // Every byte goes to the id column, which cannot be reserved.
        let err = ArchetypeBlock::new(Archetype::new(), usize::MAX).unwrap_err();
        assert!(matches!(err, BlockError::AllocationFailed { .. }));

        let err = ArchetypeBlock::new(Archetype::of::<(Empty,)>(), usize::MAX).unwrap_err();
        assert!(matches!(err, BlockError::AllocationFailed { .. }));
    }

    #[test]
    fn insert_default_constructs() {
        let mut block = ArchetypeBlock::new(Archetype::of::<(Pos, Wide)>(), 4096).unwrap();
        let slot = block.insert(entity(0)).unwrap();
        assert_eq!(block.get_entry::<Pos>(slot).unwrap(), &Pos::default());
        assert_eq!(block.get_entry::<Wide>(slot).unwrap(), &Wide(0));

        block.get_entry_mut::<Pos>(slot).unwrap().x = 4.0;
        assert_eq!(block.get_entry::<Pos>(slot).unwrap().x, 4.0);
        assert_eq!(block.len(), 1);
    }

    #[test]
    fn wrong_type_and_bad_slots_are_errors() {
        let mut block = ArchetypeBlock::new(Archetype::of::<(Pos,)>(), 4096).unwrap();
        let slot = block.insert(entity(0)).unwrap();

        assert!(matches!(
            block.get_entry::<Wide>(slot),
            Err(BlockError::TypeMismatch { .. })
        ));
        assert!(matches!(
            block.get_entry::<Pos>(slot + 1),
            Err(BlockError::VacantSlot { .. })
        ));
        assert!(matches!(
            block.get_entry::<Pos>(usize::MAX),
            Err(BlockError::SlotOutOfRange { .. })
        ));
    }

    #[test]
    fn holes_are_reused_without_compaction() {
        let mut block = ArchetypeBlock::new(Archetype::of::<(Pos,)>(), 4096).unwrap();
        let a = block.insert(entity(0)).unwrap();
        let b = block.insert(entity(1)).unwrap();
        let c = block.insert(entity(2)).unwrap();
        block.get_entry_mut::<Pos>(c).unwrap().x = 9.0;

        block.remove(b).unwrap();
        assert_eq!(block.entity_at(b), None);
        assert_eq!(block.occupied_slots().collect::<Vec<_>>(), vec![a, c]);
        // c did not move.
        assert_eq!(block.get_entry::<Pos>(c).unwrap().x, 9.0);

        let d = block.insert(entity(3)).unwrap();
        assert_eq!(d, b);
        assert_eq!(block.entity_at(d), Some(entity(3)));
    }

    #[test]
    fn full_block_rejects_insert() {
        let mut block = ArchetypeBlock::new(Archetype::of::<(Wide,)>(), 32).unwrap();
        assert_eq!(block.capacity(), 2);
        block.insert(entity(0)).unwrap();
        block.insert(entity(1)).unwrap();
        assert!(block.is_full());
        assert!(matches!(
            block.insert(entity(2)),
            Err(BlockError::Full { capacity: 2, .. })
        ));
    }

    #[test]
    fn zero_sized_components_need_no_arena() {
        let mut block = ArchetypeBlock::new(Archetype::of::<(Empty,)>(), 64).unwrap();
        assert_eq!(block.capacity(), 8);
        let slot = block.insert(entity(0)).unwrap();
        assert!(block.get_entry::<Empty>(slot).is_ok());
        block.remove(slot).unwrap();
    }

    #[test]
    fn transfer_moves_shared_and_vacate_drops_the_rest() {
        let drops = Rc::new(Cell::new(0));
        let mut src = ArchetypeBlock::new(Archetype::of::<(Pos, Tracked)>(), 4096).unwrap();
        let mut dst = ArchetypeBlock::new(Archetype::of::<(Pos, Flag)>(), 4096).unwrap();

        let s = src.insert(entity(5)).unwrap();
        src.get_entry_mut::<Pos>(s).unwrap().y = 2.5;
        *src.get_entry_mut::<Tracked>(s).unwrap() = Tracked(Some(drops.clone()));
        // The default Tracked written by insert was dropped by the assignment.
        let baseline = drops.get();

        let d = dst.insert(entity(5)).unwrap();
        dst.get_entry_mut::<Flag>(d).unwrap().0 = 1;
        let moved = dst.transfer_from(&src, s, d).unwrap();
        assert!(moved.has(Pos::id()));
        assert!(!moved.has(Tracked::id()));

        src.vacate(s, &moved).unwrap();
        assert_eq!(drops.get(), baseline + 1);
        assert_eq!(dst.get_entry::<Pos>(d).unwrap().y, 2.5);
        assert_eq!(dst.get_entry::<Flag>(d).unwrap().0, 1);
        assert!(src.is_empty());
    }

    #[test]
    fn moved_values_are_not_dropped_twice() {
        let drops = Rc::new(Cell::new(0));
        let mut src = ArchetypeBlock::new(Archetype::of::<(Tracked,)>(), 4096).unwrap();
        let mut dst = ArchetypeBlock::new(Archetype::of::<(Tracked, Flag)>(), 4096).unwrap();

        let s = src.insert(entity(0)).unwrap();
        *src.get_entry_mut::<Tracked>(s).unwrap() = Tracked(Some(drops.clone()));
        let d = dst.insert(entity(0)).unwrap();
        let moved = dst.transfer_from(&src, s, d).unwrap();
        src.vacate(s, &moved).unwrap();
        assert_eq!(drops.get(), 0);

        drop(src);
        assert_eq!(drops.get(), 0);
        drop(dst);
        assert_eq!(drops.get(), 1);
    }

    #[test]
    fn drop_destroys_live_slots_only() {
        let drops = Rc::new(Cell::new(0));
        let mut block = ArchetypeBlock::new(Archetype::of::<(Tracked,)>(), 4096).unwrap();
        for i in 0..3 {
            let slot = block.insert(entity(i)).unwrap();
            *block.get_entry_mut::<Tracked>(slot).unwrap() = Tracked(Some(drops.clone()));
        }
        block.remove(1).unwrap();
        assert_eq!(drops.get(), 1);
        drop(block);
        assert_eq!(drops.get(), 3);
    }
}
