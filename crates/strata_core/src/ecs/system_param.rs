// system_param.rs - Component access declared by systems
//
// A parameter list is a tuple of `&T` / `&mut T`. It reports which components
// it touches (so the world can derive a mask and reject aliasing), resolves
// typed column pointers once per block and then produces the per-slot
// references handed to the system.

use std::ptr::NonNull;

use super::component::{Component, ComponentMeta};
use super::storage::{ArchetypeBlock, BlockError};

/// One component named by a parameter list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentAccess {
    pub meta: ComponentMeta,
    pub write: bool,
}

impl ComponentAccess {
    pub fn read(meta: ComponentMeta) -> Self {
        Self { meta, write: false }
    }

    pub fn write(meta: ComponentMeta) -> Self {
        Self { meta, write: true }
    }
}

/// Component references fetched for one entity.
pub trait SystemParam {
    /// What the system receives per entity.
    type Item<'a>;
    /// Column base pointers for one block.
    type Columns: Copy;

    fn access(out: &mut Vec<ComponentAccess>);

    /// Resolve this parameter's columns in `block`.
    fn columns(block: &mut ArchetypeBlock) -> Result<Self::Columns, BlockError>;

    /// Build the references for `slot`.
    ///
    /// # Safety
    /// `columns` must come from a live block, `slot` must be occupied, the
    /// parameter list must not name a component twice and nothing else may
    /// access those components for `'a`.
    unsafe fn fetch<'a>(columns: Self::Columns, slot: usize) -> Self::Item<'a>;
}

/// Item type of a parameter list.
pub type ParamItem<'a, P> = <P as SystemParam>::Item<'a>;

impl<'p, T: Component> SystemParam for &'p T {
    type Item<'a> = &'a T;
    type Columns = NonNull<T>;

    fn access(out: &mut Vec<ComponentAccess>) {
        out.push(ComponentAccess::read(T::meta()));
    }

    fn columns(block: &mut ArchetypeBlock) -> Result<Self::Columns, BlockError> {
        block.column_base::<T>()
    }

    #[inline]
    unsafe fn fetch<'a>(columns: Self::Columns, slot: usize) -> &'a T {
        unsafe { &*columns.as_ptr().add(slot) }
    }
}

impl<'p, T: Component> SystemParam for &'p mut T {
    type Item<'a> = &'a mut T;
    type Columns = NonNull<T>;

    fn access(out: &mut Vec<ComponentAccess>) {
        out.push(ComponentAccess::write(T::meta()));
    }

    fn columns(block: &mut ArchetypeBlock) -> Result<Self::Columns, BlockError> {
        block.column_base::<T>()
    }

    #[inline]
    unsafe fn fetch<'a>(columns: Self::Columns, slot: usize) -> &'a mut T {
        unsafe { &mut *columns.as_ptr().add(slot) }
    }
}

macro_rules! impl_system_param {
    ($($name:ident),+) => {
        #[allow(non_snake_case)]
        impl<$($name: SystemParam),+> SystemParam for ($($name,)+) {
            type Item<'a> = ($($name::Item<'a>,)+);
            type Columns = ($($name::Columns,)+);

            fn access(out: &mut Vec<ComponentAccess>) {
                $($name::access(out);)+
            }

            fn columns(block: &mut ArchetypeBlock) -> Result<Self::Columns, BlockError> {
                Ok(($($name::columns(block)?,)+))
            }

            #[inline]
            unsafe fn fetch<'a>(columns: Self::Columns, slot: usize) -> Self::Item<'a> {
                let ($($name,)+) = columns;
                unsafe { ($($name::fetch($name, slot),)+) }
            }
        }
    };
}

impl_system_param!(A);
impl_system_param!(A, B);
impl_system_param!(A, B, C);
impl_system_param!(A, B, C, D);
impl_system_param!(A, B, C, D, E);
impl_system_param!(A, B, C, D, E, F);
impl_system_param!(A, B, C, D, E, F, G);
impl_system_param!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use crate::ecs::{Archetype, Entity};

    #[derive(Default, Debug, PartialEq)]
    struct Level(u8);
    #[derive(Default, Debug, PartialEq)]
    struct Score(i32);
    define_component!(Level, Score);

    #[test]
    fn access_lists_reads_and_writes_in_order() {
        let mut out = Vec::new();
        <(&Level, &mut Score)>::access(&mut out);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0], ComponentAccess::read(Level::meta()));
        assert_eq!(out[1], ComponentAccess::write(Score::meta()));
    }

    #[test]
    fn fetch_reaches_the_right_slot() {
        let mut block = ArchetypeBlock::new(Archetype::of::<(Level, Score)>(), 1024).unwrap();
        let first = block.insert(Entity::new(0, 0)).unwrap();
        let second = block.insert(Entity::new(1, 0)).unwrap();
        block.get_entry_mut::<Level>(second).unwrap().0 = 3;

        let columns = <(&Level, &mut Score)>::columns(&mut block).unwrap();
        unsafe {
            let (level, score) = <(&Level, &mut Score)>::fetch(columns, second);
            score.0 = level.0 as i32 * 10;
        }
        assert_eq!(block.get_entry::<Score>(second).unwrap(), &Score(30));
        assert_eq!(block.get_entry::<Score>(first).unwrap(), &Score(0));
    }

    #[test]
    fn missing_column_is_a_type_mismatch() {
        let mut block = ArchetypeBlock::new(Archetype::of::<(Level,)>(), 1024).unwrap();
        assert!(matches!(
            <(&Level, &Score)>::columns(&mut block),
            Err(BlockError::TypeMismatch { .. })
        ));
    }
}
