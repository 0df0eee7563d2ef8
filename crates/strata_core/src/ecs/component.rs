// component.rs - Runtime component registration
//
// Components are identified by dense u32 ids handed out by a process-wide
// registry the first time a type is seen. The id doubles as the component's
// bit position in a ComponentMask, so it must never collide: ids come from a
// counter, never from a TypeId hash.

use once_cell::sync::Lazy;
use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::mem::{align_of, size_of};
use std::ptr;
use std::sync::{PoisonError, RwLock};

pub type ComponentId = u32;

/// Upper bound on distinct component types per process (the mask width).
pub const MAX_COMPONENTS: usize = 256;

/// Metadata describing a component's memory layout and lifecycle.
///
/// This is everything storage needs to treat a component as opaque bytes:
/// where it lives (`size`/`align`), how to bring a slot to life and how to
/// tear it down. Moving a value between blocks is a plain byte copy of `size`
/// bytes, which is valid for every Rust type.
#[derive(Clone, Copy)]
pub struct ComponentMeta {
    pub id: ComponentId,
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    construct: unsafe fn(*mut u8),
    destruct: unsafe fn(*mut u8),
}

unsafe fn construct_default<T: Default>(slot: *mut u8) {
    // SAFETY: caller guarantees `slot` is aligned, writable and sized for T.
    unsafe { slot.cast::<T>().write(T::default()) }
}

unsafe fn destruct_in_place<T>(slot: *mut u8) {
    // SAFETY: caller guarantees `slot` holds a live T that is not used again.
    unsafe { ptr::drop_in_place(slot.cast::<T>()) }
}

impl ComponentMeta {
    /// Metadata for `T`, registering it on first use.
    pub fn of<T: Component>() -> Self {
        register_component::<T>()
    }

    /// Type name without its module path (`Position` for `game::Position`).
    pub fn short_name(&self) -> &'static str {
        short_type_name(self.name)
    }

    /// Default-construct a value at `slot`.
    ///
    /// # Safety
    /// `slot` must be valid for writes of `size` bytes, aligned to `align`,
    /// and must not hold a live value (it would be leaked).
    #[inline]
    pub(crate) unsafe fn construct(&self, slot: *mut u8) {
        unsafe { (self.construct)(slot) }
    }

    /// Drop the value stored at `slot`.
    ///
    /// # Safety
    /// `slot` must hold a live value of this component type; it is dead
    /// afterwards.
    #[inline]
    pub(crate) unsafe fn destruct(&self, slot: *mut u8) {
        unsafe { (self.destruct)(slot) }
    }
}

impl PartialEq for ComponentMeta {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentMeta {}

impl fmt::Debug for ComponentMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentMeta")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("size", &self.size)
            .field("align", &self.align)
            .finish()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let head = full.split('<').next().unwrap_or(full);
    match head.rfind("::") {
        Some(pos) => &full[pos + 2..],
        None => full,
    }
}

#[derive(Default)]
struct Registry {
    by_type: HashMap<TypeId, ComponentId>,
    by_id: Vec<ComponentMeta>,
}

/// Global registry shared by every world in the process.
static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| RwLock::new(Registry::default()));

/// Register `T` and return its metadata. Registering twice is a lookup.
///
/// # Panics
/// Panics once more than [`MAX_COMPONENTS`] distinct types are registered.
pub fn register_component<T: Component>() -> ComponentMeta {
    let type_id = TypeId::of::<T>();
    {
        let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(&id) = registry.by_type.get(&type_id) {
            return registry.by_id[id as usize];
        }
    }

    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    // Another caller may have won the race between the two locks.
    if let Some(&id) = registry.by_type.get(&type_id) {
        return registry.by_id[id as usize];
    }

    let next = registry.by_id.len();
    assert!(
        next < MAX_COMPONENTS,
        "component registry is full ({MAX_COMPONENTS} types); cannot register {}",
        type_name::<T>()
    );
    let meta = ComponentMeta {
        id: next as ComponentId,
        name: type_name::<T>(),
        size: size_of::<T>(),
        align: align_of::<T>(),
        construct: construct_default::<T>,
        destruct: destruct_in_place::<T>,
    };
    registry.by_type.insert(type_id, meta.id);
    registry.by_id.push(meta);
    tracing::debug!(id = meta.id, name = meta.name, size = meta.size, "registered component");
    meta
}

/// Look up component metadata by id.
pub fn meta_of(id: ComponentId) -> Option<ComponentMeta> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry.by_id.get(id as usize).copied()
}

/// Look up component metadata by full or short type name.
pub fn meta_of_name(name: &str) -> Option<ComponentMeta> {
    let registry = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
    registry
        .by_id
        .iter()
        .find(|meta| meta.name == name || meta.short_name() == name)
        .copied()
}

/// Number of component types registered so far.
pub fn registered_count() -> usize {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .by_id
        .len()
}

/// Trait for types that can be attached to entities.
///
/// Storage only ever default-constructs, byte-moves and drops components,
/// so `Default` is the sole requirement beyond `'static`.
///
/// ```ignore
/// #[derive(Default)]
/// struct Position { x: f32, y: f32 }
/// impl Component for Position {}
/// ```
pub trait Component: Default + 'static {
    fn meta() -> ComponentMeta {
        register_component::<Self>()
    }

    fn id() -> ComponentId {
        Self::meta().id
    }
}

/// Helper macro to implement [`Component`] for one or more types.
///
/// # Example
/// ```ignore
/// #[derive(Default)]
/// struct Position { x: f32, y: f32 }
///
/// define_component!(Position);
/// ```
#[macro_export]
macro_rules! define_component {
    ($($ty:ty),+ $(,)?) => {
        $(impl $crate::ecs::Component for $ty {})+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Mass(#[allow(dead_code)] f64);
    #[derive(Default)]
    struct Tag;
    #[derive(Default)]
    struct Label(#[allow(dead_code)] String);
    define_component!(Mass, Tag, Label);

    #[test]
    fn ids_are_stable_and_distinct() {
        let mass = Mass::id();
        let tag = Tag::id();
        assert_ne!(mass, tag);
        assert_eq!(Mass::id(), mass);
        assert_eq!(meta_of(mass).map(|m| m.name), Some(type_name::<Mass>()));
    }

    #[test]
    fn meta_records_layout() {
        let meta = ComponentMeta::of::<Mass>();
        assert_eq!(meta.size, 8);
        assert_eq!(meta.align, align_of::<f64>());
        assert_eq!(meta.short_name(), "Mass");
        assert_eq!(ComponentMeta::of::<Tag>().size, 0);
    }

    #[test]
    fn lookup_by_short_name() {
        let id = Label::id();
        assert_eq!(meta_of_name("Label").map(|m| m.id), Some(id));
        assert!(registered_count() >= 1);
    }

    #[test]
    fn construct_and_destruct_through_erased_fns() {
        let meta = Label::meta();
        let mut slot = std::mem::MaybeUninit::<Label>::uninit();
        unsafe {
            meta.construct(slot.as_mut_ptr().cast());
            assert!(slot.assume_init_ref().0.is_empty());
            meta.destruct(slot.as_mut_ptr().cast());
        }
    }

    #[test]
    fn short_name_keeps_generic_arguments() {
        assert_eq!(short_type_name("game::Wrapper<core::f32>"), "Wrapper<core::f32>");
        assert_eq!(short_type_name("Plain"), "Plain");
    }
}
