// archetype.rs - Archetype identification and management
//
// An archetype is a unique set of component types.
// Entities with the same component types share the same archetype, and
// therefore the same block layout.

use std::fmt;
use std::hash::{Hash, Hasher};

use super::bundle::ComponentSet;
use super::component::{Component, ComponentId, ComponentMeta};
use super::mask::ComponentMask;

/// An archetype represents a unique combination of component types.
///
/// The metas are always stored sorted by component id so that two archetypes
/// built in a different order lay out their blocks identically.
#[derive(Clone, Debug, Default)]
pub struct Archetype {
    metas: Vec<ComponentMeta>,
    mask: ComponentMask,
    row_width: usize,
}

impl Archetype {
    /// The empty archetype.
    pub fn new() -> Self {
        Self::default()
    }

    /// Archetype holding exactly the components of `S`.
    pub fn of<S: ComponentSet>() -> Self {
        let mut archetype = Self::new();
        archetype.add_set::<S>();
        archetype
    }

    /// Create an archetype from arbitrary metas. Duplicates are ignored.
    pub fn from_metas(metas: impl IntoIterator<Item = ComponentMeta>) -> Self {
        let mut archetype = Self::new();
        for meta in metas {
            archetype.push_meta(meta);
        }
        archetype.canonicalize();
        archetype
    }

    pub fn add<T: Component>(&mut self) -> &mut Self {
        self.add_meta(T::meta())
    }

    pub fn remove<T: Component>(&mut self) -> &mut Self {
        self.remove_id(T::id())
    }

    pub fn add_set<S: ComponentSet>(&mut self) -> &mut Self {
        for meta in S::metas() {
            self.push_meta(meta);
        }
        self.canonicalize();
        self
    }

    pub fn remove_set<S: ComponentSet>(&mut self) -> &mut Self {
        let drop = S::mask();
        self.metas.retain(|meta| !drop.has(meta.id));
        self.canonicalize();
        self
    }

    pub fn add_meta(&mut self, meta: ComponentMeta) -> &mut Self {
        if self.push_meta(meta) {
            self.canonicalize();
        }
        self
    }

    pub fn remove_id(&mut self, id: ComponentId) -> &mut Self {
        if self.mask.has(id) {
            self.metas.retain(|meta| meta.id != id);
            self.canonicalize();
        }
        self
    }

    /// Check if this archetype contains a specific component.
    pub fn contains(&self, id: ComponentId) -> bool {
        self.mask.has(id)
    }

    pub fn has<T: Component>(&self) -> bool {
        self.contains(T::id())
    }

    pub fn mask(&self) -> &ComponentMask {
        &self.mask
    }

    /// Component metas sorted by id.
    pub fn metas(&self) -> &[ComponentMeta] {
        &self.metas
    }

    /// Sum of component sizes, in bytes.
    pub fn row_width(&self) -> usize {
        self.row_width
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    fn push_meta(&mut self, meta: ComponentMeta) -> bool {
        if self.mask.has(meta.id) {
            return false;
        }
        self.mask.insert(meta.id);
        self.metas.push(meta);
        true
    }

    fn canonicalize(&mut self) {
        self.metas.sort_unstable_by_key(|meta| meta.id);
        self.mask = self.metas.iter().map(|meta| meta.id).collect();
        self.row_width = self.metas.iter().map(|meta| meta.size).sum();
    }
}

impl PartialEq for Archetype {
    fn eq(&self, other: &Self) -> bool {
        self.mask == other.mask
    }
}

impl Eq for Archetype {}

impl Hash for Archetype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mask.hash(state);
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, meta) in self.metas.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(meta.short_name())?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;

    #[derive(Default)]
    struct Health(#[allow(dead_code)] u32);
    #[derive(Default)]
    struct Armor(#[allow(dead_code)] u16);
    #[derive(Default)]
    struct Frozen;
    define_component!(Health, Armor, Frozen);

    #[test]
    fn order_of_construction_does_not_matter() {
        let mut a = Archetype::new();
        a.add::<Health>().add::<Armor>();
        let mut b = Archetype::new();
        b.add::<Armor>().add::<Health>();

        assert_eq!(a, b);
        assert_eq!(a.metas(), b.metas());
        assert!(a.metas().windows(2).all(|w| w[0].id < w[1].id));
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut arch = Archetype::of::<(Health,)>();
        arch.add::<Health>();
        assert_eq!(arch.len(), 1);
        assert_eq!(arch.row_width(), 4);

        arch.remove::<Armor>();
        assert_eq!(arch.len(), 1);
        arch.remove::<Health>().remove::<Health>();
        assert!(arch.is_empty());
        assert_eq!(arch.row_width(), 0);
    }

    #[test]
    fn sets_add_and_remove_together() {
        let mut arch = Archetype::of::<(Health, Armor, Frozen)>();
        assert_eq!(arch.row_width(), 6);
        arch.remove_set::<(Armor, Frozen)>();
        assert!(arch.has::<Health>());
        assert!(!arch.has::<Armor>());
        assert!(!arch.has::<Frozen>());
    }

    #[test]
    fn from_metas_drops_duplicates() {
        let arch = Archetype::from_metas([Health::meta(), Health::meta(), Frozen::meta()]);
        assert_eq!(arch.len(), 2);
        assert_eq!(arch, Archetype::of::<(Frozen, Health)>());
    }

    #[test]
    fn repeated_types_in_one_set_collapse() {
        let arch = Archetype::of::<(Health, Health, Armor)>();
        assert_eq!(arch.len(), 2);
        assert_eq!(arch.row_width(), 6);

        let mut grown = Archetype::of::<(Frozen,)>();
        grown.add_set::<(Armor, Armor)>();
        assert_eq!(grown.len(), 2);
        assert_eq!(grown, Archetype::of::<(Armor, Frozen)>());
    }

    #[test]
    fn display_uses_short_names() {
        let arch = Archetype::of::<(Frozen,)>();
        assert_eq!(arch.to_string(), "{Frozen}");
    }
}
