//! Component sets: compile-time lists of component types

use super::component::{Component, ComponentMeta};
use super::mask::ComponentMask;

/// A tuple of component types named together, e.g. `(Position, Velocity)`.
///
/// Used wherever the world needs a list of types rather than values:
/// creating entities, adding or removing several components at once and
/// testing membership.
pub trait ComponentSet: 'static {
    /// Metas in declaration order.
    fn metas() -> Vec<ComponentMeta>;

    fn mask() -> ComponentMask {
        Self::metas().into_iter().map(|meta| meta.id).collect()
    }
}

impl ComponentSet for () {
    fn metas() -> Vec<ComponentMeta> {
        Vec::new()
    }
}

macro_rules! impl_component_set {
    ($($name:ident),+) => {
        impl<$($name: Component),+> ComponentSet for ($($name,)+) {
            fn metas() -> Vec<ComponentMeta> {
                vec![$($name::meta()),+]
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);
impl_component_set!(A, B, C, D, E);
impl_component_set!(A, B, C, D, E, F);
impl_component_set!(A, B, C, D, E, F, G);
impl_component_set!(A, B, C, D, E, F, G, H);
