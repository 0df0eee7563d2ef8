//! Entity Component System core types.
//!
//! Entities are grouped by archetype (their exact component set) into
//! fixed-budget blocks with one column per component. Components are
//! registered at runtime and handled through type-erased metadata, so
//! storage never needs to know concrete types; typed access goes through
//! [`World`] and systems.

mod archetype;
mod bundle;
mod component;
mod entity;
mod mask;
pub mod storage;
mod system;
mod system_descriptor;
mod system_handle;
mod system_param;
mod system_registration_error;
mod system_registry;
mod world;

pub use archetype::Archetype;
pub use bundle::ComponentSet;
pub use component::{
    meta_of, meta_of_name, register_component, registered_count, Component, ComponentId,
    ComponentMeta, MAX_COMPONENTS,
};
pub use entity::{Entity, EntityEntry, EntityError, EntityTable};
pub use mask::ComponentMask;
pub use storage::{ArchetypeBlock, ArchetypeBlockStorage, BlockError, BlockRef};
pub use system::{ParamsOf, System};
pub use system_descriptor::SystemDescriptor;
pub use system_handle::SystemHandle;
pub use system_param::{ComponentAccess, ParamItem, SystemParam};
pub use system_registration_error::SystemRegistrationError;
pub use world::{World, WorldError};
