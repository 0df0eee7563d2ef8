use std::any::type_name;

use tracing::debug;

use crate::ecs::system::{ErasedSystem, SystemRunner};
use crate::ecs::{System, SystemDescriptor, SystemHandle, SystemParam, SystemRegistrationError};

/// Systems in registration order, which is also their tick order.
pub(crate) struct SystemRegistry {
    systems: Vec<RegisteredSystem>,
}

pub(crate) struct RegisteredSystem {
    pub(crate) handle: SystemHandle,
    pub(crate) descriptor: SystemDescriptor,
    pub(crate) runner: Box<dyn ErasedSystem>,
}

impl SystemRegistry {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
        }
    }

    pub fn register<S: System>(
        &mut self,
        system: S,
    ) -> Result<SystemHandle, SystemRegistrationError> {
        let mut access = Vec::new();
        S::Params::access(&mut access);
        let descriptor = SystemDescriptor::from_access(type_name::<S>(), &access)?;

        let handle = SystemHandle::new(self.systems.len() as u32);
        debug!(
            %handle,
            system = descriptor.name(),
            reads = ?descriptor.read_components(),
            writes = ?descriptor.write_components(),
            "registered system"
        );
        self.systems.push(RegisteredSystem {
            handle,
            descriptor,
            runner: Box::new(SystemRunner::new(system)),
        });
        Ok(handle)
    }

    pub fn descriptor(&self, handle: SystemHandle) -> Option<&SystemDescriptor> {
        self.systems
            .get(handle.index() as usize)
            .map(|system| &system.descriptor)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SystemHandle, &SystemDescriptor)> {
        self.systems
            .iter()
            .map(|system| (system.handle, &system.descriptor))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegisteredSystem> {
        self.systems.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use crate::ecs::{Component, ParamsOf};

    #[derive(Default)]
    struct Ammo(u32);
    define_component!(Ammo);

    struct Reload;
    impl System for Reload {
        type Params = (&'static mut Ammo,);
        fn process(&mut self, (ammo,): ParamsOf<'_, Self>) {
            ammo.0 = 30;
        }
    }

    struct Greedy;
    impl System for Greedy {
        type Params = (&'static Ammo, &'static mut Ammo);
        fn process(&mut self, _: ParamsOf<'_, Self>) {}
    }

    #[test]
    fn handles_follow_registration_order() {
        let mut registry = SystemRegistry::new();
        let first = registry.register(Reload).unwrap();
        let second = registry.register(Reload).unwrap();
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(registry.len(), 2);

        let desc = registry.descriptor(first).unwrap();
        assert!(desc.name().ends_with("Reload"));
        assert_eq!(desc.write_components(), &[Ammo::id()]);
        assert_eq!(registry.iter().count(), 2);
    }

    #[test]
    fn aliased_params_never_reach_the_registry() {
        let mut registry = SystemRegistry::new();
        assert!(matches!(
            registry.register(Greedy),
            Err(SystemRegistrationError::AliasedComponent { .. })
        ));
        assert_eq!(registry.len(), 0);
    }
}
