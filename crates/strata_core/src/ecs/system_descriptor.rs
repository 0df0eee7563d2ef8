use crate::ecs::{ComponentAccess, ComponentId, ComponentMask, SystemRegistrationError};

/// Metadata describing how a system interacts with the ECS world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SystemDescriptor {
    name: String,
    reads: Vec<ComponentId>,
    writes: Vec<ComponentId>,
    components: Vec<ComponentId>,
    mask: ComponentMask,
}

impl SystemDescriptor {
    /// Build a descriptor from a parameter list's access entries.
    ///
    /// Fails when the list is empty or names any component twice, since the
    /// system would then receive two references to the same value.
    pub fn from_access(
        name: impl Into<String>,
        access: &[ComponentAccess],
    ) -> Result<Self, SystemRegistrationError> {
        let name = name.into();
        if access.is_empty() {
            return Err(SystemRegistrationError::EmptyAccess { name });
        }

        let mut mask = ComponentMask::new();
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for entry in access {
            if mask.has(entry.meta.id) {
                return Err(SystemRegistrationError::AliasedComponent {
                    name,
                    component: entry.meta.name,
                });
            }
            mask.insert(entry.meta.id);
            if entry.write {
                writes.push(entry.meta.id);
            } else {
                reads.push(entry.meta.id);
            }
        }
        reads.sort_unstable();
        writes.sort_unstable();

        Ok(Self {
            name,
            reads,
            writes,
            components: mask.iter().collect(),
            mask,
        })
    }

    /// System name (the Rust type name for registered systems).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only component set.
    pub fn read_components(&self) -> &[ComponentId] {
        &self.reads
    }

    /// Writable component set.
    pub fn write_components(&self) -> &[ComponentId] {
        &self.writes
    }

    /// Union of read and write component ids.
    pub fn all_components(&self) -> &[ComponentId] {
        &self.components
    }

    /// Components an archetype must contain for the system to visit it.
    pub fn mask(&self) -> &ComponentMask {
        &self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use crate::ecs::{Component, SystemParam};

    #[derive(Default)]
    struct Fuel(#[allow(dead_code)] f32);
    #[derive(Default)]
    struct Thrust(#[allow(dead_code)] f32);
    define_component!(Fuel, Thrust);

    fn access<P: SystemParam>() -> Vec<ComponentAccess> {
        let mut out = Vec::new();
        P::access(&mut out);
        out
    }

    #[test]
    fn splits_reads_and_writes() {
        let desc =
            SystemDescriptor::from_access("Engine", &access::<(&Fuel, &mut Thrust)>()).unwrap();
        assert_eq!(desc.name(), "Engine");
        assert_eq!(desc.read_components(), &[Fuel::id()]);
        assert_eq!(desc.write_components(), &[Thrust::id()]);
        assert_eq!(desc.all_components().len(), 2);
        assert!(desc.mask().has(Fuel::id()) && desc.mask().has(Thrust::id()));
    }

    #[test]
    fn aliasing_is_rejected() {
        let err = SystemDescriptor::from_access("Twice", &access::<(&Fuel, &mut Fuel)>())
            .unwrap_err();
        assert!(matches!(
            err,
            SystemRegistrationError::AliasedComponent { .. }
        ));
    }

    #[test]
    fn empty_access_is_rejected() {
        let err = SystemDescriptor::from_access("Nothing", &[]).unwrap_err();
        assert!(matches!(err, SystemRegistrationError::EmptyAccess { .. }));
    }
}
