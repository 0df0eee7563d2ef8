// system.rs - Systems and their type-erased runners

use super::storage::{ArchetypeBlock, BlockError};
use super::system_param::SystemParam;

/// Per-entity logic run by [`World::tick`](crate::ecs::World::tick).
///
/// `Params` names the components the system needs; every entity whose
/// archetype contains all of them is visited once per tick.
///
/// ```ignore
/// struct Movement;
///
/// impl System for Movement {
///     type Params = (&'static mut Position, &'static Velocity);
///
///     fn process(&mut self, (pos, vel): ParamsOf<'_, Self>) {
///         pos.x += vel.x;
///     }
/// }
/// ```
pub trait System: 'static {
    type Params: SystemParam;

    fn process(&mut self, params: <Self::Params as SystemParam>::Item<'_>);
}

/// What `process` receives for system `S`.
pub type ParamsOf<'a, S> = <<S as System>::Params as SystemParam>::Item<'a>;

/// Object-safe view of a system, driven block by block.
pub(crate) trait ErasedSystem {
    /// Run over every occupied slot of `block`; returns the invocation count.
    fn run_block(&mut self, block: &mut ArchetypeBlock) -> Result<u64, BlockError>;
}

pub(crate) struct SystemRunner<S: System> {
    system: S,
}

impl<S: System> SystemRunner<S> {
    pub(crate) fn new(system: S) -> Self {
        Self { system }
    }
}

impl<S: System> ErasedSystem for SystemRunner<S> {
    fn run_block(&mut self, block: &mut ArchetypeBlock) -> Result<u64, BlockError> {
        if block.is_empty() {
            return Ok(0);
        }
        let columns = S::Params::columns(block)?;
        let mut invocations = 0;
        for slot in block.occupied_slots() {
            // SAFETY: columns were resolved from this block, the slot is
            // occupied and registration rejected aliased parameter lists.
            let params = unsafe { S::Params::fetch(columns, slot) };
            self.system.process(params);
            invocations += 1;
        }
        Ok(invocations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::define_component;
    use crate::ecs::{Archetype, Entity};

    #[derive(Default)]
    struct Counter(u32);
    define_component!(Counter);

    struct Bump {
        seen: u32,
    }

    impl System for Bump {
        type Params = (&'static mut Counter,);

        fn process(&mut self, (counter,): ParamsOf<'_, Self>) {
            counter.0 += 1;
            self.seen += 1;
        }
    }

    #[test]
    fn runner_visits_occupied_slots_only() {
        let mut block = ArchetypeBlock::new(Archetype::of::<(Counter,)>(), 1024).unwrap();
        for i in 0..4 {
            block.insert(Entity::new(i, 0)).unwrap();
        }
        block.remove(2).unwrap();

        let mut runner = SystemRunner::new(Bump { seen: 0 });
        assert_eq!(runner.run_block(&mut block).unwrap(), 3);
        assert_eq!(runner.system.seen, 3);
        assert_eq!(block.get_entry::<Counter>(0).unwrap().0, 1);
        assert_eq!(block.get_entry::<Counter>(3).unwrap().0, 1);
    }
}
