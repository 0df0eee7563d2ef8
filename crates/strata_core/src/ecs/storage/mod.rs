// mod.rs - Storage module exports

mod block;
mod block_storage;

pub use block::{ArchetypeBlock, BlockError};
pub use block_storage::ArchetypeBlockStorage;

/// Index pair naming one block: which pool, and which block inside it.
///
/// Blocks never move between pools and pools never shrink, so a `BlockRef`
/// stays valid for the lifetime of its world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef {
    pub storage: usize,
    pub block: usize,
}
