// block_storage.rs - Growable pool of blocks for one archetype
//
// Blocks are appended when every existing block is full and are never merged,
// shrunk or released before the pool itself is dropped.

use tracing::debug;

use crate::ecs::Archetype;

use super::block::{ArchetypeBlock, BlockError};

/// All blocks holding entities of a single archetype.
#[derive(Debug)]
pub struct ArchetypeBlockStorage {
    archetype: Archetype,
    blocks: Vec<ArchetypeBlock>,
    /// Block that had room the last time we looked.
    likely_free: Option<usize>,
    block_budget: usize,
}

impl ArchetypeBlockStorage {
    pub fn new(archetype: Archetype, block_budget: usize) -> Self {
        Self {
            archetype,
            blocks: Vec::new(),
            likely_free: None,
            block_budget,
        }
    }

    pub fn archetype(&self) -> &Archetype {
        &self.archetype
    }

    /// Index of a block with at least one free slot, allocating a new block
    /// if needed. The flag is true when the block was just created.
    pub fn find_free(&mut self) -> Result<(usize, bool), BlockError> {
        if let Some(index) = self.likely_free {
            if self.blocks.get(index).is_some_and(|b| !b.is_full()) {
                return Ok((index, false));
            }
        }

        if let Some(index) = self.blocks.iter().position(|b| !b.is_full()) {
            self.likely_free = Some(index);
            return Ok((index, false));
        }

        let block = ArchetypeBlock::new(self.archetype.clone(), self.block_budget)?;
        self.blocks.push(block);
        let index = self.blocks.len() - 1;
        self.likely_free = Some(index);
        debug!(
            archetype = %self.archetype,
            blocks = self.blocks.len(),
            "archetype pool grew"
        );
        Ok((index, true))
    }

    /// Hint that `index` just gained a free slot.
    pub fn note_vacancy(&mut self, index: usize) {
        self.likely_free = Some(index);
    }

    pub fn block(&self, index: usize) -> Option<&ArchetypeBlock> {
        self.blocks.get(index)
    }

    pub fn block_mut(&mut self, index: usize) -> Option<&mut ArchetypeBlock> {
        self.blocks.get_mut(index)
    }

    pub fn blocks(&self) -> &[ArchetypeBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [ArchetypeBlock] {
        &mut self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Live entities across all blocks.
    pub fn len(&self) -> usize {
        self.blocks.iter().map(ArchetypeBlock::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(ArchetypeBlock::is_empty)
    }
}
