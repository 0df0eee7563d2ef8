// mask.rs - Fixed-width component bitsets
//
// A ComponentMask is the identity of an archetype: bit `id` is set for every
// component present. Systems match blocks with a subset test on masks.

use std::fmt;

use super::bundle::ComponentSet;
use super::component::{Component, ComponentId, MAX_COMPONENTS};

const WORD_BITS: usize = u64::BITS as usize;
const MASK_WORDS: usize = MAX_COMPONENTS / WORD_BITS;

/// Bitset over component ids.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentMask {
    words: [u64; MASK_WORDS],
}

impl ComponentMask {
    pub const fn new() -> Self {
        Self {
            words: [0; MASK_WORDS],
        }
    }

    /// Mask with a bit set for every component in `S`.
    pub fn of<S: ComponentSet>() -> Self {
        S::mask()
    }

    #[inline]
    fn split(id: ComponentId) -> (usize, u64) {
        let id = id as usize;
        debug_assert!(id < MAX_COMPONENTS, "component id {id} out of mask range");
        (id / WORD_BITS, 1u64 << (id % WORD_BITS))
    }

    #[inline]
    pub fn insert(&mut self, id: ComponentId) {
        let (word, bit) = Self::split(id);
        self.words[word] |= bit;
    }

    #[inline]
    pub fn clear(&mut self, id: ComponentId) {
        let (word, bit) = Self::split(id);
        self.words[word] &= !bit;
    }

    #[inline]
    pub fn has(&self, id: ComponentId) -> bool {
        let (word, bit) = Self::split(id);
        self.words[word] & bit != 0
    }

    pub fn add<T: Component>(&mut self) {
        self.insert(T::id());
    }

    pub fn remove<T: Component>(&mut self) {
        self.clear(T::id());
    }

    pub fn has_type<T: Component>(&self) -> bool {
        self.has(T::id())
    }

    /// True when every bit of `other` is also set in `self`.
    #[inline]
    pub fn contains(&self, other: &ComponentMask) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .all(|(mine, theirs)| mine & theirs == *theirs)
    }

    pub fn union(&self, other: &ComponentMask) -> ComponentMask {
        let mut out = *self;
        for (word, theirs) in out.words.iter_mut().zip(other.words.iter()) {
            *word |= theirs;
        }
        out
    }

    pub fn difference(&self, other: &ComponentMask) -> ComponentMask {
        let mut out = *self;
        for (word, theirs) in out.words.iter_mut().zip(other.words.iter()) {
            *word &= !theirs;
        }
        out
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// Set ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.words.iter().enumerate().flat_map(|(index, &word)| {
            let mut bits = word;
            std::iter::from_fn(move || {
                if bits == 0 {
                    return None;
                }
                let offset = bits.trailing_zeros() as usize;
                bits &= bits - 1;
                Some((index * WORD_BITS + offset) as ComponentId)
            })
        })
    }
}

impl FromIterator<ComponentId> for ComponentMask {
    fn from_iter<I: IntoIterator<Item = ComponentId>>(iter: I) -> Self {
        let mut mask = ComponentMask::new();
        for id in iter {
            mask.insert(id);
        }
        mask
    }
}

impl fmt::Debug for ComponentMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
