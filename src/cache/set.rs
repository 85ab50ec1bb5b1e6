use std::cmp::Reverse;

use crate::cache::geometry::Address;
use crate::coherence::CoherenceState;

/// One way of a set. The address is kept after invalidation so that a slot bound to an in-flight
/// fetch can be found again when the fetch completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheBlock {
    state: CoherenceState,
    address: Option<Address>,
}

impl CacheBlock {
    fn empty() -> Self {
        Self {
            state: CoherenceState::Invalid,
            address: None,
        }
    }

    pub fn state(&self) -> CoherenceState {
        self.state
    }

    pub fn address(&self) -> Option<Address> {
        self.address
    }

    pub fn holds(&self, addr: &Address) -> bool {
        self.state.is_valid() && self.bound_to(addr)
    }

    fn bound_to(&self, addr: &Address) -> bool {
        self.address.map_or(false, |a| a.same_block(addr))
    }
}

/// Associativity-many blocks plus "cycles since last touched" per block. Lower recency is more
/// recently used.
#[derive(Debug, Clone)]
pub struct CacheSet {
    blocks: Vec<CacheBlock>,
    recency: Vec<u64>,
}

impl CacheSet {
    pub fn new(ways: usize) -> Self {
        Self {
            blocks: vec![CacheBlock::empty(); ways],
            recency: vec![0; ways],
        }
    }

    pub fn blocks(&self) -> &[CacheBlock] {
        &self.blocks
    }

    pub fn recency(&self) -> &[u64] {
        &self.recency
    }

    fn find(&self, addr: &Address) -> Option<usize> {
        self.blocks.iter().position(|b| b.holds(addr))
    }

    // Where a block for `addr` lives or will live: the valid copy, else an invalid slot already
    // bound to it, else any invalid slot.
    fn slot_for(&self, addr: &Address) -> Option<usize> {
        self.find(addr)
            .or_else(|| {
                self.blocks
                    .iter()
                    .position(|b| !b.state.is_valid() && b.bound_to(addr))
            })
            .or_else(|| self.blocks.iter().position(|b| !b.state.is_valid()))
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.find(addr).is_some()
    }

    pub fn has_invalid(&self) -> bool {
        self.blocks.iter().any(|b| !b.state.is_valid())
    }

    pub fn state_of(&self, addr: &Address) -> CoherenceState {
        self.find(addr)
            .map_or(CoherenceState::Invalid, |way| self.blocks[way].state)
    }

    /// Record a local access: every block ages by one, then the block for `addr` is bound (if it
    /// was not resident) and becomes the most recently used. Returns `None` when the set is full
    /// of other blocks.
    pub fn touch(&mut self, addr: &Address) -> Option<usize> {
        self.age();
        let way = self.slot_for(addr)?;
        self.blocks[way].address = Some(*addr);
        self.recency[way] = 0;
        Some(way)
    }

    pub fn set_state(&mut self, addr: &Address, state: CoherenceState) -> Option<usize> {
        let way = self.slot_for(addr)?;
        let block = &mut self.blocks[way];
        block.address = Some(*addr);
        block.state = state;
        Some(way)
    }

    /// Way holding the least recently used block. Ties go to the lowest way.
    pub fn lru(&self) -> Option<usize> {
        self.recency
            .iter()
            .enumerate()
            .min_by_key(|&(way, &age)| (Reverse(age), way))
            .map(|(way, _)| way)
    }

    pub fn evict_lru(&mut self) -> Option<CacheBlock> {
        let way = self.lru()?;
        let victim = std::mem::replace(&mut self.blocks[way], CacheBlock::empty());
        self.age();
        self.recency[way] = 0;
        Some(victim)
    }

    fn age(&mut self) {
        for r in self.recency.iter_mut() {
            *r = r.saturating_add(1);
        }
    }
}
