use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::coherence::CoherencePolicy;
use crate::error::{SimError, SimResult};

/// Bytes per data word. Blocks must hold at least one.
pub const WORD_SIZE: u32 = 4;
/// Width of a memory address.
pub const ADDRESS_BITS: u32 = 32;

/// Cache shape shared by every cache in a run, plus the address split it implies:
///
/// ```text
/// [ tag | index | offset ]
/// ```
///
/// `offset_bits` addresses a byte within a block, `index_bits` selects the set and the tag is
/// whatever is left of the 32-bit address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheGeometry {
    cache_size: u32,
    block_size: u32,
    associativity: u32,
    policy: CoherencePolicy,
    tag_bits: u32,
    index_bits: u32,
    offset_bits: u32,
}

impl CacheGeometry {
    /// Validate a cache shape and derive its addressing. Must happen before any cache is built;
    /// caches copy the geometry they were built with.
    pub fn configure(
        cache_size: u32,
        block_size: u32,
        associativity: u32,
        policy: CoherencePolicy,
    ) -> SimResult<Self> {
        let reject = |why: String| {
            Err(SimError::Configuration(format!(
                "{why} (cache size {cache_size}, block size {block_size}, associativity {associativity})"
            )))
        };

        if block_size < WORD_SIZE || block_size % WORD_SIZE != 0 {
            return reject(format!("block size must be a multiple of the {WORD_SIZE}-byte word"));
        }
        if !block_size.is_power_of_two() {
            return reject("block size must be a power of two".to_string());
        }
        if cache_size == 0 || cache_size % block_size != 0 {
            return reject("cache size must be a non-zero multiple of the block size".to_string());
        }
        if associativity == 0 {
            return reject("associativity must be at least 1".to_string());
        }
        let num_blocks = cache_size / block_size;
        if num_blocks % associativity != 0 {
            return reject("associativity must divide the number of blocks".to_string());
        }
        let num_sets = num_blocks / associativity;
        if !num_sets.is_power_of_two() {
            return reject(format!("number of sets ({num_sets}) must be a power of two"));
        }

        let offset_bits = block_size.trailing_zeros();
        let index_bits = num_sets.trailing_zeros();
        Ok(Self {
            cache_size,
            block_size,
            associativity,
            policy,
            tag_bits: ADDRESS_BITS - (offset_bits + index_bits),
            index_bits,
            offset_bits,
        })
    }

    pub fn cache_size(&self) -> u32 {
        self.cache_size
    }

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn associativity(&self) -> u32 {
        self.associativity
    }

    pub fn policy(&self) -> CoherencePolicy {
        self.policy
    }

    pub fn tag_bits(&self) -> u32 {
        self.tag_bits
    }

    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    pub fn num_blocks(&self) -> u32 {
        self.cache_size / self.block_size
    }

    pub fn num_sets(&self) -> u32 {
        self.num_blocks() / self.associativity
    }

    pub fn words_per_block(&self) -> u32 {
        self.block_size / WORD_SIZE
    }

    /// Same shape, different protocol. Used when one configuration is run under several policies.
    pub fn with_policy(&self, policy: CoherencePolicy) -> Self {
        Self { policy, ..*self }
    }

    pub fn address(&self, raw: u32) -> Address {
        let offset = raw & (self.block_size - 1);
        let index = (raw >> self.offset_bits) & (self.num_sets() - 1);
        let tag = raw
            .checked_shr(self.offset_bits + self.index_bits)
            .unwrap_or(0);
        Address {
            raw,
            tag,
            index,
            offset,
        }
    }
}

/// A memory address split under a particular geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    raw: u32,
    tag: u32,
    index: u32,
    offset: u32,
}

impl Address {
    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn tag(&self) -> u32 {
        self.tag
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Address of the first byte of the containing block.
    pub fn block_base(&self) -> u32 {
        self.raw - self.offset
    }

    pub fn same_block(&self, other: &Address) -> bool {
        self.tag == other.tag && self.index == other.index
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.raw)
    }
}
