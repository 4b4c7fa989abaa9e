//! Token to shard mapping.

use crate::token::Token;

/// Index of a shard.
pub type ShardId = u32;

/// Maps tokens to owning shards.
///
/// Implementations must be pure and total: the same token and shard count
/// always yield the same shard in `0..shard_count()`.
pub trait Sharder {
    /// Number of shards.
    fn shard_count(&self) -> u32;

    /// Owning shard of a token.
    fn shard_of(&self, token: Token) -> ShardId;
}

/// The static ring sharder.
///
/// The token is biased to an unsigned ring position, the `ignore_msb_bits`
/// most significant bits are dropped, and the remainder is scaled onto
/// `0..shard_count`. Dropping high bits interleaves shards across the ring
/// so consecutive token ranges land on different shards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StaticSharder {
    shard_count: u32,
    ignore_msb_bits: u32,
}

impl StaticSharder {
    /// Largest accepted `ignore_msb_bits`.
    pub const MAX_IGNORE_MSB_BITS: u32 = 63;

    /// Creates a sharder. A zero shard count is treated as one shard, and
    /// `ignore_msb_bits` is capped at [`Self::MAX_IGNORE_MSB_BITS`].
    #[must_use]
    pub fn new(shard_count: u32, ignore_msb_bits: u32) -> Self {
        Self {
            shard_count: shard_count.max(1),
            ignore_msb_bits: ignore_msb_bits.min(Self::MAX_IGNORE_MSB_BITS),
        }
    }

    /// A sharder that owns everything on shard 0.
    #[must_use]
    pub fn single() -> Self {
        Self::new(1, 0)
    }

    /// Number of high token bits ignored.
    #[must_use]
    pub const fn ignore_msb_bits(&self) -> u32 {
        self.ignore_msb_bits
    }
}

impl Default for StaticSharder {
    fn default() -> Self {
        Self::single()
    }
}

impl Sharder for StaticSharder {
    fn shard_count(&self) -> u32 {
        self.shard_count
    }

    fn shard_of(&self, token: Token) -> ShardId {
        if self.shard_count == 1 {
            return 0;
        }
        // i64::MIN maps to 0, i64::MAX to u64::MAX.
        let biased = (token.value() as u64) ^ (1u64 << 63);
        let adjusted = biased << self.ignore_msb_bits;
        let scaled = (u128::from(adjusted) * u128::from(self.shard_count)) >> 64;
        scaled as ShardId
    }
}
