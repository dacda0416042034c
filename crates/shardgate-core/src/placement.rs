//! Static shard placement across the two upstream stores.
//!
//! Each upstream holds one ciphertext half and one pad half, but for
//! opposing halves, so neither upstream can XOR a complete ciphertext with
//! a complete pad:
//!
//! ```text
//!   upstream A: *.cypher.first, *.rand.second
//!   upstream B: *.cypher.second, *.rand.first
//! ```
//!
//! The mapping is persistent — shards already written live where it says.
//! Swapping it is a breaking change.

use std::fmt;

use crate::codec::ShardKind;

/// One of the two upstream object stores the gateway fans out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpstreamId {
    /// The first upstream store.
    A,
    /// The second upstream store.
    B,
}

impl UpstreamId {
    /// Short lowercase label, used in logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            UpstreamId::A => "a",
            UpstreamId::B => "b",
        }
    }
}

impl fmt::Display for UpstreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The designated upstream for a shard kind.
///
/// Pure and stateless; applied on write to decide which upstream receives
/// each shard, and on read to route single-shard requests without probing
/// both upstreams.
#[must_use]
pub fn placement(kind: ShardKind) -> UpstreamId {
    match kind {
        ShardKind::CypherFirst | ShardKind::RandSecond => UpstreamId::A,
        ShardKind::CypherSecond | ShardKind::RandFirst => UpstreamId::B,
    }
}
