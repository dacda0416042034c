//! Pad-and-split codec for logical objects.
//!
//! Every logical object is stored as four physical shards. The codec draws a
//! one-time pad R the same length as the plaintext P, computes the
//! ciphertext C = P XOR R, and splits both C and R at the mid-point into
//! `first`/`second` halves:
//!
//! ```text
//!   P (len L)
//!   R = random(L)            C = P XOR R
//!   C = C1 || C2             R = R1 || R2      (split at ceil(L / 2))
//!
//!   shards: <key>.cypher.first  = C1
//!           <key>.cypher.second = C2
//!           <key>.rand.first    = R1
//!           <key>.rand.second   = R2
//! ```
//!
//! The mid-point is `ceil(L / 2)` — the first half takes the extra byte for
//! odd lengths. This is part of the on-disk contract; changing it breaks
//! every object already stored.
//!
//! Confidentiality rests on the pad quality and on the placement rule
//! (see [`crate::placement`]) that keeps `C_i` and `R_i` of the same half on
//! different upstreams. Shard sizes necessarily leak the plaintext length.

use bytes::Bytes;
use rand::CryptoRng;

/// Number of shards a logical object materializes as.
pub const SHARD_COUNT: usize = 4;

/// Identifies one of the four shards of a logical object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShardKind {
    /// First half of the ciphertext.
    CypherFirst,
    /// Second half of the ciphertext.
    CypherSecond,
    /// First half of the pad.
    RandFirst,
    /// Second half of the pad.
    RandSecond,
}

impl ShardKind {
    /// All shard kinds in canonical probe order.
    pub const ALL: [ShardKind; SHARD_COUNT] = [
        ShardKind::CypherFirst,
        ShardKind::CypherSecond,
        ShardKind::RandFirst,
        ShardKind::RandSecond,
    ];

    /// The persistent key suffix for this shard kind.
    ///
    /// The suffix format is stable; downstream tooling and restore
    /// procedures rely on it.
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            ShardKind::CypherFirst => ".cypher.first",
            ShardKind::CypherSecond => ".cypher.second",
            ShardKind::RandFirst => ".rand.first",
            ShardKind::RandSecond => ".rand.second",
        }
    }

    /// Build the shard key for a logical key.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardgate_core::codec::ShardKind;
    ///
    /// assert_eq!(
    ///     ShardKind::RandSecond.apply("photos/cat.jpg"),
    ///     "photos/cat.jpg.rand.second"
    /// );
    /// ```
    #[must_use]
    pub fn apply(self, key: &str) -> String {
        format!("{key}{}", self.suffix())
    }

    /// Parse a key as a shard key.
    ///
    /// Returns the base (logical) key and the shard kind when `key` ends in
    /// one of the four shard suffixes, `None` otherwise. The four suffixes
    /// are mutually exclusive at the end of a key, so at most one matches.
    ///
    /// # Examples
    ///
    /// ```
    /// use shardgate_core::codec::ShardKind;
    ///
    /// let (base, kind) = ShardKind::parse("a/b.txt.cypher.second").unwrap();
    /// assert_eq!(base, "a/b.txt");
    /// assert_eq!(kind, ShardKind::CypherSecond);
    /// assert!(ShardKind::parse("a/b.txt").is_none());
    /// ```
    #[must_use]
    pub fn parse(key: &str) -> Option<(&str, ShardKind)> {
        for kind in ShardKind::ALL {
            if let Some(base) = key.strip_suffix(kind.suffix()) {
                if !base.is_empty() {
                    return Some((base, kind));
                }
            }
        }
        None
    }
}

/// The four shards produced by [`split`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSet {
    /// First half of the ciphertext, `ceil(L / 2)` bytes.
    pub cypher_first: Bytes,
    /// Second half of the ciphertext, `floor(L / 2)` bytes.
    pub cypher_second: Bytes,
    /// First half of the pad, `ceil(L / 2)` bytes.
    pub rand_first: Bytes,
    /// Second half of the pad, `floor(L / 2)` bytes.
    pub rand_second: Bytes,
}

impl ShardSet {
    /// The shard bytes for a given kind.
    #[must_use]
    pub fn get(&self, kind: ShardKind) -> &Bytes {
        match kind {
            ShardKind::CypherFirst => &self.cypher_first,
            ShardKind::CypherSecond => &self.cypher_second,
            ShardKind::RandFirst => &self.rand_first,
            ShardKind::RandSecond => &self.rand_second,
        }
    }

    /// Iterate over all shards in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (ShardKind, &Bytes)> {
        ShardKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }
}

/// Codec failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    /// Ciphertext and pad reassembled to different lengths.
    #[error("cyphertext and pad lengths differ: {cypher} vs {pad}")]
    LengthMismatch {
        /// Reassembled ciphertext length.
        cypher: usize,
        /// Reassembled pad length.
        pad: usize,
    },
}

/// The split point for a plaintext of length `len`: `ceil(len / 2)`.
#[must_use]
pub fn mid_point(len: usize) -> usize {
    len.div_ceil(2)
}

/// Split a plaintext into its four shards using the process-wide
/// cryptographic RNG.
#[must_use]
pub fn split(plaintext: &[u8]) -> ShardSet {
    split_with_rng(plaintext, &mut rand::rng())
}

/// Split a plaintext into its four shards, drawing the pad from `rng`.
///
/// Exposed separately so properties of the codec can be checked under a
/// seeded RNG; production callers go through [`split`].
#[must_use]
pub fn split_with_rng<R: CryptoRng>(plaintext: &[u8], rng: &mut R) -> ShardSet {
    let mut pad = vec![0u8; plaintext.len()];
    rng.fill_bytes(&mut pad);

    let cypher: Vec<u8> = plaintext.iter().zip(&pad).map(|(p, r)| p ^ r).collect();

    let mid = mid_point(plaintext.len());
    let mut cypher = Bytes::from(cypher);
    let mut pad = Bytes::from(pad);
    let cypher_second = cypher.split_off(mid);
    let rand_second = pad.split_off(mid);

    ShardSet {
        cypher_first: cypher,
        cypher_second,
        rand_first: pad,
        rand_second,
    }
}

/// Reassemble the plaintext from its four shards.
///
/// The inverse of [`split`]: concatenates the ciphertext and pad halves and
/// XORs them back together. Fails when the reassembled ciphertext and pad
/// disagree on length, which indicates a corrupted or mismatched shard set.
pub fn join(
    cypher_first: &[u8],
    cypher_second: &[u8],
    rand_first: &[u8],
    rand_second: &[u8],
) -> Result<Bytes, CodecError> {
    let cypher_len = cypher_first.len() + cypher_second.len();
    let pad_len = rand_first.len() + rand_second.len();
    if cypher_len != pad_len {
        return Err(CodecError::LengthMismatch {
            cypher: cypher_len,
            pad: pad_len,
        });
    }

    let cypher = cypher_first.iter().chain(cypher_second);
    let pad = rand_first.iter().chain(rand_second);
    Ok(cypher.zip(pad).map(|(c, r)| c ^ r).collect())
}
