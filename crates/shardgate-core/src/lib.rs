//! Core of the shardgate S3 gateway.
//!
//! shardgate looks like a single S3 endpoint but stores nothing readable
//! anywhere: every object is one-time-pad encrypted and both the ciphertext
//! and the pad are split across two independent upstream S3 providers, such
//! that neither provider alone holds the material to reconstruct a single
//! byte.
//!
//! # Architecture
//!
//! ```text
//! s3s HTTP layer (routing, SigV4, XML)
//!        |
//!        v
//! ShardGateway (s3s::S3 trait impl, ops/*)
//!        |                    |
//!   codec + placement    error mapper
//!        |
//!        v
//! UpstreamStore x2 (aws-sdk-s3 adapter or in-memory store)
//! ```
//!
//! The codec ([`codec`]) pads and splits each object into four shards; the
//! placement rule ([`placement`]) pins each shard to one upstream; the
//! orchestrators ([`provider::ShardGateway`]) fan out the per-shard I/O and
//! project the four physical shards back into one logical object for
//! listings and probes. The [`splitter`] module holds the streaming
//! counterpart of the split algebra.

pub mod auth;
pub mod codec;
pub mod config;
pub mod error;
pub mod memory;
mod ops;
pub mod placement;
pub mod provider;
mod s3;
pub mod splitter;
#[cfg(test)]
mod testutil;
pub mod upstream;

pub use config::{GatewayConfig, UpstreamConfig};
pub use provider::ShardGateway;
