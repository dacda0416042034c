//! The gateway provider: the single entry point the HTTP layer consumes.
//!
//! [`ShardGateway`] holds the two upstream store handles and the gateway
//! configuration. Individual S3 operations are implemented in the
//! [`crate::ops`] submodules and wired together in the `impl s3s::S3`
//! block (see `s3.rs`).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use s3s::S3Error;

use crate::codec::ShardKind;
use crate::config::GatewayConfig;
use crate::error::map_bucket_probe;
use crate::placement::{UpstreamId, placement};
use crate::upstream::UpstreamStore;

/// The S3 backend that splits every object across two upstream stores.
///
/// Cheap to share: the upstream handles and configuration are `Arc`-wrapped.
/// The gateway holds no mutable per-request state besides the in-memory
/// body buffer during PutObject.
pub struct ShardGateway {
    upstream_a: Arc<dyn UpstreamStore>,
    upstream_b: Arc<dyn UpstreamStore>,
    config: Arc<GatewayConfig>,
}

impl fmt::Debug for ShardGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardGateway")
            .field("listen", &self.config.listen)
            .field("upstream_a", &self.config.upstream_a.endpoint)
            .field("upstream_b", &self.config.upstream_b.endpoint)
            .finish_non_exhaustive()
    }
}

impl ShardGateway {
    /// Create a gateway over the two upstream stores.
    #[must_use]
    pub fn new(
        config: GatewayConfig,
        upstream_a: Arc<dyn UpstreamStore>,
        upstream_b: Arc<dyn UpstreamStore>,
    ) -> Self {
        Self {
            upstream_a,
            upstream_b,
            config: Arc::new(config),
        }
    }

    /// The gateway configuration.
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// The upstream store with the given identity.
    pub(crate) fn upstream(&self, id: UpstreamId) -> &Arc<dyn UpstreamStore> {
        match id {
            UpstreamId::A => &self.upstream_a,
            UpstreamId::B => &self.upstream_b,
        }
    }

    /// The designated upstream store for a shard kind.
    pub(crate) fn shard_upstream(&self, kind: ShardKind) -> &Arc<dyn UpstreamStore> {
        self.upstream(placement(kind))
    }

    /// The settling interval between a bulk delete and its verification.
    pub(crate) fn delete_settle(&self) -> Duration {
        Duration::from_millis(self.config.delete_settle_ms)
    }

    /// Check that the bucket exists and is accessible.
    ///
    /// Head-probes upstream A; `NotFound` maps to `NoSuchBucket` and
    /// `Forbidden` to `AccessDenied`. A bucket absent from A can never form
    /// a complete shard set, so B is not probed.
    pub(crate) async fn check_bucket_access(&self, bucket: &str) -> Result<(), S3Error> {
        self.upstream_a
            .head_bucket(bucket)
            .await
            .map_err(|e| map_bucket_probe(e, bucket).into_s3_error())
    }
}

#[cfg(test)]
mod tests {
    use s3s::S3ErrorCode;

    use crate::memory::MemoryStore;

    use super::*;

    fn gateway() -> (ShardGateway, Arc<MemoryStore>, Arc<MemoryStore>) {
        let a = Arc::new(MemoryStore::new());
        let b = Arc::new(MemoryStore::new());
        let gw = ShardGateway::new(
            GatewayConfig::local_minio(),
            Arc::clone(&a) as Arc<dyn UpstreamStore>,
            Arc::clone(&b) as Arc<dyn UpstreamStore>,
        );
        (gw, a, b)
    }

    #[tokio::test]
    async fn test_should_route_shards_by_placement() {
        let (gw, a, b) = gateway();
        gw.shard_upstream(ShardKind::CypherFirst)
            .create_bucket("routed-a")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        gw.shard_upstream(ShardKind::RandFirst)
            .create_bucket("routed-b")
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert!(a.has_bucket("routed-a"));
        assert!(!a.has_bucket("routed-b"));
        assert!(b.has_bucket("routed-b"));
        assert!(!b.has_bucket("routed-a"));
    }

    #[tokio::test]
    async fn test_should_map_bucket_access_probe() {
        let (gw, a, _b) = gateway();
        let err = gw.check_bucket_access("missing").await.unwrap_err();
        assert_eq!(err.code(), &S3ErrorCode::NoSuchBucket);

        a.create_bucket("present").await.unwrap_or_else(|e| panic!("{e}"));
        assert!(gw.check_bucket_access("present").await.is_ok());
    }
}
