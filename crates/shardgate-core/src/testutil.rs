//! Shared helpers for the handler test modules.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::memory::MemoryStore;
use crate::provider::ShardGateway;
use crate::upstream::UpstreamStore;

/// A gateway over two fresh memory stores, with the bulk-delete settling
/// interval zeroed so tests are not clock-bound.
pub(crate) fn gateway() -> (ShardGateway, Arc<MemoryStore>, Arc<MemoryStore>) {
    let a = Arc::new(MemoryStore::new());
    let b = Arc::new(MemoryStore::new());
    let mut config = GatewayConfig::local_minio();
    config.delete_settle_ms = 0;
    let gw = ShardGateway::new(
        config,
        Arc::clone(&a) as Arc<dyn UpstreamStore>,
        Arc::clone(&b) as Arc<dyn UpstreamStore>,
    );
    (gw, a, b)
}

/// A gateway whose upstreams both already contain `bucket`.
pub(crate) async fn gateway_with_bucket(
    bucket: &str,
) -> (ShardGateway, Arc<MemoryStore>, Arc<MemoryStore>) {
    let (gw, a, b) = gateway();
    a.create_bucket(bucket)
        .await
        .unwrap_or_else(|e| panic!("create on a: {e}"));
    b.create_bucket(bucket)
        .await
        .unwrap_or_else(|e| panic!("create on b: {e}"));
    (gw, a, b)
}
