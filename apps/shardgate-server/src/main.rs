//! shardgate server — an S3-compatible gateway that splits every object
//! across two upstream S3 stores.
//!
//! The binary wires the gateway core to the `s3s` HTTP layer: it builds the
//! two upstream clients from configuration, probes their connectivity,
//! and serves the S3 API with path-style addressing, SigV4 authentication
//! against a single root account, and a JSON health endpoint.
//!
//! # Usage
//!
//! ```text
//! SHARDGATE_LISTEN=0.0.0.0:9000 shardgate-server
//! ```
//!
//! Configuration comes from `SHARDGATE_*` environment variables; see
//! `shardgate_core::config` for the full table. `RUST_LOG` overrides the
//! configured log level.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use hyper::body::Incoming;
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as HttpConnBuilder;
use s3s::service::S3ServiceBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use shardgate_aws::AwsUpstream;
use shardgate_core::auth::GatewayAuth;
use shardgate_core::upstream::UpstreamStore;
use shardgate_core::{GatewayConfig, ShardGateway};

/// Server version reported in health check responses.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON health check response body.
fn health_response_body() -> Bytes {
    Bytes::from(format!(
        r#"{{"services":{{"s3":"running"}},"edition":"shardgate","version":"{VERSION}"}}"#,
    ))
}

/// A wrapper service that intercepts the health path before delegating to
/// s3s.
#[derive(Debug, Clone)]
struct HealthCheckService {
    inner: s3s::service::SharedS3Service,
    health_body: Arc<Bytes>,
}

impl HealthCheckService {
    fn new(inner: s3s::service::SharedS3Service) -> Self {
        Self {
            inner,
            health_body: Arc::new(health_response_body()),
        }
    }
}

impl Service<Request<Incoming>> for HealthCheckService {
    type Response = Response<s3s::Body>;
    type Error = s3s::S3Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        if req.uri().path() == "/health" {
            let body = self.health_body.clone();
            return Box::pin(async move {
                let response = Response::builder()
                    .status(StatusCode::OK)
                    .header("content-type", "application/json")
                    .body(s3s::Body::from((*body).clone()))
                    .map_err(|e| {
                        s3s::S3Error::with_source(
                            s3s::S3ErrorCode::InternalError,
                            Box::new(e) as Box<dyn std::error::Error + Send + Sync>,
                        )
                    })?;
                Ok(response)
            });
        }

        self.inner.call(req)
    }
}

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the configured level.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Verify an upstream answers at all; a failure is logged, not fatal, since
/// the upstream may simply not be up yet.
async fn probe_upstream(label: &str, store: &Arc<dyn UpstreamStore>) {
    match store.list_buckets().await {
        Ok(buckets) => {
            info!(upstream = label, buckets = buckets.len(), "upstream reachable");
        }
        Err(e) => warn!(upstream = label, error = %e, "upstream connectivity check failed"),
    }
}

/// Build the s3s service around the gateway.
async fn build_s3_service(config: GatewayConfig) -> Result<s3s::service::SharedS3Service> {
    let upstream_a: Arc<dyn UpstreamStore> =
        Arc::new(AwsUpstream::connect("a", &config.upstream_a).await?);
    let upstream_b: Arc<dyn UpstreamStore> =
        Arc::new(AwsUpstream::connect("b", &config.upstream_b).await?);

    probe_upstream("a", &upstream_a).await;
    probe_upstream("b", &upstream_b).await;

    let auth = GatewayAuth::new(
        config.root_access_key.clone(),
        config.root_secret_key.clone(),
    );
    let gateway = ShardGateway::new(config, upstream_a, upstream_b);

    let mut builder = S3ServiceBuilder::new(gateway);
    builder.set_auth(auth);
    // Path-style addressing only; no virtual-hosted domain is configured.
    Ok(builder.build().into_shared())
}

/// Run the accept loop, serving connections until a shutdown signal.
async fn serve(listener: TcpListener, service: HealthCheckService) -> Result<()> {
    let graceful = hyper_util::server::graceful::GracefulShutdown::new();
    let http = HttpConnBuilder::new(TokioExecutor::new());

    let shutdown = async {
        tokio::signal::ctrl_c().await.ok();
        info!("received shutdown signal, draining connections");
    };

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                let (stream, peer_addr) = match result {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "failed to accept connection");
                        continue;
                    }
                };

                let svc = service.clone();
                let conn = http.serve_connection(TokioIo::new(stream), svc);
                let conn = graceful.watch(conn.into_owned());

                tokio::spawn(async move {
                    if let Err(e) = conn.await {
                        error!(peer_addr = %peer_addr, error = %e, "connection error");
                    }
                });
            }

            () = &mut shutdown => {
                info!("shutting down gracefully");
                break;
            }
        }
    }

    // Wait for in-flight requests to complete.
    graceful.shutdown().await;
    info!("all connections drained, exiting");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = GatewayConfig::from_env()?;

    init_tracing(&config.log_level)?;

    info!(
        listen = %config.listen,
        upstream_a = %config.upstream_a.endpoint,
        upstream_b = %config.upstream_b.endpoint,
        version = VERSION,
        "starting shardgate server",
    );

    let listen = config.listen.clone();
    let s3_service = build_s3_service(config).await?;
    let service = HealthCheckService::new(s3_service);

    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid bind address: {listen}"))?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    info!(%addr, "listening for connections");

    serve(listener, service).await
}
