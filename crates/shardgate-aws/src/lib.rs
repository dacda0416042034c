//! `aws-sdk-s3` implementation of the shardgate upstream capability.
//!
//! [`AwsUpstream`] backs [`shardgate_core::upstream::UpstreamStore`] with a
//! real S3 client: custom endpoint, static credentials, forced path-style
//! addressing (required for MinIO and most S3-compatible stores), and
//! operation/connect timeouts. Shard PUTs are issued with payload signing
//! disabled — the shard bodies are not part of the SigV4 payload hash.
//!
//! GET bodies are collected in full before the response crosses the
//! capability boundary, so a sibling failure in a concurrent fan-in can
//! never strand a half-read connection.
//!
//! SDK failures are reduced to
//! [`shardgate_core::upstream::UpstreamError`], keeping the service error
//! code, message, and HTTP status; transport-level failures become
//! `InternalError` with the SDK's description.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Tag, Tagging};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tracing::debug;

use shardgate_core::config::{ConfigError, UpstreamConfig};
use shardgate_core::upstream::{
    BucketEntry, GetResult, ListPage, ListRequest, ObjectInfo, PutResult, UpstreamError,
    UpstreamResult, UpstreamStore, code,
};

/// Per-request timeout covering the whole operation.
const OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection establishment timeout (covers the TLS handshake).
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An upstream S3 store reached through the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsUpstream {
    client: Client,
    region: String,
    label: String,
}

impl AwsUpstream {
    /// Build a client for the given upstream.
    ///
    /// Validates the config first; construction itself performs no I/O, so
    /// a bad endpoint only surfaces on the first call.
    pub async fn connect(
        label: impl Into<String>,
        config: &UpstreamConfig,
    ) -> Result<Self, ConfigError> {
        let label = label.into();
        config.validate(&label)?;

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "shardgate-static",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let timeouts = TimeoutConfig::builder()
            .operation_timeout(OPERATION_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build();

        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .endpoint_url(&config.endpoint)
            .force_path_style(true)
            .timeout_config(timeouts)
            .build();

        debug!(upstream = %label, endpoint = %config.endpoint, "built upstream client");

        Ok(Self {
            client: Client::from_conf(s3_config),
            region: config.region.clone(),
            label,
        })
    }

    /// The label this upstream was built with (used in logs).
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Fallback protocol code when a service error carries none.
fn default_code(status: u16) -> &'static str {
    match status {
        404 => code::NOT_FOUND,
        403 => code::FORBIDDEN,
        _ => code::INTERNAL_ERROR,
    }
}

/// Reduce an SDK failure to the capability error type.
fn to_upstream<E>(op: &str, err: SdkError<E>) -> UpstreamError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(ctx) => {
            let status = ctx.raw().status().as_u16();
            let service_err = ctx.err();
            let error_code = service_err
                .code()
                .map_or_else(|| default_code(status).to_owned(), ToOwned::to_owned);
            let message = service_err.message().map_or_else(
                || format!("{op} failed with http status {status}"),
                ToOwned::to_owned,
            );
            UpstreamError::new(error_code, message).with_status(status)
        }
        _ => UpstreamError::new(code::INTERNAL_ERROR, format!("{op} failed: {err}")),
    }
}

fn to_chrono(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
}

#[async_trait]
impl UpstreamStore for AwsUpstream {
    async fn list_buckets(&self) -> UpstreamResult<Vec<BucketEntry>> {
        let output = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| to_upstream("list_buckets", e))?;

        Ok(output
            .buckets()
            .iter()
            .filter_map(|bucket| {
                let name = bucket.name()?.to_owned();
                let created = bucket.creation_date().and_then(to_chrono)?;
                Some(BucketEntry { name, created })
            })
            .collect())
    }

    async fn head_bucket(&self, bucket: &str) -> UpstreamResult<()> {
        self.client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| to_upstream("head_bucket", e))?;
        Ok(())
    }

    async fn create_bucket(&self, bucket: &str) -> UpstreamResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        // us-east-1 is the only region without a location constraint.
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| to_upstream("create_bucket", e))?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> UpstreamResult<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| to_upstream("delete_bucket", e))?;
        Ok(())
    }

    async fn bucket_tags(&self, bucket: &str) -> UpstreamResult<HashMap<String, String>> {
        let output = self
            .client
            .get_bucket_tagging()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| to_upstream("get_bucket_tagging", e))?;

        Ok(output
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_owned(), tag.value().to_owned()))
            .collect())
    }

    async fn set_bucket_tags(
        &self,
        bucket: &str,
        tags: HashMap<String, String>,
    ) -> UpstreamResult<()> {
        let tag_set: Vec<Tag> = tags
            .into_iter()
            .map(|(key, value)| {
                Tag::builder().key(key).value(value).build().map_err(|e| {
                    UpstreamError::new(code::INTERNAL_ERROR, format!("invalid tag: {e}"))
                })
            })
            .collect::<Result<_, _>>()?;
        let tagging = Tagging::builder()
            .set_tag_set(Some(tag_set))
            .build()
            .map_err(|e| {
                UpstreamError::new(code::INTERNAL_ERROR, format!("invalid tag set: {e}"))
            })?;

        self.client
            .put_bucket_tagging()
            .bucket(bucket)
            .tagging(tagging)
            .send()
            .await
            .map_err(|e| to_upstream("put_bucket_tagging", e))?;
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> UpstreamResult<ObjectInfo> {
        let output = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| to_upstream("head_object", e))?;

        Ok(ObjectInfo {
            key: key.to_owned(),
            etag: output.e_tag().map(ToOwned::to_owned),
            size: output.content_length().unwrap_or(0),
            last_modified: output.last_modified().and_then(to_chrono),
            storage_class: output.storage_class().map(|sc| sc.as_str().to_owned()),
        })
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> UpstreamResult<PutResult> {
        let content_length = i64::try_from(body.len()).map_err(|_| {
            UpstreamError::new(code::INTERNAL_ERROR, "shard body exceeds i64 length")
        })?;

        // The shard body is excluded from the SigV4 payload hash; the
        // header signature still authenticates the request.
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_length(content_length)
            .body(ByteStream::from(body))
            .customize()
            .disable_payload_signing()
            .send()
            .await
            .map_err(|e| to_upstream("put_object", e))?;

        Ok(PutResult {
            etag: output.e_tag().map(ToOwned::to_owned),
            version_id: output.version_id().map(ToOwned::to_owned),
            checksum_crc32: output.checksum_crc32().map(ToOwned::to_owned),
            checksum_crc32c: output.checksum_crc32_c().map(ToOwned::to_owned),
            checksum_sha1: output.checksum_sha1().map(ToOwned::to_owned),
            checksum_sha256: output.checksum_sha256().map(ToOwned::to_owned),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> UpstreamResult<GetResult> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| to_upstream("get_object", e))?;

        // Capture the metadata before the body consumes the response.
        let etag = output.e_tag().map(ToOwned::to_owned);
        let last_modified = output.last_modified().and_then(to_chrono);
        let storage_class = output.storage_class().map(|sc| sc.as_str().to_owned());

        let body = output.body.collect().await.map_err(|e| {
            UpstreamError::new(
                code::INTERNAL_ERROR,
                format!("get_object body read failed: {e}"),
            )
        })?;
        let body = body.into_bytes();

        Ok(GetResult {
            info: ObjectInfo {
                key: key.to_owned(),
                etag,
                size: i64::try_from(body.len()).unwrap_or(i64::MAX),
                last_modified,
                storage_class,
            },
            body,
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> UpstreamResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| to_upstream("delete_object", e))?;
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> UpstreamResult<ListPage> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .set_prefix(request.prefix.clone())
            .set_delimiter(request.delimiter.clone())
            .set_max_keys(request.max_keys)
            .send()
            .await
            .map_err(|e| to_upstream("list_objects_v2", e))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|object| {
                Some(ObjectInfo {
                    key: object.key()?.to_owned(),
                    etag: object.e_tag().map(ToOwned::to_owned),
                    size: object.size().unwrap_or(0),
                    last_modified: object.last_modified().and_then(to_chrono),
                    storage_class: object.storage_class().map(|sc| sc.as_str().to_owned()),
                })
            })
            .collect();

        let common_prefixes = output
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(ToOwned::to_owned))
            .collect();

        Ok(ListPage {
            objects,
            common_prefixes,
        })
    }
}
