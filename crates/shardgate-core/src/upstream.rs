//! Capability façade over an upstream object store.
//!
//! The orchestrators never see a concrete S3 client; they talk to
//! [`UpstreamStore`], a narrow head/put/get/delete/list capability plus
//! bucket tagging. Production backs it with the `aws-sdk-s3` adapter from
//! `shardgate-aws`; tests back it with [`crate::memory::MemoryStore`].
//!
//! Errors cross this boundary as [`UpstreamError`] — the upstream's protocol
//! error code and description, with the HTTP status when one was observed.
//! The error mapper in [`crate::error`] translates these into the gateway's
//! client-facing S3 error taxonomy.

use std::collections::HashMap;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// Well-known upstream protocol error codes.
pub mod code {
    /// Generic 404 from head probes.
    pub const NOT_FOUND: &str = "NotFound";
    /// The referenced bucket does not exist.
    pub const NO_SUCH_BUCKET: &str = "NoSuchBucket";
    /// The referenced key does not exist.
    pub const NO_SUCH_KEY: &str = "NoSuchKey";
    /// Generic 403 from head probes.
    pub const FORBIDDEN: &str = "Forbidden";
    /// Explicit access denial.
    pub const ACCESS_DENIED: &str = "AccessDenied";
    /// The bucket has no tag set.
    pub const NO_SUCH_TAG_SET: &str = "NoSuchTagSet";
    /// The upstream does not implement the operation.
    pub const NOT_IMPLEMENTED: &str = "NotImplemented";
    /// The bucket still contains objects.
    pub const BUCKET_NOT_EMPTY: &str = "BucketNotEmpty";
    /// The bucket name is taken.
    pub const BUCKET_ALREADY_EXISTS: &str = "BucketAlreadyExists";
    /// Catch-all for unclassified failures.
    pub const INTERNAL_ERROR: &str = "InternalError";
    /// A bulk-delete verification probe found the object still present.
    pub const DELETION_VERIFICATION_FAILED: &str = "DeletionVerificationFailed";
}

/// An error reported by an upstream store.
///
/// Carries the upstream's protocol code and description verbatim so the
/// gateway can preserve them when surfacing the failure to clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct UpstreamError {
    /// Protocol error code, e.g. `NoSuchKey`.
    pub code: String,
    /// Human-readable description.
    pub message: String,
    /// HTTP status, when the failure came from an HTTP response.
    pub status: Option<u16>,
}

impl UpstreamError {
    /// Create an error with a code and message and no HTTP status.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Attach the observed HTTP status.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// A `NotFound` error with a 404 status.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(code::NOT_FOUND, message).with_status(404)
    }

    /// Whether this error means "the thing is not there".
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.code == code::NOT_FOUND
            || self.code == code::NO_SUCH_BUCKET
            || self.code == code::NO_SUCH_KEY
            || self.status == Some(404)
    }

    /// Whether this error means "you may not touch the thing".
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.code == code::FORBIDDEN || self.code == code::ACCESS_DENIED || self.status == Some(403)
    }

    /// Whether this is a missing-tag-set report from a tag read.
    ///
    /// Matched by substring: some upstreams wrap the code (AWS SDKs have
    /// shipped `NoSuchTagSet` under a composite code).
    #[must_use]
    pub fn is_tag_set_missing(&self) -> bool {
        self.code.contains(code::NO_SUCH_TAG_SET)
    }

    /// Whether the upstream declined the operation as unimplemented.
    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        self.code.contains(code::NOT_IMPLEMENTED)
    }
}

/// Convenience result alias for upstream calls.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

/// A bucket as listed by an upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketEntry {
    /// Bucket name.
    pub name: String,
    /// Creation date reported by the upstream.
    pub created: DateTime<Utc>,
}

/// Object metadata as reported by an upstream head or list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Full key of the object (a shard key, for gateway-owned objects).
    pub key: String,
    /// Entity tag, if reported.
    pub etag: Option<String>,
    /// Size in bytes.
    pub size: i64,
    /// Last-modified time, if reported.
    pub last_modified: Option<DateTime<Utc>>,
    /// Storage class, if reported.
    pub storage_class: Option<String>,
}

/// Result of an upstream PUT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutResult {
    /// Entity tag of the stored object.
    pub etag: Option<String>,
    /// Version ID, when the upstream versions the bucket.
    pub version_id: Option<String>,
    /// CRC32 checksum echoed by the upstream.
    pub checksum_crc32: Option<String>,
    /// CRC32C checksum echoed by the upstream.
    pub checksum_crc32c: Option<String>,
    /// SHA-1 checksum echoed by the upstream.
    pub checksum_sha1: Option<String>,
    /// SHA-256 checksum echoed by the upstream.
    pub checksum_sha256: Option<String>,
}

/// Result of an upstream GET: the full body plus its metadata.
///
/// Bodies cross this boundary fully read. Adapters must drain or release
/// the underlying response on every path, so a sibling failure mid fan-in
/// can never leak a half-read connection.
#[derive(Debug, Clone)]
pub struct GetResult {
    /// The object bytes.
    pub body: Bytes,
    /// Metadata of the object.
    pub info: ObjectInfo,
}

/// Parameters forwarded to an upstream list call.
#[derive(Debug, Clone, Default)]
pub struct ListRequest {
    /// Key prefix filter.
    pub prefix: Option<String>,
    /// Delimiter for common-prefix rollup.
    pub delimiter: Option<String>,
    /// Page size cap.
    pub max_keys: Option<i32>,
}

/// A single page of upstream list results.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects in the page.
    pub objects: Vec<ObjectInfo>,
    /// Common prefixes rolled up under the delimiter.
    pub common_prefixes: Vec<String>,
}

/// The object-store capability the gateway requires of each upstream.
///
/// Object-safe so the gateway can hold `Arc<dyn UpstreamStore>` and tests
/// can substitute doubles.
#[async_trait]
pub trait UpstreamStore: Send + Sync + 'static {
    /// List all buckets.
    async fn list_buckets(&self) -> UpstreamResult<Vec<BucketEntry>>;

    /// Probe a bucket for existence and accessibility.
    async fn head_bucket(&self, bucket: &str) -> UpstreamResult<()>;

    /// Create a bucket.
    async fn create_bucket(&self, bucket: &str) -> UpstreamResult<()>;

    /// Delete a bucket.
    async fn delete_bucket(&self, bucket: &str) -> UpstreamResult<()>;

    /// Read the bucket's tag set.
    ///
    /// A bucket with no tags reports [`code::NO_SUCH_TAG_SET`], matching S3.
    async fn bucket_tags(&self, bucket: &str) -> UpstreamResult<HashMap<String, String>>;

    /// Replace the bucket's tag set.
    async fn set_bucket_tags(
        &self,
        bucket: &str,
        tags: HashMap<String, String>,
    ) -> UpstreamResult<()>;

    /// Probe an object and return its metadata.
    async fn head_object(&self, bucket: &str, key: &str) -> UpstreamResult<ObjectInfo>;

    /// Store an object.
    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> UpstreamResult<PutResult>;

    /// Fetch an object, fully reading its body.
    async fn get_object(&self, bucket: &str, key: &str) -> UpstreamResult<GetResult>;

    /// Delete an object. Deleting an absent key succeeds, matching S3.
    async fn delete_object(&self, bucket: &str, key: &str) -> UpstreamResult<()>;

    /// List one page of objects.
    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> UpstreamResult<ListPage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_classify_not_found() {
        assert!(UpstreamError::not_found("missing").is_not_found());
        assert!(UpstreamError::new(code::NO_SUCH_KEY, "missing").is_not_found());
        assert!(UpstreamError::new("SomethingElse", "x").with_status(404).is_not_found());
        assert!(!UpstreamError::new(code::ACCESS_DENIED, "no").is_not_found());
    }

    #[test]
    fn test_should_classify_forbidden() {
        assert!(UpstreamError::new(code::FORBIDDEN, "no").is_forbidden());
        assert!(UpstreamError::new("Opaque", "no").with_status(403).is_forbidden());
        assert!(!UpstreamError::not_found("missing").is_forbidden());
    }

    #[test]
    fn test_should_match_wrapped_tag_set_codes() {
        // Composite code as shipped by some SDK versions.
        let err = UpstreamError::new("NoSuchTagSetError", "no tags");
        assert!(err.is_tag_set_missing());
        assert!(UpstreamError::new(code::NOT_IMPLEMENTED, "no tagging").is_not_implemented());
    }
}
