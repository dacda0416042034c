//! Object operation handlers.
//!
//! Implements `put_object` (encode + 4-way fan-out), `get_object` (fan-in +
//! decode, or passthrough for shard keys), `head_object`, `delete_object`,
//! and `delete_objects`.
//!
//! A logical object exists iff its four shards all exist in their
//! designated upstreams. Put writes all four or fails; a partial failure
//! leaves orphaned shards behind rather than rolling back, because a re-PUT
//! of the same key reliably overwrites and the listing completeness filter
//! hides the incomplete set in the meantime.

use bytes::Bytes;
use futures::TryStreamExt;
// The s3s DTO module contains dozens of types we reference; wildcard is clearer.
#[allow(clippy::wildcard_imports)]
use s3s::dto::*;
use s3s::S3Error;
use tracing::{debug, warn};

use crate::codec::{self, ShardKind};
use crate::error::{GatewayError, map_object_probe};
use crate::ops::{info_timestamp, now_timestamp};
use crate::placement::{UpstreamId, placement};
use crate::provider::ShardGateway;
use crate::upstream::{ObjectInfo, PutResult, UpstreamResult, code};

/// Buffer a request body into memory.
///
/// PutObject does not stream: each shard's upstream PUT must declare its
/// content length, which requires the full plaintext length up front.
pub(crate) async fn collect_body(
    body: Option<StreamingBlob>,
    size_hint: Option<i64>,
) -> Result<Bytes, S3Error> {
    let Some(stream) = body else {
        return Ok(Bytes::new());
    };
    let capacity = size_hint
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(8192);
    let data = stream
        .try_fold(Vec::with_capacity(capacity), |mut acc, chunk| async move {
            acc.extend_from_slice(&chunk);
            Ok(acc)
        })
        .await
        .map_err(|e| {
            GatewayError::Internal(anyhow::anyhow!("failed to read request body: {e:?}"))
                .into_s3_error()
        })?;
    Ok(Bytes::from(data))
}

/// Wrap fully-buffered bytes as a streaming response body.
pub(crate) fn streaming_body(data: Bytes) -> StreamingBlob {
    StreamingBlob::wrap::<_, std::convert::Infallible>(futures::stream::once(
        async move { Ok(data) },
    ))
}

fn head_output(info: &ObjectInfo) -> HeadObjectOutput {
    HeadObjectOutput {
        accept_ranges: Some(String::from("bytes")),
        content_length: Some(info.size),
        e_tag: info.etag.clone(),
        last_modified: info_timestamp(info),
        ..HeadObjectOutput::default()
    }
}

// AWS S3 DTOs use signed integers for inherently non-negative values
// (sizes, counts). Casting from usize is safe in practice.
#[allow(clippy::cast_possible_wrap)]
impl ShardGateway {
    async fn put_shard(
        &self,
        bucket: &str,
        key: &str,
        kind: ShardKind,
        body: Bytes,
    ) -> UpstreamResult<PutResult> {
        self.shard_upstream(kind)
            .put_object(bucket, &kind.apply(key), body)
            .await
    }

    /// Store an object as four shards across the two upstreams.
    ///
    /// The body is buffered, padded and split (see [`crate::codec`]), and
    /// the four shards are written concurrently to their designated
    /// upstreams. The first failure in canonical shard order fails the
    /// request; shards already written stay behind as an incomplete
    /// (invisible) set until the put is retried.
    ///
    /// The returned ETag and checksums are those of the `cypher.first`
    /// shard — a deterministic but arbitrary choice, so clients must not
    /// expect `ETag == MD5(body)`.
    pub async fn handle_put_object(
        &self,
        mut input: PutObjectInput,
    ) -> Result<PutObjectOutput, S3Error> {
        let bucket = input.bucket.clone();
        let key = input.key.clone();
        self.check_bucket_access(&bucket).await?;

        // Object-lock is unsupported; scrub the fields rather than letting
        // them reach an upstream that might honor them.
        if input.object_lock_mode.is_some()
            || input.object_lock_legal_hold_status.is_some()
            || input.object_lock_retain_until_date.is_some()
        {
            debug!(bucket = %bucket, key = %key, "ignoring object-lock fields on put");
            input.object_lock_mode = None;
            input.object_lock_legal_hold_status = None;
            input.object_lock_retain_until_date = None;
        }

        let body = collect_body(input.body.take(), input.content_length).await?;
        let shards = codec::split(&body);
        debug!(
            bucket = %bucket,
            key = %key,
            len = body.len(),
            first_half = shards.cypher_first.len(),
            "storing shard set"
        );

        let (cypher_first, cypher_second, rand_first, rand_second) = tokio::join!(
            self.put_shard(&bucket, &key, ShardKind::CypherFirst, shards.cypher_first),
            self.put_shard(&bucket, &key, ShardKind::CypherSecond, shards.cypher_second),
            self.put_shard(&bucket, &key, ShardKind::RandFirst, shards.rand_first),
            self.put_shard(&bucket, &key, ShardKind::RandSecond, shards.rand_second),
        );

        let first = cypher_first.map_err(|e| GatewayError::from(e).into_s3_error())?;
        cypher_second.map_err(|e| GatewayError::from(e).into_s3_error())?;
        rand_first.map_err(|e| GatewayError::from(e).into_s3_error())?;
        rand_second.map_err(|e| GatewayError::from(e).into_s3_error())?;

        Ok(PutObjectOutput {
            e_tag: first.etag,
            version_id: first.version_id,
            checksum_crc32: first.checksum_crc32,
            checksum_crc32c: first.checksum_crc32c,
            checksum_sha1: first.checksum_sha1,
            checksum_sha256: first.checksum_sha256,
            ..PutObjectOutput::default()
        })
    }

    /// Fetch an object.
    ///
    /// A shard key routes to its designated upstream unchanged (passthrough
    /// mode, used by administrative tooling). A logical key fans in all
    /// four shards concurrently, reassembles the plaintext, and answers
    /// with `Content-Length = L` and a synthetic `Last-Modified` of now —
    /// the shards' own timestamps may diverge across upstreams and a single
    /// logical object should not leak that skew.
    pub async fn handle_get_object(
        &self,
        input: GetObjectInput,
    ) -> Result<GetObjectOutput, S3Error> {
        let bucket = input.bucket;
        let key = input.key;
        self.check_bucket_access(&bucket).await?;

        if let Some((_, kind)) = ShardKind::parse(&key) {
            let got = self
                .shard_upstream(kind)
                .get_object(&bucket, &key)
                .await
                .map_err(|e| map_object_probe(e, &key).into_s3_error())?;
            let content_length = got.body.len() as i64;
            return Ok(GetObjectOutput {
                accept_ranges: Some(String::from("bytes")),
                body: Some(streaming_body(got.body)),
                content_length: Some(content_length),
                e_tag: got.info.etag.clone(),
                last_modified: info_timestamp(&got.info),
                ..GetObjectOutput::default()
            });
        }

        let (cypher_first, cypher_second, rand_first, rand_second) = tokio::join!(
            self.get_shard(&bucket, &key, ShardKind::CypherFirst),
            self.get_shard(&bucket, &key, ShardKind::CypherSecond),
            self.get_shard(&bucket, &key, ShardKind::RandFirst),
            self.get_shard(&bucket, &key, ShardKind::RandSecond),
        );
        let cypher_first = cypher_first.map_err(|e| map_object_probe(e, &key).into_s3_error())?;
        let cypher_second = cypher_second.map_err(|e| map_object_probe(e, &key).into_s3_error())?;
        let rand_first = rand_first.map_err(|e| map_object_probe(e, &key).into_s3_error())?;
        let rand_second = rand_second.map_err(|e| map_object_probe(e, &key).into_s3_error())?;

        let plaintext = codec::join(&cypher_first, &cypher_second, &rand_first, &rand_second)
            .map_err(|e| GatewayError::Internal(anyhow::anyhow!(e)).into_s3_error())?;

        debug!(bucket = %bucket, key = %key, len = plaintext.len(), "reassembled object");

        let content_length = plaintext.len() as i64;
        Ok(GetObjectOutput {
            accept_ranges: Some(String::from("bytes")),
            body: Some(streaming_body(plaintext)),
            content_length: Some(content_length),
            last_modified: Some(now_timestamp()),
            ..GetObjectOutput::default()
        })
    }

    async fn get_shard(&self, bucket: &str, key: &str, kind: ShardKind) -> UpstreamResult<Bytes> {
        let shard_key = kind.apply(key);
        let got = self
            .shard_upstream(kind)
            .get_object(bucket, &shard_key)
            .await?;
        Ok(got.body)
    }

    /// Probe an object's existence and metadata.
    ///
    /// A shard key passes through to its designated upstream. For a
    /// logical key the four shard names are probed in canonical order on
    /// their designated upstreams; the first hit answers with that shard's
    /// metadata (so the reported `Content-Length` is a shard size, about
    /// half the logical length). No hit means `NoSuchKey`.
    pub async fn handle_head_object(
        &self,
        input: HeadObjectInput,
    ) -> Result<HeadObjectOutput, S3Error> {
        let bucket = input.bucket;
        let key = input.key;
        self.check_bucket_access(&bucket).await?;

        if let Some((_, kind)) = ShardKind::parse(&key) {
            let info = self
                .shard_upstream(kind)
                .head_object(&bucket, &key)
                .await
                .map_err(|e| map_object_probe(e, &key).into_s3_error())?;
            return Ok(head_output(&info));
        }

        for kind in ShardKind::ALL {
            let shard_key = kind.apply(&key);
            match self.shard_upstream(kind).head_object(&bucket, &shard_key).await {
                Ok(info) => return Ok(head_output(&info)),
                Err(e) => {
                    debug!(bucket = %bucket, shard = %shard_key, error = %e, "head probe missed");
                }
            }
        }
        Err(GatewayError::NoSuchKey { key }.into_s3_error())
    }

    /// Delete an object.
    ///
    /// A shard key routes to its designated upstream. A logical key
    /// attempts all four shard deletes serially, best-effort: every shard
    /// gets its chance, and the last error (if any) is surfaced. Orphans
    /// from a partial failure stay hidden by the listing completeness
    /// filter until a retried delete removes them.
    pub async fn handle_delete_object(
        &self,
        input: DeleteObjectInput,
    ) -> Result<DeleteObjectOutput, S3Error> {
        let bucket = input.bucket;
        let key = input.key;
        self.check_bucket_access(&bucket).await?;

        if let Some((_, kind)) = ShardKind::parse(&key) {
            self.shard_upstream(kind)
                .delete_object(&bucket, &key)
                .await
                .map_err(|e| GatewayError::from(e).into_s3_error())?;
            return Ok(DeleteObjectOutput::default());
        }

        let mut last_err = None;
        for kind in ShardKind::ALL {
            let shard_key = kind.apply(&key);
            if let Err(e) = self
                .shard_upstream(kind)
                .delete_object(&bucket, &shard_key)
                .await
            {
                warn!(bucket = %bucket, shard = %shard_key, error = %e, "shard delete failed");
                last_err = Some(e);
            }
        }
        match last_err {
            Some(e) => Err(GatewayError::from(e).into_s3_error()),
            None => {
                debug!(bucket = %bucket, key = %key, "delete_object completed");
                Ok(DeleteObjectOutput::default())
            }
        }
    }

    /// Bulk-delete objects.
    ///
    /// Each input key is either a shard (routed to one upstream) or a
    /// logical key (expanded to its four shard names). The two per-upstream
    /// work lists run in parallel with each other but serially within,
    /// keeping the verification-probe ordering well-defined. Per-key
    /// failures land in the response error list; the operation itself
    /// succeeds.
    pub async fn handle_delete_objects(
        &self,
        input: DeleteObjectsInput,
    ) -> Result<DeleteObjectsOutput, S3Error> {
        let bucket = input.bucket;

        let mut work_a = Vec::new();
        let mut work_b = Vec::new();
        for object in input.delete.objects {
            let key = object.key;
            if let Some((_, kind)) = ShardKind::parse(&key) {
                match placement(kind) {
                    UpstreamId::A => work_a.push(key),
                    UpstreamId::B => work_b.push(key),
                }
            } else {
                for kind in ShardKind::ALL {
                    let shard_key = kind.apply(&key);
                    match placement(kind) {
                        UpstreamId::A => work_a.push(shard_key),
                        UpstreamId::B => work_b.push(shard_key),
                    }
                }
            }
        }

        let ((mut deleted, mut errors), (deleted_b, errors_b)) = tokio::join!(
            self.bulk_delete(UpstreamId::A, &bucket, work_a),
            self.bulk_delete(UpstreamId::B, &bucket, work_b),
        );
        deleted.extend(deleted_b);
        errors.extend(errors_b);

        debug!(
            bucket = %bucket,
            deleted = deleted.len(),
            errors = errors.len(),
            "delete_objects completed"
        );

        Ok(DeleteObjectsOutput {
            deleted: if deleted.is_empty() {
                None
            } else {
                Some(deleted)
            },
            errors: if errors.is_empty() { None } else { Some(errors) },
            request_charged: None,
        })
    }

    /// Serially delete and verify one upstream's shard work list.
    ///
    /// A key that is already absent is skipped — missing-before-delete is
    /// treated as already-deleted, not an error. After each delete the
    /// settling interval elapses and a verification probe must come back
    /// `NotFound`; anything else yields a `DeletionVerificationFailed`
    /// entry for that key.
    async fn bulk_delete(
        &self,
        id: UpstreamId,
        bucket: &str,
        keys: Vec<String>,
    ) -> (Vec<DeletedObject>, Vec<Error>) {
        let store = self.upstream(id);
        let mut deleted = Vec::new();
        let mut errors = Vec::new();

        for key in keys {
            match store.head_object(bucket, &key).await {
                Err(e) if e.is_not_found() => {
                    debug!(upstream = %id, key = %key, "already absent before delete");
                    continue;
                }
                Err(e) => {
                    warn!(upstream = %id, key = %key, error = %e, "pre-delete probe failed");
                }
                Ok(_) => {}
            }

            if let Err(e) = store.delete_object(bucket, &key).await {
                errors.push(Error {
                    code: Some(e.code.clone()),
                    key: Some(key),
                    message: Some(e.message),
                    version_id: None,
                });
                continue;
            }

            // Give an eventually-consistent upstream time to converge
            // before the verification probe.
            tokio::time::sleep(self.delete_settle()).await;

            match store.head_object(bucket, &key).await {
                Err(e) if e.is_not_found() => {
                    deleted.push(DeletedObject {
                        delete_marker: None,
                        delete_marker_version_id: None,
                        key: Some(key),
                        version_id: None,
                    });
                }
                Ok(_) => {
                    warn!(upstream = %id, key = %key, "object still present after delete");
                    errors.push(Error {
                        code: Some(code::DELETION_VERIFICATION_FAILED.to_owned()),
                        key: Some(key),
                        message: Some(String::from("object still exists after deletion")),
                        version_id: None,
                    });
                }
                Err(e) => {
                    errors.push(Error {
                        code: Some(code::DELETION_VERIFICATION_FAILED.to_owned()),
                        key: Some(key),
                        message: Some(format!("verification probe failed: {e}")),
                        version_id: None,
                    });
                }
            }
        }

        (deleted, errors)
    }
}

#[cfg(test)]
mod tests {
    use s3s::S3ErrorCode;

    use crate::testutil::{gateway, gateway_with_bucket};
    use crate::upstream::{UpstreamError, UpstreamStore};

    use super::*;

    fn put_input(bucket: &str, key: &str, body: &[u8]) -> PutObjectInput {
        PutObjectInput::builder()
            .bucket(bucket.to_owned())
            .key(key.to_owned())
            .body(Some(streaming_body(Bytes::copy_from_slice(body))))
            .build()
            .unwrap_or_else(|e| panic!("input: {e}"))
    }

    fn get_input(bucket: &str, key: &str) -> GetObjectInput {
        GetObjectInput::builder()
            .bucket(bucket.to_owned())
            .key(key.to_owned())
            .build()
            .unwrap_or_else(|e| panic!("input: {e}"))
    }

    fn head_input(bucket: &str, key: &str) -> HeadObjectInput {
        HeadObjectInput::builder()
            .bucket(bucket.to_owned())
            .key(key.to_owned())
            .build()
            .unwrap_or_else(|e| panic!("input: {e}"))
    }

    fn delete_input(bucket: &str, key: &str) -> DeleteObjectInput {
        DeleteObjectInput::builder()
            .bucket(bucket.to_owned())
            .key(key.to_owned())
            .build()
            .unwrap_or_else(|e| panic!("input: {e}"))
    }

    fn bulk_input(bucket: &str, keys: &[&str]) -> DeleteObjectsInput {
        let objects = keys
            .iter()
            .map(|k| ObjectIdentifier {
                e_tag: None,
                key: (*k).to_owned().into(),
                last_modified_time: None,
                size: None,
                version_id: None,
            })
            .collect();
        DeleteObjectsInput::builder()
            .bucket(bucket.to_owned())
            .delete(Delete {
                objects,
                quiet: None,
            })
            .build()
            .unwrap_or_else(|e| panic!("input: {e}"))
    }

    async fn body_of(output: GetObjectOutput) -> Vec<u8> {
        collect_body(output.body, output.content_length)
            .await
            .unwrap_or_else(|e| panic!("body: {e}"))
            .to_vec()
    }

    #[tokio::test]
    async fn test_should_roundtrip_put_then_get() {
        let (gw, a, b) = gateway_with_bucket("b1").await;

        let put = gw
            .handle_put_object(put_input("b1", "hello.txt", b"Hello, world!"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(put.e_tag.is_some());

        // Two shards per upstream, for opposing halves.
        let mut keys_a = a.object_keys("b1");
        keys_a.sort();
        assert_eq!(keys_a, ["hello.txt.cypher.first", "hello.txt.rand.second"]);
        let mut keys_b = b.object_keys("b1");
        keys_b.sort();
        assert_eq!(keys_b, ["hello.txt.cypher.second", "hello.txt.rand.first"]);

        let got = gw
            .handle_get_object(get_input("b1", "hello.txt"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(got.content_length, Some(13));
        assert!(got.last_modified.is_some());
        assert_eq!(body_of(got).await, b"Hello, world!");
    }

    #[tokio::test]
    async fn test_should_roundtrip_empty_body() {
        let (gw, _a, _b) = gateway_with_bucket("b1").await;

        gw.handle_put_object(put_input("b1", "empty", b""))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let got = gw
            .handle_get_object(get_input("b1", "empty"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(got.content_length, Some(0));
        assert!(body_of(got).await.is_empty());
    }

    #[tokio::test]
    async fn test_should_fan_out_exactly_four_puts() {
        let (gw, a, b) = gateway_with_bucket("b1").await;

        let body = vec![7u8; 1024 * 1024];
        gw.handle_put_object(put_input("b1", "big.bin", &body))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert_eq!(a.recorded("put_object").len(), 2);
        assert_eq!(b.recorded("put_object").len(), 2);

        // Ceiling split: A's cypher.first carries the extra byte for odd
        // lengths; here the halves are even.
        let info = a
            .head_object("b1", "big.bin.cypher.first")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(info.size, 512 * 1024);
    }

    #[tokio::test]
    async fn test_should_surface_put_failure_without_rollback() {
        let (gw, a, b) = gateway_with_bucket("b1").await;
        b.fail_put_object(UpstreamError::new("SlowDown", "simulated outage"));

        let err = gw
            .handle_put_object(put_input("b1", "k", b"data"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), &S3ErrorCode::SlowDown);

        // The A-side shards stay behind; the completeness filter hides them.
        assert_eq!(a.object_keys("b1").len(), 2);
        assert!(b.object_keys("b1").is_empty());
    }

    #[tokio::test]
    async fn test_should_fail_get_when_a_shard_is_missing() {
        let (gw, _a, b) = gateway_with_bucket("b1").await;
        gw.handle_put_object(put_input("b1", "hello.txt", b"Hello, world!"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        assert!(b.remove_object("b1", "hello.txt.rand.first"));

        let err = gw
            .handle_get_object(get_input("b1", "hello.txt"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), &S3ErrorCode::NoSuchKey);
    }

    #[tokio::test]
    async fn test_should_passthrough_get_for_shard_key() {
        let (gw, a, _b) = gateway_with_bucket("b1").await;
        gw.handle_put_object(put_input("b1", "hello.txt", b"Hello, world!"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let got = gw
            .handle_get_object(get_input("b1", "hello.txt.cypher.first"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(got.content_length, Some(7));
        let expected = a
            .get_object("b1", "hello.txt.cypher.first")
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(body_of(got).await, expected.body.to_vec());
    }

    #[tokio::test]
    async fn test_should_head_logical_key_via_first_shard() {
        let (gw, _a, _b) = gateway_with_bucket("b1").await;
        gw.handle_put_object(put_input("b1", "hello.txt", b"Hello, world!"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let head = gw
            .handle_head_object(head_input("b1", "hello.txt"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        // Shard metadata, not logical: cypher.first is ceil(13/2) bytes.
        assert_eq!(head.content_length, Some(7));
        assert!(head.e_tag.is_some());
    }

    #[tokio::test]
    async fn test_should_head_fall_back_across_missing_shards() {
        let (gw, a, _b) = gateway_with_bucket("b1").await;
        gw.handle_put_object(put_input("b1", "hello.txt", b"Hello, world!"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(a.remove_object("b1", "hello.txt.cypher.first"));

        // cypher.second (6 bytes, upstream B) answers next.
        let head = gw
            .handle_head_object(head_input("b1", "hello.txt"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(head.content_length, Some(6));
    }

    #[tokio::test]
    async fn test_should_return_no_such_key_for_absent_head() {
        let (gw, _a, _b) = gateway_with_bucket("b1").await;
        let err = gw
            .handle_head_object(head_input("b1", "ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), &S3ErrorCode::NoSuchKey);
    }

    #[tokio::test]
    async fn test_should_delete_all_four_shards() {
        let (gw, a, b) = gateway_with_bucket("b1").await;
        gw.handle_put_object(put_input("b1", "doomed", b"payload"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        gw.handle_delete_object(delete_input("b1", "doomed"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(a.object_keys("b1").is_empty());
        assert!(b.object_keys("b1").is_empty());

        // Idempotent: deleting the now-absent key still succeeds.
        gw.handle_delete_object(delete_input("b1", "doomed"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
    }

    #[tokio::test]
    async fn test_should_route_shard_key_delete() {
        let (gw, a, b) = gateway_with_bucket("b1").await;
        gw.handle_put_object(put_input("b1", "k", b"payload"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        gw.handle_delete_object(delete_input("b1", "k.rand.second"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let keys_a = a.object_keys("b1");
        assert_eq!(keys_a, ["k.cypher.first"]);
        assert_eq!(b.object_keys("b1").len(), 2);
    }

    #[tokio::test]
    async fn test_should_bulk_delete_with_missing_shard() {
        let (gw, _a, b) = gateway_with_bucket("b1").await;
        gw.handle_put_object(put_input("b1", "k1", b"first"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        gw.handle_put_object(put_input("b1", "k2", b"second"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert!(b.remove_object("b1", "k2.cypher.second"));

        let output = gw
            .handle_delete_objects(bulk_input("b1", &["k1", "k2"]))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        // k1 contributes four shard deletions, k2 only three: the missing
        // shard counts as already deleted, not as an error.
        let deleted = output.deleted.unwrap_or_default();
        assert_eq!(deleted.len(), 7);
        assert!(output.errors.is_none());
    }

    #[tokio::test]
    async fn test_should_report_verification_failures() {
        let (gw, a, _b) = gateway_with_bucket("b1").await;
        gw.handle_put_object(put_input("b1", "stuck", b"payload"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        a.skip_deletes(true);

        let output = gw
            .handle_delete_objects(bulk_input("b1", &["stuck"]))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let errors = output.errors.unwrap_or_default();
        assert_eq!(errors.len(), 2, "both A-placed shards must fail verification");
        for error in &errors {
            assert_eq!(
                error.code.as_deref(),
                Some(code::DELETION_VERIFICATION_FAILED)
            );
        }
        // The B-placed shards deleted fine.
        assert_eq!(output.deleted.unwrap_or_default().len(), 2);
    }

    #[tokio::test]
    async fn test_should_check_bucket_access_first() {
        let (gw, _a, _b) = gateway();
        let err = gw
            .handle_put_object(put_input("nobucket", "k", b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), &S3ErrorCode::NoSuchBucket);

        let err = gw
            .handle_get_object(get_input("nobucket", "k"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), &S3ErrorCode::NoSuchBucket);
    }
}
