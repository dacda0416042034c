//! Bucket operation handlers.
//!
//! Implements `list_buckets`, `create_bucket`, `delete_bucket`,
//! `head_bucket`, and `get_bucket_acl` across the two upstream stores.
//!
//! A bucket exists for clients iff it exists in both upstreams: listings
//! intersect the two upstream bucket sets, creation runs on both with
//! compensation on partial failure, and deletion runs on both surfacing
//! the failure of either.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
// The s3s DTO module contains dozens of types we reference; wildcard is clearer.
#[allow(clippy::wildcard_imports)]
use s3s::dto::*;
use s3s::S3Error;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{GatewayError, map_bucket_probe};
use crate::ops::chrono_to_timestamp;
use crate::placement::UpstreamId;
use crate::provider::ShardGateway;

/// Reserved bucket tag key under which the ACL blob is persisted on
/// upstream A. Part of the stored format.
pub(crate) const ACL_TAG_KEY: &str = "shardgateAcl";

/// Canonical identity reported as the owner of every bucket and listing.
pub(crate) const ANONYMOUS: &str = "anonymous";

/// The ACL blob stored (base64-encoded) in the reserved bucket tag.
#[derive(Debug, Serialize, Deserialize)]
struct AclBlob {
    canned: String,
}

pub(crate) fn anonymous_owner() -> Owner {
    Owner {
        display_name: Some(ANONYMOUS.to_owned()),
        id: Some(ANONYMOUS.to_owned()),
    }
}

impl ShardGateway {
    /// List the buckets visible to clients: the intersection, by name, of
    /// the two upstream bucket sets. A bucket visible in only one upstream
    /// is a skew or partial-create artifact and is not offered.
    ///
    /// The creation date is the earlier of the two upstream dates, which
    /// keeps listings stable across retries and re-creation skew.
    pub async fn handle_list_buckets(
        &self,
        _input: ListBucketsInput,
    ) -> Result<ListBucketsOutput, S3Error> {
        let (from_a, from_b) = tokio::join!(
            self.upstream(UpstreamId::A).list_buckets(),
            self.upstream(UpstreamId::B).list_buckets(),
        );
        let from_a = from_a.map_err(|e| GatewayError::from(e).into_s3_error())?;
        let from_b = from_b.map_err(|e| GatewayError::from(e).into_s3_error())?;

        let dates_b: HashMap<&str, chrono::DateTime<chrono::Utc>> =
            from_b.iter().map(|b| (b.name.as_str(), b.created)).collect();

        let buckets: Vec<Bucket> = from_a
            .iter()
            .filter_map(|entry| {
                dates_b.get(entry.name.as_str()).map(|date_b| Bucket {
                    name: Some(entry.name.clone()),
                    creation_date: Some(chrono_to_timestamp(entry.created.min(*date_b))),
                    bucket_region: None,
                })
            })
            .collect();

        debug!(count = buckets.len(), "list_buckets completed");

        Ok(ListBucketsOutput {
            buckets: Some(buckets),
            continuation_token: None,
            owner: Some(anonymous_owner()),
            prefix: None,
        })
    }

    /// Create a bucket on both upstreams.
    ///
    /// Fails with `BucketAlreadyExists` when either upstream already has
    /// the name. Creates on A, then on B; if B fails, the bucket on A is
    /// deleted best-effort before the B error is surfaced, so a failed
    /// create leaves no half-bucket behind.
    pub async fn handle_create_bucket(
        &self,
        input: CreateBucketInput,
    ) -> Result<CreateBucketOutput, S3Error> {
        let bucket = input.bucket;
        let a = self.upstream(UpstreamId::A);
        let b = self.upstream(UpstreamId::B);

        if a.head_bucket(&bucket).await.is_ok() || b.head_bucket(&bucket).await.is_ok() {
            return Err(GatewayError::BucketAlreadyExists { bucket }.into_s3_error());
        }

        a.create_bucket(&bucket)
            .await
            .map_err(|e| GatewayError::from(e).into_s3_error())?;

        if let Err(err) = b.create_bucket(&bucket).await {
            // Compensate: the bucket must not stay visible on A alone. The
            // original B failure is what the caller needs; a compensation
            // failure is only logged.
            if let Err(cleanup) = a.delete_bucket(&bucket).await {
                warn!(
                    bucket = %bucket,
                    error = %cleanup,
                    "failed to clean up bucket on upstream a after partial create"
                );
            }
            return Err(GatewayError::from(err).into_s3_error());
        }

        if let Some(acl) = &input.acl {
            self.store_acl_blob(&bucket, acl.as_str()).await;
        }

        debug!(bucket = %bucket, "create_bucket completed");

        Ok(CreateBucketOutput {
            location: Some(format!("/{bucket}")),
        })
    }

    /// Persist the canned-ACL blob as the reserved tag on upstream A.
    ///
    /// Best-effort: a bucket without the tag simply reports the default
    /// ACL, so a tagging failure does not fail the create.
    async fn store_acl_blob(&self, bucket: &str, canned: &str) {
        let blob = match serde_json::to_vec(&AclBlob {
            canned: canned.to_owned(),
        }) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(bucket = %bucket, error = %e, "failed to encode acl blob");
                return;
            }
        };
        let mut tags = HashMap::new();
        tags.insert(ACL_TAG_KEY.to_owned(), BASE64_STANDARD.encode(blob));
        if let Err(e) = self
            .upstream(UpstreamId::A)
            .set_bucket_tags(bucket, tags)
            .await
        {
            warn!(bucket = %bucket, error = %e, "failed to persist acl blob");
        }
    }

    /// Delete a bucket from both upstreams.
    ///
    /// Precondition: the bucket exists on A. Deletes on A, then on B; a B
    /// failure is surfaced without rollback — re-creating an
    /// already-emptied bucket is indistinguishable from a fresh one for
    /// subsequent semantics.
    pub async fn handle_delete_bucket(
        &self,
        input: DeleteBucketInput,
    ) -> Result<DeleteBucketOutput, S3Error> {
        let bucket = input.bucket;
        self.check_bucket_access(&bucket).await?;

        self.upstream(UpstreamId::A)
            .delete_bucket(&bucket)
            .await
            .map_err(|e| GatewayError::from(e).into_s3_error())?;
        self.upstream(UpstreamId::B)
            .delete_bucket(&bucket)
            .await
            .map_err(|e| GatewayError::from(e).into_s3_error())?;

        debug!(bucket = %bucket, "delete_bucket completed");

        Ok(DeleteBucketOutput {})
    }

    /// HEAD Bucket always succeeds.
    ///
    /// Client-compatibility stub: the real access check runs inline in
    /// every operation via the upstream A head probe.
    pub async fn handle_head_bucket(
        &self,
        input: HeadBucketInput,
    ) -> Result<HeadBucketOutput, S3Error> {
        debug!(bucket = %input.bucket, "head_bucket stub");
        Ok(HeadBucketOutput::default())
    }

    /// Read the bucket ACL from the blob persisted on upstream A.
    ///
    /// An absent tag set (or an upstream without tagging support) yields
    /// the default owner policy rather than an error.
    pub async fn handle_get_bucket_acl(
        &self,
        input: GetBucketAclInput,
    ) -> Result<GetBucketAclOutput, S3Error> {
        let bucket = input.bucket;

        let tags = match self
            .upstream(crate::placement::UpstreamId::A)
            .bucket_tags(&bucket)
            .await
        {
            Ok(tags) => tags,
            Err(e) if e.is_tag_set_missing() || e.is_not_implemented() => HashMap::new(),
            Err(e) => return Err(map_bucket_probe(e, &bucket).into_s3_error()),
        };

        let blob = match tags.get(ACL_TAG_KEY) {
            Some(encoded) => BASE64_STANDARD.decode(encoded).map_err(|e| {
                GatewayError::Internal(anyhow::anyhow!("stored acl blob is not base64: {e}"))
                    .into_s3_error()
            })?,
            None => Vec::new(),
        };

        let canned = if blob.is_empty() {
            None
        } else {
            serde_json::from_slice::<AclBlob>(&blob)
                .map(|acl| acl.canned)
                .ok()
        };

        let owner = anonymous_owner();
        let mut grants = vec![Grant {
            grantee: Some(Grantee {
                type_: Type::from_static(Type::CANONICAL_USER),
                display_name: owner.display_name.clone(),
                email_address: None,
                id: owner.id.clone(),
                uri: None,
            }),
            permission: Some(Permission::from_static(Permission::FULL_CONTROL)),
        }];

        if matches!(canned.as_deref(), Some("public-read" | "public-read-write")) {
            grants.push(Grant {
                grantee: Some(Grantee {
                    type_: Type::from_static(Type::GROUP),
                    display_name: None,
                    email_address: None,
                    id: None,
                    uri: Some(String::from(
                        "http://acs.amazonaws.com/groups/global/AllUsers",
                    )),
                }),
                permission: Some(Permission::from_static(Permission::READ)),
            });
        }

        Ok(GetBucketAclOutput {
            grants: Some(grants),
            owner: Some(owner),
        })
    }
}
