//! List operation handlers.
//!
//! Implements `list_objects` (v1) and `list_objects_v2` with the shard
//! completeness filter: a base key appears in the output iff all four of
//! its shards are present in their designated upstreams. Anything less is
//! a partial-put or partial-delete artifact that clients must not see.
//!
//! Listings are single-page: continuation tokens are not forwarded to the
//! upstreams and the gateway always answers `IsTruncated = false`.

use std::collections::{BTreeMap, HashMap};

// The s3s DTO module contains dozens of types we reference; wildcard is clearer.
#[allow(clippy::wildcard_imports)]
use s3s::dto::*;
use s3s::S3Error;
use tracing::debug;

use crate::codec::ShardKind;
use crate::error::GatewayError;
use crate::ops::info_timestamp;
use crate::placement::{UpstreamId, placement};
use crate::provider::ShardGateway;
use crate::upstream::{ListPage, ListRequest, ObjectInfo};

/// Index an upstream listing by shard key, keeping only the shards the
/// placement rule assigns to that upstream. Anything else in the namespace
/// (foreign objects, misplaced shards) is ignored.
fn partition(page: &ListPage, id: UpstreamId) -> HashMap<String, ObjectInfo> {
    page.objects
        .iter()
        .filter(|info| {
            ShardKind::parse(&info.key).is_some_and(|(_, kind)| placement(kind) == id)
        })
        .map(|info| (info.key.clone(), info.clone()))
        .collect()
}

/// The completeness filter: base keys whose four shards are all present in
/// their designated upstreams, each carrying its `cypher.first` metadata.
///
/// Pure over the two listing snapshots; candidates are derived from A's
/// `cypher.first` entries since a complete set requires one.
fn complete_bases(
    objects_a: &HashMap<String, ObjectInfo>,
    objects_b: &HashMap<String, ObjectInfo>,
) -> BTreeMap<String, ObjectInfo> {
    let mut complete = BTreeMap::new();
    for (key, info) in objects_a {
        let Some(base) = key.strip_suffix(ShardKind::CypherFirst.suffix()) else {
            continue;
        };
        if base.is_empty() {
            continue;
        }
        let all_present = objects_a.contains_key(&ShardKind::RandSecond.apply(base))
            && objects_b.contains_key(&ShardKind::CypherSecond.apply(base))
            && objects_b.contains_key(&ShardKind::RandFirst.apply(base));
        if all_present {
            complete.insert(base.to_owned(), info.clone());
        }
    }
    complete
}

/// Render a complete base key as a listing entry, under its logical name
/// but with the metadata of its `cypher.first` shard (so the reported size
/// is a shard size, about half the logical length).
fn to_entry(base: &str, info: &ObjectInfo) -> Object {
    Object {
        checksum_algorithm: None,
        checksum_type: None,
        e_tag: info.etag.clone(),
        key: Some(base.to_owned()),
        last_modified: info_timestamp(info),
        owner: None,
        restore_status: None,
        size: Some(info.size),
        storage_class: Some(ObjectStorageClass::from_static(
            ObjectStorageClass::STANDARD,
        )),
    }
}

/// Convert common prefix strings to s3s [`CommonPrefix`] DTOs.
fn to_common_prefixes(prefixes: &[String]) -> Option<CommonPrefixList> {
    if prefixes.is_empty() {
        None
    } else {
        Some(
            prefixes
                .iter()
                .map(|p| CommonPrefix {
                    prefix: Some(p.clone()),
                })
                .collect(),
        )
    }
}

// AWS S3 DTOs use signed integers for inherently non-negative values.
#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
impl ShardGateway {
    async fn list_both(
        &self,
        bucket: &str,
        request: &ListRequest,
    ) -> Result<(ListPage, ListPage), S3Error> {
        let (page_a, page_b) = tokio::join!(
            self.upstream(UpstreamId::A).list_objects(bucket, request),
            self.upstream(UpstreamId::B).list_objects(bucket, request),
        );
        Ok((
            page_a.map_err(|e| GatewayError::from(e).into_s3_error())?,
            page_b.map_err(|e| GatewayError::from(e).into_s3_error())?,
        ))
    }

    /// List objects (v1 API).
    pub async fn handle_list_objects(
        &self,
        input: ListObjectsInput,
    ) -> Result<ListObjectsOutput, S3Error> {
        let bucket = input.bucket;
        self.check_bucket_access(&bucket).await?;

        let request = ListRequest {
            prefix: input.prefix.clone(),
            delimiter: input.delimiter.clone(),
            max_keys: input.max_keys,
        };
        let (page_a, page_b) = self.list_both(&bucket, &request).await?;

        let objects_a = partition(&page_a, UpstreamId::A);
        let objects_b = partition(&page_b, UpstreamId::B);
        let complete = complete_bases(&objects_a, &objects_b);

        let contents: Vec<Object> = complete
            .iter()
            .map(|(base, info)| to_entry(base, info))
            .collect();

        debug!(
            bucket = %bucket,
            candidates = objects_a.len(),
            count = contents.len(),
            "list_objects completed"
        );

        Ok(ListObjectsOutput {
            common_prefixes: to_common_prefixes(&page_a.common_prefixes),
            contents: if contents.is_empty() {
                None
            } else {
                Some(contents)
            },
            delimiter: input.delimiter,
            encoding_type: input.encoding_type,
            is_truncated: Some(false),
            marker: input.marker,
            max_keys: input.max_keys,
            name: Some(bucket),
            next_marker: None,
            prefix: input.prefix,
            request_charged: None,
        })
    }

    /// List objects (v2 API).
    ///
    /// A non-empty prefix that does not end in the delimiter is first
    /// treated as a candidate full key: the four shard names are
    /// head-probed and, when all present, the response is the single
    /// logical entry. Otherwise both upstreams are listed and filtered.
    pub async fn handle_list_objects_v2(
        &self,
        input: ListObjectsV2Input,
    ) -> Result<ListObjectsV2Output, S3Error> {
        let bucket = input.bucket.clone();
        self.check_bucket_access(&bucket).await?;

        if let Some(prefix) = input.prefix.clone() {
            if !prefix.is_empty() && !prefix.ends_with('/') {
                return self.list_v2_candidate_key(input, &bucket, &prefix).await;
            }
        }

        let request = ListRequest {
            prefix: input.prefix.clone(),
            delimiter: input.delimiter.clone(),
            max_keys: input.max_keys,
        };
        // Continuation tokens are not forwarded; the upstream call in
        // `request` carries none and the response below declares a single
        // non-truncated page.
        let (page_a, page_b) = self.list_both(&bucket, &request).await?;

        let objects_a = partition(&page_a, UpstreamId::A);
        let objects_b = partition(&page_b, UpstreamId::B);
        let complete = complete_bases(&objects_a, &objects_b);

        let contents: Vec<Object> = complete
            .iter()
            .map(|(base, info)| to_entry(base, info))
            .collect();
        let key_count = contents.len() as i32;

        debug!(
            bucket = %bucket,
            in_a = page_a.objects.len(),
            in_b = page_b.objects.len(),
            count = key_count,
            "list_objects_v2 completed"
        );

        Ok(ListObjectsV2Output {
            common_prefixes: to_common_prefixes(&page_a.common_prefixes),
            contents: if contents.is_empty() {
                None
            } else {
                Some(contents)
            },
            continuation_token: input.continuation_token,
            delimiter: input.delimiter,
            encoding_type: input.encoding_type,
            is_truncated: Some(false),
            key_count: Some(key_count),
            max_keys: input.max_keys,
            name: Some(bucket),
            next_continuation_token: None,
            prefix: input.prefix,
            request_charged: None,
            start_after: input.start_after,
        })
    }

    /// The v2 candidate-key probe: when the prefix names a complete shard
    /// set, answer with exactly that one logical entry; otherwise an empty
    /// page.
    async fn list_v2_candidate_key(
        &self,
        input: ListObjectsV2Input,
        bucket: &str,
        prefix: &str,
    ) -> Result<ListObjectsV2Output, S3Error> {
        let mut first_shard = None;
        let mut all_present = true;
        for kind in ShardKind::ALL {
            let shard_key = kind.apply(prefix);
            match self.shard_upstream(kind).head_object(bucket, &shard_key).await {
                Ok(info) => {
                    if kind == ShardKind::CypherFirst {
                        first_shard = Some(info);
                    }
                }
                Err(e) => {
                    debug!(bucket = %bucket, shard = %shard_key, error = %e, "candidate probe missed");
                    all_present = false;
                    break;
                }
            }
        }

        let contents: Vec<Object> = match (all_present, first_shard) {
            (true, Some(info)) => vec![to_entry(prefix, &info)],
            _ => Vec::new(),
        };
        let key_count = contents.len() as i32;

        debug!(bucket = %bucket, prefix = %prefix, hit = key_count == 1, "candidate key probe");

        Ok(ListObjectsV2Output {
            common_prefixes: None,
            contents: if contents.is_empty() {
                None
            } else {
                Some(contents)
            },
            continuation_token: input.continuation_token,
            delimiter: input.delimiter,
            encoding_type: input.encoding_type,
            is_truncated: Some(false),
            key_count: Some(key_count),
            max_keys: input.max_keys,
            name: Some(bucket.to_owned()),
            next_continuation_token: None,
            prefix: input.prefix,
            request_charged: None,
            start_after: input.start_after,
        })
    }
}
