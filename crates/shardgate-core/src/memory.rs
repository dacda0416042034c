//! In-memory upstream store.
//!
//! [`MemoryStore`] backs the [`UpstreamStore`] capability with process-local
//! state. It exists for unit tests of the orchestrators (where two
//! instances stand in for the two upstream providers) and for local
//! experimentation without MinIO. It mirrors the S3 behaviors the gateway
//! depends on: head probes report `NotFound` with a 404, deleting an absent
//! key succeeds, and reading tags from an untagged bucket reports
//! `NoSuchTagSet`.
//!
//! For tests it additionally records mutating calls (so fan-out shape can
//! be asserted) and supports fault injection on selected operations.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::{Mutex, RwLock};

use crate::upstream::{
    BucketEntry, GetResult, ListPage, ListRequest, ObjectInfo, PutResult, UpstreamError,
    UpstreamResult, UpstreamStore, code,
};

/// One recorded mutating call, for assertions on fan-out shape.
#[derive(Debug, Clone)]
pub struct RecordedOp {
    /// Operation name (`"put_object"`, `"delete_object"`, ...).
    pub op: &'static str,
    /// Bucket the call targeted.
    pub bucket: String,
    /// Key the call targeted (empty for bucket-level calls).
    pub key: String,
    /// When the store observed the call.
    pub at: Instant,
}

#[derive(Debug, Default)]
struct Faults {
    create_bucket: Option<UpstreamError>,
    put_object: Option<UpstreamError>,
    get_object: Option<UpstreamError>,
    skip_delete: bool,
}

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    etag: String,
    last_modified: DateTime<Utc>,
}

#[derive(Debug)]
struct MemoryBucket {
    created: DateTime<Utc>,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    tags: RwLock<HashMap<String, String>>,
}

impl MemoryBucket {
    fn new(created: DateTime<Utc>) -> Self {
        Self {
            created,
            objects: RwLock::new(BTreeMap::new()),
            tags: RwLock::new(HashMap::new()),
        }
    }
}

/// In-process implementation of [`UpstreamStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: DashMap<String, MemoryBucket>,
    faults: Mutex<Faults>,
    ops: Mutex<Vec<RecordedOp>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `create_bucket` fail with `err` until cleared.
    pub fn fail_create_bucket(&self, err: UpstreamError) {
        self.faults.lock().create_bucket = Some(err);
    }

    /// Make every subsequent `put_object` fail with `err` until cleared.
    pub fn fail_put_object(&self, err: UpstreamError) {
        self.faults.lock().put_object = Some(err);
    }

    /// Make every subsequent `get_object` fail with `err` until cleared.
    pub fn fail_get_object(&self, err: UpstreamError) {
        self.faults.lock().get_object = Some(err);
    }

    /// Turn `delete_object` into a silent no-op, so deletion verification
    /// probes find the object still present.
    pub fn skip_deletes(&self, on: bool) {
        self.faults.lock().skip_delete = on;
    }

    /// Remove all injected faults.
    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// All recorded calls of the given operation, in call order.
    #[must_use]
    pub fn recorded(&self, op: &'static str) -> Vec<RecordedOp> {
        self.ops.lock().iter().filter(|r| r.op == op).cloned().collect()
    }

    /// Whether the bucket exists.
    #[must_use]
    pub fn has_bucket(&self, bucket: &str) -> bool {
        self.buckets.contains_key(bucket)
    }

    /// Create a bucket with an explicit creation date (creation-skew setups).
    pub fn insert_bucket_at(&self, bucket: &str, created: DateTime<Utc>) {
        self.buckets
            .insert(bucket.to_owned(), MemoryBucket::new(created));
    }

    /// Remove an object out of band, bypassing recording and faults.
    pub fn remove_object(&self, bucket: &str, key: &str) -> bool {
        self.buckets
            .get(bucket)
            .is_some_and(|b| b.objects.write().remove(key).is_some())
    }

    /// All keys currently stored in the bucket.
    #[must_use]
    pub fn object_keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .get(bucket)
            .map(|b| b.objects.read().keys().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, op: &'static str, bucket: &str, key: &str) {
        self.ops.lock().push(RecordedOp {
            op,
            bucket: bucket.to_owned(),
            key: key.to_owned(),
            at: Instant::now(),
        });
    }

    fn fault(&self, pick: impl Fn(&Faults) -> Option<UpstreamError>) -> UpstreamResult<()> {
        match pick(&self.faults.lock()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn etag_of(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Md5::digest(data)))
}

fn info_of(key: &str, obj: &StoredObject) -> ObjectInfo {
    ObjectInfo {
        key: key.to_owned(),
        etag: Some(obj.etag.clone()),
        size: obj.body.len() as i64,
        last_modified: Some(obj.last_modified),
        storage_class: Some(String::from("STANDARD")),
    }
}

#[async_trait]
impl UpstreamStore for MemoryStore {
    async fn list_buckets(&self) -> UpstreamResult<Vec<BucketEntry>> {
        let mut entries: Vec<BucketEntry> = self
            .buckets
            .iter()
            .map(|e| BucketEntry {
                name: e.key().clone(),
                created: e.value().created,
            })
            .collect();
        entries.sort_by(|x, y| x.name.cmp(&y.name));
        Ok(entries)
    }

    async fn head_bucket(&self, bucket: &str) -> UpstreamResult<()> {
        if self.buckets.contains_key(bucket) {
            Ok(())
        } else {
            Err(UpstreamError::not_found("bucket does not exist"))
        }
    }

    async fn create_bucket(&self, bucket: &str) -> UpstreamResult<()> {
        self.fault(|f| f.create_bucket.clone())?;
        self.record("create_bucket", bucket, "");
        if self.buckets.contains_key(bucket) {
            return Err(
                UpstreamError::new(code::BUCKET_ALREADY_EXISTS, "bucket already exists")
                    .with_status(409),
            );
        }
        self.buckets
            .insert(bucket.to_owned(), MemoryBucket::new(Utc::now()));
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> UpstreamResult<()> {
        self.record("delete_bucket", bucket, "");
        let Some(entry) = self.buckets.get(bucket) else {
            return Err(
                UpstreamError::new(code::NO_SUCH_BUCKET, "bucket does not exist").with_status(404),
            );
        };
        if !entry.objects.read().is_empty() {
            return Err(
                UpstreamError::new(code::BUCKET_NOT_EMPTY, "the bucket is not empty")
                    .with_status(409),
            );
        }
        drop(entry);
        self.buckets.remove(bucket);
        Ok(())
    }

    async fn bucket_tags(&self, bucket: &str) -> UpstreamResult<HashMap<String, String>> {
        let Some(entry) = self.buckets.get(bucket) else {
            return Err(
                UpstreamError::new(code::NO_SUCH_BUCKET, "bucket does not exist").with_status(404),
            );
        };
        let tags = entry.tags.read().clone();
        if tags.is_empty() {
            return Err(
                UpstreamError::new(code::NO_SUCH_TAG_SET, "the TagSet does not exist")
                    .with_status(404),
            );
        }
        Ok(tags)
    }

    async fn set_bucket_tags(
        &self,
        bucket: &str,
        tags: HashMap<String, String>,
    ) -> UpstreamResult<()> {
        let Some(entry) = self.buckets.get(bucket) else {
            return Err(
                UpstreamError::new(code::NO_SUCH_BUCKET, "bucket does not exist").with_status(404),
            );
        };
        *entry.tags.write() = tags;
        Ok(())
    }

    async fn head_object(&self, bucket: &str, key: &str) -> UpstreamResult<ObjectInfo> {
        let Some(entry) = self.buckets.get(bucket) else {
            return Err(UpstreamError::not_found("bucket does not exist"));
        };
        let objects = entry.objects.read();
        objects
            .get(key)
            .map(|obj| info_of(key, obj))
            .ok_or_else(|| UpstreamError::not_found("object does not exist"))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Bytes) -> UpstreamResult<PutResult> {
        self.fault(|f| f.put_object.clone())?;
        self.record("put_object", bucket, key);
        let Some(entry) = self.buckets.get(bucket) else {
            return Err(
                UpstreamError::new(code::NO_SUCH_BUCKET, "bucket does not exist").with_status(404),
            );
        };
        let etag = etag_of(&body);
        entry.objects.write().insert(
            key.to_owned(),
            StoredObject {
                body,
                etag: etag.clone(),
                last_modified: Utc::now(),
            },
        );
        Ok(PutResult {
            etag: Some(etag),
            ..PutResult::default()
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> UpstreamResult<GetResult> {
        self.fault(|f| f.get_object.clone())?;
        let Some(entry) = self.buckets.get(bucket) else {
            return Err(
                UpstreamError::new(code::NO_SUCH_BUCKET, "bucket does not exist").with_status(404),
            );
        };
        let objects = entry.objects.read();
        let obj = objects.get(key).ok_or_else(|| {
            UpstreamError::new(code::NO_SUCH_KEY, "the specified key does not exist")
                .with_status(404)
        })?;
        Ok(GetResult {
            body: obj.body.clone(),
            info: info_of(key, obj),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> UpstreamResult<()> {
        let skip = self.faults.lock().skip_delete;
        self.record("delete_object", bucket, key);
        let Some(entry) = self.buckets.get(bucket) else {
            return Err(
                UpstreamError::new(code::NO_SUCH_BUCKET, "bucket does not exist").with_status(404),
            );
        };
        if !skip {
            // Deleting an absent key still succeeds, matching S3.
            entry.objects.write().remove(key);
        }
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, request: &ListRequest) -> UpstreamResult<ListPage> {
        let Some(entry) = self.buckets.get(bucket) else {
            return Err(
                UpstreamError::new(code::NO_SUCH_BUCKET, "bucket does not exist").with_status(404),
            );
        };

        let prefix = request.prefix.as_deref().unwrap_or("");
        let delimiter = request.delimiter.as_deref().unwrap_or("");
        let max_keys = request
            .max_keys
            .and_then(|k| usize::try_from(k).ok())
            .unwrap_or(1000);

        let mut page = ListPage::default();
        let mut prefixes: BTreeMap<String, ()> = BTreeMap::new();
        let objects = entry.objects.read();
        for (key, obj) in objects.range(prefix.to_owned()..) {
            if !key.starts_with(prefix) {
                break;
            }
            if page.objects.len() + prefixes.len() >= max_keys {
                break;
            }
            if !delimiter.is_empty() {
                if let Some(idx) = key[prefix.len()..].find(delimiter) {
                    let end = prefix.len() + idx + delimiter.len();
                    prefixes.insert(key[..end].to_owned(), ());
                    continue;
                }
            }
            page.objects.push(info_of(key, obj));
        }
        page.common_prefixes = prefixes.into_keys().collect();
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_should_roundtrip_objects() {
        let store = MemoryStore::new();
        store.create_bucket("b").await.unwrap_or_else(|e| panic!("{e}"));
        store
            .put_object("b", "k", Bytes::from_static(b"payload"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let got = store.get_object("b", "k").await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(&got.body[..], b"payload");
        assert_eq!(got.info.size, 7);

        let info = store.head_object("b", "k").await.unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(info.etag, got.info.etag);
    }

    #[tokio::test]
    async fn test_should_report_not_found_probes() {
        let store = MemoryStore::new();
        assert!(store.head_bucket("nope").await.unwrap_err().is_not_found());

        store.create_bucket("b").await.unwrap_or_else(|e| panic!("{e}"));
        assert!(store.head_object("b", "nope").await.unwrap_err().is_not_found());
        assert!(store.get_object("b", "nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_should_delete_idempotently() {
        let store = MemoryStore::new();
        store.create_bucket("b").await.unwrap_or_else(|e| panic!("{e}"));
        store
            .put_object("b", "k", Bytes::from_static(b"x"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        store.delete_object("b", "k").await.unwrap_or_else(|e| panic!("{e}"));
        // Absent now; a second delete still succeeds.
        store.delete_object("b", "k").await.unwrap_or_else(|e| panic!("{e}"));
    }

    #[tokio::test]
    async fn test_should_refuse_deleting_nonempty_bucket() {
        let store = MemoryStore::new();
        store.create_bucket("b").await.unwrap_or_else(|e| panic!("{e}"));
        store
            .put_object("b", "k", Bytes::from_static(b"x"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));

        let err = store.delete_bucket("b").await.unwrap_err();
        assert_eq!(err.code, code::BUCKET_NOT_EMPTY);
    }

    #[tokio::test]
    async fn test_should_report_missing_tag_set() {
        let store = MemoryStore::new();
        store.create_bucket("b").await.unwrap_or_else(|e| panic!("{e}"));
        assert!(store.bucket_tags("b").await.unwrap_err().is_tag_set_missing());

        let mut tags = HashMap::new();
        tags.insert(String::from("k"), String::from("v"));
        store
            .set_bucket_tags("b", tags.clone())
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(store.bucket_tags("b").await.unwrap_or_else(|e| panic!("{e}")), tags);
    }

    #[tokio::test]
    async fn test_should_list_with_prefix_and_delimiter() {
        let store = MemoryStore::new();
        store.create_bucket("b").await.unwrap_or_else(|e| panic!("{e}"));
        for key in ["a/x", "a/y", "b/z", "top"] {
            store
                .put_object("b", key, Bytes::from_static(b"d"))
                .await
                .unwrap_or_else(|e| panic!("{e}"));
        }

        let page = store
            .list_objects(
                "b",
                &ListRequest {
                    delimiter: Some(String::from("/")),
                    ..ListRequest::default()
                },
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["top"]);
        assert_eq!(page.common_prefixes, ["a/", "b/"]);

        let page = store
            .list_objects(
                "b",
                &ListRequest {
                    prefix: Some(String::from("a/")),
                    ..ListRequest::default()
                },
            )
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, ["a/x", "a/y"]);
    }

    #[tokio::test]
    async fn test_should_inject_faults_and_record_ops() {
        let store = MemoryStore::new();
        store.create_bucket("b").await.unwrap_or_else(|e| panic!("{e}"));

        store.fail_put_object(UpstreamError::new("SlowDown", "simulated"));
        let err = store
            .put_object("b", "k", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.code, "SlowDown");

        store.clear_faults();
        store
            .put_object("b", "k", Bytes::from_static(b"x"))
            .await
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(store.recorded("put_object").len(), 1);

        store.skip_deletes(true);
        store.delete_object("b", "k").await.unwrap_or_else(|e| panic!("{e}"));
        assert!(store.head_object("b", "k").await.is_ok());
    }
}
