//! S3 operation handlers.
//!
//! Implementations of the gateway's S3 operations, organized by category.
//! Each submodule exposes `handle_*` methods on
//! [`crate::provider::ShardGateway`]; the `impl s3s::S3` block in `s3.rs`
//! bridges them to the HTTP layer.

pub mod bucket;
pub mod list;
pub mod object;

use s3s::dto::Timestamp;

use crate::upstream::ObjectInfo;

/// Convert a `chrono::DateTime<Utc>` to an s3s [`Timestamp`].
pub(crate) fn chrono_to_timestamp(dt: chrono::DateTime<chrono::Utc>) -> Timestamp {
    let system_time = std::time::SystemTime::UNIX_EPOCH
        + std::time::Duration::from_millis(
            u64::try_from(dt.timestamp_millis()).unwrap_or_default(),
        );
    Timestamp::from(system_time)
}

/// The current instant as an s3s [`Timestamp`].
pub(crate) fn now_timestamp() -> Timestamp {
    Timestamp::from(std::time::SystemTime::now())
}

/// The last-modified time of an upstream object as an s3s [`Timestamp`].
pub(crate) fn info_timestamp(info: &ObjectInfo) -> Option<Timestamp> {
    info.last_modified.map(chrono_to_timestamp)
}
