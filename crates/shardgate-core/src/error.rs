//! Gateway error taxonomy and the upstream error mapper.
//!
//! [`GatewayError`] covers the error kinds the gateway itself originates
//! plus a transparent wrapper for upstream failures. Converting to
//! [`s3s::S3Error`] attaches the correct [`s3s::S3ErrorCode`]; for wrapped
//! upstream errors the upstream's own protocol code and description are
//! preserved (non-standard codes such as `DeletionVerificationFailed`
//! survive as custom codes). The HTTP status of the response is derived by
//! s3s from the error code.
//!
//! Probe-site mapping follows the upstream semantics: a 404 from a bucket
//! probe becomes `NoSuchBucket`, from an object probe `NoSuchKey`, and a
//! 403 becomes `AccessDenied` in both positions.

use std::str::FromStr;

use s3s::{S3Error, S3ErrorCode};

use crate::upstream::UpstreamError;

/// Errors the gateway surfaces to clients.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The specified bucket does not exist.
    #[error("The specified bucket does not exist: {bucket}")]
    NoSuchBucket {
        /// The bucket name that was not found.
        bucket: String,
    },

    /// The specified key does not exist.
    #[error("The specified key does not exist: {key}")]
    NoSuchKey {
        /// The key that was not found.
        key: String,
    },

    /// Access denied.
    #[error("Access Denied")]
    AccessDenied,

    /// The requested bucket name is already in use.
    #[error("The requested bucket name is not available: {bucket}")]
    BucketAlreadyExists {
        /// The bucket name that already exists.
        bucket: String,
    },

    /// The requested functionality is not implemented.
    #[error("This operation is not implemented")]
    NotImplemented,

    /// An argument provided is invalid.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    /// An upstream store failed; its code and description are preserved.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// Internal error with context.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl GatewayError {
    /// Convert this error into an [`s3s::S3Error`].
    #[must_use]
    pub fn into_s3_error(self) -> S3Error {
        S3Error::from(self)
    }
}

impl From<GatewayError> for S3Error {
    fn from(err: GatewayError) -> Self {
        let code = match &err {
            GatewayError::NoSuchBucket { .. } => S3ErrorCode::NoSuchBucket,
            GatewayError::NoSuchKey { .. } => S3ErrorCode::NoSuchKey,
            GatewayError::AccessDenied => S3ErrorCode::AccessDenied,
            GatewayError::BucketAlreadyExists { .. } => S3ErrorCode::BucketAlreadyExists,
            GatewayError::NotImplemented => S3ErrorCode::NotImplemented,
            GatewayError::InvalidArgument { .. } => S3ErrorCode::InvalidArgument,
            GatewayError::Upstream(upstream) => parse_error_code(&upstream.code),
            GatewayError::Internal(_) => S3ErrorCode::InternalError,
        };
        S3Error::with_message(code, err.to_string())
    }
}

/// Parse an error code string into an [`S3ErrorCode`].
///
/// [`S3ErrorCode::from_str`] returns `Result<S3ErrorCode, Infallible>`;
/// unknown strings become `S3ErrorCode::Custom(...)`, which is exactly how
/// upstream codes outside the standard taxonomy are preserved.
fn parse_error_code(code: &str) -> S3ErrorCode {
    match S3ErrorCode::from_str(code) {
        Ok(c) => c,
        Err(infallible) => match infallible {},
    }
}

/// Map an upstream failure observed while probing a bucket.
#[must_use]
pub fn map_bucket_probe(err: UpstreamError, bucket: &str) -> GatewayError {
    if err.is_not_found() {
        GatewayError::NoSuchBucket {
            bucket: bucket.to_owned(),
        }
    } else if err.is_forbidden() {
        GatewayError::AccessDenied
    } else {
        GatewayError::Upstream(err)
    }
}

/// Map an upstream failure observed while fetching or probing an object.
#[must_use]
pub fn map_object_probe(err: UpstreamError, key: &str) -> GatewayError {
    if err.is_not_found() {
        GatewayError::NoSuchKey {
            key: key.to_owned(),
        }
    } else if err.is_forbidden() {
        GatewayError::AccessDenied
    } else {
        GatewayError::Upstream(err)
    }
}
