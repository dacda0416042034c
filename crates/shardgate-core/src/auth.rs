//! Front-end authentication via the `s3s::auth::S3Auth` trait.
//!
//! The gateway accepts a single root account whose credentials come from
//! configuration. Requests signed with any other access key are rejected
//! before reaching the backend.
//!
//! # Object safety
//!
//! The [`s3s::auth::S3Auth`] trait uses `#[async_trait]` because it must be
//! object-safe for dynamic dispatch. We follow the same pattern here.

use s3s::S3Result;
use s3s::auth::SecretKey;
use s3s::s3_error;
use tracing::debug;

/// Root-account authentication provider.
#[derive(Debug, Clone)]
pub struct GatewayAuth {
    access_key: String,
    secret_key: String,
}

impl GatewayAuth {
    /// Create an authentication provider for the given root account.
    #[must_use]
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

#[async_trait::async_trait]
impl s3s::auth::S3Auth for GatewayAuth {
    async fn get_secret_key(&self, access_key: &str) -> S3Result<SecretKey> {
        if access_key == self.access_key {
            return Ok(SecretKey::from(self.secret_key.as_str()));
        }
        debug!(access_key, "rejecting unknown access key");
        Err(s3_error!(
            InvalidAccessKeyId,
            "The AWS access key ID you provided does not exist in our records"
        ))
    }
}

#[cfg(test)]
mod tests {
    use s3s::auth::S3Auth;

    use super::*;

    #[tokio::test]
    async fn test_should_return_secret_for_root_access_key() {
        let auth = GatewayAuth::new("testkey", "testsecret");
        let key = auth
            .get_secret_key("testkey")
            .await
            .unwrap_or_else(|e| panic!("get_secret_key failed: {e}"));
        assert_eq!(key.expose(), "testsecret");
    }

    #[tokio::test]
    async fn test_should_reject_unknown_access_key() {
        let auth = GatewayAuth::new("testkey", "testsecret");
        let err = auth.get_secret_key("intruder").await.unwrap_err();
        assert_eq!(err.code(), &s3s::S3ErrorCode::InvalidAccessKeyId);
    }
}
