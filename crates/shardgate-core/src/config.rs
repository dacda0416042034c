//! Gateway configuration.
//!
//! Two upstream client configs plus the gateway's own knobs, loadable from
//! environment variables. A `local_minio` switch selects the local-MinIO
//! development defaults; cloud deployments must provide every upstream
//! field explicitly.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SHARDGATE_LISTEN` | `0.0.0.0:9000` | Bind address |
//! | `SHARDGATE_REGION` | `us-east-1` | Region announced to clients |
//! | `SHARDGATE_ROOT_ACCESS_KEY` | `testkey` | Root account access key |
//! | `SHARDGATE_ROOT_SECRET_KEY` | `testsecret` | Root account secret key |
//! | `SHARDGATE_LOG_LEVEL` | `info` | Log level filter |
//! | `SHARDGATE_DELETE_SETTLE_MS` | `100` | Bulk-delete settling interval |
//! | `SHARDGATE_LOCAL_MINIO` | `true` | Use local MinIO upstream defaults |
//! | `SHARDGATE_A_ENDPOINT` etc. | *(unset)* | Upstream A/B fields (cloud mode) |

use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

/// Configuration failures detected at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A mandatory upstream field is empty.
    #[error("upstream {upstream}: missing required field `{field}`")]
    MissingField {
        /// Which upstream the field belongs to.
        upstream: String,
        /// The missing field.
        field: &'static str,
    },

    /// A mandatory environment variable is unset.
    #[error("missing required environment variable {0}")]
    MissingEnv(String),

    /// A numeric environment variable failed to parse.
    #[error("invalid value for environment variable {name}: {value}")]
    InvalidEnv {
        /// Variable name.
        name: String,
        /// The offending value.
        value: String,
    },
}

/// Connection parameters for one upstream S3 store.
///
/// All four fields are mandatory; [`UpstreamConfig::validate`] enumerates
/// whatever is missing.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamConfig {
    /// Endpoint URL, e.g. `http://localhost:7531`.
    pub endpoint: String,
    /// Signing region.
    pub region: String,
    /// Static access key.
    pub access_key: String,
    /// Static secret key.
    pub secret_key: String,
}

impl UpstreamConfig {
    /// Check that every mandatory field is present.
    pub fn validate(&self, upstream: &str) -> Result<(), ConfigError> {
        let missing = [
            ("endpoint", self.endpoint.is_empty()),
            ("region", self.region.is_empty()),
            ("access_key", self.access_key.is_empty()),
            ("secret_key", self.secret_key.is_empty()),
        ];
        for (field, absent) in missing {
            if absent {
                return Err(ConfigError::MissingField {
                    upstream: upstream.to_owned(),
                    field,
                });
            }
        }
        Ok(())
    }

    fn local_minio(port: u16) -> Self {
        Self {
            endpoint: format!("http://localhost:{port}"),
            region: String::from("us-east-1"),
            access_key: String::from("minioadmin"),
            secret_key: String::from("minioadmin"),
        }
    }

    fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: env_required(&format!("{prefix}_ENDPOINT"))?,
            region: env_required(&format!("{prefix}_REGION"))?,
            access_key: env_required(&format!("{prefix}_ACCESS_KEY"))?,
            secret_key: env_required(&format!("{prefix}_SECRET_KEY"))?,
        })
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Bind address for the gateway listener.
    #[builder(default = String::from("0.0.0.0:9000"))]
    pub listen: String,

    /// Region the gateway announces to clients.
    #[builder(default = String::from("us-east-1"))]
    pub region: String,

    /// Root account access key accepted by the front end.
    #[builder(default = String::from("testkey"))]
    pub root_access_key: String,

    /// Root account secret key accepted by the front end.
    #[builder(default = String::from("testsecret"))]
    pub root_secret_key: String,

    /// Log level filter string (e.g. `"info"`, `"debug"`).
    #[builder(default = String::from("info"))]
    pub log_level: String,

    /// Settling interval between a bulk delete and its verification probe.
    #[builder(default = 100)]
    pub delete_settle_ms: u64,

    /// Upstream A: receives `*.cypher.first` and `*.rand.second`.
    pub upstream_a: UpstreamConfig,

    /// Upstream B: receives `*.cypher.second` and `*.rand.first`.
    pub upstream_b: UpstreamConfig,
}

impl GatewayConfig {
    /// Development defaults targeting two local MinIO servers.
    #[must_use]
    pub fn local_minio() -> Self {
        Self::builder()
            .upstream_a(UpstreamConfig::local_minio(7531))
            .upstream_b(UpstreamConfig::local_minio(7532))
            .build()
    }

    /// Load the configuration from environment variables.
    ///
    /// With `SHARDGATE_LOCAL_MINIO` unset or truthy, the upstream fields
    /// default to the two local MinIO servers. Otherwise every
    /// `SHARDGATE_A_*` / `SHARDGATE_B_*` field is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        let local_minio = env_or("SHARDGATE_LOCAL_MINIO", "true");
        let (upstream_a, upstream_b) = if is_truthy(&local_minio) {
            (
                UpstreamConfig::local_minio(7531),
                UpstreamConfig::local_minio(7532),
            )
        } else {
            (
                UpstreamConfig::from_env("SHARDGATE_A")?,
                UpstreamConfig::from_env("SHARDGATE_B")?,
            )
        };

        let settle_name = "SHARDGATE_DELETE_SETTLE_MS";
        let settle_raw = env_or(settle_name, "100");
        let delete_settle_ms =
            settle_raw
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidEnv {
                    name: settle_name.to_owned(),
                    value: settle_raw,
                })?;

        let config = Self {
            listen: env_or("SHARDGATE_LISTEN", "0.0.0.0:9000"),
            region: env_or("SHARDGATE_REGION", "us-east-1"),
            root_access_key: env_or("SHARDGATE_ROOT_ACCESS_KEY", "testkey"),
            root_secret_key: env_or("SHARDGATE_ROOT_SECRET_KEY", "testsecret"),
            log_level: env_or("SHARDGATE_LOG_LEVEL", "info"),
            delete_settle_ms,
            upstream_a,
            upstream_b,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate both upstream configs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upstream_a.validate("a")?;
        self.upstream_b.validate("b")
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_owned())
}

fn env_required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(name.to_owned()))
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_provide_local_minio_defaults() {
        let config = GatewayConfig::local_minio();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.upstream_a.endpoint, "http://localhost:7531");
        assert_eq!(config.upstream_b.endpoint, "http://localhost:7532");
        assert_eq!(config.delete_settle_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_should_enumerate_missing_upstream_fields() {
        let config = UpstreamConfig::builder()
            .endpoint(String::from("http://localhost:7531"))
            .region(String::new())
            .access_key(String::from("ak"))
            .secret_key(String::from("sk"))
            .build();
        let err = config.validate("a").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField { field: "region", .. }
        ));

        let config = UpstreamConfig::builder()
            .endpoint(String::from("http://localhost:7531"))
            .region(String::from("us-east-1"))
            .access_key(String::from("ak"))
            .secret_key(String::new())
            .build();
        let err = config.validate("b").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingField {
                field: "secret_key",
                ..
            }
        ));
    }

    #[test]
    fn test_should_recognize_truthy_values() {
        for v in ["1", "true", "TRUE", "yes", "on"] {
            assert!(is_truthy(v), "{v} should be truthy");
        }
        for v in ["0", "false", "no", "off", ""] {
            assert!(!is_truthy(v), "{v} should be falsy");
        }
    }
}
