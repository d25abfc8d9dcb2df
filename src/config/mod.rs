use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Gateway configuration, built once at startup and handed to the store and services.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Store region (AWS_REGION)
    pub region: String,

    /// Access key id (AWS_ACCESS_KEY_ID)
    pub access_key_id: String,

    /// Secret access key (AWS_SECRET_ACCESS_KEY)
    pub secret_access_key: String,

    /// Bucket name (AWS_BUCKET_NAME)
    pub bucket: String,

    /// Listen port (PORT_FILE_MANAGER)
    pub port: u16,

    /// Custom S3 endpoint, e.g. MinIO (S3_ENDPOINT_URL)
    pub endpoint_url: Option<String>,

    /// Domain used for public object URLs (default: "s3.amazonaws.com")
    pub storage_domain: String,

    /// Local directory for staged uploads (default: "uploads")
    pub staging_dir: PathBuf,

    /// Maximum upload size in bytes (default: 256 MB)
    pub max_file_size: usize,

    /// Per-request timeout in seconds (default: 120)
    pub request_timeout_secs: u64,

    /// Staged files older than this are treated as orphans (default: 24)
    pub staging_cleanup_age_hours: u64,

    /// Follow list continuation tokens instead of returning the first page (default: false)
    pub list_follow_pagination: bool,
}

impl GatewayConfig {
    pub const DEFAULT_STORAGE_DOMAIN: &'static str = "s3.amazonaws.com";
    pub const DEFAULT_STAGING_DIR: &'static str = "uploads";
    pub const DEFAULT_MAX_FILE_SIZE: usize = 256 * 1024 * 1024; // 256 MB
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
    pub const DEFAULT_STAGING_CLEANUP_AGE_HOURS: u64 = 24;

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required = |name: &'static str| get(name).ok_or(ConfigError::Missing(name));

        Ok(Self {
            region: required("AWS_REGION")?,
            access_key_id: required("AWS_ACCESS_KEY_ID")?,
            secret_access_key: required("AWS_SECRET_ACCESS_KEY")?,
            bucket: required("AWS_BUCKET_NAME")?,
            port: parse("PORT_FILE_MANAGER", required("PORT_FILE_MANAGER")?)?,

            endpoint_url: get("S3_ENDPOINT_URL"),

            storage_domain: get("STORAGE_DOMAIN")
                .unwrap_or_else(|| Self::DEFAULT_STORAGE_DOMAIN.to_string()),

            staging_dir: get("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_STAGING_DIR)),

            max_file_size: get("MAX_FILE_SIZE")
                .map(|v| parse("MAX_FILE_SIZE", v))
                .transpose()?
                .unwrap_or(Self::DEFAULT_MAX_FILE_SIZE),

            request_timeout_secs: get("REQUEST_TIMEOUT_SECS")
                .map(|v| parse("REQUEST_TIMEOUT_SECS", v))
                .transpose()?
                .unwrap_or(Self::DEFAULT_REQUEST_TIMEOUT_SECS),

            staging_cleanup_age_hours: get("STAGING_CLEANUP_AGE_HOURS")
                .map(|v| parse("STAGING_CLEANUP_AGE_HOURS", v))
                .transpose()?
                .unwrap_or(Self::DEFAULT_STAGING_CLEANUP_AGE_HOURS),

            list_follow_pagination: get("LIST_FOLLOW_PAGINATION")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
        })
    }

    /// Config for tests and local runs against an in-memory store
    pub fn development() -> Self {
        Self {
            region: "us-east-1".to_string(),
            access_key_id: "development".to_string(),
            secret_access_key: "development".to_string(),
            bucket: "file-manager".to_string(),
            port: 5001,
            endpoint_url: None,
            storage_domain: Self::DEFAULT_STORAGE_DOMAIN.to_string(),
            staging_dir: PathBuf::from(Self::DEFAULT_STAGING_DIR),
            max_file_size: Self::DEFAULT_MAX_FILE_SIZE,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            staging_cleanup_age_hours: Self::DEFAULT_STAGING_CLEANUP_AGE_HOURS,
            list_follow_pagination: false,
        }
    }

    /// Age after which a staged file is treated as orphaned.
    pub fn staging_cleanup_age(&self) -> Duration {
        Duration::from_secs(self.staging_cleanup_age_hours.saturating_mul(3600))
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("AWS_REGION", "eu-west-1"),
        ("AWS_ACCESS_KEY_ID", "AKIA"),
        ("AWS_SECRET_ACCESS_KEY", "secret"),
        ("AWS_BUCKET_NAME", "files"),
        ("PORT_FILE_MANAGER", "5001"),
    ];

    #[test]
    fn test_required_only_uses_defaults() {
        let config = GatewayConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.bucket, "files");
        assert_eq!(config.port, 5001);
        assert_eq!(config.endpoint_url, None);
        assert_eq!(config.storage_domain, "s3.amazonaws.com");
        assert_eq!(config.staging_dir, PathBuf::from("uploads"));
        assert_eq!(config.max_file_size, 256 * 1024 * 1024);
        assert!(!config.list_follow_pagination);
    }

    #[test]
    fn test_missing_credentials_fail_fast() {
        let vars: Vec<_> = REQUIRED
            .iter()
            .copied()
            .filter(|(k, _)| *k != "AWS_SECRET_ACCESS_KEY")
            .collect();
        let err = GatewayConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("AWS_SECRET_ACCESS_KEY"));
        assert_eq!(err.to_string(), "AWS_SECRET_ACCESS_KEY must be set");
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut vars = REQUIRED.to_vec();
        vars.retain(|(k, _)| *k != "AWS_BUCKET_NAME");
        vars.push(("AWS_BUCKET_NAME", "   "));
        let err = GatewayConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert_eq!(err, ConfigError::Missing("AWS_BUCKET_NAME"));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = REQUIRED.to_vec();
        vars.retain(|(k, _)| *k != "PORT_FILE_MANAGER");
        vars.push(("PORT_FILE_MANAGER", "http"));
        let err = GatewayConfig::from_lookup(lookup(&vars)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT_FILE_MANAGER", .. }));
    }

    #[test]
    fn test_optional_overrides() {
        let mut vars = REQUIRED.to_vec();
        vars.extend_from_slice(&[
            ("S3_ENDPOINT_URL", "http://127.0.0.1:9000"),
            ("STORAGE_DOMAIN", "cdn.example.com"),
            ("STAGING_DIR", "/tmp/staging"),
            ("MAX_FILE_SIZE", "1024"),
            ("LIST_FOLLOW_PAGINATION", "TRUE"),
        ]);
        let config = GatewayConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.endpoint_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(config.storage_domain, "cdn.example.com");
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/staging"));
        assert_eq!(config.max_file_size, 1024);
        assert!(config.list_follow_pagination);
    }

    #[test]
    fn test_huge_cleanup_age_saturates() {
        let mut vars = REQUIRED.to_vec();
        vars.push(("STAGING_CLEANUP_AGE_HOURS", "18446744073709551615"));
        let config = GatewayConfig::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(config.staging_cleanup_age(), Duration::from_secs(u64::MAX));

        let config = GatewayConfig::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.staging_cleanup_age(), Duration::from_secs(24 * 3600));
    }
}
