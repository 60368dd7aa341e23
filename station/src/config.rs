//! Configuration management for the scanner station.
//!
//! Loads configuration from `ATLAS_*` environment variables with sensible
//! defaults. The binary loads a `.env` file first (via `dotenvy`) and lets
//! command-line flags override the selection.

use crate::error::ConfigError;
use crate::types::ScannerMode;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Station configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Backend connection
    pub api: ApiConfig,
    /// Scanning behaviour
    pub scanner: ScannerConfig,
    /// Option loading
    pub catalog: CatalogConfig,
    /// Certificate output
    pub certificates: CertificateConfig,
    /// Abstract cache
    pub cache: CacheConfig,
    /// Log filter (`RUST_LOG` syntax)
    pub log_level: String,
}

/// Backend connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API, e.g. `http://localhost:5000/api`
    pub base_url: String,
    /// Bearer token of the staff account
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Scanning behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Cooldown before the camera resumes after a decode, in milliseconds
    pub resume_delay_ms: u64,
    /// Entries shown in the recent-scans feed
    pub recent_scans_limit: usize,
    /// Decoder command line used in camera mode
    pub camera_command: String,
    /// Mode the station starts in
    pub default_mode: ScannerMode,
}

/// Option loading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Show placeholder / load-error options instead of an empty selector
    pub placeholder_options: bool,
}

/// Certificate output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateConfig {
    /// Directory generated certificates are written to
    pub output_dir: PathBuf,
}

/// Abstract cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached events
    pub capacity: usize,
    /// Entry lifetime in seconds
    pub ttl_secs: u64,
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|s| s.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: lookup("ATLAS_API_URL")
                    .unwrap_or_else(|| "http://localhost:5000/api".to_string()),
                token: lookup("ATLAS_API_TOKEN").filter(|t| !t.trim().is_empty()),
                timeout_secs: parsed(&lookup, "ATLAS_API_TIMEOUT_SECS", 15),
            },
            scanner: ScannerConfig {
                resume_delay_ms: parsed(&lookup, "ATLAS_SCANNER_RESUME_DELAY_MS", 2000),
                recent_scans_limit: parsed(&lookup, "ATLAS_RECENT_SCANS_LIMIT", 10),
                camera_command: lookup("ATLAS_CAMERA_COMMAND")
                    .unwrap_or_else(|| "zbarcam --raw --nodisplay".to_string()),
                default_mode: match lookup("ATLAS_SCANNER_MODE").as_deref().map(str::trim) {
                    Some(mode) if mode.eq_ignore_ascii_case("manual") => ScannerMode::Manual,
                    _ => ScannerMode::Camera,
                },
            },
            catalog: CatalogConfig {
                placeholder_options: parsed(&lookup, "ATLAS_PLACEHOLDER_OPTIONS", true),
            },
            certificates: CertificateConfig {
                output_dir: lookup("ATLAS_CERTIFICATE_DIR")
                    .map_or_else(|| PathBuf::from("certificates"), PathBuf::from),
            },
            cache: CacheConfig {
                capacity: parsed(&lookup, "ATLAS_CACHE_CAPACITY", 32),
                ttl_secs: parsed(&lookup, "ATLAS_CACHE_TTL_SECS", 300),
            },
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info,onsite_atlas=debug".to_string()),
        }
    }

    /// Reject values the station cannot run with
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api.base_url.starts_with("http://") || self.api.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                key: "ATLAS_API_URL",
                reason: format!("`{}` is not an http(s) URL", self.api.base_url),
            });
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "ATLAS_API_TIMEOUT_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.scanner.recent_scans_limit == 0 {
            return Err(ConfigError::Invalid {
                key: "ATLAS_RECENT_SCANS_LIMIT",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.cache.capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "ATLAS_CACHE_CAPACITY",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl ApiConfig {
    /// Per-request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl ScannerConfig {
    /// Camera cooldown after a decode
    #[must_use]
    pub const fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }
}

impl CacheConfig {
    /// Entry lifetime
    #[must_use]
    pub fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}
