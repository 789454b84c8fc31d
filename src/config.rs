use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "MediCore";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Patient register page size.
pub const PATIENTS_PER_PAGE: u32 = 10;
/// Doctor list page size.
pub const DOCTORS_PER_PAGE: u32 = 10;
/// Every other list.
pub const PER_PAGE: u32 = 15;
pub const AUTOCOMPLETE_LIMIT: u32 = 10;
pub const AUTOCOMPLETE_MIN_CHARS: usize = 2;
/// Dashboard widgets for staff and doctors.
pub const DASHBOARD_RECENT: u32 = 5;
/// Dashboard widgets for patients.
pub const PATIENT_DASHBOARD_RECENT: u32 = 3;
pub const AUDIT_RETENTION_DAYS: i64 = 90;

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_LOG_FILTER: &str = "medicore=info,tower_http=info";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
    #[error("Cannot determine home directory; set MEDICORE_DATA_DIR")]
    NoHomeDir,
}

/// Runtime configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub max_upload_bytes: u64,
    pub cors_origin: Option<String>,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let bind = match get("MEDICORE_BIND") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                var: "MEDICORE_BIND",
                value: raw,
            })?,
            None => DEFAULT_BIND.parse().map_err(|_| ConfigError::Invalid {
                var: "MEDICORE_BIND",
                value: DEFAULT_BIND.into(),
            })?,
        };

        let data_dir = match get("MEDICORE_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => app_data_dir()?,
        };
        let db_path = get("MEDICORE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("medicore.db"));
        let media_dir = get("MEDICORE_MEDIA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("media"));

        let max_upload_bytes = match get("MEDICORE_MAX_UPLOAD_BYTES") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        var: "MEDICORE_MAX_UPLOAD_BYTES",
                        value: raw,
                    })
                }
            },
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let log_filter = get("MEDICORE_LOG")
            .or_else(|| get("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            bind,
            data_dir,
            db_path,
            media_dir,
            max_upload_bytes,
            cors_origin: get("MEDICORE_CORS_ORIGIN"),
            log_filter,
        })
    }

    /// Configuration rooted in a scratch directory, for tests.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            db_path: data_dir.join("medicore.db"),
            media_dir: data_dir.join("media"),
            data_dir,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            cors_origin: None,
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

/// ~/MediCore/ on all platforms
pub fn app_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(APP_NAME))
        .ok_or(ConfigError::NoHomeDir)
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
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_derive_from_data_dir() {
        let config = AppConfig::from_lookup(lookup(&[("MEDICORE_DATA_DIR", "/srv/medicore")])).unwrap();
        assert_eq!(config.bind.to_string(), "127.0.0.1:8080");
        assert_eq!(config.db_path, PathBuf::from("/srv/medicore/medicore.db"));
        assert_eq!(config.media_dir, PathBuf::from("/srv/medicore/media"));
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = AppConfig::from_lookup(lookup(&[
            ("MEDICORE_DATA_DIR", "/srv/medicore"),
            ("MEDICORE_BIND", "0.0.0.0:9000"),
            ("MEDICORE_DB", "/tmp/clinic.db"),
            ("MEDICORE_MAX_UPLOAD_BYTES", "2048"),
            ("MEDICORE_CORS_ORIGIN", "https://clinic.example"),
            ("RUST_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.db_path, PathBuf::from("/tmp/clinic.db"));
        assert_eq!(config.max_upload_bytes, 2048);
        assert_eq!(config.cors_origin.as_deref(), Some("https://clinic.example"));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn invalid_values_rejected() {
        let err = AppConfig::from_lookup(lookup(&[
            ("MEDICORE_DATA_DIR", "/srv"),
            ("MEDICORE_BIND", "not-an-address"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "MEDICORE_BIND", .. }));

        let err = AppConfig::from_lookup(lookup(&[
            ("MEDICORE_DATA_DIR", "/srv"),
            ("MEDICORE_MAX_UPLOAD_BYTES", "0"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn app_name_is_medicore() {
        assert_eq!(APP_NAME, "MediCore");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, "0.3.0");
    }
}
