//! Process settings, read from `REQFLOW_*` environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use reqflow_inventory::Catalog;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub const DEFAULT_STORAGE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not valid: {reason}")]
    Invalid { var: &'static str, reason: String },

    #[error("cannot read catalog {}: {source}", .path.display())]
    CatalogRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse catalog {}: {source}", .path.display())]
    CatalogParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    /// Upper bound on any single storage call made on behalf of a request.
    pub storage_timeout: Duration,
    /// JSON array of catalog entries; no catalog when unset.
    pub catalog_path: Option<PathBuf>,
    /// Address approval requests are sent to.
    pub approver: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            storage_timeout: Duration::from_millis(DEFAULT_STORAGE_TIMEOUT_MS),
            catalog_path: None,
            approver: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build settings from an arbitrary variable source. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = match get("REQFLOW_BIND_ADDR") {
            Some(raw) => raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                var: "REQFLOW_BIND_ADDR",
                reason: e.to_string(),
            })?,
            None => {
                tracing::info!("REQFLOW_BIND_ADDR not set; using {DEFAULT_BIND_ADDR}");
                Settings::default().bind_addr
            }
        };

        let storage_timeout = match get("REQFLOW_STORAGE_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw.parse().map_err(|e: std::num::ParseIntError| {
                    ConfigError::Invalid {
                        var: "REQFLOW_STORAGE_TIMEOUT_MS",
                        reason: e.to_string(),
                    }
                })?;
                if ms == 0 {
                    return Err(ConfigError::Invalid {
                        var: "REQFLOW_STORAGE_TIMEOUT_MS",
                        reason: "must be greater than zero".to_string(),
                    });
                }
                Duration::from_millis(ms)
            }
            None => Duration::from_millis(DEFAULT_STORAGE_TIMEOUT_MS),
        };

        let catalog_path = get("REQFLOW_CATALOG_PATH").map(PathBuf::from);
        if catalog_path.is_none() {
            tracing::warn!("REQFLOW_CATALOG_PATH not set; running without a catalog");
        }

        Ok(Self {
            bind_addr,
            storage_timeout,
            catalog_path,
            approver: get("REQFLOW_APPROVER"),
        })
    }

    /// Load the configured catalog, or an empty one when none is configured.
    pub fn load_catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.catalog_path {
            Some(path) => load_catalog(path),
            None => Ok(Catalog::empty()),
        }
    }
}

pub fn load_catalog(path: &Path) -> Result<Catalog, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::CatalogRead {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog: Catalog = serde_json::from_str(&raw).map_err(|source| ConfigError::CatalogParse {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), parts = catalog.len(), "catalog loaded");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use reqflow_core::PartNumber;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let s = settings(&[]).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.bind_addr.to_string(), DEFAULT_BIND_ADDR);
    }

    #[test]
    fn explicit_values_are_parsed() {
        let s = settings(&[
            ("REQFLOW_BIND_ADDR", "127.0.0.1:9000"),
            ("REQFLOW_STORAGE_TIMEOUT_MS", "250"),
            ("REQFLOW_APPROVER", "stores@example.com"),
            ("REQFLOW_CATALOG_PATH", "  "),
        ])
        .unwrap();

        assert_eq!(s.bind_addr.port(), 9000);
        assert_eq!(s.storage_timeout, Duration::from_millis(250));
        assert_eq!(s.approver.as_deref(), Some("stores@example.com"));
        assert!(s.catalog_path.is_none());
    }

    #[test]
    fn bad_values_name_the_variable() {
        let err = settings(&[("REQFLOW_STORAGE_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("REQFLOW_STORAGE_TIMEOUT_MS"));
        assert!(settings(&[("REQFLOW_STORAGE_TIMEOUT_MS", "0")]).is_err());
        assert!(settings(&[("REQFLOW_BIND_ADDR", "nowhere")]).is_err());
    }

    #[test]
    fn catalog_file_is_loaded() {
        let path = std::env::temp_dir().join(format!("reqflow-catalog-{}.json", uuid::Uuid::now_v7()));
        std::fs::write(
            &path,
            r#"[{"partNumber":" p-100 ","description":"Bolt","rol":5,"roq":20},
                {"partNumber":"P-200","description":"Nut"}]"#,
        )
        .unwrap();

        let s = Settings {
            catalog_path: Some(path.clone()),
            ..Settings::default()
        };
        let catalog = s.load_catalog().unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(catalog.len(), 2);
        let entry = catalog.get(&PartNumber::parse("P-100").unwrap()).unwrap();
        assert_eq!(entry.roq, Some(20));
    }

    #[test]
    fn missing_catalog_file_is_an_error() {
        let s = Settings {
            catalog_path: Some(PathBuf::from("/nonexistent/reqflow/catalog.json")),
            ..Settings::default()
        };
        assert!(matches!(s.load_catalog(), Err(ConfigError::CatalogRead { .. })));
    }
}
