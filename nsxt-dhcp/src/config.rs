//! Driver configuration and state file handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::spec::{ClusterTags, InfraSpec, full_cluster_name};
use crate::state::InfraState;

/// Default owner stamped into the `owner` tag.
pub const DEFAULT_OWNER: &str = "nsxt-dhcp";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Connection settings for the NSX-T Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NsxConfig {
    /// Manager host, with or without scheme (`https://` is assumed).
    pub host: String,
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// Skip TLS certificate verification.
    #[serde(default)]
    pub insecure_ssl: bool,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Desired DHCP topology as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfraConfig {
    pub cluster_name: String,
    #[serde(default)]
    pub name_prefix: Option<String>,
    /// Worker subnet CIDR, e.g. `10.250.0.0/16`.
    pub worker_network: String,
    #[serde(default)]
    pub dns_servers: Vec<String>,
    pub edge_cluster_name: String,
    #[serde(default = "default_owner")]
    pub owner: String,
}

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

impl InfraConfig {
    pub fn to_spec(&self) -> InfraSpec {
        let full_name = full_cluster_name(self.name_prefix.as_deref(), &self.cluster_name);
        InfraSpec {
            cluster_name: self.cluster_name.clone(),
            name_prefix: self.name_prefix.clone(),
            worker_network: self.worker_network.clone(),
            dns_servers: self.dns_servers.clone(),
            edge_cluster_name: self.edge_cluster_name.clone(),
            tags: Arc::new(ClusterTags::new(&self.owner, full_name)),
        }
    }
}

/// Top-level config file of the `nsxt-dhcp` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    pub nsx: NsxConfig,
    pub infra: InfraConfig,
}

impl DriverConfig {
    pub async fn load(path: &Path) -> Result<Self> {
        let data = tokio::fs::read(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&data).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load a persisted state. A missing file is an empty state (first pass).
pub async fn load_state(path: &Path) -> Result<InfraState> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "No state file, starting empty");
            return Ok(InfraState::default());
        }
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_slice(&data).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Persist the state, replacing the file atomically.
pub async fn save_state(path: &Path, state: &InfraState) -> Result<()> {
    let data = serde_json::to_vec_pretty(state).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let tmp = path.with_extension("tmp");
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp, &data).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "nsx": {"host": "nsx.example.com", "username": "admin"},
        "infra": {
            "cluster_name": "shoot--dev--a",
            "name_prefix": "garden",
            "worker_network": "10.250.0.0/16",
            "dns_servers": ["10.0.0.53", "10.0.1.53"],
            "edge_cluster_name": "edge-1"
        }
    }"#;

    #[tokio::test]
    async fn test_load_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, CONFIG).await.unwrap();

        let config = DriverConfig::load(&path).await.unwrap();
        assert_eq!(config.nsx.timeout_secs, 30);
        assert!(!config.nsx.insecure_ssl);
        assert!(config.nsx.password.is_empty());
        assert_eq!(config.infra.owner, DEFAULT_OWNER);

        let spec = config.infra.to_spec();
        assert_eq!(spec.full_cluster_name(), "garden--shoot--dev--a");
        assert_eq!(spec.dns_servers, vec!["10.0.0.53", "10.0.1.53"]);
        assert!(
            spec.common_tags()
                .iter()
                .any(|t| t.tag == "garden--shoot--dev--a")
        );
    }

    #[tokio::test]
    async fn test_load_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        tokio::fs::write(&path, "{").await.unwrap();

        let err = DriverConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[tokio::test]
    async fn test_missing_state_file_is_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = load_state(&dir.path().join("state.json")).await.unwrap();
        assert_eq!(state, InfraState::default());
    }

    #[tokio::test]
    async fn test_state_survives_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = InfraState::default();
        state.segment_path = Some("/infra/segments/workers".to_string());
        state.dhcp.profile_id.set("profile-1");
        state.dhcp.server_id.set("");

        save_state(&path, &state).await.unwrap();
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(load_state(&path).await.unwrap(), state);
    }
}
