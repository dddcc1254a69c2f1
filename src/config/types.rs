use serde::{Deserialize, Serialize};

// ─── Top-Level Config ───────────────────────────────────────────────────────

/// Root configuration, usually loaded from `cloudkeep.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloudkeepConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub store: StoreSettings,
    #[serde(default)]
    pub queue: QueueSettings,
}

// ─── Server ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:8787".to_string()
}

// ─── Store ──────────────────────────────────────────────────────────────────

/// Row-store backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackendKind {
    Rest,
    Sqlite,
    #[default]
    Memory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default)]
    pub backend: StoreBackendKind,
    /// Base URL of the PostgREST endpoint (rest backend).
    #[serde(default)]
    pub url: Option<String>,
    /// Service key sent as `apikey` and bearer token (rest backend).
    #[serde(default)]
    pub service_key: Option<String>,
    /// Database file (sqlite backend).
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::default(),
            url: None,
            service_key: None,
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> String {
    ".cloudkeep/store.db".to_string()
}

// ─── Queue ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default = "default_max")]
    pub default_max: usize,
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            default_max: default_max(),
        }
    }
}

fn default_max() -> usize {
    crate::automation::queue::DEFAULT_MAX
}
