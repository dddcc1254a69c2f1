use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};

use super::types::{CloudkeepConfig, StoreBackendKind};

pub const DEFAULT_CONFIG_FILE: &str = "cloudkeep.yaml";

/// Load configuration from `path`, then apply environment overrides.
///
/// - An explicit path that does not exist is an error.
/// - The default `cloudkeep.yaml` is optional; without it defaults apply.
pub fn load_config(path: &str) -> Result<CloudkeepConfig> {
    let p = Path::new(path);
    let mut config = if p.is_file() {
        let content = fs::read_to_string(p)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        parse_config(&content).with_context(|| format!("Invalid config file: {}", path))?
    } else if path == DEFAULT_CONFIG_FILE {
        tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
        CloudkeepConfig::default()
    } else {
        bail!("Config not found: '{}'", path);
    };

    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Parse YAML content into a CloudkeepConfig.
pub fn parse_config(content: &str) -> Result<CloudkeepConfig> {
    if content.trim().is_empty() {
        return Ok(CloudkeepConfig::default());
    }
    let config: CloudkeepConfig =
        serde_yaml::from_str(content).context("Failed to parse YAML configuration")?;
    Ok(config)
}

/// Apply `CLOUDKEEP_*` overrides. Setting a store URL selects the REST
/// backend, setting a store path selects SQLite.
pub fn apply_overrides<F>(config: &mut CloudkeepConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(bind) = get("CLOUDKEEP_BIND") {
        config.server.bind = bind;
    }
    if let Some(path) = get("CLOUDKEEP_STORE_PATH") {
        config.store.path = path;
        config.store.backend = StoreBackendKind::Sqlite;
    }
    if let Some(url) = get("CLOUDKEEP_STORE_URL") {
        config.store.url = Some(url);
        config.store.backend = StoreBackendKind::Rest;
    }
    if let Some(key) = get("CLOUDKEEP_SERVICE_KEY") {
        config.store.service_key = Some(key);
    }
}

/// Check that the selected backend has what it needs.
pub fn validate(config: &CloudkeepConfig) -> Result<()> {
    if config.store.backend == StoreBackendKind::Rest {
        if config.store.url.as_deref().unwrap_or("").is_empty() {
            bail!("store.url is required for the rest backend (or set CLOUDKEEP_STORE_URL)");
        }
        if config.store.service_key.as_deref().unwrap_or("").is_empty() {
            bail!(
                "store.service_key is required for the rest backend (or set CLOUDKEEP_SERVICE_KEY)"
            );
        }
    }
    if config.queue.default_max == 0 {
        bail!("queue.default_max must be at least 1");
    }
    Ok(())
}
