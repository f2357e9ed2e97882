use anyhow::{Context as AnyhowContext, Result};
use dms_client::ClientConfig;
use dms_navigator::NavigatorConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const BASE_URL_ENV: &str = "DMS_BASE_URL";
pub const TIMEOUT_ENV: &str = "DMS_TIMEOUT_MS";

/// Contents of the optional `--config` TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub navigator: NavigatorConfig,
    pub client: ClientConfig,
}

impl FileConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
    }

    /// Applies `DMS_BASE_URL` / `DMS_TIMEOUT_MS`, then explicit flags.
    pub fn with_overrides(mut self, base_url: Option<&str>) -> Result<Self> {
        if let Some(url) = env_value(BASE_URL_ENV) {
            self.client.base_url = url;
        }
        if let Some(raw) = env_value(TIMEOUT_ENV) {
            self.client.timeout_ms = raw
                .parse()
                .with_context(|| format!("{TIMEOUT_ENV} must be a number of milliseconds"))?;
        }
        if let Some(url) = base_url {
            self.client.base_url = url.to_string();
        }
        Ok(self)
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[navigator]\nroot_label = \"Registratur\"\n\n[client]\nbase_url = \"https://dms.example.org/api\""
        )
        .unwrap();
        let cfg = FileConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.navigator.root_label, "Registratur");
        assert!(cfg.navigator.billing_fail_open);
        assert_eq!(cfg.client.base_url, "https://dms.example.org/api");
        assert_eq!(cfg.client.timeout_ms, ClientConfig::default().timeout_ms);
    }

    #[test]
    fn flag_wins_over_file() {
        let cfg = FileConfig::default()
            .with_overrides(Some("http://127.0.0.1:9000"))
            .unwrap();
        assert_eq!(cfg.client.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = FileConfig::load(Some(Path::new("/nonexistent/dms.toml"))).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to read config"));
    }
}
