use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

/// Environment override for the backend base URL, checked after the config
/// file and before the built-in default.
pub const BACKEND_URL_ENV: &str = "STUDYSYNC_BACKEND_URL";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
}

/// The identity broker is optional; without it the dashboard simply has no
/// sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    pub base_url: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            base_url: default_backend_url(),
        }
    }
}

/// Local-loopback default matching the backend's development port.
pub fn default_backend_url() -> String {
    "http://localhost:3000".to_string()
}

impl Config {
    /// Resolution order: config file, then the `STUDYSYNC_BACKEND_URL`
    /// environment variable, then the loopback default. The CLI `--backend`
    /// flag is applied on top by `with_backend_override`.
    pub fn load() -> Result<Self> {
        let mut config = Config::default();

        if let Some(dirs) = directories::ProjectDirs::from("com", "studysync", "studysync") {
            let config_file = dirs.config_dir().join("config.toml");
            if config_file.exists() {
                let content = std::fs::read_to_string(&config_file)
                    .with_context(|| format!("reading {}", config_file.display()))?;
                config = toml::from_str(&content)
                    .with_context(|| format!("parsing {}", config_file.display()))?;
            }
        }

        if let Ok(url) = std::env::var(BACKEND_URL_ENV) {
            if !url.trim().is_empty() {
                config.backend.base_url = url;
            }
        }

        config.backend.base_url = normalize_base_url(&config.backend.base_url)?;
        if let Some(identity_url) = config.identity.base_url.take() {
            config.identity.base_url = Some(normalize_base_url(&identity_url)?);
        }
        Ok(config)
    }

    pub fn with_backend_override(mut self, base_url: Option<String>) -> Result<Self> {
        if let Some(url) = base_url {
            self.backend.base_url = normalize_base_url(&url)?;
        }
        Ok(self)
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dirs) = directories::ProjectDirs::from("com", "studysync", "studysync") {
            std::fs::create_dir_all(dirs.config_dir())?;
            let config_file = dirs.config_dir().join("config.toml");
            let content = toml::to_string_pretty(self)?;
            std::fs::write(config_file, content)?;
        }
        Ok(())
    }
}

/// Validate and canonicalize a base URL: http(s) only, no trailing slash.
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw.trim()).map_err(|e| anyhow!("invalid URL '{}': {}", raw, e))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("unsupported URL scheme '{}'", other)),
    }
    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_points_at_loopback() {
        let config = Config::default();
        assert_eq!(config.backend.base_url, "http://localhost:3000");
        assert!(config.identity.base_url.is_none());
    }

    #[test]
    fn normalize_trims_trailing_slash() {
        assert_eq!(
            normalize_base_url("http://localhost:3000/").unwrap(),
            "http://localhost:3000"
        );
        assert_eq!(
            normalize_base_url("https://api.studysync.dev").unwrap(),
            "https://api.studysync.dev"
        );
    }

    #[test]
    fn normalize_rejects_non_http_schemes() {
        assert!(normalize_base_url("ftp://example.com").is_err());
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn cli_override_wins() {
        let config = Config::default()
            .with_backend_override(Some("http://127.0.0.1:8080/".to_string()))
            .unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:8080");
    }
}
