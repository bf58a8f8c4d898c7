use std::path::{Path, PathBuf};

use vault_cache::CacheConfig;

/// Name of the optional settings file inside the cache directory.
pub const CONFIG_FILE: &str = "config.json";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the local store and `config.json`
    pub cache_dir: PathBuf,
    /// Directory acting as the remote hierarchy
    pub remote_root: PathBuf,
    pub cache: CacheConfig,
}

impl Config {
    /// Resolve paths and load the cache settings.
    ///
    /// `cache_dir` falls back to the platform cache directory; both paths
    /// support `~` for the home directory. A missing `config.json` yields
    /// default settings; an unreadable one is an error.
    pub fn load(cache_dir: Option<&str>, remote_root: &str) -> Result<Self, ConfigError> {
        let cache_dir = match cache_dir {
            Some(dir) => expand_tilde(dir),
            None => default_cache_dir()?,
        };
        let remote_root = expand_tilde(remote_root);
        let cache = load_cache_config(&cache_dir)?;

        Ok(Self {
            cache_dir,
            remote_root,
            cache,
        })
    }

    /// Directory the local store lives in.
    pub fn store_dir(&self) -> PathBuf {
        self.cache_dir.join("store")
    }
}

fn default_cache_dir() -> Result<PathBuf, ConfigError> {
    dirs::cache_dir()
        .map(|dir| dir.join("vault-reader"))
        .ok_or(ConfigError::NoCacheDir)
}

fn load_cache_config(cache_dir: &Path) -> Result<CacheConfig, ConfigError> {
    let path = cache_dir.join(CONFIG_FILE);
    match std::fs::read_to_string(&path) {
        Ok(json) => serde_json::from_str(&json).map_err(|source| ConfigError::Parse { path, source }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(CacheConfig::default()),
        Err(source) => Err(ConfigError::Read { path, source }),
    }
}

/// Expand ~ or ~/ prefix to the user's home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"))
    } else if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path))
    } else {
        PathBuf::from(path)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("No cache directory available; set VAULT_READER_CACHE_DIR")]
    NoCacheDir,

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings in {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().to_str().unwrap();

        let config = Config::load(Some(dir), "/srv/remote").unwrap();

        assert_eq!(config.cache, CacheConfig::default());
        assert_eq!(config.remote_root, PathBuf::from("/srv/remote"));
        assert_eq!(config.store_dir(), temp_dir.path().join("store"));
    }

    #[test]
    fn reads_config_file() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(CONFIG_FILE),
            r#"{ "retain_attachments_across_vaults": true }"#,
        )
        .unwrap();

        let config = Config::load(temp_dir.path().to_str(), "remote").unwrap();
        assert!(config.cache.retain_attachments_across_vaults);
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(CONFIG_FILE), "{ nope").unwrap();

        let err = Config::load(temp_dir.path().to_str(), "remote").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn expands_home_prefix() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/notes"), home.join("notes"));
        }
    }
}
