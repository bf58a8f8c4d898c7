//! Cache behaviour settings.

use serde::{Deserialize, Serialize};

/// Settings for the cache components.
///
/// Every field has a default, so a partial (or empty) config file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Keep cached attachments when switching or clearing the vault.
    ///
    /// Notes and the metadata index are always wiped on a switch.
    pub retain_attachments_across_vaults: bool,

    /// Mime type recorded for attachments whose type the remote doesn't report
    pub default_attachment_mime: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            retain_attachments_across_vaults: false,
            default_attachment_mime: "application/octet-stream".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_uses_defaults() {
        let config: CacheConfig =
            serde_json::from_str(r#"{ "retain_attachments_across_vaults": true }"#).unwrap();
        assert!(config.retain_attachments_across_vaults);
        assert_eq!(config.default_attachment_mime, "application/octet-stream");
    }

    #[test]
    fn empty_config_is_default() {
        let config: CacheConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, CacheConfig::default());
    }
}
