//! Layout engine configuration
//!
//! The active configuration is process-wide: it is read when a builder
//! finalizes, so changing it never affects trees that already exist.

use std::path::Path;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::constants::{env, memory::DEFAULT_BUFFER_ALIGNMENT};
use crate::error::{config_error, LayoutResult};
use crate::padding::PaddingPolicy;

/// Configuration consulted at finalize time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Rounding applied to node extents
    pub padding: PaddingPolicy,

    /// Alignment of each tree's backing buffer (bytes, power of two)
    pub buffer_alignment: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            padding: PaddingPolicy::PowerOfTwoPad,
            buffer_alignment: DEFAULT_BUFFER_ALIGNMENT,
        }
    }
}

impl LayoutConfig {
    pub fn packed() -> Self {
        Self {
            padding: PaddingPolicy::Packed,
            ..Self::default()
        }
    }

    pub fn with_padding(mut self, padding: PaddingPolicy) -> Self {
        self.padding = padding;
        self
    }

    pub fn validate(&self) -> LayoutResult<()> {
        if self.buffer_alignment == 0 || !self.buffer_alignment.is_power_of_two() {
            return Err(config_error(format!(
                "buffer_alignment {} must be a non-zero power of two",
                self.buffer_alignment
            )));
        }
        Ok(())
    }

    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(source: &str) -> LayoutResult<Self> {
        let config: Self = toml::from_str(source).map_err(config_error)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> LayoutResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| config_error(format!("failed to read {}: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&source)?;
        log::debug!("[Config] Loaded {} from {}", config.summary(), path.display());
        Ok(config)
    }

    pub fn to_toml_string(&self) -> LayoutResult<String> {
        toml::to_string(self).map_err(config_error)
    }

    /// Default configuration with environment overrides applied
    pub fn from_env() -> LayoutResult<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply `FIELD_LAYOUT_*` overrides looked up through `lookup`
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> LayoutResult<Self> {
        if let Some(value) = lookup(env::PADDING) {
            self.padding = value.parse()?;
        }
        if let Some(value) = lookup(env::ALIGNMENT) {
            self.buffer_alignment = value.trim().parse().map_err(|e| {
                config_error(format!("{}={} is not an integer: {}", env::ALIGNMENT, value, e))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn summary(&self) -> String {
        format!("padding={} alignment={}", self.padding, self.buffer_alignment)
    }
}

lazy_static! {
    static ref ACTIVE: RwLock<LayoutConfig> = RwLock::new(LayoutConfig::default());
}

/// Install `config` as the process-wide configuration
pub fn init(config: LayoutConfig) -> LayoutResult<()> {
    config.validate()?;
    log::info!("[Config] Active layout configuration: {}", config.summary());
    *ACTIVE.write() = config;
    Ok(())
}

/// Snapshot of the process-wide configuration
pub fn active() -> LayoutConfig {
    ACTIVE.read().clone()
}

pub(crate) fn update(f: impl FnOnce(&mut LayoutConfig)) {
    f(&mut ACTIVE.write());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = LayoutConfig::default();
        assert_eq!(config.padding, PaddingPolicy::PowerOfTwoPad);
        assert_eq!(config.buffer_alignment, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_partial_document() {
        let config = LayoutConfig::from_toml_str("padding = \"packed\"\n").unwrap();
        assert_eq!(config.padding, PaddingPolicy::Packed);
        assert_eq!(config.buffer_alignment, 64);

        let text = config.to_toml_string().unwrap();
        assert_eq!(LayoutConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_toml_rejects_bad_alignment() {
        assert!(LayoutConfig::from_toml_str("buffer_alignment = 48").is_err());
        assert!(LayoutConfig::from_toml_str("padding = \"loose\"").is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("FIELD_LAYOUT_PADDING", "packed"),
            ("FIELD_LAYOUT_ALIGNMENT", "128"),
        ]
        .into_iter()
        .collect();

        let config = LayoutConfig::default()
            .with_overrides(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.padding, PaddingPolicy::Packed);
        assert_eq!(config.buffer_alignment, 128);

        let bad = LayoutConfig::default().with_overrides(|key| {
            (key == "FIELD_LAYOUT_ALIGNMENT").then(|| "lots".to_string())
        });
        assert!(bad.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.toml");
        std::fs::write(&path, "padding = \"pow2\"\nbuffer_alignment = 256\n").unwrap();

        let config = LayoutConfig::load(&path).unwrap();
        assert_eq!(config.padding, PaddingPolicy::PowerOfTwoPad);
        assert_eq!(config.buffer_alignment, 256);

        assert!(LayoutConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
