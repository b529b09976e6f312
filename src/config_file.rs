//! Configuration file handling for the build configurator.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! yields a working setup over the standard slot table.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::configurator::{Configurator, ConfiguratorOptions, FinishMode};
use crate::error::RigError;
use crate::slots::{SlotDefinition, SlotTable, StandardSlot};

/// Longest lookup timeout accepted (10 minutes)
pub const MAX_LOOKUP_TIMEOUT_MS: u64 = 600_000;

/// Configurator settings that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    /// Product catalog (JSON array of product records)
    pub catalog_path: PathBuf,
    /// Cart file written by `finish`
    pub cart_path: PathBuf,
    /// Per-lookup timeout; 0 disables the timeout
    pub lookup_timeout_ms: u64,
    /// Re-check stock and compatibility when a part is selected
    pub validate_on_select: bool,
    pub finish_mode: FinishMode,
    /// Build slots in display order
    pub slots: Vec<SlotDefinition>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("catalog.json"),
            cart_path: PathBuf::from("cart.json"),
            lookup_timeout_ms: 10_000,
            validate_on_select: false,
            finish_mode: FinishMode::default(),
            slots: StandardSlot::standard_definitions(),
        }
    }
}

impl BuilderConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.catalog_path.as_os_str().is_empty() {
            return Err(RigError::config("Catalog path must be specified"));
        }
        if self.cart_path.as_os_str().is_empty() {
            return Err(RigError::config("Cart path must be specified"));
        }
        if self.cart_path == self.catalog_path {
            return Err(RigError::config(
                "Cart path must differ from the catalog path",
            ));
        }
        if self.lookup_timeout_ms > MAX_LOOKUP_TIMEOUT_MS {
            return Err(RigError::config(format!(
                "Lookup timeout must be at most {MAX_LOOKUP_TIMEOUT_MS} ms"
            )));
        }

        self.slot_table()?;
        Ok(())
    }

    pub fn slot_table(&self) -> crate::error::Result<SlotTable> {
        Ok(SlotTable::new(self.slots.clone())?)
    }

    pub fn lookup_timeout(&self) -> Option<Duration> {
        (self.lookup_timeout_ms > 0).then(|| Duration::from_millis(self.lookup_timeout_ms))
    }

    pub fn options(&self) -> ConfiguratorOptions {
        ConfiguratorOptions {
            validate_on_select: self.validate_on_select,
            finish_mode: self.finish_mode,
        }
    }

    /// A fresh configurator session for this configuration
    pub fn configurator(&self) -> crate::error::Result<Configurator> {
        Ok(Configurator::with_options(self.slot_table()?, self.options()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = BuilderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lookup_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(config.slot_table().unwrap(), SlotTable::standard());
    }

    #[test]
    fn test_empty_object_uses_defaults() {
        let config: BuilderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BuilderConfig::default());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let config = BuilderConfig {
            lookup_timeout_ms: 0,
            validate_on_select: true,
            finish_mode: FinishMode::AllOrNothing,
            ..Default::default()
        };

        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        let loaded = BuilderConfig::load_from_file(file.path()).unwrap();

        assert_eq!(loaded, config);
        assert_eq!(loaded.lookup_timeout(), None);
        assert!(loaded.options().validate_on_select);
    }

    #[test]
    fn test_finish_mode_serializes_snake_case() {
        let json = serde_json::to_string(&BuilderConfig {
            finish_mode: FinishMode::AllOrNothing,
            ..Default::default()
        })
        .unwrap();
        assert!(json.contains("\"all_or_nothing\""));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = BuilderConfig::load_from_file(Path::new("/nonexistent/rigbuild.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_json() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"{ invalid json }").unwrap();
        temp_file.flush().unwrap();

        assert!(BuilderConfig::load_from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_slots() {
        let config = BuilderConfig {
            slots: vec![SlotDefinition::new("motherboard", "Motherboard", "motherboard")
                .depending_on("cpu")],
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, RigError::SlotTable(_)));
        assert!(config.configurator().is_err());
    }

    #[test]
    fn test_validation_rejects_shared_paths() {
        let config = BuilderConfig {
            cart_path: PathBuf::from("catalog.json"),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(RigError::Config(_))));
    }

    #[test]
    fn test_validation_rejects_huge_timeout() {
        let config = BuilderConfig {
            lookup_timeout_ms: MAX_LOOKUP_TIMEOUT_MS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_configurator_uses_options() {
        let config = BuilderConfig {
            finish_mode: FinishMode::AllOrNothing,
            ..Default::default()
        };
        let configurator = config.configurator().unwrap();
        assert_eq!(configurator.options().finish_mode, FinishMode::AllOrNothing);
        assert_eq!(configurator.slots().len(), 7);
    }
}
