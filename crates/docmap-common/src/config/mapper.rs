//! Mapper settings.
//!
//! These structures configure the mapping layer itself, as opposed to the
//! engine configuration text it emits.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use super::grammar::{ConfigObject, ConfigValue};
use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_COLLATOR_NAME, DEFAULT_EXTRACTOR_NAME};
use crate::error::{MapError, MapResult};

/// What an index's `index_id` hash covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexIdScope {
    /// Table value format and column descriptors only: two tables with the
    /// same shape and index share an identifier.
    #[default]
    Shape,
    /// Shape plus the table name.
    Table,
}

/// Mapper configuration.
///
/// # Example
///
/// ```rust
/// use docmap_common::config::MapperConfig;
///
/// let config = MapperConfig::default();
/// assert_eq!(config.batch_size, 100);
/// assert_eq!(config.extractor_name, "multikey");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Rows fetched per cursor batch.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Registered name of the engine's metadata-driven token extractor.
    #[serde(default = "default_extractor_name")]
    pub extractor_name: String,

    /// Registered name of the engine's compound directional collator.
    #[serde(default = "default_collator_name")]
    pub collator_name: String,

    /// Inputs of the deterministic index identifier.
    #[serde(default)]
    pub index_id_scope: IndexIdScope,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_extractor_name() -> String {
    DEFAULT_EXTRACTOR_NAME.to_string()
}

fn default_collator_name() -> String {
    DEFAULT_COLLATOR_NAME.to_string()
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            extractor_name: default_extractor_name(),
            collator_name: default_collator_name(),
            index_id_scope: IndexIdScope::default(),
        }
    }
}

impl MapperConfig {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file.
    pub fn from_file(path: &Path) -> MapResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save(&self, path: &Path) -> MapResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to a TOML string.
    pub fn to_toml(&self) -> MapResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> MapResult<()> {
        if self.batch_size == 0 {
            return Err(MapError::invalid_config("batch_size must be positive"));
        }
        if self.extractor_name.is_empty() {
            return Err(MapError::invalid_config("extractor_name must not be empty"));
        }
        if self.collator_name.is_empty() {
            return Err(MapError::invalid_config("collator_name must not be empty"));
        }
        Ok(())
    }

    /// Creates a builder for configuration.
    #[must_use]
    pub fn builder() -> MapperConfigBuilder {
        MapperConfigBuilder::new()
    }
}

/// Builder for mapper configuration.
#[derive(Default)]
pub struct MapperConfigBuilder {
    config: MapperConfig,
}

impl MapperConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cursor batch size.
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Sets the extractor name.
    #[must_use]
    pub fn extractor_name(mut self, name: impl Into<String>) -> Self {
        self.config.extractor_name = name.into();
        self
    }

    /// Sets the collator name.
    #[must_use]
    pub fn collator_name(mut self, name: impl Into<String>) -> Self {
        self.config.collator_name = name.into();
        self
    }

    /// Sets the index identifier scope.
    #[must_use]
    pub fn index_id_scope(mut self, scope: IndexIdScope) -> Self {
        self.config.index_id_scope = scope;
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> MapResult<MapperConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// User table options passed through to the table create config.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableOptions {
    /// Enables key prefix compression.
    #[serde(default)]
    pub prefix_compression: Option<bool>,

    /// Minimum shared prefix length before compression applies (0..=4).
    #[serde(default)]
    pub prefix_compression_min: Option<u8>,

    /// Column groups: group name to member column names.
    #[serde(default)]
    pub colgroups: BTreeMap<String, Vec<String>>,

    /// Extra `key=value` entries appended verbatim.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl TableOptions {
    /// Maximum accepted `prefix_compression_min`.
    pub const MAX_PREFIX_COMPRESSION_MIN: u8 = 4;

    /// Validates the options.
    pub fn validate(&self) -> MapResult<()> {
        if let Some(min) = self.prefix_compression_min {
            if min > Self::MAX_PREFIX_COMPRESSION_MIN {
                return Err(MapError::invalid_config(format!(
                    "prefix_compression_min must be 0..={}, got {}",
                    Self::MAX_PREFIX_COMPRESSION_MIN,
                    min
                )));
            }
        }
        for name in self.colgroups.keys() {
            if name.is_empty() {
                return Err(MapError::invalid_config("column group name must not be empty"));
            }
        }
        Ok(())
    }

    /// Appends the options to a create config. Column groups are emitted by
    /// the schema compiler, not here.
    pub fn apply(&self, config: &mut ConfigObject) {
        if let Some(enabled) = self.prefix_compression {
            config.push("prefix_compression", ConfigValue::Flag(enabled));
        }
        if let Some(min) = self.prefix_compression_min {
            config.push("prefix_compression_min", ConfigValue::scalar(min));
        }
        for (key, value) in &self.extra {
            config.push(key.clone(), ConfigValue::Scalar(value.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = MapperConfig::default();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.collator_name, "compound");
        assert_eq!(config.index_id_scope, IndexIdScope::Shape);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = MapperConfig::builder()
            .batch_size(7)
            .extractor_name("tokens")
            .index_id_scope(IndexIdScope::Table)
            .build()
            .unwrap();
        assert_eq!(config.batch_size, 7);
        assert_eq!(config.extractor_name, "tokens");
        assert_eq!(config.index_id_scope, IndexIdScope::Table);

        assert!(MapperConfig::builder().batch_size(0).build().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: MapperConfig = toml::from_str("batch_size = 5\nindex_id_scope = \"table\"").unwrap();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.extractor_name, "multikey");
        assert_eq!(config.index_id_scope, IndexIdScope::Table);
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("conf").join("mapper.toml");

        let config = MapperConfig::builder().batch_size(42).build().unwrap();
        config.save(&path).unwrap();

        let loaded = MapperConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        std::fs::write(&path, "batch_size = 0").unwrap();
        assert!(MapperConfig::from_file(&path).is_err());

        std::fs::write(&path, "batch_size = \"many\"").unwrap();
        assert!(MapperConfig::from_file(&path).is_err());
    }

    #[test]
    fn test_table_options_apply() {
        let mut options = TableOptions {
            prefix_compression: Some(true),
            prefix_compression_min: Some(2),
            ..Default::default()
        };
        options.extra.insert("block_compressor".to_string(), "snappy".to_string());
        assert!(options.validate().is_ok());

        let mut config = ConfigObject::new();
        options.apply(&mut config);
        assert_eq!(
            config.to_string(),
            "prefix_compression,prefix_compression_min=2,block_compressor=snappy"
        );

        options.prefix_compression_min = Some(5);
        assert!(options.validate().is_err());
    }
}
