//! Volume configuration via `mftrec.toml`
//!
//! Geometry (record and cluster size) and the validation bounds the record
//! layer enforces. A volume normally derives these from its boot sector;
//! the file form exists for tooling and tests.

use crate::error::{RecordError, Result};
use crate::types::{AttrType, RecordId};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "mftrec.toml";

const SECTOR_SIZE: u32 = 512;

fn default_record_size() -> u32 {
    1024
}

fn default_cluster_size() -> u32 {
    4096
}

fn default_max_attr_type() -> u32 {
    AttrType::LOGGED_UTILITY_STREAM.as_u32()
}

fn default_reserved_records() -> u64 {
    11
}

fn default_first_free_record() -> u64 {
    16
}

/// Per-volume record geometry and validation bounds.
///
/// # Example
///
/// ```toml
/// record_size = 1024
/// cluster_size = 4096
/// max_attr_type = 256
/// reserved_records = 11
/// first_free_record = 16
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeConfig {
    /// Size of every record in bytes (power of two).
    #[serde(default = "default_record_size")]
    pub record_size: u32,
    /// Cluster size in bytes (power of two).
    #[serde(default = "default_cluster_size")]
    pub cluster_size: u32,
    /// Largest attribute-type code accepted as structurally valid.
    #[serde(default = "default_max_attr_type")]
    pub max_attr_type: u32,
    /// First record of the reserved range cleared in bulk on retire.
    #[serde(default = "default_reserved_records")]
    pub reserved_records: u64,
    /// First record number handed out to ordinary objects.
    #[serde(default = "default_first_free_record")]
    pub first_free_record: u64,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            record_size: default_record_size(),
            cluster_size: default_cluster_size(),
            max_attr_type: default_max_attr_type(),
            reserved_records: default_reserved_records(),
            first_free_record: default_first_free_record(),
        }
    }
}

impl VolumeConfig {
    /// Config with a given record size and defaults elsewhere.
    pub fn with_record_size(record_size: u32) -> Self {
        Self {
            record_size,
            ..Self::default()
        }
    }

    /// Check geometry and bounds.
    ///
    /// # Errors
    ///
    /// Returns `RecordError::Config` describing the first bad field.
    pub fn validate(&self) -> Result<()> {
        if !self.record_size.is_power_of_two()
            || self.record_size < SECTOR_SIZE
            || self.record_size > 0x1_0000
        {
            return Err(RecordError::Config(format!(
                "record_size {} must be a power of two in [512, 65536]",
                self.record_size
            )));
        }
        if !self.cluster_size.is_power_of_two() || self.cluster_size < SECTOR_SIZE {
            return Err(RecordError::Config(format!(
                "cluster_size {} must be a power of two >= 512",
                self.cluster_size
            )));
        }
        if self.max_attr_type == 0 || !AttrType::new(self.max_attr_type).is_valid(u32::MAX) {
            return Err(RecordError::Config(format!(
                "max_attr_type {:#x} must be a non-zero multiple of 16",
                self.max_attr_type
            )));
        }
        if self.reserved_records > self.first_free_record {
            return Err(RecordError::Config(format!(
                "reserved_records {} exceeds first_free_record {}",
                self.reserved_records, self.first_free_record
            )));
        }
        Ok(())
    }

    /// log2 of the record size
    pub fn record_bits(&self) -> u32 {
        self.record_size.trailing_zeros()
    }

    /// log2 of the cluster size
    pub fn cluster_bits(&self) -> u32 {
        self.cluster_size.trailing_zeros()
    }

    /// Sectors covered by one record
    pub fn sectors_per_record(&self) -> u32 {
        self.record_size / SECTOR_SIZE
    }

    /// Byte offset of a record inside the metadata file
    pub fn record_offset(&self, id: RecordId) -> u64 {
        id.as_u64() << self.record_bits()
    }

    /// Logical cluster of the metadata file holding a record
    pub fn record_vcn(&self, id: RecordId) -> u64 {
        self.record_offset(id) >> self.cluster_bits()
    }

    /// Whether `id` lies in the reserved range that is cleared in bulk
    pub fn is_reserved(&self, id: RecordId) -> bool {
        (self.reserved_records..self.first_free_record).contains(&id.as_u64())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# mftrec volume configuration
#
# Record size in bytes. Power of two between 512 and 65536.
record_size = 1024

# Cluster size in bytes. Power of two, at least 512.
cluster_size = 4096

# Largest attribute-type code accepted when walking a record.
# Records containing larger codes are treated as corrupt.
max_attr_type = 256

# Reserved range [reserved_records, first_free_record) is cleared in bulk
# when retired. Records below first_free_record get sequence = record number.
reserved_records = 11
first_free_record = 16
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RecordError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: VolumeConfig = toml::from_str(&content).map_err(|e| {
            RecordError::Config(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                RecordError::Config(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}
