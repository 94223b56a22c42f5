//! CPU construction parameters.
//!
//! A config can come from defaults, a JSON file, or command-line flags
//! layered on top of either.

use std::path::Path;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::cpu::memory::{ADDRESS_SPACE, DEFAULT_MEMORY_SIZE};
use crate::cpu::registers::DEFAULT_REGISTER_COUNT;

/// Largest register file an 8-bit index can reach.
pub const MAX_REGISTERS: usize = 256;

/// Sizes of the register file and memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuConfig {
    /// Number of general-purpose registers.
    pub registers: usize,
    /// Number of memory words.
    pub memory_size: usize,
}

impl CpuConfig {
    /// Parse a config from JSON text. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Read and parse a JSON config file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Check the sizes are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registers == 0 || self.registers > MAX_REGISTERS {
            return Err(ConfigError::InvalidRegisterCount(self.registers));
        }
        if self.memory_size == 0 || self.memory_size > ADDRESS_SPACE {
            return Err(ConfigError::InvalidMemorySize(self.memory_size));
        }
        Ok(())
    }
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            registers: DEFAULT_REGISTER_COUNT,
            memory_size: DEFAULT_MEMORY_SIZE,
        }
    }
}

/// Errors from loading or validating a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("register count {0} out of range (1-256)")]
    InvalidRegisterCount(usize),

    #[error("memory size {0} out of range (1-65536)")]
    InvalidMemorySize(usize),
}
