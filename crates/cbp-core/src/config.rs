use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::CbpError;
use crate::pooling::{Normalization, Pooling};

/// Largest seed that fits a TOML integer (signed 64-bit).
pub const MAX_SEED: u64 = i64::MAX as u64;

/// Construction options of a compact bilinear pooling layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CbpOptions {
    /// Seed for the hash mappings, at most [`MAX_SEED`]. `None` draws one
    /// from OS entropy at construction; the effective seed is kept on the layer.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Spatial aggregation of the per-location result
    #[serde(default)]
    pub pooling: Pooling,
    /// Post-processing of the final descriptor
    #[serde(default)]
    pub normalization: Normalization,
}

impl Default for CbpOptions {
    fn default() -> Self {
        Self {
            seed: None,
            pooling: Pooling::Sum,
            normalization: Normalization::None,
        }
    }
}

impl CbpOptions {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }
}

/// Full description of a layer: dimensions plus options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CbpConfig {
    /// Channels of the first input (C1)
    pub input_dim1: usize,
    /// Channels of the second input (C2)
    pub input_dim2: usize,
    /// Sketch dimension D
    pub output_dim: usize,
    #[serde(default)]
    pub options: CbpOptions,
}

impl Default for CbpConfig {
    fn default() -> Self {
        Self {
            input_dim1: 512,
            input_dim2: 512,
            output_dim: 8000,
            options: CbpOptions::default(),
        }
    }
}

impl CbpConfig {
    pub fn new(input_dim1: usize, input_dim2: usize, output_dim: usize) -> Self {
        Self {
            input_dim1,
            input_dim2,
            output_dim,
            options: CbpOptions::default(),
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, CbpError> {
        let config: CbpConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CbpError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration with environment variable overrides
    /// Environment variables are prefixed with CBP_
    /// Example: CBP_OUTPUT_DIM=4096
    pub fn from_file_with_env<P: AsRef<Path>>(path: P) -> Result<Self, CbpError> {
        let mut config = Self::from_file(path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<(), CbpError> {
        use std::env;

        if let Ok(val) = env::var("CBP_OUTPUT_DIM") {
            self.output_dim = val
                .trim()
                .parse()
                .map_err(|e| CbpError::config_with_source("Invalid CBP_OUTPUT_DIM", e))?;
        }
        if let Ok(val) = env::var("CBP_SEED") {
            self.options.seed = Some(
                val.trim()
                    .parse()
                    .map_err(|e| CbpError::config_with_source("Invalid CBP_SEED", e))?,
            );
        }
        if let Ok(val) = env::var("CBP_POOLING") {
            self.options.pooling = val.parse()?;
        }
        if let Ok(val) = env::var("CBP_NORMALIZATION") {
            self.options.normalization = val.parse()?;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), CbpError> {
        if self.output_dim == 0 {
            return Err(CbpError::config("output_dim must be positive"));
        }
        if self.input_dim1 == 0 {
            return Err(CbpError::config("input_dim1 must be positive"));
        }
        if self.input_dim2 == 0 {
            return Err(CbpError::config("input_dim2 must be positive"));
        }
        if let Some(seed) = self.options.seed {
            if seed > MAX_SEED {
                return Err(CbpError::config(format!(
                    "seed {} exceeds the maximum of {}",
                    seed, MAX_SEED
                )));
            }
        }
        Ok(())
    }

    /// Serialize configuration to TOML string
    pub fn to_toml_string(&self) -> Result<String, CbpError> {
        toml::to_string_pretty(self)
            .map_err(|e| CbpError::config_with_source("TOML serialization error", e))
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CbpError> {
        let content = self.to_toml_string()?;
        fs::write(path, content)?;
        Ok(())
    }
}
