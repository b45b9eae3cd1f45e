//! Assignment settings
//!
//! Every field has a default, so an empty TOML document is a valid config:
//!
//! ```toml
//! tolerance = 1e-6
//! max_iterations = 100
//! target_relative_gap = 1e-5
//! max_equilibration_passes = 10000
//! ```

use std::path::Path;

use ef_common::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::bush::DEFAULT_PASS_LIMIT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssignmentConfig {
    /// Destination cost gap accepted by `Bush::fix`
    pub tolerance: f64,
    /// Outer sweeps over all bushes
    pub max_iterations: usize,
    /// Stop once the relative gap falls to this value
    pub target_relative_gap: f64,
    /// Cap on rebuild/scan rounds and reversal batches inside one `fix`
    pub max_equilibration_passes: usize,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 100,
            target_relative_gap: 1e-5,
            max_equilibration_passes: DEFAULT_PASS_LIMIT,
        }
    }
}

impl AssignmentConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(Error::Config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        if !self.target_relative_gap.is_finite() || self.target_relative_gap < 0.0 {
            return Err(Error::Config(format!(
                "target_relative_gap must be a non-negative number, got {}",
                self.target_relative_gap
            )));
        }
        if self.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".into()));
        }
        if self.max_equilibration_passes == 0 {
            return Err(Error::Config(
                "max_equilibration_passes must be at least 1".into(),
            ));
        }
        Ok(())
    }
}
