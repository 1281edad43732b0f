//! Synthesizer configuration: the fixed parameter set and its bounds.
//!
//! Loaded once at session setup from a TOML file. The parameter count fixes
//! the frame layout for the whole session, so a replacement configuration
//! must keep it unchanged.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

fn default_smoothing_window() -> usize {
    8
}

/// One vocal-tract control parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(default)]
    pub label: String,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

/// Vocal-tract and voice configuration for one synthesis session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Synthesis output rate in Hz. The device rate wins at run time; this
    /// is what the parameter trajectories were generated for.
    pub output_rate: f32,
    /// Parameter frames per second produced by the control side.
    pub control_rate: f32,
    /// Moving-average window length for per-parameter smoothing.
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    pub parameters: Vec<ParameterSpec>,
}

impl SynthConfig {
    /// Parse and validate a configuration from TOML text.
    ///
    /// Defaults outside `[min, max]` are clamped to the bounds, matching the
    /// load behavior of the original configuration files.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: SynthConfig =
            toml::from_str(text).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        for p in &mut config.parameters {
            p.default = p.default.clamp(p.min, p.max);
        }
        Ok(config)
    }

    /// Load and validate a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check the invariants a session start relies on.
    pub fn validate(&self) -> Result<()> {
        if self.parameters.is_empty() {
            return Err(Error::InvalidConfig("no parameters defined".into()));
        }
        if !(self.output_rate.is_finite() && self.output_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "output_rate must be positive, got {}",
                self.output_rate
            )));
        }
        if !(self.control_rate.is_finite() && self.control_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "control_rate must be positive, got {}",
                self.control_rate
            )));
        }
        if self.smoothing_window == 0 {
            return Err(Error::InvalidConfig("smoothing_window must be >= 1".into()));
        }
        for p in &self.parameters {
            if !(p.min.is_finite() && p.max.is_finite() && p.default.is_finite()) {
                return Err(Error::InvalidConfig(format!(
                    "parameter {}: bounds must be finite",
                    p.name
                )));
            }
            if p.min >= p.max {
                return Err(Error::InvalidConfig(format!(
                    "parameter {}: the minimum value must be less than the maximum value",
                    p.name
                )));
            }
        }
        Ok(())
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    /// Initial parameter frame, one default per parameter.
    pub fn default_frame(&self) -> Vec<f32> {
        self.parameters.iter().map(|p| p.default).collect()
    }

    /// Clamp a frame to the declared per-parameter bounds.
    pub fn clamp_frame(&self, frame: &mut [f32]) {
        for (value, p) in frame.iter_mut().zip(&self.parameters) {
            *value = value.clamp(p.min, p.max);
        }
    }

    /// Check that `replacement` can take over from this configuration while
    /// the surrounding machinery stays sized for it.
    ///
    /// The running filter bank and frame layout are sized by the parameter
    /// count, so a reload must keep it.
    pub fn check_reload(&self, replacement: &SynthConfig) -> Result<()> {
        replacement.validate()?;
        if replacement.parameter_count() != self.parameter_count() {
            return Err(Error::InvalidConfig(format!(
                "the number of parameters is different: {} -> {}",
                self.parameter_count(),
                replacement.parameter_count()
            )));
        }
        Ok(())
    }
}
