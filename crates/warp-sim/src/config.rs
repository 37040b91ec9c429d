//! Simulation settings
//!
//! Loaded with layered precedence (highest wins):
//! 1. Command-line flags (applied by the caller)
//! 2. Environment variables: `WARP_SEED`, `WARP_FACTOR`
//! 3. Config file
//! 4. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::Path;
use warp_core::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarpSettings {
    /// Dilation reached while the warp is engaged
    pub factor: f32,
    /// Real seconds to blend in and out of the warp
    pub ramp_time: f32,
}

impl Default for WarpSettings {
    fn default() -> Self {
        Self {
            factor: 0.25,
            ramp_time: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    /// Pool size for emitters that do not set `max_particles`
    pub default_max: usize,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self { default_max: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Longest real frame accepted before clamping, in seconds
    pub max_frame_time: f64,
    /// Particle RNG seed
    pub seed: u32,
    pub warp: WarpSettings,
    pub particles: ParticleSettings,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_frame_time: 0.25,
            seed: 0xDEAD_BEEF,
            warp: WarpSettings::default(),
            particles: ParticleSettings::default(),
        }
    }
}

impl SimConfig {
    /// Load a config file, then apply environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("WARP_SEED") {
            match raw.trim().parse::<u32>() {
                Ok(seed) => self.seed = seed,
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring invalid WARP_SEED"),
            }
        }
        if let Some(raw) = lookup("WARP_FACTOR") {
            match raw.trim().parse::<f32>() {
                Ok(f) if f.is_finite() && f > 0.0 => self.warp.factor = f,
                Ok(f) => tracing::warn!(value = f, "ignoring non-positive WARP_FACTOR"),
                Err(e) => tracing::warn!(value = %raw, error = %e, "ignoring invalid WARP_FACTOR"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_empty_file_is_all_defaults() {
        let config = SimConfig::from_toml_str("").unwrap();
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = SimConfig::from_toml_str(
            r#"
seed = 7

[warp]
factor = 0.1
"#,
        )
        .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.warp.factor, 0.1);
        assert_eq!(config.warp.ramp_time, 0.5);
        assert_eq!(config.particles.default_max, 256);
        assert_eq!(config.max_frame_time, 0.25);
    }

    #[test]
    fn test_bad_type_is_parse_error() {
        let err = SimConfig::from_toml_str("seed = \"many\"").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let mut config = SimConfig::from_toml_str("seed = 1\n[warp]\nfactor = 0.5").unwrap();
        let env: HashMap<&str, &str> = [("WARP_SEED", "99"), ("WARP_FACTOR", "0.2")].into();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.seed, 99);
        assert_eq!(config.warp.factor, 0.2);
    }

    #[test]
    fn test_invalid_overrides_are_ignored() {
        let mut config = SimConfig::default();
        let env: HashMap<&str, &str> = [("WARP_SEED", "-3"), ("WARP_FACTOR", "0")].into();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = SimConfig {
            seed: 42,
            ..SimConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(SimConfig::from_toml_str(&text).unwrap(), config);
    }
}
