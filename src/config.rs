//! Application configuration.
//!
//! The configuration is loaded from a JSON file.  The top-level schema uses
//! an `"apply"` key so the file can be extended with additional sections
//! later without breaking backward compatibility.
//!
//! # Example
//!
//! ```json
//! {
//!   "apply": {
//!     "max_attempts": 3,
//!     "settle_delay_ms": 300,
//!     "fallback_enabled": true,
//!     "fallback_width": 1024,
//!     "fallback_height": 768
//!   }
//! }
//! ```

use crate::applicator::ApplyPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration.
///
/// Every field is optional; a minimal `{}` file is valid and all sections
/// fall back to their compiled-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Retry, settle and fallback settings for layout changes.
    #[serde(default)]
    pub apply: ApplyConfig,
}

/// Retry, settle and fallback settings.
///
/// The defaults work around drivers that only partially apply a
/// multi-monitor change per commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Attempts per application cycle.
    pub max_attempts: u32,
    /// Wait after each commit before the result is checked (ms).
    pub settle_delay_ms: u64,
    /// Detour through "all screens" when "main + above" fails.
    pub fallback_enabled: bool,
    /// Resolution used to re-enable a display whose baseline mode has no
    /// size.
    pub fallback_width: u32,
    pub fallback_height: u32,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        let policy = ApplyPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            settle_delay_ms: policy.settle_delay.as_millis() as u64,
            fallback_enabled: policy.fallback_enabled,
            fallback_width: policy.fallback_width,
            fallback_height: policy.fallback_height,
        }
    }
}

impl ApplyConfig {
    /// The [`ApplyPolicy`] described by this section.
    pub fn policy(&self) -> ApplyPolicy {
        ApplyPolicy {
            max_attempts: self.max_attempts.max(1),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            fallback_enabled: self.fallback_enabled,
            fallback_width: self.fallback_width,
            fallback_height: self.fallback_height,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);
