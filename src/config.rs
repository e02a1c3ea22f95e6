//! Cache configuration

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Cache configuration
///
/// Capacity is the only knob: the cache is bounded by entry count, not by
/// memory size or entry age.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of live entries
    ///
    /// Must be at least 1. A capacity-1 cache evicts its sole entry on
    /// every new key.
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl CacheConfig {
    /// Create config with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Validate the configuration
    ///
    /// Rejects a capacity below 1 as a configuration error.
    pub fn validate(&self) -> Result<()> {
        if self.capacity < 1 {
            return Err(Error::Config(format!(
                "cache capacity must be at least 1, got {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

// Default value functions
fn default_capacity() -> usize {
    100
}
