//! Cache key namespacing.

use crate::config::CacheConfig;

/// Builds the positive and negative store keys for a lookup key.
///
/// Construction is only valid when neither prefix extends the other
/// (checked by config validation), so the two namespaces never collide.
#[derive(Debug, Clone)]
pub struct CacheKeys {
    positive_prefix: String,
    negative_prefix: String,
}

impl CacheKeys {
    pub fn new(positive_prefix: impl Into<String>, negative_prefix: impl Into<String>) -> Self {
        Self {
            positive_prefix: positive_prefix.into(),
            negative_prefix: negative_prefix.into(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.positive_prefix.clone(), config.negative_prefix.clone())
    }

    /// Key holding image bytes.
    pub fn positive(&self, key: &str) -> String {
        format!("{}{}", self.positive_prefix, key)
    }

    /// Key holding the "confirmed absent" marker.
    pub fn negative(&self, key: &str) -> String {
        format!("{}{}", self.negative_prefix, key)
    }
}

impl Default for CacheKeys {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}
