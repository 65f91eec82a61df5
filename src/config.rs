//! Configuration for string table generation

use crate::key::{self, FRAGMENT_COUNT};
use serde::{Deserialize, Serialize};

/// Configuration for one obfuscation build
///
/// One `VeilConfig` describes one build unit: which identity the generated
/// artifacts carry, how the secret key is obtained, and how many fragment
/// holders the key is scattered across.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VeilConfig {
    /// Identity appended to the generated artifact names
    ///
    /// Sanitized to letters, digits, and underscores before use so that
    /// multiple build units sharing one output directory cannot collide.
    /// If empty after sanitization, the base name is used alone.
    #[serde(default)]
    pub artifact_name: Option<String>,

    /// Deterministic key seed for reproducible builds
    ///
    /// If not provided, a fresh random key is generated per build (default).
    /// WARNING: seeding trades the per-build key uniqueness guarantee for
    /// build reproducibility; only opt in when caching demands it.
    #[serde(default)]
    pub seed: Option<String>,

    /// Number of fragment holders the key is scattered across (1..=8)
    #[serde(default = "default_fragment_count")]
    pub fragment_count: usize,
}

fn default_fragment_count() -> usize {
    FRAGMENT_COUNT
}

impl Default for VeilConfig {
    fn default() -> Self {
        Self {
            artifact_name: None,
            seed: None,
            fragment_count: default_fragment_count(),
        }
    }
}

impl VeilConfig {
    /// Create new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the artifact identity
    pub fn artifact_name(mut self, name: impl Into<String>) -> Self {
        self.artifact_name = Some(name.into());
        self
    }

    /// Use a deterministic key derived from the given seed
    pub fn seed(mut self, seed: impl Into<String>) -> Self {
        self.seed = Some(seed.into());
        self
    }

    /// Set the fragment holder count
    pub fn fragment_count(mut self, count: usize) -> Self {
        self.fragment_count = count;
        self
    }

    /// Resolve the secret key for this build
    ///
    /// Seeded configs derive the key one-way from the seed; unseeded configs
    /// get a fresh random key every build.
    pub fn resolve_key(&self) -> [u8; key::KEY_SIZE] {
        match &self.seed {
            Some(seed) => key::derive_key(seed),
            None => key::random_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VeilConfig::default();
        assert!(config.artifact_name.is_none());
        assert!(config.seed.is_none());
        assert_eq!(config.fragment_count, 8);
    }

    #[test]
    fn test_builder() {
        let config = VeilConfig::new()
            .artifact_name("my-app")
            .seed("ci-build-42")
            .fragment_count(4);
        assert_eq!(config.artifact_name.as_deref(), Some("my-app"));
        assert_eq!(config.seed.as_deref(), Some("ci-build-42"));
        assert_eq!(config.fragment_count, 4);
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = VeilConfig::new().artifact_name("app").seed("seed");
        let json = serde_json::to_string(&config).unwrap();
        let back: VeilConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.artifact_name.as_deref(), Some("app"));
        assert_eq!(back.seed.as_deref(), Some("seed"));
        assert_eq!(back.fragment_count, 8);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: VeilConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.fragment_count, 8);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_seeded_key_is_deterministic() {
        let a = VeilConfig::new().seed("same").resolve_key();
        let b = VeilConfig::new().seed("same").resolve_key();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseeded_keys_differ() {
        let a = VeilConfig::new().resolve_key();
        let b = VeilConfig::new().resolve_key();
        assert_ne!(a, b);
    }
}
