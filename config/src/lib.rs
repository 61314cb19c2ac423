//! Shieldpool Configuration
//!
//! Shared configuration crate for the Shieldpool tools.
//!
//! Handles loading configuration from:
//! 1. SP_CONFIG env var (explicit path)
//! 2. ./shieldpool.toml (current directory)
//! 3. ~/.shieldpool/shieldpool.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use shieldpool_privacy::field::field_from_decimal;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

/// Global config instance for convenience access
pub static GLOBAL_CONFIG: OnceLock<ShieldpoolConfig> = OnceLock::new();

const CONFIG_FILE_NAME: &str = "shieldpool.toml";
const CONFIG_DIR_NAME: &str = ".shieldpool";

// ============================================================================
// Default Constants
// ============================================================================

/// Default tree depth (2^19 triads)
pub const DEFAULT_TREE_DEPTH: usize = 20;

pub use shieldpool_privacy::MAX_TREE_DEPTH;

/// Default empty-leaf value (keccak256("tornado") mod P, as used by circom pools)
pub const DEFAULT_ZERO_VALUE: &str =
    "21663839004416932945382355908790599225266501822907911457504978515578255421292";

const DEFAULT_TREE_PATH: &str = "./shieldpool-tree.json";

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldpoolConfig {
    #[serde(default)]
    pub tree: TreeConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub keys: KeysConfig,
}

/// Commitment tree parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    #[serde(default = "default_tree_depth")]
    pub depth: usize,
    /// Decimal field element used for empty leaves
    #[serde(default = "default_zero_value")]
    pub zero_value: String,
    /// Save snapshots in the compact (base64) form
    #[serde(default)]
    pub compressed: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_TREE_DEPTH,
            zero_value: DEFAULT_ZERO_VALUE.into(),
            compressed: false,
        }
    }
}

fn default_tree_depth() -> usize {
    DEFAULT_TREE_DEPTH
}

fn default_zero_value() -> String {
    DEFAULT_ZERO_VALUE.into()
}

/// Where the tree snapshot lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_tree_path")]
    pub tree_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            tree_path: DEFAULT_TREE_PATH.into(),
        }
    }
}

fn default_tree_path() -> String {
    DEFAULT_TREE_PATH.into()
}

/// Key generation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Random scalars must have at least this many bits (0 = any non-zero scalar)
    #[serde(default)]
    pub min_scalar_bits: u32,
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Set field from env var if present
fn env_string(key: &str, field: &mut String) {
    if let Ok(v) = env::var(key) {
        *field = v;
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(v) = env::var(key) {
        if let Ok(parsed) = v.parse() {
            *field = parsed;
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ShieldpoolConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SP_CONFIG env var
        if let Ok(path) = env::var("SP_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check ./shieldpool.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shieldpool/shieldpool.toml
        dirs::home_dir()
            .map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
            .filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Tree
        env_parse("SP_TREE_DEPTH", &mut self.tree.depth);
        env_string("SP_TREE_ZERO_VALUE", &mut self.tree.zero_value);
        if let Some(v) = env_bool("SP_TREE_COMPRESSED") {
            self.tree.compressed = v;
        }

        // Storage
        env_string("SP_TREE_PATH", &mut self.storage.tree_path);

        // Keys
        env_parse("SP_MIN_SCALAR_BITS", &mut self.keys.min_scalar_bits);
    }

    /// Reject values the library would refuse later anyway
    pub fn validate(&self) -> Result<()> {
        if self.tree.depth == 0 || self.tree.depth > MAX_TREE_DEPTH {
            bail!(
                "tree.depth must be in 1..={MAX_TREE_DEPTH}, got {}",
                self.tree.depth
            );
        }
        if let Err(e) = field_from_decimal(&self.tree.zero_value) {
            bail!("tree.zero_value must be a decimal field element: {e}");
        }
        if self.keys.min_scalar_bits > 251 {
            bail!(
                "keys.min_scalar_bits must be at most 251, got {}",
                self.keys.min_scalar_bits
            );
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.tree.compressed = true;
        toml::to_string_pretty(&sample).unwrap_or_default()
    }

    /// Get the global config instance, initializing it if necessary.
    ///
    /// Falls back to defaults if loading fails.
    pub fn global() -> &'static ShieldpoolConfig {
        GLOBAL_CONFIG.get_or_init(|| {
            Self::load().unwrap_or_else(|e| {
                log::warn!("Failed to load config: {}, using defaults", e);
                Self::default()
            })
        })
    }

    /// Try to get the global config instance.
    ///
    /// Returns `None` if config hasn't been initialized yet.
    pub fn try_global() -> Option<&'static ShieldpoolConfig> {
        GLOBAL_CONFIG.get()
    }

    /// Initialize the global config with a specific instance.
    ///
    /// Returns `Err(config)` if already initialized.
    pub fn set_global(config: ShieldpoolConfig) -> Result<(), ShieldpoolConfig> {
        GLOBAL_CONFIG.set(config)
    }
}

/// Shorthand for `ShieldpoolConfig::global()`.
#[inline]
pub fn global_config() -> &'static ShieldpoolConfig {
    ShieldpoolConfig::global()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ShieldpoolConfig::default();
        assert_eq!(config.tree.depth, DEFAULT_TREE_DEPTH);
        assert_eq!(config.tree.zero_value, DEFAULT_ZERO_VALUE);
        assert_eq!(config.storage.tree_path, DEFAULT_TREE_PATH);
        assert!(!config.tree.compressed);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_generate_sample() {
        let sample = ShieldpoolConfig::generate_sample();
        assert!(sample.contains("[tree]"));
        assert!(sample.contains("[storage]"));
        assert!(sample.contains("[keys]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ShieldpoolConfig::generate_sample();
        let parsed: ShieldpoolConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.tree.depth, DEFAULT_TREE_DEPTH);
        assert!(parsed.tree.compressed);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: ShieldpoolConfig = toml::from_str("[tree]\ndepth = 8\n").unwrap();
        assert_eq!(parsed.tree.depth, 8);
        assert_eq!(parsed.tree.zero_value, DEFAULT_ZERO_VALUE);
        assert_eq!(parsed.storage, StorageConfig::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ShieldpoolConfig::default();
        config.tree.depth = 0;
        assert!(config.validate().is_err());

        let mut config = ShieldpoolConfig::default();
        config.tree.depth = MAX_TREE_DEPTH + 1;
        assert!(config.validate().is_err());

        let mut config = ShieldpoolConfig::default();
        config.tree.zero_value = "0x12".into();
        assert!(config.validate().is_err());

        // The BN254 scalar field modulus itself is out of range
        let mut config = ShieldpoolConfig::default();
        config.tree.zero_value =
            "21888242871839275222246405745257275088548364400416034343698204186575808495617".into();
        assert!(config.validate().is_err());

        let mut config = ShieldpoolConfig::default();
        config.keys.min_scalar_bits = 252;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_depth_bound_matches_library() {
        let mut config = ShieldpoolConfig::default();
        config.tree.depth = MAX_TREE_DEPTH;
        config.validate().unwrap();

        let hasher = shieldpool_privacy::CircomPoseidon::new();
        assert!(
            shieldpool_privacy::TriadMerkleTree::new(
                MAX_TREE_DEPTH + 1,
                shieldpool_privacy::FieldElement::from(0u64),
                hasher
            )
            .is_err()
        );
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[tree]\ndepth = 12\nzero_value = \"0\"\n").unwrap();

        let config = ShieldpoolConfig::load_from(&path).unwrap();
        if env::var("SP_TREE_DEPTH").is_err() {
            assert_eq!(config.tree.depth, 12);
        }

        let bad = dir.path().join("bad.toml");
        fs::write(&bad, "[tree]\ndepth = \"deep\"\n").unwrap();
        assert!(ShieldpoolConfig::load_from(&bad).is_err());
    }
}
