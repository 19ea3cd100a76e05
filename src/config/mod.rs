use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration for the planner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directories to always exclude from registry walks (by basename)
    #[serde(default)]
    pub exclude_dirs: Vec<String>,

    /// Default walk depth
    #[serde(default)]
    pub default_depth: Option<usize>,

    /// Days without a lifecycle update before an application counts as stale
    #[serde(default = "default_stale_days")]
    pub stale_days: i64,

    /// Named registry profiles
    #[serde(default)]
    pub registry_profiles: BTreeMap<String, RegistryProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude_dirs: vec![
                String::from(".git"),
                String::from(".github"),
                String::from("node_modules"),
            ],
            default_depth: None,
            stale_days: default_stale_days(),
            registry_profiles: BTreeMap::new(),
        }
    }
}

fn default_stale_days() -> i64 {
    90
}

/// A named registry checkout with its own walk defaults
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryProfile {
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub depth: Option<usize>,
    #[serde(default)]
    pub stale_days: Option<i64>,
    #[serde(default)]
    pub gitignore: Option<bool>,
}

impl Config {
    /// Load config from file, or create default if not exists
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("datacap-planner").join("config.toml")
        } else {
            PathBuf::from(".datacap-planner.toml")
        }
    }

    /// Create config directory if it doesn't exist
    pub fn ensure_config_dir() -> Result<PathBuf> {
        let config_path = Self::default_path();

        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_save_load() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");

        let config = Config {
            exclude_dirs: vec![String::from("archive")],
            ..Default::default()
        };

        config.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        assert_eq!(loaded.exclude_dirs, vec!["archive"]);
        assert_eq!(loaded.stale_days, 90);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.exclude_dirs.contains(&String::from(".git")));
        assert_eq!(config.stale_days, 90);
    }

    #[test]
    fn test_profile_roundtrip() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");

        let mut config = Config::default();
        config.registry_profiles.insert(
            String::from("main"),
            RegistryProfile {
                paths: vec![PathBuf::from("/registries/allocator-a")],
                depth: Some(3),
                stale_days: Some(30),
                gitignore: Some(true),
            },
        );
        config.save(&config_path).unwrap();

        let loaded = Config::load(&config_path).unwrap();
        let profile = loaded.registry_profiles.get("main").unwrap();
        assert_eq!(profile.depth, Some(3));
        assert_eq!(profile.stale_days, Some(30));
    }
}
