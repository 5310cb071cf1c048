//! Config and data file locations.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Directory name under the platform config/data roots
const APP_DIR: &str = "slidecache";

/// Environment override for the config directory
pub const CONFIG_DIR_ENV: &str = "SLIDECACHE_CONFIG_DIR";

/// Files whose presence in the working directory makes it the config dir
const LOCAL_MARKERS: &[&str] = &["slidecache.json", "slidecache.log"];

/// Configuration for overriding default application paths
#[derive(Debug, Clone, Default)]
pub struct PathConfig {
    /// Custom config directory (from CLI or ENV)
    pub config_dir: Option<PathBuf>,
}

impl PathConfig {
    /// Priority: CLI args → ENV var (SLIDECACHE_CONFIG_DIR) → None (use defaults)
    pub fn from_env_and_cli(cli_dir: Option<PathBuf>) -> Self {
        let config_dir = cli_dir.or_else(|| std::env::var_os(CONFIG_DIR_ENV).map(PathBuf::from));
        Self { config_dir }
    }
}

/// Get path to a configuration file
///
/// Priority:
/// 1. CLI --config-dir argument
/// 2. SLIDECACHE_CONFIG_DIR environment variable
/// 3. Current directory IF slidecache.json or slidecache.log exists there
/// 4. Platform config directory from dirs-next (e.g. ~/.config/slidecache)
pub fn config_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::config_dir()).join(name)
}

/// Get path to a data file (logs). Same priority as `config_file`, but
/// falls back to the platform data directory (e.g. ~/.local/share/slidecache).
pub fn data_file(name: &str, config: &PathConfig) -> PathBuf {
    resolve_dir(config, dirs_next::data_dir()).join(name)
}

/// Create the parent directory of `file` if missing
pub fn ensure_parent(file: &Path) -> Result<()> {
    if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    }
    Ok(())
}

fn has_local_config_files(dir: &Path) -> bool {
    LOCAL_MARKERS.iter().any(|f| dir.join(f).exists())
}

fn resolve_dir(config: &PathConfig, platform_root: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = &config.config_dir {
        return dir.clone();
    }

    if let Ok(current_dir) = std::env::current_dir()
        && has_local_config_files(&current_dir)
    {
        return current_dir;
    }

    platform_root
        .map(|root| root.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_custom_dir_wins() {
        let config = PathConfig {
            config_dir: Some(PathBuf::from("/custom")),
        };

        assert_eq!(config_file("a.json", &config), PathBuf::from("/custom/a.json"));
        assert_eq!(data_file("a.log", &config), PathBuf::from("/custom/a.log"));
    }

    #[test]
    fn test_cli_beats_env() {
        let config = PathConfig::from_env_and_cli(Some(PathBuf::from("/from/cli")));
        assert_eq!(config.config_dir, Some(PathBuf::from("/from/cli")));
    }

    #[test]
    fn test_platform_fallback_names_app_dir() {
        let dir = resolve_dir(&PathConfig::default(), Some(PathBuf::from("/platform")));
        // Either the working directory has markers or the platform root is used
        if !has_local_config_files(&std::env::current_dir().unwrap()) {
            assert_eq!(dir, PathBuf::from("/platform/slidecache"));
        }
    }

    #[test]
    fn test_local_markers() {
        let tmp = TempDir::new().unwrap();
        assert!(!has_local_config_files(tmp.path()));
        std::fs::write(tmp.path().join("slidecache.json"), "{}").unwrap();
        assert!(has_local_config_files(tmp.path()));
    }

    #[test]
    fn test_ensure_parent_creates_dirs() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("a/b/c.json");
        ensure_parent(&file).unwrap();
        assert!(tmp.path().join("a/b").is_dir());
    }
}
