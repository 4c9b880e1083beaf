//! Configuration for ncmq.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (NCMQ_BACKEND)
//! 2. Config file (.ncmq/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches the current directory and parents for .ncmq/config.yaml
//! - Falls back to ~/.ncmq/config.yaml
//! - Relative backend paths resolve against the config file's directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const DEFAULT_SIMULATE_DELAY_MS: u64 = 400;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub convert: ConvertConfig,
    #[serde(default)]
    pub simulate: SimulateConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    /// Path to the backend binary (relative to the config file's directory)
    pub binary: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertConfig {
    /// File extensions admitted into the queue
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulateConfig {
    /// Per-item conversion delay in milliseconds
    pub delay_ms: Option<u64>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Backend binary, if one is configured
    pub backend_binary: Option<PathBuf>,

    /// Extensions admitted by discovery (no leading dot)
    pub extensions: Vec<String>,

    /// Simulated conversion latency
    pub simulate_delay: Duration,

    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            backend_binary: None,
            extensions: vec!["ncm".to_string()],
            simulate_delay: Duration::from_millis(DEFAULT_SIMULATE_DELAY_MS),
            config_file: None,
        }
    }
}

/// Find config file by searching current directory and parents,
/// then the home directory
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".ncmq").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    let home_config = dirs::home_dir()?.join(".ncmq").join("config.yaml");
    home_config.exists().then_some(home_config)
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let mut resolved = ResolvedConfig::default();

    if let Some(config_path) = find_config_file() {
        let config = load_config_file(&config_path)?;
        let base_dir = config_path.parent().unwrap_or(Path::new("."));

        if let Some(binary) = &config.backend.binary {
            resolved.backend_binary = Some(resolve_path(base_dir, binary));
        }
        if let Some(extensions) = config.convert.extensions {
            resolved.extensions = extensions;
        }
        if let Some(delay_ms) = config.simulate.delay_ms {
            resolved.simulate_delay = Duration::from_millis(delay_ms);
        }
        resolved.config_file = Some(config_path);
    }

    // Environment wins over the file
    if let Ok(env_backend) = std::env::var("NCMQ_BACKEND") {
        if !env_backend.is_empty() {
            resolved.backend_binary = Some(PathBuf::from(env_backend));
        }
    }

    Ok(resolved)
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = ResolvedConfig::default();

        assert!(config.backend_binary.is_none());
        assert_eq!(config.extensions, vec!["ncm".to_string()]);
        assert_eq!(config.simulate_delay, Duration::from_millis(400));
    }

    #[test]
    fn test_config_file_parsing() {
        let temp = TempDir::new().unwrap();
        let ncmq_dir = temp.path().join(".ncmq");
        std::fs::create_dir_all(&ncmq_dir).unwrap();

        let config_path = ncmq_dir.join("config.yaml");
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
backend:
  binary: ./ncm-backend
convert:
  extensions: [ncm, qmc]
simulate:
  delay_ms: 50
"#
        )
        .unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert_eq!(config.backend.binary, Some("./ncm-backend".to_string()));
        assert_eq!(
            config.convert.extensions,
            Some(vec!["ncm".to_string(), "qmc".to_string()])
        );
        assert_eq!(config.simulate.delay_ms, Some(50));
    }

    #[test]
    fn test_empty_config_file_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.yaml");
        std::fs::write(&config_path, "backend: {}\n").unwrap();

        let config = load_config_file(&config_path).unwrap();
        assert!(config.backend.binary.is_none());
        assert!(config.convert.extensions.is_none());
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project/.ncmq");

        assert_eq!(
            resolve_path(&base, "./ncm-backend"),
            PathBuf::from("/home/user/project/.ncmq/./ncm-backend")
        );
        assert_eq!(
            resolve_path(&base, "/usr/local/bin/ncm-backend"),
            PathBuf::from("/usr/local/bin/ncm-backend")
        );
    }
}
