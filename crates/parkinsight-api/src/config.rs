//! YAML configuration loading for the API server.
//!
//! Loads [`ServiceConfig`] from a YAML file on disk, falling back to defaults
//! when no file is specified, then applies environment overrides.

use parkinsight_core::ServiceConfig;
use std::path::{Path, PathBuf};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "PARKINSIGHT_CONFIG";

/// Environment variable overriding `auth.api_key`.
pub const API_KEY_ENV: &str = "PARKINSIGHT_API_KEY";

/// Load a [`ServiceConfig`] from a YAML file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the YAML is invalid.
pub fn load_config(path: &Path) -> anyhow::Result<ServiceConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e))?;
    let config: ServiceConfig = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {}", e))?;
    Ok(config)
}

/// Resolve the configuration the server starts with.
///
/// Checks (in order):
/// 1. `cli_path` (the first CLI argument)
/// 2. `PARKINSIGHT_CONFIG` environment variable
/// 3. Default configuration
///
/// `PARKINSIGHT_API_KEY`, when set and non-empty, replaces `auth.api_key`.
/// The result is validated before it is returned.
///
/// # Errors
///
/// Returns an error if the file cannot be loaded or validation fails.
pub fn resolve_config(cli_path: Option<String>) -> anyhow::Result<ServiceConfig> {
    let config_path: Option<PathBuf> = cli_path
        .or_else(|| std::env::var(CONFIG_ENV).ok())
        .map(PathBuf::from);

    let mut config = match config_path {
        Some(path) => load_config(&path)?,
        None => ServiceConfig::default(),
    };

    if let Some(key) = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()) {
        config.auth.api_key = Some(key);
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Helper to write YAML to a temp file and return the path.
    fn write_yaml(yaml: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(yaml.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_load_config_minimal() {
        let yaml = r#"
listen_addr: "127.0.0.1:9090"
model_dir: "/srv/models"
auth:
  api_key: "secret"
fusion:
  voice_weight: 0.5
models:
  - name: random_forest
    file: rf.json
"#;
        let f = write_yaml(yaml);
        let config = load_config(f.path()).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9090");
        assert_eq!(config.model_dir, "/srv/models");
        assert_eq!(config.auth.api_key.as_deref(), Some("secret"));
        assert!(config.auth.enabled);
        assert_eq!(config.fusion.voice_weight, 0.5);
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.scaler_file, "scaler.json");
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_config(Path::new("/nonexistent/parkinsight.yaml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/parkinsight.yaml"));
    }

    #[test]
    fn test_models_must_be_a_list() {
        let f = write_yaml("models: random_forest.json\n");
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn test_resolve_config_rejects_invalid_file() {
        let f = write_yaml("auth:\n  enabled: false\nfusion:\n  voice_weight: 1.5\n");
        let err = resolve_config(Some(f.path().display().to_string())).unwrap_err();
        assert!(err.to_string().contains("voice_weight"));
    }

    #[test]
    fn test_resolve_config_from_cli_path() {
        let f = write_yaml("auth:\n  enabled: false\nlisten_addr: \"127.0.0.1:0\"\n");
        let config = resolve_config(Some(f.path().display().to_string())).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:0");
        assert!(!config.auth.enabled);
    }
}
