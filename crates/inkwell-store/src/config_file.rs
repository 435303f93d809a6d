// ABOUTME: Loads and saves the inkwell YAML configuration file.
// ABOUTME: Saves are atomic: write to a temp file, fsync, then rename over the target.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use inkwell_core::{ConfigError, InkwellConfig};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigFileError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config error in {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

/// A YAML configuration document at a fixed path.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and validate the configuration. A missing file yields the defaults.
    pub fn load(&self) -> Result<InkwellConfig, ConfigFileError> {
        let yaml = match fs::read_to_string(&self.path) {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no config file, using defaults");
                return Ok(InkwellConfig::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let config = InkwellConfig::from_yaml_str(&yaml).map_err(|e| self.config_error(e))?;
        config.validate().map_err(|e| self.config_error(e))?;
        Ok(config)
    }

    /// Persist the configuration atomically.
    pub fn save(&self, config: &InkwellConfig) -> Result<(), ConfigFileError> {
        config.validate().map_err(|e| self.config_error(e))?;
        let yaml = config.to_yaml_string().map_err(|e| self.config_error(e))?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }

        let tmp_path = self.path.with_extension("yaml.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(|e| self.io_error(e))?;
            file.write_all(yaml.as_bytes())
                .map_err(|e| self.io_error(e))?;
            file.sync_all().map_err(|e| self.io_error(e))?;
        }
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))?;

        tracing::info!(path = %self.path.display(), "saved configuration");
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> ConfigFileError {
        ConfigFileError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn config_error(&self, source: ConfigError) -> ConfigFileError {
        ConfigFileError::Config {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inkwell_core::{AgentDescriptor, ProviderDescriptor, ProviderKind, Specialty};
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path().join("absent.yaml"));
        let config = store.load().unwrap();
        assert!(config.providers.is_empty());
        assert!(config.agents.is_empty());
    }

    #[test]
    fn save_then_load_preserves_agents_and_providers() {
        let dir = TempDir::new().unwrap();
        let store = FileConfigStore::new(dir.path().join("conf").join("inkwell.yaml"));

        let provider = ProviderDescriptor::new(ProviderKind::Ollama, "llama3.1");
        let mut agent = AgentDescriptor::new("ideas", Specialty::Theme, provider.key());
        agent.enabled = false;

        let mut config = InkwellConfig::default();
        config.default_provider = Some(provider.key());
        config.providers.push(provider);
        config.agents.push(agent);

        store.save(&config).unwrap();
        assert!(!store.path().with_extension("yaml.tmp").exists());

        let loaded = store.load().unwrap();
        assert_eq!(loaded.providers.len(), 1);
        assert_eq!(loaded.agents[0].id, "ideas");
        assert!(!loaded.agents[0].enabled);
    }

    #[test]
    fn invalid_yaml_reports_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(&path, "agents: [this is: not valid").unwrap();

        let err = FileConfigStore::new(&path).load().unwrap_err();
        assert!(matches!(err, ConfigFileError::Config { .. }));
        assert!(err.to_string().contains("bad.yaml"));
    }
}
