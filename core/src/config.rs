use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::repository::{Backend, FileBackend, SupabaseBackend};

const CONFIG_FILE_NAME: &str = "config.toml";
const SUPABASE_SESSION_FILE: &str = "supabase_session.json";

pub const ENV_DATA_DIR: &str = "TASKFLOW_DATA_DIR";
pub const ENV_SUPABASE_URL: &str = "TASKFLOW_SUPABASE_URL";
pub const ENV_SUPABASE_ANON_KEY: &str = "TASKFLOW_SUPABASE_ANON_KEY";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// JSON files on this machine.
    Local {
        #[serde(default)]
        data_dir: Option<PathBuf>,
    },
    /// Hosted auth + database.
    Supabase { url: String, anon_key: String },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local { data_dir: None }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    /// Where `config.toml` and local state live. Not read from the file.
    #[serde(skip)]
    pub home: Option<PathBuf>,
}

/// `~/.taskflow`
pub fn default_data_dir() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| Error::Config("Could not determine home directory".into()))?;
    Ok(home_dir.join(".taskflow"))
}

impl Config {
    /// Reads `<home>/config.toml` and applies environment overrides.
    /// A missing file yields the defaults.
    pub fn load(home: Option<PathBuf>) -> Result<Self> {
        let home = match home {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        let mut config = Self::from_file(&home.join(CONFIG_FILE_NAME))?;
        config.home = Some(home);
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&raw).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::Config(e.to_string()))
    }

    /// Environment wins over the file. Both supabase variables are needed to
    /// switch backends.
    pub fn apply_env<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let (Some(url), Some(anon_key)) = (get(ENV_SUPABASE_URL), get(ENV_SUPABASE_ANON_KEY)) {
            self.backend = BackendConfig::Supabase { url, anon_key };
        } else if let Some(dir) = get(ENV_DATA_DIR) {
            self.backend = BackendConfig::Local {
                data_dir: Some(PathBuf::from(dir)),
            };
        }
    }

    pub fn home_dir(&self) -> Result<PathBuf> {
        match &self.home {
            Some(dir) => Ok(dir.clone()),
            None => default_data_dir(),
        }
    }

    pub fn connect(&self) -> Result<Arc<dyn Backend>> {
        match &self.backend {
            BackendConfig::Local { data_dir } => {
                let dir = match data_dir {
                    Some(dir) => dir.clone(),
                    None => self.home_dir()?,
                };
                tracing::debug!(dir = %dir.display(), "using local backend");
                Ok(Arc::new(FileBackend::new(Some(dir))?))
            }
            BackendConfig::Supabase { url, anon_key } => {
                let home = self.home_dir()?;
                fs::create_dir_all(&home)?;
                tracing::debug!(url = %url, "using hosted backend");
                let backend = SupabaseBackend::new(url, anon_key.clone())?
                    .with_session_file(home.join(SUPABASE_SESSION_FILE))?;
                Ok(Arc::new(backend))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_parse_supabase() {
        let config = Config::parse(
            r#"
            [backend]
            kind = "supabase"
            url = "https://demo.supabase.co"
            anon_key = "public-anon"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.backend,
            BackendConfig::Supabase {
                url: "https://demo.supabase.co".into(),
                anon_key: "public-anon".into(),
            }
        );
    }

    #[test]
    fn test_empty_file_is_local_default() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend, BackendConfig::Local { data_dir: None });
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let err = Config::parse("[backend]\nkind = \"carrier-pigeon\"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SUPABASE_URL, "https://env.supabase.co"),
            (ENV_SUPABASE_ANON_KEY, "env-key"),
        ]
        .into_iter()
        .collect();
        let mut config = Config::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert!(matches!(config.backend, BackendConfig::Supabase { .. }));

        let mut config = Config::default();
        config.apply_env(|k| (k == ENV_DATA_DIR).then(|| "/tmp/tf".to_string()));
        assert_eq!(
            config.backend,
            BackendConfig::Local {
                data_dir: Some(PathBuf::from("/tmp/tf"))
            }
        );
    }

    #[test]
    fn test_load_missing_file_uses_home() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::from_file(&dir.path().join(CONFIG_FILE_NAME)).unwrap();
        assert_eq!(config, Config::default());
    }
}
