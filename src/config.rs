use std::{env, path::PathBuf};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultConfig {
    /// JSON tree to load; `None` means the bundled demo tree.
    pub tree_file: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub log_file: String,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            tree_file: None,
            log_dir: PathBuf::from("./log"),
            log_file: "vaulttree.log".into(),
        }
    }
}

impl VaultConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let tree_file = match lookup("VAULT_TREE_FILE") {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ConfigError::Invalid {
                    key: "VAULT_TREE_FILE",
                    reason: "path is empty".into(),
                })
            }
            Some(raw) => Some(PathBuf::from(raw.trim())),
            None => None,
        };

        let log_dir = lookup("VAULT_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let log_file = lookup("VAULT_LOG_FILE").unwrap_or(defaults.log_file);
        if log_file.is_empty() || log_file.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                key: "VAULT_LOG_FILE",
                reason: format!("expected a bare file name, got {log_file:?}"),
            });
        }

        Ok(Self {
            tree_file,
            log_dir,
            log_file,
        })
    }
}
