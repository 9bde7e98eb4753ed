//! pool.toml configuration parser.
//!
//! Every field is optional in the file; missing values fall back to
//! [`PoolConfig::default`]. A loaded config is validated before use and is
//! immutable for the lifetime of the pool.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::types::{LoginCredentials, NodeTemplate};

/// Errors raised while loading or validating a pool configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid pool config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PoolConfig {
    /// Nodes provisioned before the pool is declared ready.
    pub min_size: u32,
    /// Upper bound on assigned nodes.
    pub max_size: u32,
    /// Backend group every pool node is created in.
    pub group_prefix: String,
    /// Destroy the backend node on release (`true`) or keep it for reuse.
    pub remove_destroyed: bool,
    /// Default credentials for templates without an explicit login.
    pub admin_access: AdminAccess,
    /// Template used when growing the pool.
    pub template: NodeTemplate,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 1,
            max_size: 10,
            group_prefix: "nodepool".to_string(),
            remove_destroyed: true,
            admin_access: AdminAccess::default(),
            template: NodeTemplate::default(),
        }
    }
}

/// Admin account installed on every pool node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AdminAccess {
    pub login_user: String,
    pub password: Option<String>,
    pub private_key: Option<String>,
    pub authenticate_sudo: bool,
}

impl Default for AdminAccess {
    fn default() -> Self {
        Self {
            login_user: "nodepool".to_string(),
            password: None,
            private_key: None,
            authenticate_sudo: true,
        }
    }
}

impl AdminAccess {
    /// Login credentials for the admin account.
    pub fn credentials(&self) -> LoginCredentials {
        LoginCredentials {
            user: self.login_user.clone(),
            password: self.password.clone(),
            private_key: self.private_key.clone(),
            authenticate_sudo: self.authenticate_sudo,
        }
    }
}

impl PoolConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: PoolConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Check the bounds and the required identity fields.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_size == 0 {
            return Err(ConfigError::Invalid("max_size must be at least 1".to_string()));
        }
        if self.max_size < self.min_size {
            return Err(ConfigError::Invalid(format!(
                "max_size ({}) must be >= min_size ({})",
                self.max_size, self.min_size
            )));
        }
        if self.group_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("group_prefix must not be empty".to_string()));
        }
        if self.admin_access.login_user.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "admin_access.login_user must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The pool's own template with admin credentials merged in.
    pub fn provisioning_template(&self) -> NodeTemplate {
        self.template
            .with_default_login(&self.admin_access.credentials())
    }
}
