//! Shared types used across node pool crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for a node as reported by the compute backend.
pub type NodeId = String;

// ── Backend nodes ─────────────────────────────────────────────────

/// A node as reported by the compute backend.
///
/// Snapshots are immutable: the pool never mutates a node, it only asks the
/// backend for a fresh listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendNode {
    pub id: NodeId,
    /// Backend group the node was created in (the pool's group prefix).
    pub group: String,
    /// Backend-assigned name, usually `{group}-{suffix}`.
    pub name: String,
    pub state: NodeState,
    /// Reachable addresses (ip or hostname).
    #[serde(default)]
    pub addresses: Vec<String>,
    /// Unix timestamp (seconds) when the backend created the node.
    pub created_at: u64,
}

impl BackendNode {
    /// Whether the node still counts towards the pool's size.
    pub fn is_live(&self) -> bool {
        self.state != NodeState::Terminated
    }
}

/// Lifecycle status of a backend node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Running,
    Suspended,
    Terminated,
    Error,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Pending => write!(f, "pending"),
            NodeState::Running => write!(f, "running"),
            NodeState::Suspended => write!(f, "suspended"),
            NodeState::Terminated => write!(f, "terminated"),
            NodeState::Error => write!(f, "error"),
        }
    }
}

// ── Credentials & templates ───────────────────────────────────────

/// Login credentials handed to whoever owns a node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginCredentials {
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    /// Whether `sudo` prompts for the password.
    #[serde(default)]
    pub authenticate_sudo: bool,
}

impl LoginCredentials {
    /// Credentials with only a user name.
    pub fn for_user(user: &str) -> Self {
        Self {
            user: user.to_string(),
            password: None,
            private_key: None,
            authenticate_sudo: false,
        }
    }
}

/// Per-request options carried by a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct TemplateOptions {
    /// Explicit login. When absent, the pool's admin credentials are used.
    #[serde(default)]
    pub login: Option<LoginCredentials>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub user_metadata: HashMap<String, String>,
}

/// What to create (backend side) or what a caller asks for (frontend side).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeTemplate {
    /// Image identifier understood by the backend.
    pub image: String,
    /// Hardware profile identifier understood by the backend.
    pub hardware: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub options: TemplateOptions,
}

impl Default for NodeTemplate {
    fn default() -> Self {
        Self {
            image: "default".to_string(),
            hardware: "small".to_string(),
            location: None,
            options: TemplateOptions::default(),
        }
    }
}

impl NodeTemplate {
    /// Copy of this template whose login falls back to `fallback`.
    ///
    /// An explicit login on the template always wins.
    pub fn with_default_login(&self, fallback: &LoginCredentials) -> Self {
        let mut template = self.clone();
        if template.options.login.is_none() {
            template.options.login = Some(fallback.clone());
        }
        template
    }
}
