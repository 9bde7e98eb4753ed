//! Command handlers. Each returns pretty-printed JSON for stdout.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use nodepool::{EagerNodePool, LocalBackend, PoolCounters, PoolStats};
use nodepool_core::{LoginCredentials, NodeTemplate, PoolConfig};
use nodepool_state::StateStore;

/// Load the pool config, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PoolConfig> {
    match path {
        Some(path) => {
            let config = PoolConfig::from_file(path)?;
            info!(path = ?path, "pool config loaded");
            Ok(config)
        }
        None => Ok(PoolConfig::default()),
    }
}

/// Open the state store under `data_dir` and start a warm pool on it.
pub async fn open_pool(config: PoolConfig, data_dir: &Path) -> anyhow::Result<EagerNodePool> {
    std::fs::create_dir_all(data_dir)?;
    let db_path = data_dir.join("nodepool.redb");

    let state = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let backend = Arc::new(LocalBackend::new(state.clone()));
    let pool = EagerNodePool::start(config, backend, Arc::new(state)).await?;
    Ok(pool)
}

#[derive(Serialize)]
struct StatusReport {
    group: String,
    remove_destroyed: bool,
    stats: PoolStats,
    counters: PoolCounters,
}

pub async fn status(pool: &EagerNodePool) -> anyhow::Result<String> {
    let report = StatusReport {
        group: pool.config().group_prefix.clone(),
        remove_destroyed: pool.config().remove_destroyed,
        stats: pool.stats().await?,
        counters: pool.counters().await,
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

pub async fn allocate(
    pool: &EagerNodePool,
    group: &str,
    name: &str,
    login_user: Option<&str>,
    tags: Vec<String>,
) -> anyhow::Result<String> {
    let mut template = NodeTemplate::default();
    template.options.login = login_user.map(LoginCredentials::for_user);
    template.options.tags = tags;

    let node = pool.allocate(group, name, &template).await?;
    Ok(serde_json::to_string_pretty(&node)?)
}

pub async fn destroy(pool: &EagerNodePool, id: &str) -> anyhow::Result<String> {
    let reclamation = pool.destroy(id).await?;
    Ok(serde_json::to_string_pretty(&reclamation)?)
}

pub async fn nodes(pool: &EagerNodePool) -> anyhow::Result<String> {
    let nodes = pool.list_nodes().await?;
    Ok(serde_json::to_string_pretty(&nodes)?)
}
