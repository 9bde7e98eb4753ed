//! nodepoold — the node pool daemon.
//!
//! Opens the state store, warms the pool to its minimum size against the
//! local backend, and runs one control-plane command.
//!
//! # Usage
//!
//! ```text
//! nodepoold --config pool.toml --data-dir /var/lib/nodepool start
//! nodepoold allocate --group ci --name runner-1
//! nodepoold destroy nodepool-0001
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "nodepoold", about = "Eager node pool daemon", version)]
struct Cli {
    /// Pool configuration (TOML). Built-in defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for persistent state.
    #[arg(long, global = true, default_value = "/var/lib/nodepool")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Warm the pool to its minimum size and print its stats.
    Start,
    /// Assign a pool node to a frontend group and name.
    Allocate {
        #[arg(long)]
        group: String,
        #[arg(long)]
        name: String,
        /// Login user for the node; the pool's admin account otherwise.
        #[arg(long)]
        login_user: Option<String>,
        /// Tags recorded with the assignment (repeatable).
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// Release an assigned node according to the destroy policy.
    Destroy {
        /// Backend node id.
        id: String,
    },
    /// Print current pool sizes and bounds.
    Status,
    /// List assigned nodes.
    Nodes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info,nodepool=debug,nodepoold=debug")
                }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;
    let pool = commands::open_pool(config, &cli.data_dir).await?;

    let output = match cli.command {
        Command::Start | Command::Status => commands::status(&pool).await?,
        Command::Allocate {
            group,
            name,
            login_user,
            tags,
        } => commands::allocate(&pool, &group, &name, login_user.as_deref(), tags).await?,
        Command::Destroy { id } => commands::destroy(&pool, &id).await?,
        Command::Nodes => commands::nodes(&pool).await?,
    };

    println!("{output}");
    Ok(())
}
