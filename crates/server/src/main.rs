use clap::Parser;
use claw_office_server::config::Config;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Real-time control plane for office bots.
#[derive(Debug, Parser)]
#[command(name = "claw-office-server", version)]
struct Args {
    /// YAML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    listen: Option<SocketAddr>,

    /// SQLite snapshot database.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Static credential for the Control API.
    #[arg(long, env = "CLAW_OFFICE_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Drive bot motion server-side.
    #[arg(long)]
    simulate: bool,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let mut cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(listen) = args.listen {
        cfg.listen = listen;
    }
    if let Some(db) = args.db {
        cfg.db_path = Some(db);
    }
    if let Some(token) = args.api_token {
        cfg.api_token = Some(token);
    }
    if args.simulate {
        cfg.simulation.enabled = true;
    }

    claw_office_server::serve(cfg).await
}
