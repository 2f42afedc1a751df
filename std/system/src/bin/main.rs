//! Binary entry point for the wmcp-system MCP server.

use clap::Parser;
use rmcp::ServiceExt;
use std::path::PathBuf;
use wmcp_system::{
    SystemServer,
    config::{Config, ConfigStore},
    tools::ToolContext,
};

/// Walrus MCP System Server, providing command, process and file tools.
#[derive(Parser)]
#[command(name = "wmcp-system", version, about)]
struct Cli {
    /// Configuration file. Defaults to `<config dir>/wmcp/system.json`.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    if std::env::var_os("RUST_LOG").is_some() {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .init();
    }
    let cli = Cli::parse();
    let server = SystemServer::new(ToolContext::new(load_config(cli.config)));
    let transport = rmcp::transport::stdio();
    let service = match server.serve(transport).await {
        Ok(service) => service,
        Err(e) => {
            eprintln!("failed to start server: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = service.waiting().await {
        eprintln!("server error: {e}");
        std::process::exit(1);
    }
}

/// Load the configuration file, falling back to defaults when it is unusable.
fn load_config(path: Option<PathBuf>) -> ConfigStore {
    let Some(path) = path.or_else(ConfigStore::default_path) else {
        tracing::warn!("no configuration directory, using defaults");
        return ConfigStore::in_memory(Config::default());
    };
    match ConfigStore::load(path) {
        Ok(store) => {
            tracing::info!(path = ?store.path(), "loaded configuration");
            store
        }
        Err(e) => {
            tracing::warn!(error = %e, "invalid configuration, using defaults");
            ConfigStore::in_memory(Config::default())
        }
    }
}
