//! keyflow server - non-blocking sessions over HTTP.
//!
//! Every session dispatches in non-blocking mode: menus come back as
//! pending prompts and are answered with `POST /api/sessions/{id}/select`.

mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use keyflow::core::types::Mode;
use keyflow::io::config::{CONFIG_FILE, load_config};

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "keyflow-server")]
#[command(about = "HTTP API for non-blocking keyflow sessions")]
struct Args {
    /// Address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Port to listen on
    #[arg(long, default_value = "3001")]
    port: u16,

    /// Project directory (contains keyflow.toml)
    #[arg(long, default_value = ".")]
    project_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("keyflow_server=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let project_dir = args.project_dir.canonicalize().unwrap_or(args.project_dir);
    let mut config = load_config(&project_dir.join(CONFIG_FILE))
        .context("load project config")?
        .resolve_paths(&project_dir);
    if config.mode != Mode::NonBlocking {
        info!("server sessions always run non-blocking");
        config.mode = Mode::NonBlocking;
    }
    info!(
        project_dir = %project_dir.display(),
        documents_dir = %config.documents_dir.display(),
        "starting keyflow-server"
    );

    let state = AppState::new(&config, &project_dir)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .nest("/api", routes::api_router())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port).parse()?;
    info!(addr = %addr, "listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
