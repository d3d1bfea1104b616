use clap::{ArgAction, Parser};
use nufeed_core::{error::FeedError, FeedResult, PackageStore};
use tracing::info;

use crate::{config::Config, routes::AppState};

mod config;
mod logging;
mod routes;

#[derive(Parser)]
#[command(author, version, about = "A NuGet V2 package feed server")]
struct Args {
    /// Provide custom config file
    #[arg(short, long)]
    config: Option<String>,

    /// Override the configured listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Suppress outputs
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> FeedResult<()> {
    let args = Args::parse();
    logging::setup_logging(args.verbose, args.quiet);

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.port = port;
    }

    let store = PackageStore::open(&config.db_path)?;
    info!("package database at {}", config.db_path);

    let addr = format!("{}:{}", config.bind, config.port);
    let app = routes::router(AppState::new(store, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|err| FeedError::IoError {
            action: format!("binding {addr}"),
            source: err,
        })?;
    info!("nufeed listening on http://{addr}");

    axum::serve(listener, app)
        .await
        .map_err(|err| FeedError::IoError {
            action: "serving HTTP".into(),
            source: err,
        })?;

    Ok(())
}
