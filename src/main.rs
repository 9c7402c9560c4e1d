//! `directory-portal` binary: loads the configuration and serves the portal.

// std
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
// crates.io
use clap::Parser;
use color_eyre::eyre::{Result, WrapErr, eyre};
use tokio::net::TcpListener;
// self
use directory_portal::{
	config::AppConfig,
	http::ReqwestHttpClient,
	telemetry,
	web::{self, AppState},
};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
	/// Configuration file.
	#[arg(short, long, env = "PORTAL_CONFIG", default_value = "portal.toml")]
	config: PathBuf,
	/// Overrides `server.listen`.
	#[arg(short, long, env = "PORTAL_LISTEN")]
	listen: Option<SocketAddr>,
	/// Log filter directives; overrides `RUST_LOG`.
	#[arg(long, env = "PORTAL_LOG")]
	log: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	// A missing `.env` is fine; the file only supplies optional overrides.
	let dotenv = dotenvy::dotenv();
	let cli = Cli::parse();

	telemetry::init(cli.log.as_deref()).map_err(|e| eyre!(e))?;

	if let Err(e) = dotenv
		&& !e.not_found()
	{
		tracing::warn!(error = %e, "Failed to load .env file.");
	}

	let mut config = AppConfig::load(&cli.config)
		.wrap_err_with(|| format!("Failed to load {}.", cli.config.display()))?;

	if let Some(listen) = cli.listen {
		config.server.listen = listen;
	}

	let listen = config.server.listen;
	let state = Arc::new(AppState::new(config, ReqwestHttpClient::new()?)?);
	let listener =
		TcpListener::bind(listen).await.wrap_err_with(|| format!("Failed to bind {listen}."))?;

	web::serve(state, listener, shutdown_signal()).await?;

	tracing::info!("Directory portal stopped.");

	Ok(())
}

async fn shutdown_signal() {
	if let Err(e) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %e, "Failed to listen for the shutdown signal.");
	}
}
