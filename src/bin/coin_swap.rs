use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use clap::Parser;
use coin_swap::config::AppConfig;
use coin_swap::{ChangellyClient, QuoteController, create_coin_swap_router};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "coin-swap", about = "Currency exchange quote service")]
struct Args {
    /// Config file (defaults to <work-dir>/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Working directory (defaults to ~/.coin-swap)
    #[arg(short, long)]
    work_dir: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let default_filter = "debug";
        let hyper_filter = "hyper=warn";
        let reqwest_filter = "reqwest=warn";
        let h2_filter = "h2=warn";
        let rustls_filter = "rustls=warn";

        let env_filter = EnvFilter::new(format!(
            "{},{},{},{},{}",
            default_filter, hyper_filter, reqwest_filter, h2_filter, rustls_filter
        ));

        tracing_subscriber::fmt().with_env_filter(env_filter).init();

        let work_dir = match args.work_dir {
            Some(dir) => dir,
            None => AppConfig::default_dir().map_err(|e| anyhow!("Could not get home dir: {}", e))?,
        };

        // Ensure work directory exists
        std::fs::create_dir_all(&work_dir)
            .map_err(|e| anyhow!("Failed to create work directory: {}", e))?;

        // Load configuration
        let config_path = args.config.unwrap_or_else(|| work_dir.join("config.toml"));
        let config = match AppConfig::new(Some(&config_path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!("Failed to load configuration: {}", e);
                tracing::error!(
                    "Please copy and modify {} to: {}",
                    config_path.with_file_name("example.config.toml").display(),
                    config_path.display()
                );
                return Err(anyhow!("Configuration error: {}", e));
            }
        };

        if config.changelly.api_key.is_empty() || config.changelly.api_secret.is_empty() {
            tracing::warn!("Exchange API credentials are not set; remote calls will be rejected");
        }

        let client = Arc::new(ChangellyClient::from_config(&config.changelly));
        let controller = QuoteController::new(client, &config.quote);

        match controller.initialize().await {
            Ok(catalog) => tracing::info!("{} currencies available", catalog.len()),
            // The catalog is fetched again on the next /currencies request
            Err(e) => tracing::warn!("Could not load currency catalog: {}", e),
        }

        let service = create_coin_swap_router(controller.clone()).await?;

        let service = service.layer(CorsLayer::permissive());

        let socket_addr = SocketAddr::from_str(&format!(
            "{}:{}",
            config.server.listen_host, config.server.listen_port
        ))?;

        tracing::info!("Starting coin swap server on {}", socket_addr);

        let listener = tokio::net::TcpListener::bind(socket_addr).await?;

        let axum_result = axum::serve(listener, service).with_graceful_shutdown(shutdown_signal());

        match axum_result.await {
            Ok(_) => {
                tracing::info!("Axum server stopped with okay status");
            }
            Err(err) => {
                tracing::warn!("Axum server stopped with error");
                tracing::error!("{}", err);
                bail!("Axum exited with error")
            }
        }

        Ok(())
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
