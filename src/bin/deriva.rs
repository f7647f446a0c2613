use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;
use deriva::{
    DerivativeEngine,
    config::{ServerConfig, enter_root},
    logging::init_logging,
    server::{AppState, NotFoundAsset, router},
    watch::watch_root,
};

#[derive(Parser, Debug)]
#[command(name = "deriva", version, about = "On-demand image derivative server")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, default_value = "deriva.json")]
    config: PathBuf,

    /// Listening port (overrides the config file).
    #[arg(long)]
    port: Option<u16>,

    /// Log verbosity 0..=4 (overrides the config file).
    #[arg(long)]
    log_level: Option<u8>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut cfg = ServerConfig::load(&cli.config)?;
    if let Some(port) = cli.port {
        cfg.port = port;
    }
    if let Some(level) = cli.log_level {
        cfg.log_level = level;
    }

    let _log_guard = init_logging(cfg.log_level, cfg.log_file.as_deref())?;
    for key in cfg.ignored.keys() {
        tracing::warn!(%key, "ignoring unknown configuration key");
    }
    let root = enter_root(&cfg.img_root)?;
    tracing::info!(root = %root.display(), mode = ?cfg.cache_mode, "image root entered");

    let engine = DerivativeEngine::from_config(&cfg, &root)?;
    let mut state = AppState::new(engine.clone(), cfg.max_age);
    if let Some(rel) = cfg.not_found.as_deref() {
        match NotFoundAsset::load(&engine, rel) {
            Ok(asset) => state = state.with_not_found(asset),
            Err(e) => tracing::warn!(path = rel, error = %e, "not-found asset unavailable"),
        }
    }

    let _watcher = if cfg.watch {
        Some(watch_root(&root)?)
    } else {
        None
    };

    let addr = cfg.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    Ok(())
}
