mod app;

use anyhow::Context;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use clap::Parser;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use paru_core::{config::Config, pipeline::AppCore};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Lung-disease risk prediction server
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON config file; flags below override it
    #[arg(long, env = "PARU_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "PARU_MODEL_DIR")]
    model_dir: Option<PathBuf>,

    #[arg(long, env = "PARU_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, env = "PARU_PAGES_DIR")]
    pages_dir: Option<PathBuf>,

    /// host:port
    #[arg(long, env = "PARU_BIND")]
    bind: Option<String>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<Config> {
        let mut cfg = match &self.config {
            Some(p) => Config::from_file(p)?,
            None => Config::default(),
        };
        if let Some(v) = self.model_dir {
            cfg.model_dir = v;
        }
        if let Some(v) = self.data_dir {
            cfg.data_dir = v;
        }
        if let Some(v) = self.pages_dir {
            cfg.pages_dir = v;
        }
        if let Some(v) = self.bind {
            cfg.bind = v;
        }
        Ok(cfg)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // metrics
    let prom = PrometheusBuilder::new()
        .install_recorder()
        .context("install prometheus recorder")?;

    let cfg = Args::parse().into_config()?;
    let bind = cfg.bind.clone();
    tracing::info!(csv = %cfg.csv_path().display(), pages = %cfg.pages_dir.display(), "config");
    let core = Arc::new(AppCore::new(cfg)?);

    let app = app::router(core)
        .merge(Router::new().route("/metrics", get(move || render_metrics(prom.clone()))))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    tracing::info!("paru-server listening on http://{bind}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn render_metrics(prom: PrometheusHandle) -> impl IntoResponse {
    (StatusCode::OK, prom.render())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(err = %e, "ctrl_c handler failed");
    }
    tracing::info!("shutting down");
}
