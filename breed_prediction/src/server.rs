use crate::{config::ServerConfig, predictor::Predictor, routes::api_routes, telemetry::Metrics};
use axum::{extract::DefaultBodyLimit, Router};
use axum_otel_metrics::HttpMetricsLayerBuilder;
use std::{net::SocketAddr, sync::Arc};
use tokio::{net::TcpListener, signal};

#[derive(Clone)]
pub struct SharedState {
    pub predictor: Arc<Predictor>,
    pub metrics: Arc<Metrics>,
    pub body_limit_bytes: usize,
}

pub fn build_router(state: SharedState) -> Router {
    let metrics_layer = HttpMetricsLayerBuilder::new().build();
    let body_limit = DefaultBodyLimit::max(state.body_limit_bytes);

    Router::new()
        .merge(api_routes())
        .with_state(state)
        .layer(body_limit)
        .layer(metrics_layer)
}

pub struct HttpServer {
    router: Router,
    listener: TcpListener,
}

impl HttpServer {
    pub async fn new(predictor: Arc<Predictor>, config: &ServerConfig) -> anyhow::Result<Self> {
        let addr = config.get_address();

        let app_state = SharedState {
            predictor,
            metrics: Arc::new(Metrics::new()?),
            body_limit_bytes: config.body_limit_bytes,
        };
        let router = build_router(app_state);

        let listener = TcpListener::bind(addr).await?;

        Ok(Self { router, listener })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub async fn run(self) -> anyhow::Result<()> {
        tracing::info!("Starting app on {}", self.local_addr()?);

        let shutdown = async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, starting graceful shutdown")
        };

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
