use crate::{config::Config, predictor::Predictor, server::HttpServer};
use std::{error::Error, sync::Arc};

pub async fn start_app(config: Config) -> Result<(), Box<dyn Error>> {
    let model_config = config.clone();
    let predictor = tokio::task::spawn_blocking(move || Predictor::from_config(&model_config))
        .await?;
    if !predictor.is_ready() {
        tracing::warn!("Serving without a model, /predict will answer 503");
    }

    let server = match HttpServer::new(Arc::new(predictor), &config.server).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("Failed to initialize http server: {:?}", e);
            return Err(e.into());
        }
    };

    server.run().await?;

    Ok(())
}
