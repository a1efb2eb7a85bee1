mod batch;
mod classifier;
mod config;
mod error;
mod image_loader;
mod prefilter;
mod routes;
mod session;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use classifier::{ConfidencePolicy, ModelHandle};
use config::AppConfig;
use image_loader::ImageLoader;
use routes::{AppState, configure_routes};
use session::SessionStore;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::other(format!("Configuration failed: {}", e))
    })?;

    let model = ModelHandle::load(&config.model).map_err(|e| {
        log::error!("Failed to load model at startup: {}", e);
        std::io::Error::other(format!("Model loading failed: {}", e))
    })?;
    log::info!(
        "Loaded model {} with input shape {:?}",
        config.model.path.display(),
        model.input_shape()
    );

    if config.diagnostics.debug_mode {
        log::info!("Debug diagnostics enabled by default");
    }
    if config.diagnostics.bypass_validation {
        log::warn!("Image validation is bypassed by default");
    }

    let state = web::Data::new(AppState {
        model,
        loader: ImageLoader::new(&config.upload.allowed_extensions),
        policy: ConfidencePolicy::new(config.model.confidence_threshold),
        diagnostics: config.diagnostics.clone(),
    });
    let sessions = web::Data::new(SessionStore::new());

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .expose_headers(vec![actix_web::http::header::CONTENT_DISPOSITION])
                    .max_age(3600),
            )
            .app_data(state.clone())
            .app_data(sessions.clone())
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
