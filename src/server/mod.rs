pub mod handlers;

use crate::{
    comfy::{ComfyImageClient, ImageBackend},
    config::Config,
    error::Result,
    models::ErrorResponse,
};
use actix_web::{error::InternalError, middleware::Logger, web, App, HttpResponse, HttpServer};
use std::sync::Arc;

pub use handlers::{AppState, GenerateBody, SeedInput};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        let body = ErrorResponse::new(err.to_string());
        InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
    }))
    .route("/health", web::get().to(handlers::health_check))
    .route("/api/generate", web::post().to(handlers::generate))
    .route("/api/community", web::get().to(handlers::community_works));
}

pub fn build_state(config: &Config) -> Result<web::Data<AppState>> {
    let backend: Arc<dyn ImageBackend> = Arc::new(ComfyImageClient::new(&config.backend)?);
    Ok(web::Data::new(AppState { backend }))
}

pub async fn run(config: Config) -> std::io::Result<()> {
    let state = build_state(&config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let address = config.bind_address();

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%r %s %Dms"))
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(&address)?
    .run()
    .await
}
