mod classifier;
mod config;
mod error;
mod limiter;
mod medical;
mod routes;

use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use classifier::Classifier;
use config::AppConfig;
use limiter::{RateLimitMiddleware, RateLimits};
use routes::configure_routes;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    dotenv::dotenv().ok();

    if let Ok(current_dir) = std::env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env();
    log::info!("Serving frontend from: {}", config.frontend_dir);

    // A missing or broken artifact degrades to mock mode instead of aborting.
    let classifier = web::Data::new(Classifier::load(&config.model_path));
    log::info!("Classifier mode: {}", classifier.mode());

    let limiter = RateLimitMiddleware::new(RateLimits {
        per_minute: config.rate_per_minute,
        per_day: config.rate_per_day,
    });

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    let config_data = web::Data::new(config.clone());
    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(limiter.clone())
            .app_data(classifier.clone())
            .app_data(config_data.clone())
            .configure(|cfg| configure_routes(cfg, config.frontend_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
