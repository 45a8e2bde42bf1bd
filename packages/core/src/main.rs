use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;

use weather_lookup::api;
use weather_lookup::cache::{CacheRepository, MokaCache};
use weather_lookup::cli::ApiCli;
use weather_lookup::config::ApiConfig;
use weather_lookup::db::create_pool;
use weather_lookup::error::AppError;
use weather_lookup::logging::{init_logging, API_DEFAULT_FILTER};
use weather_lookup::queue::publisher::RabbitPublisher;
use weather_lookup::queue::{Broker, REFRESH_QUEUE};
use weather_lookup::repository::WeatherRepository;
use weather_lookup::services::openweather::OpenWeatherClient;
use weather_lookup::services::weather::WeatherService;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging("weather-api", API_DEFAULT_FILTER);

    let cli = ApiCli::parse();
    let config = ApiConfig::from_env()
        .map(|config| config.with_cli(&cli))
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    if let Err(err) = run(config).await {
        tracing::error!("Failed to start API Service: {}", err);
        std::process::exit(1);
    }
}

async fn run(config: ApiConfig) -> Result<(), AppError> {
    tracing::info!("Starting server...");

    let pool = create_pool(&config.database_url).await?;
    tracing::info!("Connected to database at {}", config.database_url);

    let broker = Broker::connect(&config.rabbitmq_url).await?;

    let source = OpenWeatherClient::new(
        config.openweather_base_url.clone(),
        config.openweather_api_key.clone(),
    );
    tracing::info!("Using weather provider at {}", source.base_url());

    let service = WeatherService::new(
        Arc::new(WeatherRepository::new(pool.clone())),
        CacheRepository::new(Arc::new(MokaCache::new(config.cache_max_entries))),
        Arc::new(source),
        Arc::new(RabbitPublisher::new(broker.channel(), REFRESH_QUEUE)),
        config.cache_ttl,
    );

    let app = api::router(Arc::new(service));

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .map_err(|err| AppError::Network(format!("Failed to bind port {}: {}", config.port, err)))?;
    tracing::info!("API Service running on port {}", config.port);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Network(err.to_string()));

    tracing::info!("Shutdown... closing connections");
    broker.close().await;
    pool.close().await;

    served
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("SIGINT signal received: closing connections...");
}
