use std::sync::Arc;

use clap::Parser;
use dotenvy::dotenv;

use weather_lookup::cli::WorkerCli;
use weather_lookup::config::WorkerConfig;
use weather_lookup::error::AppError;
use weather_lookup::logging::{init_logging, WORKER_DEFAULT_FILTER};
use weather_lookup::notification::EmailNotifier;
use weather_lookup::queue::consumer::{run_consumer, RefreshConsumer};
use weather_lookup::queue::{Broker, REFRESH_QUEUE};

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging("email-worker", WORKER_DEFAULT_FILTER);

    let cli = WorkerCli::parse();
    let config = WorkerConfig::from_env()
        .map(|config| config.with_cli(&cli))
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });

    if let Err(err) = run(config).await {
        tracing::error!("Email Notification Worker failed: {}", err);
        std::process::exit(1);
    }
}

async fn run(config: WorkerConfig) -> Result<(), AppError> {
    let broker = Broker::connect(&config.rabbitmq_url).await?;
    let consumer = RefreshConsumer::new(Arc::new(EmailNotifier::new(config.notification_delay)));

    tracing::info!("Email Notification Worker started and listening for messages.");
    let outcome = run_consumer(broker.channel(), REFRESH_QUEUE, consumer).await;

    broker.close().await;
    outcome
}
