use clap::Parser;

/// Weather lookup API
#[derive(Debug, Parser)]
#[command(
    name = "weather-api",
    version,
    about = "Cached current-weather lookups with refresh notifications"
)]
pub struct ApiCli {
    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// SQLite database URL
    #[arg(long)]
    pub database_url: Option<String>,

    /// RabbitMQ AMQP URL
    #[arg(long)]
    pub rabbitmq_url: Option<String>,
}

/// Refresh notification worker
#[derive(Debug, Parser)]
#[command(
    name = "email-worker",
    version,
    about = "Sends an email for every forced weather refresh"
)]
pub struct WorkerCli {
    /// RabbitMQ AMQP URL
    #[arg(long)]
    pub rabbitmq_url: Option<String>,
}
