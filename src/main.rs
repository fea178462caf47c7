use std::env;
use std::process::ExitCode;

use clap::Parser;
use nexus::config::PipelineConfig;
use nexus::server::Server;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "nexus", version = nexus::VERSION, about = "Reverse proxy with credential rewriting and per-credential rate limiting")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long)]
    config: Option<String>,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Pretty => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config_path = cli
        .config
        .or_else(|| env::var("CONFIG_PATH").ok())
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = match PipelineConfig::load(&config_path) {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, path = %config_path, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        listen_port = config.listen_port,
        target = %config.target_url,
        "nexus starting"
    );

    let server = Server::new(&config);
    if let Err(err) = server.run().await {
        tracing::error!(error = %err, "server exited with error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
