use anyhow::Context;
use std::io;
use tracing::info;
use tracing_subscriber::{fmt::time::UtcTime, EnvFilter};

use togglebot::config::Config;
use togglebot::{build_provider, create_app};

const DEFAULT_TIME_PATTERN: &str =
    "[year]-[month]-[day]T[hour repr:24]:[minute]:[second]::[subsecond digits:4]";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let time_format = time::format_description::parse(DEFAULT_TIME_PATTERN)
        .with_context(|| "Invalid log time format")?;

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .flatten_event(true)
        .with_thread_ids(true)
        .with_timer(UtcTime::new(time_format))
        .with_writer(io::stdout)
        .init();

    let config = Config::from_env().with_context(|| "Invalid configuration")?;

    let provider = build_provider(&config.provider)?;
    let app = create_app(&config, provider);

    let listener = tokio::net::TcpListener::bind(config.addr())
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr()))?;

    info!(addr = %config.addr(), user_id = %config.user_id, "server is chilling");

    axum::serve(listener, app)
        .await
        .with_context(|| "Server error")?;

    Ok(())
}
