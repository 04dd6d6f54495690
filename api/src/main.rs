use anyhow::Context;
use api::{
    Config, build,
    events::EventBus,
    telemetry::{get_subscriber, init_subscriber, log_error},
    time::TimeSource,
};

/// Bracket of Death API Server
///
/// Environment variables can be set directly or loaded from a .env file in the project root.
///
/// Required environment variables:
/// - IP_ADDRESS: Server bind address (127.0.0.1 for local, 0.0.0.0 for public)
/// - PORT: Server port
///
/// Optional environment variables:
/// - ALLOWED_ORIGINS: CORS origins ("*" for any origin, the default, or a comma-separated list)
/// - APP_ENV: "development" or "production" (default). Development error responses include the error chain.
/// - SSE_HEARTBEAT_SECS: seconds between keep-alive comments on event streams (default 25)
/// - RUST_LOG: log filter (default "info")
///
/// Example .env file:
/// IP_ADDRESS=127.0.0.1
/// PORT=8000
/// ALLOWED_ORIGINS=*
/// APP_ENV=development
///
/// Example production command:
/// IP_ADDRESS=0.0.0.0 PORT=8000 ALLOWED_ORIGINS=https://bod.example.com \
/// cargo run --release
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if available
    // This will silently ignore if the file doesn't exist
    let _ = dotenvy::dotenv();

    let subscriber = get_subscriber("info".into());
    init_subscriber(subscriber)?;

    let mut config = Config::from_env().context("reading configuration")?;

    #[cfg(not(feature = "mock-time"))]
    let time_source = TimeSource::new();
    #[cfg(feature = "mock-time")]
    let time_source = TimeSource::new(jiff::Timestamp::now());

    let event_bus = EventBus::new(time_source);
    let server = build(&mut config, event_bus.clone())
        .await
        .context("starting server")?;
    let result = server.await;
    event_bus.shutdown();
    if let Err(e) = &result {
        log_error(anyhow::anyhow!("server stopped with an error: {e}"));
    }
    Ok(result?)
}
