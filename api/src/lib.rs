pub mod events;
pub mod routes;
pub mod telemetry;
pub mod time;
pub mod validation;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use std::net::TcpListener;
use std::time::Duration;

use crate::events::EventBus;
use crate::routes::tournament::Heartbeat;

/// Build the server, but not await it.
///
/// Returns the port that the server has bound to by modifying the config.
pub async fn build(
    config: &mut Config,
    event_bus: EventBus,
) -> std::io::Result<Server> {
    routes::set_include_stack(config.environment.is_development());
    let event_bus = web::Data::new(event_bus);
    let heartbeat = web::Data::new(Heartbeat(config.heartbeat));

    let allowed_origins = config.allowed_origins.clone();

    // OS assigns the port if binding to 0
    let listener = TcpListener::bind(format!("{}:{}", config.ip, config.port))?;
    config.port = listener.local_addr()?.port();
    tracing::info!(
        ip = %config.ip,
        port = config.port,
        environment = ?config.environment,
        "starting server"
    );
    let server = HttpServer::new(move || {
        let cors = if allowed_origins.iter().any(|origin| origin == "*") {
            Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
        } else {
            let mut cors = Cors::default()
                .allow_any_method()
                .allow_any_header()
                .supports_credentials();
            for origin in &allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors
        };

        App::new()
            .wrap(cors)
            .service(routes::api_services())
            .app_data(event_bus.clone())
            .app_data(heartbeat.clone())
    })
    .listen(listener)?
    .run();
    Ok(server)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(ConfigError::Invalid("APP_ENV", s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// set to "0.0.0.0" for public access, "127.0.0.1" for local dev
    pub ip: String,
    /// set to 0 to get an os-assigned port
    pub port: u16,
    /// List of allowed CORS origins. Use "*" to allow any origin (development only)
    pub allowed_origins: Vec<String>,
    /// Development mode adds error chains to error responses.
    pub environment: Environment,
    /// Interval between keep-alive comments on event streams.
    pub heartbeat: Duration,
}

pub const DEFAULT_HEARTBEAT_SECS: u64 = 25;

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which returns the value of a
    /// variable if it is set.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "*".to_string()) // Default to allow any origin for development
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let port = required("PORT")?;
        let port = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid("PORT", port))?;

        let environment = match lookup("APP_ENV") {
            Some(env) if !env.trim().is_empty() => env.parse()?,
            _ => Environment::Production,
        };

        let heartbeat = match lookup("SSE_HEARTBEAT_SECS") {
            Some(secs) => match secs.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::Invalid("SSE_HEARTBEAT_SECS", secs)),
            },
            None => Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
        };

        Ok(Config {
            ip: required("IP_ADDRESS")?,
            port,
            allowed_origins,
            environment,
            heartbeat,
        })
    }
}
