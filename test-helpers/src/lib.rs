use std::time::Duration;

use api::{Config, Environment, events::EventBus, telemetry, time::TimeSource};
use payloads::{TournamentId, requests, responses};
use reqwest::StatusCode;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

pub struct TestApp {
    #[allow(unused)]
    pub port: u16,
    pub client: payloads::APIClient,
    /// The bus the server publishes on, for subscribing from the test.
    pub event_bus: EventBus,
    pub time_source: TimeSource,
}

/// Settings for [`spawn_app_with`].
#[derive(Debug, Clone)]
pub struct TestOptions {
    /// Interval between keep-alive comments on event streams.
    pub heartbeat: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(25),
        }
    }
}

/// Helpers for driving tournament events.
///
/// Using anyhow::Result lets us get a backtrace from when the error was fist
/// converted to anyhow::Result. Run with RUST_BACKTRACE=1 to view.
impl TestApp {
    /// Publish an event through the API and return what the server
    /// broadcast.
    pub async fn publish(
        &self,
        tournament_id: &TournamentId,
        kind: &str,
        payload: Option<serde_json::Value>,
    ) -> anyhow::Result<responses::PublishedEvent> {
        let details = requests::PublishTournamentEvent {
            kind: kind.to_string(),
            payload,
        };
        let response = self
            .client
            .publish_tournament_event(tournament_id, &details)
            .await?;
        match (response.success, response.data) {
            (true, Some(published)) => Ok(published),
            _ => anyhow::bail!(
                "publish failed: {}",
                response.error.unwrap_or_default()
            ),
        }
    }

    /// Wait until the server holds `count` listeners for the tournament.
    pub async fn wait_for_listeners(
        &self,
        tournament_id: &TournamentId,
        count: usize,
    ) -> anyhow::Result<()> {
        for _ in 0..200 {
            if self.event_bus.listener_count(tournament_id) == count {
                return Ok(());
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        anyhow::bail!(
            "expected {count} listeners, found {}",
            self.event_bus.listener_count(tournament_id)
        )
    }
}

pub async fn spawn_app_with(options: TestOptions) -> TestApp {
    let subscriber = telemetry::get_subscriber("error".into());
    let _ = LogTracer::init();
    let _ = subscriber.try_init();

    #[cfg(any(feature = "mock-time", test))]
    let time_source = TimeSource::new("2025-01-01T00:00:00Z".parse().unwrap());

    #[cfg(not(any(feature = "mock-time", test)))]
    let time_source = TimeSource::new();

    let mut config = Config {
        ip: "127.0.0.1".into(),
        port: 0,
        allowed_origins: vec!["*".to_string()],
        environment: Environment::Development,
        heartbeat: options.heartbeat,
    };

    let event_bus = EventBus::new(time_source.clone());
    let server = api::build(&mut config, event_bus.clone()).await.unwrap();
    tokio::spawn(server);

    TestApp {
        port: config.port,
        client: payloads::APIClient {
            address: format!("http://127.0.0.1:{}", config.port),
            inner_client: reqwest::Client::new(),
        },
        event_bus,
        time_source,
    }
}

/// Use OS-assigned port for parallel testing.
pub async fn spawn_app() -> TestApp {
    spawn_app_with(TestOptions::default()).await
}

/// A well formed tournament id.
pub fn tournament_id() -> TournamentId {
    TournamentId::from("507f1f77bcf86cd799439011")
}

/// Assert that the result of an API action results in a specific status code.
pub fn assert_status_code<T>(
    result: Result<T, payloads::ClientError>,
    expected: StatusCode,
) {
    match result {
        Err(payloads::ClientError::APIError(code, _)) => {
            assert_eq!(code, expected)
        }
        _ => panic!("Expected APIError"),
    };
}
