//! Live tournament updates: publishing events and streaming them to
//! browsers as server-sent events.

use std::time::Duration;

use actix_web::{
    HttpResponse, get,
    http::header,
    post,
    web::{self, Bytes},
};
use payloads::{
    ApiResponse, TournamentId, requests::PublishTournamentEvent,
    responses::{PublishedEvent, StreamReady},
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::UnboundedReceiverStream};

use crate::{
    events::EventBus,
    telemetry::log_error,
    validation::{sanitize_input, validate_object_ids, validate_required},
};

use super::APIError;

/// Interval between keep-alive comments on an open event stream.
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat(pub Duration);

const PING: &[u8] = b": ping\n\n";

/// Encode one server-sent event frame.
pub fn frame(
    event: &str,
    data: &impl Serialize,
) -> Result<Bytes, serde_json::Error> {
    let data = serde_json::to_string(data)?;
    Ok(Bytes::from(format!("event: {event}\ndata: {data}\n\n")))
}

fn parse_tournament_id(raw: String) -> Result<TournamentId, APIError> {
    validate_object_ids(&[("tournamentId", &raw)])?;
    Ok(TournamentId(raw))
}

#[tracing::instrument(skip(body, bus), ret)]
#[post("/tournaments/{tournament_id}/events")]
pub async fn publish_event(
    path: web::Path<String>,
    body: web::Json<Value>,
    bus: web::Data<EventBus>,
) -> Result<HttpResponse, APIError> {
    let tournament_id = parse_tournament_id(path.into_inner())?;
    let body = sanitize_input(body.into_inner());
    validate_required(&body, &["type"])?;
    let details: PublishTournamentEvent = serde_json::from_value(body)
        .map_err(|e| APIError::BadRequest(e.to_string()))?;

    let event = bus.new_event(&tournament_id, details.kind, details.payload);
    let delivered = bus.deliver(&event);
    Ok(HttpResponse::Ok().json(ApiResponse::ok(PublishedEvent {
        event,
        delivered,
    })))
}

/// Stream a tournament's events. The first frame is `ready`, followed by an
/// `update` frame per event and a comment line every heartbeat.
#[tracing::instrument(skip(bus, heartbeat))]
#[get("/tournaments/{tournament_id}/stream")]
pub async fn stream_tournament(
    path: web::Path<String>,
    bus: web::Data<EventBus>,
    heartbeat: web::Data<Heartbeat>,
) -> Result<HttpResponse, APIError> {
    let tournament_id = parse_tournament_id(path.into_inner())?;
    let (tx, rx) = mpsc::unbounded_channel::<Bytes>();

    let ready = frame(
        "ready",
        &ApiResponse::ok(StreamReady {
            tournament_id: tournament_id.clone(),
        }),
    )
    .map_err(anyhow::Error::from)?;
    // the receiver is still held here
    let _ = tx.send(ready);

    let listener_tx = tx.clone();
    let subscription = bus.on_tournament(&tournament_id, move |event| {
        match frame("update", event) {
            Ok(bytes) => {
                let _ = listener_tx.send(bytes);
            }
            Err(e) => log_error(e),
        }
    });

    let interval = heartbeat.0;
    actix_web::rt::spawn(async move {
        let mut ticks = tokio::time::interval(interval);
        // the first tick completes immediately
        ticks.tick().await;
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                _ = ticks.tick() => {
                    if tx.send(Bytes::from_static(PING)).is_err() {
                        break;
                    }
                }
            }
        }
        drop(subscription);
        tracing::debug!(%tournament_id, "event stream closed");
    });

    let body = UnboundedReceiverStream::new(rx).map(Ok::<_, actix_web::Error>);
    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header(("X-Accel-Buffering", "no"))
        .streaming(body))
}
