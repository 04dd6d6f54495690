use std::time::Duration;

use payloads::{
    ApiResponse, TournamentId, requests::PublishTournamentEvent,
    responses::StreamReady,
};
use reqwest::StatusCode;
use serde_json::json;
use test_helpers::{
    TestOptions, assert_status_code, spawn_app, spawn_app_with, tournament_id,
};

#[tokio::test]
async fn stream_opens_with_ready_frame() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let id = tournament_id();

    let mut stream = app.client.tournament_events(&id).await?;
    let ready = stream.next_event().await?.expect("stream ended");

    assert_eq!(ready.event, "ready");
    let ready: ApiResponse<StreamReady> = serde_json::from_str(&ready.data)?;
    assert!(ready.success);
    assert_eq!(ready.data.map(|d| d.tournament_id), Some(id.clone()));
    // subscribed before the response headers were sent
    assert_eq!(app.event_bus.listener_count(&id), 1);

    Ok(())
}

#[tokio::test]
async fn published_event_reaches_stream() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let id = tournament_id();
    let mut stream = app.client.tournament_events(&id).await?;

    let published = app
        .publish(&id, "match:update", Some(json!({ "matchId": "m1", "score": [11, 7] })))
        .await?;
    assert_eq!(published.delivered, 1);
    assert_eq!(published.event.timestamp.to_string(), "2025-01-01T00:00:00Z");

    let received = stream.next_tournament_event().await?.expect("stream ended");
    assert_eq!(received, published.event);
    assert_eq!(received.kind, "match:update");
    assert_eq!(received.tournament_id, id);

    Ok(())
}

#[tokio::test]
async fn events_use_the_server_clock() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let id = tournament_id();

    app.time_source.advance(jiff::Span::new().hours(2));
    let published = app.publish(&id, "status_changed", None).await?;

    assert_eq!(published.event.timestamp.to_string(), "2025-01-01T02:00:00Z");
    assert_eq!(published.event.payload, None);
    Ok(())
}

#[tokio::test]
async fn events_emitted_on_bus_are_streamed() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let id = tournament_id();
    let mut stream = app.client.tournament_events(&id).await?;

    let delivered =
        app.event_bus
            .emit_tournament(&id, "status_changed", Some(json!({ "foo": 1 })));
    assert_eq!(delivered, 1);

    let received = stream.next_tournament_event().await?.expect("stream ended");
    assert_eq!(received.kind, "status_changed");
    assert_eq!(received.payload, Some(json!({ "foo": 1 })));
    Ok(())
}

#[tokio::test]
async fn publish_without_listeners_delivers_to_none() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let published = app.publish(&tournament_id(), "bracket:generated", None).await?;

    assert_eq!(published.delivered, 0);
    Ok(())
}

#[tokio::test]
async fn streams_only_carry_their_tournament() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let a = TournamentId::from("aaaaaaaaaaaaaaaaaaaaaaaa");
    let b = TournamentId::from("bbbbbbbbbbbbbbbbbbbbbbbb");
    let mut stream_b = app.client.tournament_events(&b).await?;

    assert_eq!(app.publish(&a, "for-a", None).await?.delivered, 0);
    assert_eq!(app.publish(&b, "for-b", None).await?.delivered, 1);

    let received = stream_b.next_tournament_event().await?.expect("stream ended");
    assert_eq!(received.kind, "for-b");
    Ok(())
}

#[tokio::test]
async fn every_stream_receives_each_event() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let id = tournament_id();
    let mut first = app.client.tournament_events(&id).await?;
    let mut second = app.client.tournament_events(&id).await?;

    let published = app.publish(&id, "round:complete", None).await?;

    assert_eq!(published.delivered, 2);
    assert_eq!(first.next_tournament_event().await?, Some(published.event.clone()));
    assert_eq!(second.next_tournament_event().await?, Some(published.event));
    Ok(())
}

#[tokio::test]
async fn heartbeats_keep_stream_usable() -> anyhow::Result<()> {
    let app = spawn_app_with(TestOptions {
        heartbeat: Duration::from_millis(20),
    })
    .await;
    let id = tournament_id();
    let mut stream = app.client.tournament_events(&id).await?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    let published = app.publish(&id, "after-pings", None).await?;

    assert_eq!(stream.next_tournament_event().await?, Some(published.event));
    Ok(())
}

#[tokio::test]
async fn closed_stream_releases_subscription() -> anyhow::Result<()> {
    let app = spawn_app_with(TestOptions {
        heartbeat: Duration::from_millis(20),
    })
    .await;
    let id = tournament_id();
    let stream = app.client.tournament_events(&id).await?;
    app.wait_for_listeners(&id, 1).await?;

    drop(stream);

    app.wait_for_listeners(&id, 0).await?;
    Ok(())
}

#[tokio::test]
async fn stream_rejects_malformed_ids() -> anyhow::Result<()> {
    let app = spawn_app().await;

    assert_status_code(
        app.client.tournament_events(&"not-an-id".into()).await,
        StatusCode::BAD_REQUEST,
    );
    let error = app
        .client
        .tournament_events(&"undefined".into())
        .await
        .err()
        .expect("expected an error");
    assert_eq!(error.to_string(), "tournamentId is required");
    Ok(())
}

#[tokio::test]
async fn publish_requires_event_type() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let details = PublishTournamentEvent {
        kind: "  ".into(),
        payload: None,
    };

    let response = app
        .client
        .publish_tournament_event(&tournament_id(), &details)
        .await?;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Missing required fields: type"));
    Ok(())
}

#[tokio::test]
async fn publish_rejects_malformed_id() -> anyhow::Result<()> {
    let app = spawn_app().await;
    let details = PublishTournamentEvent {
        kind: "match:update".into(),
        payload: None,
    };

    let response = app
        .client
        .publish_tournament_event(&"12345".into(), &details)
        .await?;

    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Invalid tournamentId format"));
    Ok(())
}

#[tokio::test]
async fn published_payload_is_sanitized() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let published = app
        .publish(
            &tournament_id(),
            "match:update",
            Some(json!({ "score": 3, "__proto__": { "admin": true }, "nested": { "constructor": 1 } })),
        )
        .await?;

    assert_eq!(published.event.payload, Some(json!({ "score": 3, "nested": {} })));
    Ok(())
}
