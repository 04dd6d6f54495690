use reqwest::StatusCode;
use serde_json::Value;
use test_helpers::{spawn_app, tournament_id};

#[tokio::test]
async fn malformed_json_is_a_bad_request_envelope() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let response = app
        .client
        .inner_client
        .post(format!(
            "{}/api/tournaments/{}/events",
            app.client.address,
            tournament_id()
        ))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    Ok(())
}

#[tokio::test]
async fn development_errors_include_stack() -> anyhow::Result<()> {
    let app = spawn_app().await;

    let response = app
        .client
        .inner_client
        .get(format!("{}/api/tournaments/undefined/stream", app.client.address))
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await?;
    assert_eq!(body["error"], "tournamentId is required");
    assert!(body["stack"].as_str().is_some_and(|s| s.contains("BadRequest")));
    Ok(())
}
