mod common;

use axum::{extract::State, http::StatusCode};
use storefront_checkout::routes::health::health_check;

#[tokio::test]
async fn health_check_returns_ok() -> anyhow::Result<()> {
    let app = common::setup().await?;
    let (status, response) = health_check(State(app.state)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.database, "up");
    Ok(())
}
