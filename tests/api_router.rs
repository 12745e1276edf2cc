mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::Duration;
use common::{JWT_SECRET, create_customer, create_product, setup};
use serde_json::{Value, json};
use storefront_checkout::{middleware::auth::issue_token, routes::create_app};
use tower::ServiceExt;

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

async fn body_json(response: axum::response::Response) -> anyhow::Result<Value> {
    let bytes = to_bytes(response.into_body(), 1024 * 1024).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn api_requires_a_valid_token() -> anyhow::Result<()> {
    let app = setup().await?;
    let router = create_app(app.state);

    let response = router
        .clone()
        .oneshot(Request::get("/api/cart").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await?;
    assert_eq!(body["data"]["error"], "unauthorized");

    let response = router
        .oneshot(
            Request::get("/api/cart")
                .header(header::AUTHORIZATION, "Bearer not-a-token")
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn cart_to_order_over_http() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_customer(&app.state, "grace@example.com").await?;
    let mug = create_product(&app.state, "Ferris Mug", 499, true).await?;
    let stickers = create_product(&app.state, "Sticker Pack", 349, true).await?;
    let token = issue_token(
        JWT_SECRET,
        user.user_id,
        &user.email,
        &user.role,
        Duration::hours(1),
    )?;
    let router = create_app(app.state);

    for (product_id, quantity) in [(mug, 2), (stickers, 1)] {
        let response = router
            .clone()
            .oneshot(
                Request::post("/api/cart/items")
                    .header(header::AUTHORIZATION, bearer(&token))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({ "product_id": product_id, "quantity": quantity }).to_string(),
                    ))?,
            )
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = router
        .clone()
        .oneshot(
            Request::get("/api/cart")
                .header(header::AUTHORIZATION, bearer(&token))
                .body(Body::empty())?,
        )
        .await?;
    let cart = body_json(response).await?;
    assert_eq!(cart["data"]["total_amount"], "13.47");

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/orders?shipping_address=1%20Main%20St&payment_provider=stripe")
                .header(header::AUTHORIZATION, bearer(&token))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let placed = body_json(response).await?;
    assert_eq!(placed["data"]["order"]["total_amount"], "13.47");
    assert_eq!(placed["data"]["order"]["status"], "pending");
    assert_eq!(placed["data"]["order"]["payment_status"], "pending");
    let order_id = placed["data"]["order"]["id"].as_str().unwrap().to_string();

    let response = router
        .clone()
        .oneshot(
            Request::post("/api/checkout/verify-payment")
                .header(header::AUTHORIZATION, bearer(&token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({ "order_id": order_id, "provider": "STRIPE", "reference": "pi_http" })
                        .to_string(),
                ))?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let verified = body_json(response).await?;
    assert_eq!(verified["data"]["verified"], true);
    assert_eq!(verified["data"]["order"]["payment_status"], "completed");

    let response = router
        .clone()
        .oneshot(
            Request::delete("/api/cart")
                .header(header::AUTHORIZATION, bearer(&token))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = router
        .oneshot(
            Request::put(format!("/api/admin/orders/{order_id}/status?status=processing"))
                .header(header::AUTHORIZATION, bearer(&token))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn unknown_paths_get_the_json_envelope() -> anyhow::Result<()> {
    let app = setup().await?;
    let response = create_app(app.state)
        .oneshot(Request::get("/nope").body(Body::empty())?)
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await?;
    assert_eq!(body["data"]["path"], "/nope");
    Ok(())
}
