use axum::{Json, Router, extract::State, routing::post};

use crate::{
    dto::checkout::{PaymentSessionRequest, VerifyPaymentRequest, VerifyPaymentResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    models::PaymentProvider,
    payments::PaymentSession,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stripe/create-intent", post(create_stripe_intent))
        .route("/paystack/initialize", post(initialize_paystack))
        .route("/verify-payment", post(verify_payment))
}

#[utoipa::path(
    post,
    path = "/api/checkout/stripe/create-intent",
    request_body = PaymentSessionRequest,
    responses(
        (status = 200, description = "Stripe payment intent for the order total", body = ApiResponse<PaymentSession>),
        (status = 400, description = "Order already paid or not a Stripe order"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Stripe unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn create_stripe_intent(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PaymentSessionRequest>,
) -> AppResult<Json<ApiResponse<PaymentSession>>> {
    let resp = payment_service::create_payment_session(
        &state,
        &user,
        payload.order_id,
        PaymentProvider::Stripe,
    )
    .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/paystack/initialize",
    request_body = PaymentSessionRequest,
    responses(
        (status = 200, description = "Paystack transaction for the order total", body = ApiResponse<PaymentSession>),
        (status = 400, description = "Order already paid or not a Paystack order"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Paystack unavailable"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn initialize_paystack(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<PaymentSessionRequest>,
) -> AppResult<Json<ApiResponse<PaymentSession>>> {
    let resp = payment_service::create_payment_session(
        &state,
        &user,
        payload.order_id,
        PaymentProvider::Paystack,
    )
    .await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/checkout/verify-payment",
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Verification result and current order state", body = ApiResponse<VerifyPaymentResponse>),
        (status = 400, description = "Unknown provider or bad reference"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Provider unavailable; order unchanged"),
    ),
    security(("bearer_auth" = [])),
    tag = "Checkout"
)]
pub async fn verify_payment(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<VerifyPaymentRequest>,
) -> AppResult<Json<ApiResponse<VerifyPaymentResponse>>> {
    let resp = payment_service::verify_payment(&state, payload).await?;
    Ok(Json(resp))
}
