//! Payment session creation and verification.
//!
//! Only a successful provider verification moves an order's payment status from
//! `pending` to `completed`. Verification is idempotent: replays rewrite the
//! same state and the confirmation notification goes out once.
//!
//! Sessions and verification go to whichever provider the request names. The
//! provider chosen at checkout is a preference; the one that settles the
//! payment is what the order records.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, EntityTrait, QuerySelect, Set, TransactionTrait, sea_query::LockType,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::checkout::{VerifyPaymentRequest, VerifyPaymentResponse},
    entity::orders::{ActiveModel as OrderActive, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{PaymentProvider, PaymentStatus},
    notifier::{self, Notification, NotificationKind},
    payments::{PaymentInit, PaymentSession},
    response::ApiResponse,
    services::order_service::{load_order, order_from_entity, parse_provider},
    state::AppState,
};

const MAX_REFERENCE_LEN: usize = 128;

/// Opens a payment with `provider` for the order's fixed total.
pub async fn create_payment_session(
    state: &AppState,
    user: &AuthUser,
    order_id: Uuid,
    provider: PaymentProvider,
) -> AppResult<ApiResponse<PaymentSession>> {
    let order = load_order(&state.orm, order_id).await?.order;

    if order.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "order belongs to another customer".into(),
        ));
    }
    if order.payment_status == PaymentStatus::Completed {
        return Err(AppError::validation(format!(
            "order {} is already paid",
            order.order_number
        )));
    }
    if !order.total_amount.is_positive() {
        return Err(AppError::validation("order total must be greater than zero"));
    }

    let gateway = state.gateways.get(provider)?;
    let session = gateway
        .initialize(&PaymentInit {
            order_number: order.order_number.clone(),
            email: order.customer_email.clone(),
            amount: order.total_amount,
            currency: order.currency.clone(),
        })
        .await?;

    tracing::info!(
        order_id = %order.id,
        %provider,
        reference = %session.reference,
        "payment session created"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "payment_session_created",
        "orders",
        json!({ "order_id": order.id, "provider": provider, "reference": session.reference }),
    )
    .await;

    Ok(ApiResponse::single("Payment session created", session))
}

pub async fn verify_payment(
    state: &AppState,
    payload: VerifyPaymentRequest,
) -> AppResult<ApiResponse<VerifyPaymentResponse>> {
    let order = load_order(&state.orm, payload.order_id).await?.order;
    let provider = parse_provider(&payload.provider)?;
    let reference = validate_reference(&payload.reference)?;

    let gateway = state.gateways.get(provider)?;
    let settled = gateway.verify(reference).await?;

    if !settled {
        tracing::info!(order_id = %order.id, %provider, reference, "payment not settled");
        let order = load_order(&state.orm, order.id).await?;
        return Ok(ApiResponse::single(
            "Payment not verified",
            VerifyPaymentResponse {
                verified: false,
                order,
            },
        ));
    }

    let completed = mark_completed(state, order.id, provider, reference).await?;
    let order = load_order(&state.orm, order.id).await?;

    if completed {
        audit::record(
            &state.orm,
            Some(order.order.user_id),
            "payment_completed",
            "orders",
            json!({ "order_id": order.order.id, "provider": provider, "reference": reference }),
        )
        .await;
        notifier::dispatch(
            &state.notifier,
            Notification::new(
                NotificationKind::OrderConfirmation,
                order.order.customer_email.clone(),
                json!({
                    "customer_name": order.order.customer_name,
                    "order_number": order.order.order_number,
                    "total_amount": order.order.total_amount,
                    "currency": order.order.currency,
                    "items": order.items,
                }),
            ),
        );
    }

    Ok(ApiResponse::single(
        "Payment verified",
        VerifyPaymentResponse {
            verified: true,
            order,
        },
    ))
}

/// Applies a confirmed payment under the order row lock. Returns `true` only for
/// the call that actually moved the order out of `pending`.
async fn mark_completed(
    state: &AppState,
    order_id: Uuid,
    provider: PaymentProvider,
    reference: &str,
) -> AppResult<bool> {
    let txn = state.orm.begin().await?;

    let existing = Orders::find_by_id(order_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;
    let current = order_from_entity(existing.clone())?;

    let completed = match current.payment_status {
        PaymentStatus::Pending => {
            let now = Utc::now();
            let mut active: OrderActive = existing.into();
            active.payment_status = Set(PaymentStatus::Completed.as_str().into());
            active.payment_provider = Set(provider.as_str().into());
            active.payment_reference = Set(Some(reference.to_string()));
            active.paid_at = Set(Some(now.into()));
            active.updated_at = Set(now.into());
            active.update(&txn).await?;
            true
        }
        PaymentStatus::Completed if current.payment_reference.as_deref() == Some(reference) => {
            let mut active: OrderActive = existing.into();
            active.payment_status = Set(PaymentStatus::Completed.as_str().into());
            active.payment_reference = Set(Some(reference.to_string()));
            active.update(&txn).await?;
            false
        }
        PaymentStatus::Completed => {
            tracing::warn!(
                order_id = %current.id,
                stored = ?current.payment_reference,
                reference,
                "order already paid under another reference"
            );
            false
        }
        PaymentStatus::Failed => {
            return Err(AppError::validation(format!(
                "payment for order {} has failed",
                current.order_number
            )));
        }
    };

    txn.commit().await?;
    Ok(completed)
}

/// References are interpolated into provider URLs, so only a conservative
/// character set is accepted.
fn validate_reference(reference: &str) -> AppResult<&str> {
    let reference = reference.trim();
    let valid = !reference.is_empty()
        && !reference.starts_with('.')
        && reference.len() <= MAX_REFERENCE_LEN
        && reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(AppError::validation("invalid payment reference"));
    }
    Ok(reference)
}
