use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, EntityTrait, QuerySelect, Set, TransactionTrait, sea_query::LockType,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, OrderWithItems, UpdateStatusQuery},
    entity::orders::{ActiveModel as OrderActive, Entity as Orders},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Order,
    notifier::{self, Notification, NotificationKind},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service::{list_page, load_order, order_from_entity, parse_status},
    state::AppState,
    workflow,
};

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    list_page(&state.orm, Orders::find(), &query).await
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = load_order(&state.orm, id).await?;
    Ok(ApiResponse::single("Ok", order))
}

/// Moves an order along its lifecycle. The row is locked so two admins cannot
/// both apply a transition from the same starting state.
pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    query: UpdateStatusQuery,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let existing = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;

    let next = parse_status(&query.status)?;
    let current = order_from_entity(existing.clone())?.status;
    workflow::ensure_transition(current, next)?;

    let mut active: OrderActive = existing.into();
    active.status = Set(next.as_str().into());
    active.updated_at = Set(Utc::now().into());
    let order = order_from_entity(active.update(&txn).await?)?;

    txn.commit().await?;

    tracing::info!(
        order_id = %order.id,
        from = %current,
        to = %next,
        "order status changed"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_status_changed",
        "orders",
        json!({ "order_id": order.id, "from": current, "to": next }),
    )
    .await;

    notifier::dispatch(
        &state.notifier,
        Notification::new(
            NotificationKind::OrderStatusUpdate,
            order.customer_email.clone(),
            json!({
                "customer_name": order.customer_name,
                "order_number": order.order_number,
                "previous_status": current,
                "status": next,
            }),
        ),
    );

    Ok(ApiResponse::single("Order status updated", order))
}
