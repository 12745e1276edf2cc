use std::str::FromStr;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait, sea_query::LockType,
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{OrderList, OrderWithItems, PlaceOrderQuery},
    entity::{
        cart_items::{Column as CartItemCol, Entity as CartItems},
        carts::{Column as CartCol, Entity as Carts},
        order_items::{
            ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems,
            Model as OrderItemModel,
        },
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem, OrderStatus, PaymentProvider, PaymentStatus, UnknownVariant},
    money::Money,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::{cart_service, catalog},
    state::AppState,
};

/// Turns the caller's cart into a pending order in one transaction.
///
/// The cart row is locked for the whole checkout, so concurrent cart edits
/// either land before the snapshot or after the cart has been emptied.
pub async fn place_order(
    state: &AppState,
    user: &AuthUser,
    query: PlaceOrderQuery,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let shipping_address = query.shipping_address.trim();
    if shipping_address.is_empty() {
        return Err(AppError::validation("shipping address is required"));
    }
    let provider = parse_provider(&query.payment_provider)?;

    let txn = state.orm.begin().await?;

    let customer = catalog::find_customer_by_email(&txn, &user.email)
        .await?
        .ok_or_else(|| AppError::not_found("customer"))?;
    if customer.id != user.user_id {
        return Err(AppError::Forbidden(
            "token does not match the customer record".into(),
        ));
    }

    let cart = Carts::find()
        .filter(CartCol::UserId.eq(customer.id))
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::not_found("cart"))?;

    let lines = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .order_by_asc(CartItemCol::Id)
        .all(&txn)
        .await?;
    if lines.is_empty() {
        return Err(AppError::validation("cart is empty"));
    }

    let products = catalog::find_products(&txn, lines.iter().map(|line| line.product_id)).await?;

    let mut subtotals = Vec::with_capacity(lines.len());
    for line in &lines {
        if !products.contains_key(&line.product_id) {
            return Err(AppError::validation(format!(
                "product {} is no longer available",
                line.product_id
            )));
        }
        let subtotal = Money::from_minor(line.price)
            .checked_times(line.quantity)
            .ok_or_else(|| AppError::validation("order line total is too large"))?;
        subtotals.push(subtotal);
    }
    let total_amount = Money::checked_sum(subtotals.iter().copied())
        .ok_or_else(|| AppError::validation("order total is too large"))?;

    let now = Utc::now();
    let order_id = Uuid::new_v4();

    let order = OrderActive {
        id: Set(order_id),
        order_number: Set(build_order_number(order_id, now)),
        user_id: Set(customer.id),
        customer_name: Set(customer.full_name()),
        customer_email: Set(customer.email.clone()),
        total_amount: Set(total_amount.minor()),
        currency: Set(state.gateways.currency().to_string()),
        status: Set(OrderStatus::Pending.as_str().into()),
        payment_provider: Set(provider.as_str().into()),
        payment_status: Set(PaymentStatus::Pending.as_str().into()),
        payment_reference: Set(None),
        shipping_address: Set(shipping_address.to_string()),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let name = products
            .get(&line.product_id)
            .map(|product| product.name.clone())
            .unwrap_or_default();
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(Some(line.product_id)),
            product_name: Set(name),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;
        items.push(order_item_from_entity(item)?);
    }

    CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;
    cart_service::touch_cart(&txn, cart).await?;

    txn.commit().await?;

    let order = order_from_entity(order)?;
    tracing::info!(
        order_id = %order.id,
        order_number = %order.order_number,
        total = %order.total_amount,
        provider = %order.payment_provider,
        "order placed"
    );
    audit::record(
        &state.orm,
        Some(user.user_id),
        "order_placed",
        "orders",
        json!({ "order_id": order.id, "order_number": order.order_number }),
    )
    .await;

    Ok(ApiResponse::single(
        "Order placed",
        OrderWithItems { order, items },
    ))
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let finder = Orders::find().filter(OrderCol::UserId.eq(user.user_id));
    list_page(&state.orm, finder, &query).await
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = load_order(&state.orm, id).await?;
    if order.order.user_id != user.user_id && !user.is_admin() {
        return Err(AppError::Forbidden(
            "order belongs to another customer".into(),
        ));
    }
    Ok(ApiResponse::single("Ok", order))
}

/// Newest-first page of orders, optionally narrowed to one status.
pub(crate) async fn list_page<C: ConnectionTrait>(
    conn: &C,
    finder: Select<Orders>,
    query: &OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let mut condition = Condition::all();
    if let Some(status) = query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        condition = condition.add(OrderCol::Status.eq(parse_status(status)?.as_str()));
    }
    let finder = finder
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id);

    let total = finder.clone().count(conn).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(conn)
        .await?
        .into_iter()
        .map(order_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ApiResponse::paged(
        "Ok",
        OrderList { items: orders },
        page,
        limit,
        total,
    ))
}

pub(crate) async fn load_order<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<OrderWithItems> {
    let order = Orders::find_by_id(id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("order"))?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .order_by_asc(OrderItemCol::Id)
        .all(conn)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(OrderWithItems {
        order: order_from_entity(order)?,
        items,
    })
}

pub(crate) fn parse_provider(value: &str) -> AppResult<PaymentProvider> {
    value
        .parse()
        .map_err(|_| AppError::validation(format!("unsupported payment provider '{}'", value.trim())))
}

pub(crate) fn parse_status(value: &str) -> AppResult<OrderStatus> {
    value
        .parse()
        .map_err(|_| AppError::validation(format!("invalid order status '{}'", value.trim())))
}

pub(crate) fn order_from_entity(model: OrderModel) -> AppResult<Order> {
    Ok(Order {
        id: model.id,
        status: stored(&model.status, "orders.status")?,
        payment_provider: stored(&model.payment_provider, "orders.payment_provider")?,
        payment_status: stored(&model.payment_status, "orders.payment_status")?,
        order_number: model.order_number,
        user_id: model.user_id,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        total_amount: Money::from_minor(model.total_amount),
        currency: model.currency,
        payment_reference: model.payment_reference,
        shipping_address: model.shipping_address,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

fn order_item_from_entity(model: OrderItemModel) -> AppResult<OrderItem> {
    let price = Money::from_minor(model.price);
    let subtotal = price
        .checked_times(model.quantity)
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("order item {} overflows", model.id)))?;
    Ok(OrderItem {
        id: model.id,
        order_id: model.order_id,
        product_id: model.product_id,
        product_name: model.product_name,
        price,
        quantity: model.quantity,
        subtotal,
    })
}

/// Stored enum columns are written by this crate; anything else is corruption.
fn stored<T: FromStr<Err = UnknownVariant>>(value: &str, column: &str) -> AppResult<T> {
    value
        .parse()
        .map_err(|err: UnknownVariant| AppError::Internal(anyhow::anyhow!("{column}: {err}")))
}

fn build_order_number(order_id: Uuid, at: DateTime<Utc>) -> String {
    let suffix = order_id.simple().to_string();
    format!(
        "ORD-{}-{}",
        at.format("%Y%m%d"),
        suffix[..8].to_ascii_uppercase()
    )
}
