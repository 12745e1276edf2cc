use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
    sea_query::{LockType, OnConflict},
};
use serde_json::json;
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::AddToCartRequest,
    entity::{
        cart_items::{
            ActiveModel as CartItemActive, Column as CartItemCol, Entity as CartItems,
            Model as CartItemModel,
        },
        carts::{ActiveModel as CartActive, Column as CartCol, Entity as Carts, Model as CartModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Cart, CartItem},
    money::Money,
    response::ApiResponse,
    services::catalog,
    state::AppState,
};

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Cart>> {
    let txn = state.orm.begin().await?;
    let cart = get_or_create_cart(&txn, user.user_id, false).await?;
    let view = cart_view(&txn, &cart).await?;
    txn.commit().await?;

    Ok(ApiResponse::single("Ok", view))
}

pub async fn add_item(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<Cart>> {
    if payload.quantity <= 0 {
        return Err(AppError::validation("quantity must be greater than zero"));
    }

    let txn = state.orm.begin().await?;

    let product = catalog::find_product(&txn, payload.product_id)
        .await?
        .ok_or_else(|| AppError::not_found("product"))?;
    if !product.is_active {
        return Err(AppError::validation(format!(
            "product {} is not available",
            product.slug
        )));
    }

    let cart = get_or_create_cart(&txn, user.user_id, true).await?;
    let now = Utc::now();

    let existing = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .filter(CartItemCol::ProductId.eq(product.id))
        .one(&txn)
        .await?;

    let quantity = match existing {
        Some(item) => {
            let quantity = item
                .quantity
                .checked_add(payload.quantity)
                .ok_or_else(|| AppError::validation("quantity is too large"))?;
            // Adding again re-syncs the unit price with the catalog.
            let mut active: CartItemActive = item.into();
            active.quantity = Set(quantity);
            active.price = Set(product.price.minor());
            active.updated_at = Set(now.into());
            active.update(&txn).await?;
            quantity
        }
        None => {
            CartItemActive {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product.id),
                quantity: Set(payload.quantity),
                price: Set(product.price.minor()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            }
            .insert(&txn)
            .await?;
            payload.quantity
        }
    };

    let cart = touch_cart(&txn, cart).await?;
    let view = cart_view(&txn, &cart).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_add_item",
        "cart",
        json!({ "cart_id": cart.id, "product_id": product.id, "quantity": quantity }),
    )
    .await;

    Ok(ApiResponse::single("Item added to cart", view))
}

pub async fn set_item_quantity(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
    quantity: i32,
) -> AppResult<ApiResponse<Cart>> {
    let txn = state.orm.begin().await?;
    let cart = get_or_create_cart(&txn, user.user_id, true).await?;
    let item = owned_item(&txn, &cart, item_id).await?;

    if quantity <= 0 {
        CartItems::delete_by_id(item.id).exec(&txn).await?;
    } else {
        let mut active: CartItemActive = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now().into());
        active.update(&txn).await?;
    }

    let cart = touch_cart(&txn, cart).await?;
    let view = cart_view(&txn, &cart).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_update_item",
        "cart",
        json!({ "cart_id": cart.id, "item_id": item_id, "quantity": quantity.max(0) }),
    )
    .await;

    Ok(ApiResponse::single("Cart updated", view))
}

pub async fn remove_item(
    state: &AppState,
    user: &AuthUser,
    item_id: Uuid,
) -> AppResult<ApiResponse<Cart>> {
    let txn = state.orm.begin().await?;
    let cart = get_or_create_cart(&txn, user.user_id, true).await?;
    let item = owned_item(&txn, &cart, item_id).await?;

    CartItems::delete_by_id(item.id).exec(&txn).await?;

    let cart = touch_cart(&txn, cart).await?;
    let view = cart_view(&txn, &cart).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_remove_item",
        "cart",
        json!({ "cart_id": cart.id, "item_id": item_id }),
    )
    .await;

    Ok(ApiResponse::single("Item removed from cart", view))
}

pub async fn clear_cart(state: &AppState, user: &AuthUser) -> AppResult<()> {
    let txn = state.orm.begin().await?;
    let cart = get_or_create_cart(&txn, user.user_id, true).await?;

    let removed = CartItems::delete_many()
        .filter(CartItemCol::CartId.eq(cart.id))
        .exec(&txn)
        .await?;

    let cart = touch_cart(&txn, cart).await?;
    txn.commit().await?;

    audit::record(
        &state.orm,
        Some(user.user_id),
        "cart_clear",
        "cart",
        json!({ "cart_id": cart.id, "removed": removed.rows_affected }),
    )
    .await;

    Ok(())
}

/// Returns the customer's single cart, creating it on first use.
///
/// The insert is a no-op when another request created the cart first, so two
/// racing callers always end up on the same row. With `lock` set the row is
/// selected `FOR UPDATE`, serializing mutations of one cart for the rest of
/// the transaction.
pub(crate) async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    lock: bool,
) -> AppResult<CartModel> {
    let now = Utc::now();
    Carts::insert(CartActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        last_reminder_sent_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    })
    .on_conflict(OnConflict::column(CartCol::UserId).do_nothing().to_owned())
    .exec_without_returning(conn)
    .await?;

    let mut finder = Carts::find().filter(CartCol::UserId.eq(user_id));
    if lock {
        finder = finder.lock(LockType::Update);
    }
    finder
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("cart"))
}

async fn owned_item<C: ConnectionTrait>(
    conn: &C,
    cart: &CartModel,
    item_id: Uuid,
) -> AppResult<CartItemModel> {
    let item = CartItems::find_by_id(item_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::not_found("cart item"))?;

    if item.cart_id != cart.id {
        return Err(AppError::Forbidden(
            "cart item belongs to another customer".into(),
        ));
    }
    Ok(item)
}

pub(crate) async fn touch_cart<C: ConnectionTrait>(conn: &C, cart: CartModel) -> AppResult<CartModel> {
    let mut active: CartActive = cart.into();
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

async fn cart_view<C: ConnectionTrait>(conn: &C, cart: &CartModel) -> AppResult<Cart> {
    let rows = CartItems::find()
        .filter(CartItemCol::CartId.eq(cart.id))
        .order_by_asc(CartItemCol::CreatedAt)
        .order_by_asc(CartItemCol::Id)
        .all(conn)
        .await?;

    let products = catalog::find_products(conn, rows.iter().map(|row| row.product_id)).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        let price = Money::from_minor(row.price);
        let subtotal = price
            .checked_times(row.quantity)
            .ok_or_else(|| AppError::validation("cart line total is too large"))?;
        let product = products.get(&row.product_id);
        items.push(CartItem {
            id: row.id,
            product_id: row.product_id,
            product_name: product.map(|p| p.name.clone()).unwrap_or_default(),
            product_slug: product.map(|p| p.slug.clone()).unwrap_or_default(),
            product_image_url: product.and_then(|p| p.image_url.clone()),
            price,
            quantity: row.quantity,
            subtotal,
        });
    }

    let total_amount = Money::checked_sum(items.iter().map(|item| item.subtotal))
        .ok_or_else(|| AppError::validation("cart total is too large"))?;

    Ok(Cart {
        id: cart.id,
        items,
        total_amount,
        updated_at: cart.updated_at.with_timezone(&Utc),
    })
}
