mod common;

use common::{create_admin, create_customer, create_product, setup};
use storefront_checkout::{
    dto::{
        cart::AddToCartRequest,
        orders::{PlaceOrderQuery, UpdateStatusQuery},
    },
    error::AppError,
    models::OrderStatus,
    notifier::NotificationKind,
    routes::params::OrderListQuery,
    services::{admin_service, cart_service, order_service},
};
use uuid::Uuid;

fn to(status: &str) -> UpdateStatusQuery {
    UpdateStatusQuery {
        status: status.into(),
    }
}

#[tokio::test]
async fn lifecycle_is_enforced_and_customers_are_told() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_admin(&app.state).await?;
    let user = create_customer(&app.state, "grace@example.com").await?;
    let mug = create_product(&app.state, "Ferris Mug", 499, true).await?;

    cart_service::add_item(
        &app.state,
        &user,
        AddToCartRequest {
            product_id: mug,
            quantity: 1,
        },
    )
    .await?;
    let order = order_service::place_order(
        &app.state,
        &user,
        PlaceOrderQuery {
            shipping_address: "1 Main St".into(),
            payment_provider: "stripe".into(),
        },
    )
    .await?
    .data
    .unwrap()
    .order;

    let err = admin_service::update_order_status(&app.state, &admin, order.id, to("shipped"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    for (next, expected) in [
        ("PROCESSING", OrderStatus::Processing),
        ("shipped", OrderStatus::Shipped),
        ("delivered", OrderStatus::Delivered),
    ] {
        let updated = admin_service::update_order_status(&app.state, &admin, order.id, to(next))
            .await?
            .data
            .unwrap();
        assert_eq!(updated.status, expected);
    }

    let err = admin_service::update_order_status(&app.state, &admin, order.id, to("cancelled"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("already delivered"));

    let updates = app
        .notifier
        .wait_for(NotificationKind::OrderStatusUpdate, 3)
        .await;
    assert_eq!(updates.len(), 3);
    assert!(updates.iter().all(|n| n.recipient == "grace@example.com"));
    assert!(
        updates
            .iter()
            .any(|n| n.data["status"] == "delivered" && n.data["previous_status"] == "shipped")
    );
    Ok(())
}

#[tokio::test]
async fn status_changes_need_an_admin_and_a_real_order() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_admin(&app.state).await?;
    let user = create_customer(&app.state, "grace@example.com").await?;

    let err = admin_service::update_order_status(&app.state, &user, Uuid::new_v4(), to("shipped"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = admin_service::update_order_status(&app.state, &admin, Uuid::new_v4(), to("shipped"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    let err = admin_service::list_all_orders(&app.state, &user, OrderListQuery::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn admin_lists_every_order_with_status_filter() -> anyhow::Result<()> {
    let app = setup().await?;
    let admin = create_admin(&app.state).await?;
    let mug = create_product(&app.state, "Ferris Mug", 499, true).await?;

    let mut orders = Vec::new();
    for email in ["a@example.com", "b@example.com"] {
        let user = create_customer(&app.state, email).await?;
        cart_service::add_item(
            &app.state,
            &user,
            AddToCartRequest {
                product_id: mug,
                quantity: 1,
            },
        )
        .await?;
        let order = order_service::place_order(
            &app.state,
            &user,
            PlaceOrderQuery {
                shipping_address: "1 Main St".into(),
                payment_provider: "paystack".into(),
            },
        )
        .await?
        .data
        .unwrap()
        .order;
        orders.push(order.id);
    }

    admin_service::update_order_status(&app.state, &admin, orders[0], to("cancelled")).await?;

    let all = admin_service::list_all_orders(&app.state, &admin, OrderListQuery::default())
        .await?
        .data
        .unwrap();
    assert_eq!(all.items.len(), 2);

    let cancelled = admin_service::list_all_orders(
        &app.state,
        &admin,
        OrderListQuery {
            status: Some("Cancelled".into()),
            ..OrderListQuery::default()
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(cancelled.items.len(), 1);
    assert_eq!(cancelled.items[0].id, orders[0]);

    let err = admin_service::list_all_orders(
        &app.state,
        &admin,
        OrderListQuery {
            status: Some("lost".into()),
            ..OrderListQuery::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let detail = admin_service::get_order(&app.state, &admin, orders[1])
        .await?
        .data
        .unwrap();
    assert_eq!(detail.items.len(), 1);
    Ok(())
}
