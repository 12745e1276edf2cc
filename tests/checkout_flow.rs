mod common;

use common::{create_customer, create_product, create_user, setup};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use storefront_checkout::{
    dto::{cart::AddToCartRequest, orders::PlaceOrderQuery},
    entity::{
        order_items::Entity as OrderItems,
        orders::Entity as Orders,
        products::{ActiveModel as ProductActive, Entity as Products},
    },
    error::AppError,
    models::{OrderStatus, PaymentProvider, PaymentStatus},
    money::Money,
    routes::params::OrderListQuery,
    services::{cart_service, order_service},
};
use uuid::Uuid;

fn query(provider: &str) -> PlaceOrderQuery {
    PlaceOrderQuery {
        shipping_address: "12 Harbour Road, Lagos".into(),
        payment_provider: provider.into(),
    }
}

#[tokio::test]
async fn checkout_snapshots_cart_into_pending_order() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_user(&app.state, "grace@example.com", "Grace", "Hopper", "customer").await?;
    let mug = create_product(&app.state, "Ferris Mug", 499, true).await?;
    let stickers = create_product(&app.state, "Sticker Pack", 349, true).await?;

    for (product_id, quantity) in [(mug, 2), (stickers, 1)] {
        cart_service::add_item(
            &app.state,
            &user,
            AddToCartRequest {
                product_id,
                quantity,
            },
        )
        .await?;
    }

    let placed = order_service::place_order(&app.state, &user, query("STRIPE"))
        .await?
        .data
        .unwrap();
    let order = &placed.order;

    assert_eq!(order.total_amount, Money::from_minor(1347));
    assert_eq!(order.total_amount.to_string(), "13.47");
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.payment_provider, PaymentProvider::Stripe);
    assert_eq!(order.customer_name, "Grace Hopper");
    assert_eq!(order.customer_email, "grace@example.com");
    assert_eq!(order.currency, "usd");
    assert_eq!(order.shipping_address, "12 Harbour Road, Lagos");
    assert!(order.payment_reference.is_none());
    assert!(order.order_number.starts_with("ORD-"));

    assert_eq!(placed.items.len(), 2);
    let mug_line = placed.items.iter().find(|i| i.product_id == Some(mug)).unwrap();
    assert_eq!(mug_line.product_name, "Ferris Mug");
    assert_eq!(mug_line.quantity, 2);
    assert_eq!(mug_line.price, Money::from_minor(499));
    assert_eq!(mug_line.subtotal, Money::from_minor(998));

    let cart = cart_service::get_cart(&app.state, &user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    Ok(())
}

#[tokio::test]
async fn empty_or_missing_cart_creates_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_customer(&app.state, "grace@example.com").await?;

    let err = order_service::place_order(&app.state, &user, query("stripe"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    cart_service::get_cart(&app.state, &user).await?;
    let err = order_service::place_order(&app.state, &user, query("stripe"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.to_string(), "cart is empty");

    assert_eq!(Orders::find().count(&app.state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn checkout_validates_address_and_provider() -> anyhow::Result<()> {
    let app = setup().await?;
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

    let err = order_service::place_order(
        &app.state,
        &user,
        PlaceOrderQuery {
            shipping_address: "   ".into(),
            payment_provider: "stripe".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = order_service::place_order(&app.state, &user, query("paypal"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    // Failed attempts leave the cart as it was.
    let cart = cart_service::get_cart(&app.state, &user).await?.data.unwrap();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(Orders::find().count(&app.state.orm).await?, 0);
    Ok(())
}

#[tokio::test]
async fn order_total_ignores_later_price_changes() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_customer(&app.state, "grace@example.com").await?;
    let mug = create_product(&app.state, "Ferris Mug", 499, true).await?;
    cart_service::add_item(
        &app.state,
        &user,
        AddToCartRequest {
            product_id: mug,
            quantity: 2,
        },
    )
    .await?;

    let order = order_service::place_order(&app.state, &user, query("paystack"))
        .await?
        .data
        .unwrap()
        .order;

    let mut product: ProductActive = Products::find_by_id(mug)
        .one(&app.state.orm)
        .await?
        .unwrap()
        .into();
    product.price = Set(10_000);
    product.name = Set("Golden Ferris Mug".into());
    product.update(&app.state.orm).await?;

    let reloaded = order_service::get_order(&app.state, &user, order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(reloaded.order.total_amount, Money::from_minor(998));
    assert_eq!(reloaded.items[0].price, Money::from_minor(499));
    assert_eq!(reloaded.items[0].product_name, "Ferris Mug");
    Ok(())
}

#[tokio::test]
async fn orders_are_listed_newest_first_and_private() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_customer(&app.state, "grace@example.com").await?;
    let other = create_customer(&app.state, "other@example.com").await?;
    let mug = create_product(&app.state, "Ferris Mug", 499, true).await?;

    let mut placed = Vec::new();
    for quantity in [1, 2] {
        cart_service::add_item(
            &app.state,
            &user,
            AddToCartRequest {
                product_id: mug,
                quantity,
            },
        )
        .await?;
        let order = order_service::place_order(&app.state, &user, query("stripe"))
            .await?
            .data
            .unwrap()
            .order;
        placed.push(order.id);
    }

    let listed = order_service::list_orders(&app.state, &user, OrderListQuery::default()).await?;
    let meta = listed.meta.clone().unwrap();
    let ids: Vec<_> = listed.data.unwrap().items.iter().map(|o| o.id).collect();
    assert_eq!(ids, vec![placed[1], placed[0]]);
    assert_eq!(meta.total, Some(2));

    let theirs = order_service::list_orders(&app.state, &other, OrderListQuery::default())
        .await?
        .data
        .unwrap();
    assert!(theirs.items.is_empty());

    let err = order_service::get_order(&app.state, &other, placed[0])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    Ok(())
}

#[tokio::test]
async fn huge_page_numbers_return_an_empty_page() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_customer(&app.state, "grace@example.com").await?;

    let listed = order_service::list_orders(
        &app.state,
        &user,
        OrderListQuery {
            page: Some(i64::MAX),
            per_page: Some(20),
            status: None,
        },
    )
    .await?;
    assert!(listed.data.unwrap().items.is_empty());
    assert_eq!(listed.meta.unwrap().page, Some(i64::MAX));
    Ok(())
}

// The in-memory SQLite pool holds a single connection, so the transactions
// below run one after another and the interleaving happens at await points.
// On Postgres the cart row lock (`SELECT ... FOR UPDATE`) is what orders them.

#[tokio::test]
async fn checkout_racing_an_add_keeps_every_unit() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_customer(&app.state, "grace@example.com").await?;
    let mug = create_product(&app.state, "Ferris Mug", 499, true).await?;
    let stickers = create_product(&app.state, "Sticker Pack", 349, true).await?;
    cart_service::add_item(
        &app.state,
        &user,
        AddToCartRequest {
            product_id: mug,
            quantity: 2,
        },
    )
    .await?;

    let (placed, added) = tokio::join!(
        order_service::place_order(&app.state, &user, query("stripe")),
        cart_service::add_item(
            &app.state,
            &user,
            AddToCartRequest {
                product_id: stickers,
                quantity: 3,
            },
        ),
    );
    added?;
    let placed = placed?.data.unwrap();
    let cart = cart_service::get_cart(&app.state, &user).await?.data.unwrap();

    let ordered = |id: Uuid| {
        placed
            .items
            .iter()
            .filter(|i| i.product_id == Some(id))
            .map(|i| i.quantity)
            .sum::<i32>()
    };
    let carted = |id: Uuid| {
        cart.items
            .iter()
            .filter(|i| i.product_id == id)
            .map(|i| i.quantity)
            .sum::<i32>()
    };
    assert_eq!(ordered(mug), 2);
    assert_eq!(carted(mug), 0);
    assert_eq!(ordered(stickers) + carted(stickers), 3);
    assert!(ordered(stickers) == 0 || carted(stickers) == 0);

    let expected_total = Money::checked_sum(placed.items.iter().map(|i| i.subtotal)).unwrap();
    assert_eq!(placed.order.total_amount, expected_total);
    Ok(())
}

#[tokio::test]
async fn double_checkout_places_exactly_one_order() -> anyhow::Result<()> {
    let app = setup().await?;
    let user = create_customer(&app.state, "grace@example.com").await?;
    let mug = create_product(&app.state, "Ferris Mug", 499, true).await?;
    let stickers = create_product(&app.state, "Sticker Pack", 349, true).await?;
    for (product_id, quantity) in [(mug, 2), (stickers, 1)] {
        cart_service::add_item(
            &app.state,
            &user,
            AddToCartRequest {
                product_id,
                quantity,
            },
        )
        .await?;
    }

    let (first, second) = tokio::join!(
        order_service::place_order(&app.state, &user, query("stripe")),
        order_service::place_order(&app.state, &user, query("paystack")),
    );
    let (placed, err) = match (first, second) {
        (Ok(placed), Err(err)) | (Err(err), Ok(placed)) => (placed.data.unwrap(), err),
        (first, second) => panic!("expected one success, got {first:?} and {second:?}"),
    };
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(err.to_string(), "cart is empty");

    assert_eq!(Orders::find().count(&app.state.orm).await?, 1);
    assert_eq!(OrderItems::find().count(&app.state.orm).await?, 2);
    assert_eq!(placed.items.len(), 2);
    assert_eq!(placed.order.total_amount, Money::from_minor(1347));

    let cart = cart_service::get_cart(&app.state, &user).await?.data.unwrap();
    assert!(cart.items.is_empty());
    Ok(())
}
