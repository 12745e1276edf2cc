use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        cart::{AddToCartRequest, UpdateQuantityQuery},
        checkout::{PaymentSessionRequest, VerifyPaymentRequest, VerifyPaymentResponse},
        orders::{OrderList, OrderWithItems, PlaceOrderQuery, UpdateStatusQuery},
    },
    models::{
        Cart, CartItem, Customer, Order, OrderItem, OrderStatus, PaymentProvider, PaymentStatus,
        Product,
    },
    payments::PaymentSession,
    response::{ApiResponse, Meta},
    routes::{admin, cart, checkout, health, orders, params},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        cart::get_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::clear_cart,
        orders::place_order,
        orders::list_orders,
        orders::get_order,
        admin::list_all_orders,
        admin::get_order_admin,
        admin::update_order_status,
        checkout::create_stripe_intent,
        checkout::initialize_paystack,
        checkout::verify_payment
    ),
    components(
        schemas(
            Product,
            Customer,
            Cart,
            CartItem,
            Order,
            OrderItem,
            OrderStatus,
            PaymentStatus,
            PaymentProvider,
            PaymentSession,
            AddToCartRequest,
            UpdateQuantityQuery,
            PlaceOrderQuery,
            UpdateStatusQuery,
            PaymentSessionRequest,
            VerifyPaymentRequest,
            VerifyPaymentResponse,
            OrderList,
            OrderWithItems,
            params::Pagination,
            params::OrderListQuery,
            health::HealthData,
            Meta,
            ApiResponse<Cart>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<Order>,
            ApiResponse<PaymentSession>,
            ApiResponse<VerifyPaymentResponse>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Admin", description = "Admin endpoints"),
        (name = "Checkout", description = "Payment session and verification endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
