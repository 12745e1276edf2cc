use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Order, OrderItem};

/// Both fields arrive as query parameters on `POST /orders`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PlaceOrderQuery {
    pub shipping_address: String,
    /// `stripe` or `paystack`, any case.
    pub payment_provider: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusQuery {
    pub status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct OrderList {
    #[schema(value_type = Vec<Order>)]
    pub items: Vec<Order>,
}
