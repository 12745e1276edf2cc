use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

/// `quantity <= 0` removes the line.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityQuery {
    pub quantity: i32,
}
