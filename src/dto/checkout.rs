use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::orders::OrderWithItems;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentSessionRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub order_id: Uuid,
    /// Provider tag, case-insensitive (`stripe`, `paystack`).
    pub provider: String,
    /// Payment intent id or transaction reference, depending on the provider.
    pub reference: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyPaymentResponse {
    /// Whether the provider confirmed the payment on this call.
    pub verified: bool,
    #[serde(flatten)]
    pub order: OrderWithItems,
}
