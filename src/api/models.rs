use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::orders::models::{LineItem, Order, TransactionRecord};

// ========== REQUEST MODELS ==========

/// Host-store integration: register an order with the gateway before
/// checkout is started for it.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(range(min = 1))]
    pub id: u64,
    #[validate(length(min = 3, max = 3))]
    pub currency: String,
    #[validate(length(min = 1))]
    pub items: Vec<LineItem>,
    #[validate(length(min = 1))]
    pub customer_name: String,
    #[validate(email)]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: String,
}

impl From<CreateOrderRequest> for Order {
    fn from(request: CreateOrderRequest) -> Self {
        Order::new(
            request.id,
            request.currency,
            request.items,
            request.customer_name,
            request.customer_email,
            request.customer_phone,
        )
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct VendorAccountRequest {
    #[validate(length(min = 1))]
    pub account_name: String,
    #[validate(length(min = 1))]
    pub account_number: String,
    #[validate(length(min = 1))]
    pub bank_code: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(range(min = 1))]
    pub order_id: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyCodeRequest {
    #[validate(range(min = 1))]
    pub order_id: u64,
    #[validate(length(min = 1))]
    pub code: String,
}

// ========== RESPONSE MODELS ==========

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub payment_link: String,
    pub transaction_reference: String,
}

/// Transaction status after an escrow code was applied, provider-cased.
#[derive(Debug, Serialize)]
pub struct ApplyCodeResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct OrderDetailResponse {
    pub order: Order,
    pub transaction: Option<TransactionRecord>,
}

/// Webhook acknowledgement body; paired with 200 or 202 depending on the
/// outcome.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: String,
    pub message: String,
}

impl WebhookAck {
    pub fn success(message: &str) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
}
