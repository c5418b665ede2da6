use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::settlement::models::VendorId;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Processing,
    OnHold,
    Completed,
    Cancelled,
    Failed,
}

/// One purchasable row of an order. Shipping is carried as a line item with
/// no vendor so it stays visible in the broker transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub vendor: Option<VendorId>,
}

impl LineItem {
    pub fn extended_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderNote {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub currency: String,
    pub items: Vec<LineItem>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub status: OrderStatus,
    pub notes: Vec<OrderNote>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        id: u64,
        currency: String,
        items: Vec<LineItem>,
        customer_name: String,
        customer_email: String,
        customer_phone: String,
    ) -> Self {
        Self {
            id,
            currency,
            items,
            customer_name,
            customer_email,
            customer_phone,
            status: OrderStatus::Pending,
            notes: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// Persisted escrow transaction state for one order.
///
/// Created when the broker transaction is started; mutated only by the
/// webhook reconciler; never deleted (audit trail).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub order_id: u64,
    /// Our transaction reference, also echoed back by the broker.
    pub transaction_id: String,
    /// Canonical secondary identifier assigned asynchronously by the broker.
    pub transaction_number: Option<String>,
    /// Raw broker status string, provider-cased.
    pub status: String,
    pub escrow_code: Option<String>,
    pub in_dispute: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn new(order_id: u64, transaction_id: String) -> Self {
        let now = Utc::now();
        Self {
            order_id,
            transaction_id,
            transaction_number: None,
            status: "Pending".to_string(),
            escrow_code: None,
            in_dispute: false,
            created_at: now,
            updated_at: now,
        }
    }
}
