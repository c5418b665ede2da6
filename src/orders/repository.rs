use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::orders::models::{Order, OrderNote, OrderStatus, TransactionRecord};

/// Keyed store for orders and their escrow transaction records.
///
/// Stands in for the host store's order database behind the narrow
/// read/update surface the gateway needs: status transitions, audit notes
/// and transaction metadata lookups.
pub struct OrderRepository {
    orders: RwLock<HashMap<u64, Order>>,
    transactions: RwLock<HashMap<u64, TransactionRecord>>,
}

impl OrderRepository {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            transactions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create_order(&self, order: Order) -> AppResult<Order> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    pub async fn get_order(&self, order_id: u64) -> AppResult<Order> {
        let orders = self.orders.read().await;
        orders
            .get(&order_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))
    }

    pub async fn order_exists(&self, order_id: u64) -> bool {
        self.orders.read().await.contains_key(&order_id)
    }

    /// Move the order to `status` and append the accompanying note.
    pub async fn update_status(
        &self,
        order_id: u64,
        status: OrderStatus,
        note: &str,
    ) -> AppResult<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        order.status = status;
        order.notes.push(OrderNote {
            text: note.to_string(),
            created_at: Utc::now(),
        });

        info!("Order #{} moved to {:?}", order_id, status);
        Ok(order.clone())
    }

    pub async fn add_note(&self, order_id: u64, note: &str) -> AppResult<()> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

        order.notes.push(OrderNote {
            text: note.to_string(),
            created_at: Utc::now(),
        });
        Ok(())
    }

    pub async fn record_transaction(&self, record: TransactionRecord) -> AppResult<()> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(record.order_id, record);
        Ok(())
    }

    pub async fn transaction_for_order(&self, order_id: u64) -> Option<TransactionRecord> {
        self.transactions.read().await.get(&order_id).cloned()
    }

    pub async fn find_order_by_transaction_number(&self, number: &str) -> Option<u64> {
        let transactions = self.transactions.read().await;
        transactions
            .values()
            .find(|t| t.transaction_number.as_deref() == Some(number))
            .map(|t| t.order_id)
    }

    pub async fn find_order_by_transaction_id(&self, transaction_id: &str) -> Option<u64> {
        let transactions = self.transactions.read().await;
        transactions
            .values()
            .find(|t| t.transaction_id == transaction_id)
            .map(|t| t.order_id)
    }

    /// One-time backfill of the broker-assigned transaction number.
    /// Returns true when the number was newly persisted.
    pub async fn set_transaction_number(&self, order_id: u64, number: &str) -> AppResult<bool> {
        let mut transactions = self.transactions.write().await;
        let record = transactions.get_mut(&order_id).ok_or_else(|| {
            AppError::NotFound(format!("No transaction record for order {}", order_id))
        })?;

        if record.transaction_number.is_some() {
            return Ok(false);
        }

        record.transaction_number = Some(number.to_string());
        record.updated_at = Utc::now();
        Ok(true)
    }

    pub async fn set_escrow_code(&self, order_id: u64, code: &str) -> AppResult<()> {
        let mut transactions = self.transactions.write().await;
        let record = transactions.get_mut(&order_id).ok_or_else(|| {
            AppError::NotFound(format!("No transaction record for order {}", order_id))
        })?;

        record.escrow_code = Some(code.to_string());
        record.updated_at = Utc::now();
        Ok(())
    }

    pub async fn update_transaction_state(
        &self,
        order_id: u64,
        status: &str,
        in_dispute: bool,
    ) -> AppResult<()> {
        let mut transactions = self.transactions.write().await;
        let record = transactions.get_mut(&order_id).ok_or_else(|| {
            AppError::NotFound(format!("No transaction record for order {}", order_id))
        })?;

        record.status = status.to_string();
        record.in_dispute = in_dispute;
        record.updated_at = Utc::now();
        Ok(())
    }
}

impl Default for OrderRepository {
    fn default() -> Self {
        Self::new()
    }
}
