use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::{info, warn};

use crate::broker::models::TransactionStatusResponse;
use crate::broker::BrokerApi;
use crate::error::{AppError, AppResult};
use crate::orders::models::OrderStatus;
use crate::orders::OrderRepository;
use crate::payments::reference::parse_order_id;
use crate::webhook::dedup::{idempotency_key, normalize_status, IdempotencyStore};
use crate::webhook::signature::WebhookVerifier;

/// Inbound webhook payload. Transient: verified, deduplicated, applied,
/// then discarded.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookEvent {
    pub transaction_id: Option<String>,
    pub transaction_number: Option<String>,
    pub status: Option<String>,
    pub escrow_status: Option<String>,
    pub escrow_code: Option<String>,
    pub external_reference: Option<String>,
}

/// How a verified delivery was concluded. Errors carry their own HTTP
/// mapping through `AppError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// State transition applied for the first time.
    Processed,
    /// Identical event already processed; intentionally a no-op.
    Duplicate,
    /// Another delivery of this event is being handled right now.
    Inflight,
}

/// Reconciles asynchronous broker notifications against local order state.
///
/// Tolerates at-least-once delivery: every event is authenticated,
/// cross-checked against the broker's authoritative status endpoint,
/// deduplicated, and applied exactly once.
pub struct WebhookReconciler {
    verifier: WebhookVerifier,
    store: Arc<IdempotencyStore>,
    orders: Arc<OrderRepository>,
    broker: Arc<dyn BrokerApi>,
}

impl WebhookReconciler {
    pub fn new(
        verifier: WebhookVerifier,
        store: Arc<IdempotencyStore>,
        orders: Arc<OrderRepository>,
        broker: Arc<dyn BrokerApi>,
    ) -> Self {
        Self {
            verifier,
            store,
            orders,
            broker,
        }
    }

    pub async fn handle_delivery(
        &self,
        headers: &HeaderMap,
        raw_body: &[u8],
    ) -> AppResult<WebhookOutcome> {
        // Trust boundary: nothing in the body is read before this passes.
        let signature = headers
            .get("x-payscrow-signature")
            .or_else(|| headers.get("x-signature"))
            .and_then(|v| v.to_str().ok());
        self.verifier.verify(raw_body, signature)?;

        let event: WebhookEvent = serde_json::from_slice(raw_body)
            .map_err(|e| AppError::Validation(format!("Invalid payload: {}", e)))?;

        let Some(status) = event.status.as_deref().filter(|s| !s.is_empty()) else {
            return Err(AppError::Validation("Missing status field".to_string()));
        };

        let transaction_number = event
            .transaction_number
            .as_deref()
            .filter(|s| !s.is_empty());
        let transaction_id = event.transaction_id.as_deref().filter(|s| !s.is_empty());
        if transaction_number.is_none() && transaction_id.is_none() {
            return Err(AppError::Validation(
                "Missing transaction identifier".to_string(),
            ));
        }

        // Normalized forms feed the idempotency key only; branching below
        // always uses the raw provider-cased status.
        let normalized_status = normalize_status(status);
        let normalized_escrow_status = event
            .escrow_status
            .as_deref()
            .map(normalize_status)
            .filter(|s| !s.is_empty());

        // The webhook is not trusted to self-report state; the broker's
        // status endpoint is authoritative.
        let identifier_for_status = transaction_number.or(transaction_id).unwrap_or_default();
        let cross_check = self
            .broker
            .get_transaction_status(identifier_for_status)
            .await
            .map_err(|error| match error {
                // Keep configuration errors visible as such; everything else
                // is a retryable cross-check failure.
                AppError::Config(msg) => AppError::Config(msg),
                other => AppError::Upstream(format!(
                    "Failed to verify transaction status: {}",
                    other
                )),
            })?;

        if let Some(authoritative) = cross_check.status() {
            if authoritative != status {
                warn!(
                    "Webhook status mismatch for {}: claimed '{}', broker reports '{}'",
                    identifier_for_status, status, authoritative
                );
                return Err(AppError::Consistency {
                    claimed: status.to_string(),
                    authoritative: authoritative.to_string(),
                });
            }
        }

        // Lazy-capture the canonical number when only a transaction id was
        // delivered and the status API knows the number.
        let migrated_number = transaction_number
            .map(str::to_string)
            .or_else(|| cross_check.transaction_number().map(str::to_string));

        let identifier_for_key = migrated_number
            .as_deref()
            .or(transaction_id)
            .unwrap_or_default();
        let key = idempotency_key(
            identifier_for_key,
            &normalized_status,
            normalized_escrow_status.as_deref(),
        );

        if self.store.is_processed(&key).await {
            info!(
                "Duplicate webhook ignored for {} status {}",
                identifier_for_key, normalized_status
            );
            return Ok(WebhookOutcome::Duplicate);
        }

        if !self.store.try_acquire(&key).await {
            info!(
                "Webhook already being processed (inflight) for {}",
                identifier_for_key
            );
            return Ok(WebhookOutcome::Inflight);
        }

        // Inflight marker is held from here; release on every exit path so
        // a failed delivery can be retried.
        let result = self
            .apply_event(&event, status, migrated_number.as_deref(), &cross_check)
            .await;

        match result {
            Ok(order_id) => {
                self.store.mark_processed(&key).await;
                self.store.release(&key).await;
                info!(
                    "Webhook processed: order #{} status '{}'",
                    order_id, status
                );
                Ok(WebhookOutcome::Processed)
            }
            Err(error) => {
                self.store.release(&key).await;
                Err(error)
            }
        }
    }

    /// Steps after the inflight marker is held: locate the order, backfill
    /// identifiers, and apply the state transition.
    async fn apply_event(
        &self,
        event: &WebhookEvent,
        status: &str,
        transaction_number: Option<&str>,
        cross_check: &TransactionStatusResponse,
    ) -> AppResult<u64> {
        let order_id = self.resolve_order(event, transaction_number).await?;

        // One-time backfill of the broker-assigned number (idempotent).
        if let Some(number) = transaction_number {
            if self.orders.set_transaction_number(order_id, number).await? {
                self.orders
                    .add_note(
                        order_id,
                        &format!("PayScrow transaction number (migrated): {}", number),
                    )
                    .await?;
                info!(
                    "Persisted transaction number {} for order #{}",
                    number, order_id
                );
            }
        }

        if let Some(code) = event.escrow_code.as_deref().filter(|c| !c.is_empty()) {
            self.orders.set_escrow_code(order_id, code).await?;
            self.orders
                .add_note(order_id, &format!("PayScrow escrow code: {}", code))
                .await?;
        }

        match status {
            "Paid" | "InProgress" => {
                self.orders
                    .update_status(
                        order_id,
                        OrderStatus::Processing,
                        "Payment confirmed and in escrow via PayScrow.",
                    )
                    .await?;
            }
            "Completed" => {
                self.orders
                    .add_note(order_id, "Customer has released the escrow code via PayScrow.")
                    .await?;
                self.orders
                    .update_status(
                        order_id,
                        OrderStatus::Completed,
                        "Transaction completed in PayScrow.",
                    )
                    .await?;
            }
            "Finalized" => {
                self.orders
                    .update_status(
                        order_id,
                        OrderStatus::Completed,
                        "Transaction finalized in PayScrow.",
                    )
                    .await?;
            }
            "Pending" => {
                self.orders
                    .update_status(order_id, OrderStatus::Pending, "Awaiting payment via PayScrow.")
                    .await?;
            }
            "Cancelled" => {
                self.orders
                    .update_status(
                        order_id,
                        OrderStatus::Cancelled,
                        "Transaction cancelled in PayScrow.",
                    )
                    .await?;
            }
            other => {
                // Unknown status: audit note only, no transition.
                self.orders
                    .add_note(order_id, &format!("PayScrow status updated to: {}", other))
                    .await?;
            }
        }

        // Dispute is a boolean flag orthogonal to status; it forces the
        // order on hold regardless of the transition above.
        let in_dispute = cross_check.in_dispute();
        if in_dispute {
            self.orders
                .update_status(
                    order_id,
                    OrderStatus::OnHold,
                    "Order has been disputed in PayScrow.",
                )
                .await?;
            self.orders
                .add_note(order_id, "Order dispute opened in PayScrow.")
                .await?;
        }

        self.orders
            .update_transaction_state(order_id, status, in_dispute)
            .await?;

        Ok(order_id)
    }

    /// Locate the order: transaction number, then transaction id, then the
    /// order id embedded in our reference format, then a numeric external
    /// reference.
    async fn resolve_order(
        &self,
        event: &WebhookEvent,
        transaction_number: Option<&str>,
    ) -> AppResult<u64> {
        if let Some(number) = transaction_number {
            if let Some(order_id) = self.orders.find_order_by_transaction_number(number).await {
                return Ok(order_id);
            }
        }

        let transaction_id = event.transaction_id.as_deref().filter(|s| !s.is_empty());

        if let Some(id) = transaction_id {
            if let Some(order_id) = self.orders.find_order_by_transaction_id(id).await {
                return Ok(order_id);
            }

            // Our references embed the order id: KM{order_id}T{timestamp}.
            if let Some(order_id) = parse_order_id(id) {
                if self.orders.order_exists(order_id).await {
                    info!(
                        "Found order #{} by extracting from reference: {}",
                        order_id, id
                    );
                    return Ok(order_id);
                }
            }
        }

        if let Some(reference) = event.external_reference.as_deref() {
            if let Ok(order_id) = reference.parse::<u64>() {
                if self.orders.order_exists(order_id).await {
                    info!("Found order #{} using external reference", order_id);
                    return Ok(order_id);
                }
            }
        }

        Err(AppError::NotFound(format!(
            "Order not found. Transaction ID: {}",
            transaction_id.unwrap_or("<none>")
        )))
    }
}
