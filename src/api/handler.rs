use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::models::*;
use crate::{
    broker::{models::EscrowCodeVerification, BrokerApi},
    error::{AppError, AppResult},
    orders::OrderRepository,
    payments::{PaymentProcessor, VendorDirectory},
    settlement::models::{AccountOwner, PayoutAccount},
    webhook::{WebhookOutcome, WebhookReconciler},
};

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderRepository>,
    pub vendors: Arc<VendorDirectory>,
    pub broker: Arc<dyn BrokerApi>,
    pub processor: Arc<PaymentProcessor>,
    pub reconciler: Arc<WebhookReconciler>,
}

/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Register an order with the gateway
/// POST /api/v1/orders
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> AppResult<Json<OrderDetailResponse>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let order = state.orders.create_order(request.into()).await?;
    info!("Order #{} registered", order.id);

    Ok(Json(OrderDetailResponse {
        order,
        transaction: None,
    }))
}

/// Fetch an order with its escrow transaction record
/// GET /api/v1/orders/:id
pub async fn get_order(
    State(state): State<AppState>,
    Path(order_id): Path<u64>,
) -> AppResult<Json<OrderDetailResponse>> {
    let order = state.orders.get_order(order_id).await?;
    let transaction = state.orders.transaction_for_order(order_id).await;

    Ok(Json(OrderDetailResponse { order, transaction }))
}

/// Register a vendor's payout account
/// PUT /api/v1/vendors/:id/account
pub async fn register_vendor_account(
    State(state): State<AppState>,
    Path(vendor_id): Path<u64>,
    Json(request): Json<VendorAccountRequest>,
) -> AppResult<StatusCode> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    state
        .vendors
        .register_account(
            vendor_id,
            PayoutAccount {
                account_name: request.account_name,
                account_number: request.account_number,
                bank_code: request.bank_code,
                owner: AccountOwner::Vendor(vendor_id),
            },
        )
        .await;

    info!("Payout account registered for vendor #{}", vendor_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Start the escrow payment for an order
/// POST /api/v1/checkout
pub async fn checkout(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> AppResult<Json<CheckoutResponse>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = state.processor.start_escrow_payment(request.order_id).await?;

    Ok(Json(CheckoutResponse {
        payment_link: outcome.payment_link,
        transaction_reference: outcome.transaction_reference,
    }))
}

/// Apply a customer's escrow code to their order's transaction
/// POST /api/v1/escrow-codes/apply
pub async fn apply_escrow_code(
    State(state): State<AppState>,
    Json(request): Json<ApplyCodeRequest>,
) -> AppResult<Json<ApplyCodeResponse>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let status = state
        .processor
        .apply_escrow_code(request.order_id, &request.code)
        .await?;

    Ok(Json(ApplyCodeResponse { status }))
}

/// Verify an escrow code against the broker
/// GET /api/v1/escrow-codes/:code/verify
pub async fn verify_escrow_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Json<EscrowCodeVerification>> {
    let verification = state.broker.verify_escrow_code(&code).await?;
    Ok(Json(verification))
}

/// Broker status notification endpoint
/// POST /api/v1/webhook/payscrow
///
/// The reconciler owns authentication, dedup and state application; this
/// handler only translates outcomes to HTTP acknowledgements.
pub async fn payscrow_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<(StatusCode, Json<WebhookAck>)> {
    let outcome = state.reconciler.handle_delivery(&headers, &body).await?;

    let (status, ack) = match outcome {
        WebhookOutcome::Processed => (
            StatusCode::OK,
            WebhookAck::success("Webhook processed successfully"),
        ),
        WebhookOutcome::Duplicate => (
            StatusCode::OK,
            WebhookAck::success("Duplicate webhook ignored"),
        ),
        WebhookOutcome::Inflight => (
            StatusCode::ACCEPTED,
            WebhookAck::success("Webhook accepted (processing)"),
        ),
    };

    Ok((status, Json(ack)))
}
