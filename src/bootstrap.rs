use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use crate::{
    api::handler::AppState,
    broker::{BrokerApi, PayscrowClient},
    config::Config,
    error::{AppError, AppResult},
    orders::OrderRepository,
    payments::{PaymentProcessor, VendorDirectory},
    webhook::{IdempotencyStore, WebhookReconciler, WebhookVerifier},
};

pub async fn initialize_app_state(config: Config) -> AppResult<AppState> {
    info!("Initializing application components ...");

    let admin_percentage = Decimal::from_str(&config.admin_percentage)
        .map_err(|e| AppError::Config(format!("Invalid ADMIN_PERCENTAGE: {}", e)))?;
    if admin_percentage < Decimal::ZERO || admin_percentage > Decimal::from(100) {
        error!("ADMIN_PERCENTAGE {} outside 0..=100", admin_percentage);
        return Err(AppError::Config(format!(
            "Admin percentage {} is outside the 0..=100 range",
            admin_percentage
        )));
    }

    if config.webhook_secret.is_empty() {
        warn!("⚠️  PAYSCROW_WEBHOOK_SECRET not set - all webhook deliveries will be rejected");
    }
    if config.broker_api_key.is_empty() {
        warn!("⚠️  PAYSCROW_API_KEY not set - broker calls will fail until configured");
    }

    // Core repositories
    let orders = Arc::new(OrderRepository::new());
    info!("✅ Order repository initialized");

    let vendors = Arc::new(VendorDirectory::new());
    info!("✅ Vendor directory initialized");

    // Broker API client
    let broker: Arc<dyn BrokerApi> = Arc::new(PayscrowClient::new(
        config.broker_api_key.clone(),
        config.sandbox,
    )?);
    info!(
        "✅ Broker client initialized ({} mode)",
        if config.sandbox { "sandbox" } else { "production" }
    );

    // Webhook idempotency store: 7 day dedup retention, 30s inflight TTL
    let idempotency = Arc::new(IdempotencyStore::new());
    info!("✅ Idempotency store initialized");

    let reconciler = Arc::new(WebhookReconciler::new(
        WebhookVerifier::new(config.webhook_secret.clone()),
        idempotency.clone(),
        orders.clone(),
        broker.clone(),
    ));
    info!("✅ Webhook reconciler initialized");

    let processor = Arc::new(PaymentProcessor::new(
        config.clone(),
        admin_percentage,
        orders.clone(),
        vendors.clone(),
        broker.clone(),
    ));
    info!("✅ Payment processor initialized (admin cut: {}%)", admin_percentage);

    // Background task to purge expired webhook dedup records (hourly)
    let idempotency_cleanup = idempotency.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;

            let purged = idempotency_cleanup.purge_expired().await;
            if purged > 0 {
                info!("🗑️  Purged {} expired webhook dedup records", purged);
            }
        }
    });
    info!("✅ Dedup record cleanup task started (hourly)");

    Ok(AppState {
        orders,
        vendors,
        broker,
        processor,
        reconciler,
    })
}
