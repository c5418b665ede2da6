use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::api::handler::{
    apply_escrow_code, checkout, create_order, get_order, health_check, payscrow_webhook,
    register_vendor_account, verify_escrow_code, AppState,
};

pub async fn create_app(state: AppState) -> Router {
    info!("⚙️ Setting up HTTP routes...");

    let app = Router::new()
        // Public health check endpoint
        .route("/health", get(health_check))
        .nest(
            "/api/v1",
            Router::new()
                // Host-store integration
                .route("/orders", post(create_order))
                .route("/orders/:id", get(get_order))
                .route("/vendors/:id/account", put(register_vendor_account))
                // Checkout
                .route("/checkout", post(checkout))
                // Escrow codes
                .route("/escrow-codes/:code/verify", get(verify_escrow_code))
                .route("/escrow-codes/apply", post(apply_escrow_code))
                // Broker notifications
                .route("/webhook/payscrow", post(payscrow_webhook)),
        )
        .layer(CorsLayer::very_permissive())
        // Add request tracing
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("✓ HTTP routes configured");
    app
}

pub async fn run_server(app: Router, bind_address: &str) -> Result<(), Box<dyn std::error::Error>> {
    let listener = tokio::net::TcpListener::bind(bind_address).await?;
    info!("🌐 Server listening on: {}", bind_address);

    axum::serve(listener, app).await?;
    Ok(())
}
