// Webhook authentication, dedup and reconciliation
pub mod dedup;
pub mod reconciler;
pub mod signature;

pub use dedup::IdempotencyStore;
pub use reconciler::{WebhookOutcome, WebhookReconciler};
pub use signature::WebhookVerifier;
