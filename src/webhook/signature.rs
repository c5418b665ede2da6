use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::{AppError, AppResult};

type HmacSha256 = Hmac<Sha256>;

/// Verifies webhook deliveries against the shared secret.
///
/// The signature is HMAC-SHA256 over the raw request body, hex encoded,
/// optionally prefixed `sha256=`. This is the sole trust boundary for the
/// webhook endpoint; everything in the body is untrusted until it passes.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
}

impl WebhookVerifier {
    pub fn new(secret: String) -> Self {
        Self { secret }
    }

    pub fn verify(&self, raw_body: &[u8], signature_header: Option<&str>) -> AppResult<()> {
        if self.secret.is_empty() {
            warn!("Webhook verification failed: no webhook secret configured");
            return Err(AppError::Authentication(
                "Webhook verification failed".to_string(),
            ));
        }

        let Some(signature) = signature_header.filter(|s| !s.is_empty()) else {
            warn!("Webhook verification failed: missing signature header");
            return Err(AppError::Authentication(
                "Webhook verification failed".to_string(),
            ));
        };

        // Some providers prefix signatures like "sha256=..."
        let signature = signature.strip_prefix("sha256=").unwrap_or(signature);

        let signature_bytes = hex::decode(signature).map_err(|_| {
            warn!(
                "Webhook verification failed: non-hex signature (prefix: {})",
                &signature[..signature.len().min(8)]
            );
            AppError::Authentication("Invalid signature".to_string())
        })?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|_| AppError::Authentication("Invalid secret key length".to_string()))?;
        mac.update(raw_body);

        // verify_slice is constant time
        mac.verify_slice(&signature_bytes).map_err(|_| {
            // Never log the secret; a short signature prefix is enough for diagnostics.
            warn!(
                "Webhook verification failed: invalid signature (prefix: {})",
                &signature[..signature.len().min(8)]
            );
            AppError::Authentication("Invalid signature".to_string())
        })
    }
}

/// Test helper and documentation of the expected signing scheme.
#[cfg(test)]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
