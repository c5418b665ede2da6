use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::broker::models::{
    ApplyEscrowCodeRequest, EscrowCodeVerification, StartTransactionRequest,
    StartTransactionResponse, TransactionStatusResponse,
};
use crate::broker::BrokerApi;
use crate::error::{AppError, AppResult};

/// Candidate sandbox base URLs, in preference order.
const SANDBOX_BASES: &[&str] = &[
    "https://sandbox.payscrow.net/api/v3/",
    "https://sandbox-api.payscrow.net/api/v3/",
    "https://sandbox.payscrow.africa/api/v3/",
    "https://sandbox.payscrow.com/api/v3/",
];

/// Candidate production base URLs, in preference order.
const PRODUCTION_BASES: &[&str] = &[
    "https://payscrow.net/api/v3/",
    "https://api.payscrow.net/api/v3/",
    "https://payscrow.africa/api/v3/",
    "https://api.payscrow.africa/api/v3/",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// PayScrow API v3 client.
///
/// The broker is reachable under several domains; each call walks the
/// candidate list in fixed preference order and uses the first base that
/// responds. The choice is never persisted beyond the current call.
pub struct PayscrowClient {
    http: reqwest::Client,
    api_key: String,
    sandbox: bool,
}

impl PayscrowClient {
    pub fn new(api_key: String, sandbox: bool) -> AppResult<Self> {
        // A default client would drop the request timeout; constructing one
        // is a startup failure, not something to fall back from.
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            sandbox,
        })
    }

    fn candidate_bases(&self) -> &'static [&'static str] {
        if self.sandbox {
            SANDBOX_BASES
        } else {
            PRODUCTION_BASES
        }
    }

    async fn request<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&B>,
    ) -> AppResult<T> {
        if self.api_key.is_empty() {
            return Err(AppError::Config(
                "Broker API key is not configured".to_string(),
            ));
        }

        let mut last_error: Option<reqwest::Error> = None;

        for base in self.candidate_bases() {
            let url = format!("{}{}", base, endpoint);
            debug!("Broker request: {} {}", method, url);

            let mut builder = self
                .http
                .request(method.clone(), &url)
                .header("BrokerApiKey", &self.api_key)
                .header("Accept", "application/json");
            if let Some(body) = body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) => return Self::handle_response(response).await,
                Err(error) => {
                    // Unreachable domain: log and try the next candidate.
                    warn!("Broker domain {} unreachable: {}", base, error);
                    last_error = Some(error);
                }
            }
        }

        let domains = self.candidate_bases().join(", ");
        Err(AppError::Upstream(match last_error {
            Some(error) => format!(
                "Connection failed to all broker domains ({}). Last error: {}",
                domains, error
            ),
            None => format!("No broker domains configured ({})", domains),
        }))
    }

    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(AppError::Upstream(Self::upstream_message(status, &body)));
        }

        serde_json::from_str(&body).map_err(|error| {
            AppError::Upstream(format!("Unparseable broker response: {}", error))
        })
    }

    /// Build an upstream error carrying the HTTP status plus whatever
    /// message field the broker put in the body.
    fn upstream_message(status: StatusCode, body: &str) -> String {
        let detail = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| {
                v.get("message")
                    .or_else(|| v.get("error"))
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| body.chars().take(200).collect());

        format!("HTTP {}: {}", status.as_u16(), detail)
    }
}

#[async_trait]
impl BrokerApi for PayscrowClient {
    async fn start_transaction(
        &self,
        request: &StartTransactionRequest,
    ) -> AppResult<StartTransactionResponse> {
        self.request(Method::POST, "marketplace/transactions/start", Some(request))
            .await
    }

    async fn get_transaction_status(
        &self,
        identifier: &str,
    ) -> AppResult<TransactionStatusResponse> {
        let endpoint = format!("marketplace/transactions/{}/status", identifier);
        self.request::<(), _>(Method::GET, &endpoint, None).await
    }

    async fn verify_escrow_code(&self, code: &str) -> AppResult<EscrowCodeVerification> {
        let endpoint = format!("marketplace/escrow-codes/{}/verify", code);
        self.request::<(), _>(Method::GET, &endpoint, None).await
    }

    async fn apply_escrow_code(
        &self,
        transaction_id: &str,
        code: &str,
    ) -> AppResult<TransactionStatusResponse> {
        let body = ApplyEscrowCodeRequest {
            transaction_id: transaction_id.to_string(),
            escrow_code: code.to_string(),
        };
        self.request(Method::POST, "marketplace/transactions/apply-code", Some(&body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_with_timeout_and_selects_domains_by_mode() {
        let client = PayscrowClient::new("key".into(), true).unwrap();
        assert!(client.candidate_bases()[0].contains("sandbox"));

        let client = PayscrowClient::new("key".into(), false).unwrap();
        assert!(!client.candidate_bases()[0].contains("sandbox"));
    }

    #[tokio::test]
    async fn missing_api_key_is_a_configuration_error() {
        let client = PayscrowClient::new(String::new(), true).unwrap();
        let err = client.get_transaction_status("TXN123").await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn upstream_message_extracts_broker_message_field() {
        let msg = PayscrowClient::upstream_message(
            StatusCode::BAD_REQUEST,
            r#"{"message":"Invalid settlement account"}"#,
        );
        assert_eq!(msg, "HTTP 400: Invalid settlement account");
    }

    #[test]
    fn upstream_message_truncates_opaque_bodies() {
        let body = "x".repeat(500);
        let msg = PayscrowClient::upstream_message(StatusCode::BAD_GATEWAY, &body);
        assert!(msg.len() < 250);
    }
}
