use serde::Deserialize;

use crate::settlement::models::{AccountOwner, PayoutAccount};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub bind_address: String,
    pub broker_api_key: String,
    pub webhook_secret: String,
    pub sandbox: bool,
    pub admin_account_name: String,
    pub admin_account_number: String,
    pub admin_bank_code: String,
    pub admin_percentage: String,
    pub merchant_name: String,
    pub merchant_email: String,
    pub merchant_phone: String,
    pub return_url: String,
    pub webhook_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Ok(Self {
            bind_address: std::env::var("BIND_ADDRESS")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            broker_api_key: std::env::var("PAYSCROW_API_KEY").unwrap_or_default(),
            webhook_secret: std::env::var("PAYSCROW_WEBHOOK_SECRET").unwrap_or_default(),
            sandbox: std::env::var("PAYSCROW_SANDBOX")
                .map(|v| v != "false")
                .unwrap_or(true),
            admin_account_name: std::env::var("ADMIN_ACCOUNT_NAME").unwrap_or_default(),
            admin_account_number: std::env::var("ADMIN_ACCOUNT_NUMBER").unwrap_or_default(),
            admin_bank_code: std::env::var("ADMIN_BANK_CODE").unwrap_or_default(),
            admin_percentage: std::env::var("ADMIN_PERCENTAGE")
                .unwrap_or_else(|_| "10".to_string()),
            merchant_name: std::env::var("MERCHANT_NAME")
                .unwrap_or_else(|_| "PayScrow Marketplace".to_string()),
            merchant_email: std::env::var("MERCHANT_EMAIL")
                .unwrap_or_else(|_| "admin@example.com".to_string()),
            merchant_phone: std::env::var("MERCHANT_PHONE")
                .unwrap_or_else(|_| "08012345678".to_string()),
            return_url: std::env::var("RETURN_URL")
                .unwrap_or_else(|_| "http://localhost:8080/order-received".to_string()),
            webhook_url: std::env::var("WEBHOOK_URL").unwrap_or_else(|_| {
                "http://localhost:8080/api/v1/webhook/payscrow".to_string()
            }),
        })
    }

    /// The marketplace admin's payout account as configured.
    pub fn admin_account(&self) -> PayoutAccount {
        PayoutAccount {
            account_name: self.admin_account_name.clone(),
            account_number: self.admin_account_number.clone(),
            bank_code: self.admin_bank_code.clone(),
            owner: AccountOwner::Admin,
        }
    }
}
