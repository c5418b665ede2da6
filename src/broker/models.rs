use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One order line as the broker expects it. `price` is the unit price,
/// pre-rounded to exactly 2 decimal places.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionItem {
    pub name: String,
    pub description: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// One payout line of the settlement instruction set, broker wire shape.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementAccount {
    pub account_name: String,
    pub account_number: String,
    pub bank_code: String,
    pub amount: Decimal,
}

/// Body of `marketplace/transactions/start` (broker API v3).
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartTransactionRequest {
    pub items: Vec<TransactionItem>,
    pub merchant_email_address: String,
    pub merchant_name: String,
    pub transaction_reference: String,
    pub merchant_charge_percentage: Decimal,
    pub currency_code: String,
    pub return_url: String,
    pub webhook_notification_url: String,
    pub settlement_accounts: Vec<SettlementAccount>,
    pub customer_name: String,
    pub customer_email_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub merchant_phone_no: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_phone_no: Option<String>,
    // NIN fields are sent explicitly null when unknown.
    #[serde(rename = "merchantNIN")]
    pub merchant_nin: Option<String>,
    #[serde(rename = "customerNIN")]
    pub customer_nin: Option<String>,
}

/// Response of `marketplace/transactions/start`. The broker has been seen
/// returning the link and identifier under several names, sometimes nested
/// under `data`; accessors flatten all the variants.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartTransactionResponse {
    pub payment_link: Option<String>,
    pub redirect_url: Option<String>,
    pub transaction_no: Option<String>,
    pub transaction_id: Option<String>,
    pub data: Option<Box<StartTransactionResponse>>,
}

impl StartTransactionResponse {
    pub fn payment_link(&self) -> Option<&str> {
        self.payment_link
            .as_deref()
            .or(self.redirect_url.as_deref())
            .or_else(|| self.data.as_ref().and_then(|d| d.payment_link()))
    }

    pub fn transaction_identifier(&self) -> Option<&str> {
        self.transaction_no
            .as_deref()
            .or(self.transaction_id.as_deref())
            .or_else(|| self.data.as_ref().and_then(|d| d.transaction_identifier()))
    }
}

/// Response of `marketplace/transactions/{id}/status`; this endpoint is the
/// authoritative source of transaction state.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionStatusResponse {
    pub status: Option<String>,
    pub transaction_number: Option<String>,
    pub in_dispute: Option<bool>,
    pub escrow_code: Option<String>,
    pub data: Option<Box<TransactionStatusResponse>>,
}

impl TransactionStatusResponse {
    pub fn status(&self) -> Option<&str> {
        self.status
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.status()))
    }

    pub fn transaction_number(&self) -> Option<&str> {
        self.transaction_number
            .as_deref()
            .or_else(|| self.data.as_ref().and_then(|d| d.transaction_number()))
    }

    pub fn in_dispute(&self) -> bool {
        self.in_dispute
            .or_else(|| self.data.as_ref().map(|d| d.in_dispute()))
            .unwrap_or(false)
    }
}

/// Response of `marketplace/escrow-codes/{code}/verify`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EscrowCodeVerification {
    pub is_valid: bool,
    pub amount: Option<Decimal>,
}

/// Body of `marketplace/transactions/apply-code`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyEscrowCodeRequest {
    pub transaction_id: String,
    pub escrow_code: String,
}
