use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{error, info};

use crate::broker::models::{SettlementAccount, StartTransactionRequest, TransactionItem};
use crate::broker::BrokerApi;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::orders::models::TransactionRecord;
use crate::orders::OrderRepository;
use crate::payments::reference::build_reference;
use crate::payments::vendors::VendorDirectory;
use crate::settlement::calculator::round_money;
use crate::settlement::compute_settlement;

/// Result of starting an escrow transaction for an order.
#[derive(Debug, Clone)]
pub struct CheckoutOutcome {
    pub payment_link: String,
    pub transaction_reference: String,
}

/// Checkout-side payment flow: compute the settlement split, start the
/// broker transaction and persist the resulting transaction record.
pub struct PaymentProcessor {
    config: Config,
    admin_percentage: Decimal,
    orders: Arc<OrderRepository>,
    vendors: Arc<VendorDirectory>,
    broker: Arc<dyn BrokerApi>,
}

impl PaymentProcessor {
    pub fn new(
        config: Config,
        admin_percentage: Decimal,
        orders: Arc<OrderRepository>,
        vendors: Arc<VendorDirectory>,
        broker: Arc<dyn BrokerApi>,
    ) -> Self {
        Self {
            config,
            admin_percentage,
            orders,
            vendors,
            broker,
        }
    }

    pub async fn start_escrow_payment(&self, order_id: u64) -> AppResult<CheckoutOutcome> {
        let order = self.orders.get_order(order_id).await?;
        info!("Processing escrow payment for order #{}", order_id);

        let admin_account = self.config.admin_account();
        let vendor_accounts = self.vendors.snapshot().await;

        let instructions = compute_settlement(
            &order.items,
            &admin_account,
            self.admin_percentage,
            &vendor_accounts,
        )
        .map_err(AppError::Settlement)?;

        let reference = build_reference(order.id, Utc::now().timestamp());

        let items: Vec<TransactionItem> = order
            .items
            .iter()
            .map(|item| TransactionItem {
                name: clean_text(&item.name),
                description: clean_text(&item.description),
                quantity: item.quantity,
                price: round_money(item.unit_price),
            })
            .collect();

        let settlement_accounts: Vec<SettlementAccount> = instructions
            .iter()
            .map(|instruction| SettlementAccount {
                account_name: instruction.account.account_name.clone(),
                account_number: instruction.account.account_number.clone(),
                bank_code: instruction.account.bank_code.clone(),
                amount: instruction.amount,
            })
            .collect();

        let customer_phone = if order.customer_phone.is_empty() {
            "08012345678".to_string()
        } else {
            format_nigerian_phone(&order.customer_phone)
        };

        let request = StartTransactionRequest {
            items,
            merchant_email_address: self.config.merchant_email.clone(),
            merchant_name: self.config.merchant_name.clone(),
            transaction_reference: reference.clone(),
            merchant_charge_percentage: self.admin_percentage,
            currency_code: order.currency.clone(),
            return_url: self.config.return_url.clone(),
            webhook_notification_url: self.config.webhook_url.clone(),
            settlement_accounts,
            customer_name: clean_text(&order.customer_name),
            customer_email_address: order.customer_email.clone(),
            merchant_phone_no: Some(format_nigerian_phone(&self.config.merchant_phone)),
            customer_phone_no: Some(customer_phone),
            merchant_nin: None,
            customer_nin: None,
        };

        let response = match self.broker.start_transaction(&request).await {
            Ok(response) => response,
            Err(err) => {
                error!("Broker start-transaction failed for order #{}: {}", order_id, err);
                self.orders
                    .add_note(order_id, &format!("Escrow payment API error: {}", err))
                    .await?;
                return Err(match err {
                    AppError::Upstream(detail) => {
                        AppError::Upstream(user_facing_payment_error(&detail))
                    }
                    other => other,
                });
            }
        };

        let Some(payment_link) = response.payment_link().map(str::to_string) else {
            let message =
                "No payment link returned from escrow service. Please check API configuration.";
            error!("Missing payment link for order #{}", order_id);
            self.orders
                .add_note(order_id, &format!("Escrow payment error: {}", message))
                .await?;
            return Err(AppError::Upstream(message.to_string()));
        };

        let mut record = TransactionRecord::new(order.id, reference.clone());
        if let Some(identifier) = response.transaction_identifier() {
            if identifier != reference {
                record.transaction_number = Some(identifier.to_string());
            }
            self.orders
                .add_note(order_id, &format!("PayScrow Transaction ID: {}", identifier))
                .await?;
        }
        self.orders.record_transaction(record).await?;

        self.orders
            .update_status(
                order_id,
                crate::orders::models::OrderStatus::Pending,
                "Awaiting escrow payment",
            )
            .await?;

        info!(
            "Redirecting order #{} to escrow payment page: {}",
            order_id, payment_link
        );

        Ok(CheckoutOutcome {
            payment_link,
            transaction_reference: reference,
        })
    }

    /// Apply a customer-held escrow code to the order's transaction and
    /// record the state the broker reports back.
    pub async fn apply_escrow_code(&self, order_id: u64, code: &str) -> AppResult<String> {
        let record = self
            .orders
            .transaction_for_order(order_id)
            .await
            .ok_or_else(|| {
                AppError::NotFound(format!("No escrow transaction for order {}", order_id))
            })?;

        // Prefer the broker-assigned number; fall back to our reference.
        let identifier = record
            .transaction_number
            .as_deref()
            .unwrap_or(&record.transaction_id)
            .to_string();

        let response = self.broker.apply_escrow_code(&identifier, code).await?;

        let status = response
            .status()
            .map(str::to_string)
            .unwrap_or_else(|| record.status.clone());

        self.orders
            .update_transaction_state(order_id, &status, response.in_dispute())
            .await?;
        self.orders
            .add_note(
                order_id,
                &format!("PayScrow escrow code applied; status: {}", status),
            )
            .await?;

        info!(
            "Escrow code applied for order #{} (status {})",
            order_id, status
        );
        Ok(status)
    }
}

/// Distinguish the likely cause in the message shown to the shopper; the
/// full broker detail stays in the order notes and the logs.
fn user_facing_payment_error(detail: &str) -> String {
    if detail.contains("HTTP 400") {
        "The payment could not be processed due to an issue with the request. \
         Please try again or contact support."
            .to_string()
    } else if detail.contains("HTTP 401") || detail.contains("HTTP 403") {
        "Authentication failed with the payment processor. Please contact the \
         store administrator to verify the API settings."
            .to_string()
    } else if detail.contains("connect") || detail.contains("Connection failed") {
        "Could not connect to the payment processor. Please try again later or \
         use a different payment method."
            .to_string()
    } else {
        detail.to_string()
    }
}

/// Strip control characters and collapse whitespace runs; the broker
/// rejects items containing non-printable characters.
fn clean_text(text: &str) -> String {
    text.chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .filter(|c| !c.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalise a phone number to the 11-digit Nigerian mobile format the
/// broker expects.
fn format_nigerian_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut normalized = if let Some(rest) = digits.strip_prefix("234") {
        format!("0{}", rest)
    } else if !digits.starts_with('0') {
        format!("0{}", digits)
    } else {
        digits
    };

    // Pad or trim to 11 digits.
    while normalized.len() < 11 {
        normalized.push('0');
    }
    normalized.truncate(11);

    const VALID_PREFIXES: &[&str] = &["070", "071", "080", "081", "090", "091"];
    if !VALID_PREFIXES.contains(&&normalized[..3]) {
        normalized.replace_range(..3, "080");
    }

    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::models::{
        EscrowCodeVerification, StartTransactionResponse, TransactionStatusResponse,
    };
    use crate::orders::models::{LineItem, Order, OrderStatus};
    use crate::settlement::models::{AccountOwner, PayoutAccount};
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use tokio::sync::Mutex;

    struct RecordingBroker {
        last_request: Mutex<Option<StartTransactionRequest>>,
        last_applied: Mutex<Option<(String, String)>>,
        response: StartTransactionResponse,
        apply_response: TransactionStatusResponse,
    }

    impl RecordingBroker {
        fn returning(response: StartTransactionResponse) -> Self {
            Self {
                last_request: Mutex::new(None),
                last_applied: Mutex::new(None),
                response,
                apply_response: TransactionStatusResponse::default(),
            }
        }

        fn with_apply(mut self, apply_response: TransactionStatusResponse) -> Self {
            self.apply_response = apply_response;
            self
        }
    }

    #[async_trait]
    impl BrokerApi for RecordingBroker {
        async fn start_transaction(
            &self,
            request: &StartTransactionRequest,
        ) -> AppResult<StartTransactionResponse> {
            *self.last_request.lock().await = Some(request.clone());
            Ok(self.response.clone())
        }

        async fn get_transaction_status(
            &self,
            _identifier: &str,
        ) -> AppResult<TransactionStatusResponse> {
            unimplemented!("not used by checkout tests")
        }

        async fn verify_escrow_code(&self, _code: &str) -> AppResult<EscrowCodeVerification> {
            unimplemented!("not used by checkout tests")
        }

        async fn apply_escrow_code(
            &self,
            transaction_id: &str,
            code: &str,
        ) -> AppResult<TransactionStatusResponse> {
            *self.last_applied.lock().await =
                Some((transaction_id.to_string(), code.to_string()));
            Ok(self.apply_response.clone())
        }
    }

    fn test_config() -> Config {
        Config {
            bind_address: "127.0.0.1:0".into(),
            broker_api_key: "key".into(),
            webhook_secret: "secret".into(),
            sandbox: true,
            admin_account_name: "Marketplace Ltd".into(),
            admin_account_number: "0011223344".into(),
            admin_bank_code: "044".into(),
            admin_percentage: "10".into(),
            merchant_name: "Marketplace".into(),
            merchant_email: "admin@example.com".into(),
            merchant_phone: "2348031234567".into(),
            return_url: "https://shop.example/return".into(),
            webhook_url: "https://shop.example/webhook".into(),
        }
    }

    async fn seeded() -> (Arc<OrderRepository>, Arc<VendorDirectory>) {
        let orders = Arc::new(OrderRepository::new());
        orders
            .create_order(Order::new(
                1,
                "NGN".into(),
                vec![
                    LineItem {
                        name: "Widget\u{00a0}A".into(),
                        description: "A  fine\twidget".into(),
                        unit_price: dec!(100.00),
                        quantity: 1,
                        vendor: Some(1),
                    },
                    LineItem {
                        name: "Widget B".into(),
                        description: "Another widget".into(),
                        unit_price: dec!(50.00),
                        quantity: 2,
                        vendor: Some(2),
                    },
                ],
                "Ada Obi".into(),
                "ada@example.com".into(),
                "08012345678".into(),
            ))
            .await
            .unwrap();

        let vendors = Arc::new(VendorDirectory::new());
        for id in [1u64, 2] {
            vendors
                .register_account(
                    id,
                    PayoutAccount {
                        account_name: format!("Vendor {}", id),
                        account_number: format!("000000{:04}", id),
                        bank_code: "058".into(),
                        owner: AccountOwner::Vendor(id),
                    },
                )
                .await;
        }

        (orders, vendors)
    }

    #[tokio::test]
    async fn checkout_builds_settlement_and_stores_record() {
        let (orders, vendors) = seeded().await;
        let broker = Arc::new(RecordingBroker::returning(StartTransactionResponse {
            payment_link: Some("https://pay.example/tx/1".into()),
            transaction_no: Some("TXN123".into()),
            ..Default::default()
        }));

        let processor = PaymentProcessor::new(
            test_config(),
            dec!(10),
            orders.clone(),
            vendors,
            broker.clone(),
        );

        let outcome = processor.start_escrow_payment(1).await.unwrap();
        assert_eq!(outcome.payment_link, "https://pay.example/tx/1");
        assert!(outcome.transaction_reference.starts_with("KM1T"));

        let request = broker.last_request.lock().await.clone().unwrap();
        // Admin first, vendors in grouping order: 20.00 / 90.00 / 90.00.
        assert_eq!(request.settlement_accounts.len(), 3);
        assert_eq!(request.settlement_accounts[0].amount, dec!(20.00));
        assert_eq!(request.settlement_accounts[1].amount, dec!(90.00));
        assert_eq!(request.settlement_accounts[2].amount, dec!(90.00));
        // Item text is cleaned for the API.
        assert_eq!(request.items[0].name, "Widget A");
        assert_eq!(request.items[0].description, "A fine widget");

        let record = orders.transaction_for_order(1).await.unwrap();
        assert_eq!(record.transaction_number.as_deref(), Some("TXN123"));
        assert_eq!(orders.get_order(1).await.unwrap().status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn missing_vendor_account_aborts_before_broker_call() {
        let (orders, _) = seeded().await;
        let broker = Arc::new(RecordingBroker::returning(StartTransactionResponse::default()));
        let processor = PaymentProcessor::new(
            test_config(),
            dec!(10),
            orders,
            Arc::new(VendorDirectory::new()),
            broker.clone(),
        );

        let err = processor.start_escrow_payment(1).await.unwrap_err();
        assert!(matches!(err, AppError::Settlement(_)));
        assert!(broker.last_request.lock().await.is_none());
    }

    #[tokio::test]
    async fn missing_payment_link_surfaces_configuration_problem() {
        let (orders, vendors) = seeded().await;
        let broker = Arc::new(RecordingBroker::returning(StartTransactionResponse::default()));
        let processor =
            PaymentProcessor::new(test_config(), dec!(10), orders.clone(), vendors, broker);

        let err = processor.start_escrow_payment(1).await.unwrap_err();
        assert!(matches!(err, AppError::Upstream(_)));
        // The failure is recorded on the order for the admin.
        let order = orders.get_order(1).await.unwrap();
        assert!(order.notes.iter().any(|n| n.text.contains("payment link")));
    }

    #[tokio::test]
    async fn escrow_code_application_updates_transaction_state() {
        let (orders, vendors) = seeded().await;
        let broker = Arc::new(
            RecordingBroker::returning(StartTransactionResponse {
                payment_link: Some("https://pay.example/tx/1".into()),
                transaction_no: Some("TXN123".into()),
                ..Default::default()
            })
            .with_apply(TransactionStatusResponse {
                status: Some("Completed".into()),
                ..Default::default()
            }),
        );
        let processor = PaymentProcessor::new(
            test_config(),
            dec!(10),
            orders.clone(),
            vendors,
            broker.clone(),
        );

        processor.start_escrow_payment(1).await.unwrap();
        let status = processor.apply_escrow_code(1, "ESC-42").await.unwrap();
        assert_eq!(status, "Completed");

        // Addressed by the broker-assigned number, not our reference.
        let (identifier, code) = broker.last_applied.lock().await.clone().unwrap();
        assert_eq!(identifier, "TXN123");
        assert_eq!(code, "ESC-42");

        let record = orders.transaction_for_order(1).await.unwrap();
        assert_eq!(record.status, "Completed");
        let order = orders.get_order(1).await.unwrap();
        assert!(order.notes.iter().any(|n| n.text.contains("escrow code applied")));
    }

    #[tokio::test]
    async fn escrow_code_application_without_transaction_is_not_found() {
        let (orders, vendors) = seeded().await;
        let broker = Arc::new(RecordingBroker::returning(StartTransactionResponse::default()));
        let processor = PaymentProcessor::new(test_config(), dec!(10), orders, vendors, broker);

        let err = processor.apply_escrow_code(1, "ESC-42").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn phone_normalization_handles_international_prefix() {
        assert_eq!(format_nigerian_phone("+234 803 123 4567"), "08031234567");
        assert_eq!(format_nigerian_phone("08031234567"), "08031234567");
        assert_eq!(format_nigerian_phone("8031234567"), "08031234567");
    }

    #[test]
    fn phone_normalization_repairs_invalid_prefix() {
        let normalized = format_nigerian_phone("123456789012");
        assert_eq!(normalized.len(), 11);
        assert!(normalized.starts_with("080"));
    }

    #[test]
    fn user_facing_messages_distinguish_causes() {
        assert!(user_facing_payment_error("HTTP 401: nope").contains("Authentication"));
        assert!(user_facing_payment_error("HTTP 400: bad").contains("could not be processed"));
        assert!(user_facing_payment_error("Connection failed to all broker domains")
            .contains("Could not connect"));
    }
}
