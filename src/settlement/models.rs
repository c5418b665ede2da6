use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Marketplace vendor identifier (the product author in the host store).
pub type VendorId = u64;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccountOwner {
    Admin,
    Vendor(VendorId),
}

/// Bank payout destination for one settlement party. Immutable per request.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PayoutAccount {
    pub account_name: String,
    pub account_number: String,
    pub bank_code: String,
    pub owner: AccountOwner,
}

impl PayoutAccount {
    /// All three bank fields must be non-empty before the account can
    /// appear in a broker settlement request.
    pub fn is_complete(&self) -> bool {
        !self.account_name.trim().is_empty()
            && !self.account_number.trim().is_empty()
            && !self.bank_code.trim().is_empty()
    }
}

/// One payout line in a broker transaction-start request.
///
/// Invariant: across a settlement run the amounts sum exactly to the
/// order's item total and no amount is negative.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementInstruction {
    pub account: PayoutAccount,
    pub amount: Decimal,
}
