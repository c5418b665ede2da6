use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::settlement::models::{PayoutAccount, VendorId};

/// Vendor payout account directory.
///
/// Stands in for the host store's per-vendor profile data; the settlement
/// calculator consumes a point-in-time snapshot so accounts are immutable
/// per request.
pub struct VendorDirectory {
    accounts: RwLock<HashMap<VendorId, PayoutAccount>>,
}

impl VendorDirectory {
    pub fn new() -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register_account(&self, vendor_id: VendorId, account: PayoutAccount) {
        let mut accounts = self.accounts.write().await;
        accounts.insert(vendor_id, account);
    }

    pub async fn snapshot(&self) -> HashMap<VendorId, PayoutAccount> {
        self.accounts.read().await.clone()
    }
}

impl Default for VendorDirectory {
    fn default() -> Self {
        Self::new()
    }
}
