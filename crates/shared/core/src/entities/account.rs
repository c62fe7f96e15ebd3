use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::values::{AccountId, Amount};

/// One balance line of an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_issuer: Option<String>,
    pub balance: Amount,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<Amount>,
}

/// Full account record as returned by `GET /accounts/{id}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub id: AccountId,
    /// Sequence number, kept as Horizon's decimal string
    pub sequence: String,
    #[serde(default)]
    pub balances: Vec<Balance>,
    #[serde(default)]
    pub subentry_count: u32,
    #[serde(default)]
    pub last_modified_ledger: u64,
    /// Everything else Horizon sends (signers, flags, thresholds, links...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AccountRecord {
    /// Reduced view used for change detection: fields like
    /// `last_modified_ledger` move on every ledger close without carrying
    /// information for a consumer.
    pub fn change_snapshot(&self) -> String {
        serde_json::to_string(&(&self.sequence, &self.balances)).unwrap_or_default()
    }

    /// Balance of the native asset, if the account holds one
    pub fn native_balance(&self) -> Option<Amount> {
        self.balances
            .iter()
            .find(|b| b.asset_type == "native")
            .map(|b| b.balance)
    }
}
