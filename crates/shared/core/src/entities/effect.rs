use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::values::{AccountId, Cursor, Timestamp};

/// One atomic change to an account's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectRecord {
    pub id: String,
    pub paging_token: Cursor,
    pub account: AccountId,
    #[serde(rename = "type")]
    pub kind: String,
    pub created_at: Timestamp,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EffectRecord {
    pub const ACCOUNT_REMOVED: &'static str = "account_removed";

    /// Whether this effect ends the lifetime of `account_id`
    pub fn removes_account(&self, account_id: &str) -> bool {
        self.kind == Self::ACCOUNT_REMOVED && self.account == account_id
    }
}
