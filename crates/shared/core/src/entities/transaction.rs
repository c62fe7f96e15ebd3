use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::values::{AccountId, Cursor, Timestamp};

/// A transaction touching an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: String,
    pub hash: String,
    pub paging_token: Cursor,
    pub source_account: AccountId,
    pub created_at: Timestamp,
    #[serde(default = "default_successful")]
    pub successful: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_successful() -> bool {
    true
}
