use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::asset::Asset;
use crate::values::{AccountId, Amount, Cursor};

/// An open order (offer) placed by an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferRecord {
    /// Horizon renders offer ids as strings on recent versions, numbers on older ones
    #[serde(deserialize_with = "offer_id")]
    pub id: String,
    pub paging_token: Cursor,
    pub seller: AccountId,
    pub selling: Asset,
    pub buying: Asset,
    pub amount: Amount,
    pub price: Amount,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl OfferRecord {
    /// Offer id as a cursor, so ids compare numerically
    pub fn id_cursor(&self) -> Cursor {
        Cursor::new(self.id.clone())
    }
}

fn offer_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid offer id: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_numeric_and_string_ids() {
        let template = |id: &str| {
            format!(
                r#"{{
                    "id": {},
                    "paging_token": "165561423",
                    "seller": "GABC",
                    "selling": {{"asset_type": "native"}},
                    "buying": {{"asset_type": "credit_alphanum4", "asset_code": "USD", "asset_issuer": "GISSUER"}},
                    "amount": "10.0000000",
                    "price": "0.2500000"
                }}"#,
                id
            )
        };

        let numeric: OfferRecord = serde_json::from_str(&template("165561423")).unwrap();
        let string: OfferRecord = serde_json::from_str(&template("\"165561423\"")).unwrap();
        assert_eq!(numeric.id, string.id);
        assert_eq!(numeric.price, dec!(0.25));
        assert!(numeric.selling.is_native());
    }
}
