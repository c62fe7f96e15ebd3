//! Entity keys
//!
//! A key identifies one subscribable resource: the Horizon base URL plus the
//! resource identity. Two requests with equal keys share one subscription.

use std::fmt;

use crate::asset::Asset;
use crate::values::AccountId;

fn normalize_horizon(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Key of an account-scoped resource (account, effects, transactions, offers)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccountKey {
    pub horizon: String,
    pub account_id: AccountId,
}

impl AccountKey {
    pub fn new(horizon: &str, account_id: impl Into<AccountId>) -> Self {
        AccountKey {
            horizon: normalize_horizon(horizon),
            account_id: account_id.into(),
        }
    }
}

impl fmt::Display for AccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.horizon, self.account_id)
    }
}

/// Key of an order book; the asset pair is ordered (selling, buying)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderbookKey {
    pub horizon: String,
    pub selling: Asset,
    pub buying: Asset,
}

impl OrderbookKey {
    pub fn new(horizon: &str, selling: Asset, buying: Asset) -> Self {
        OrderbookKey {
            horizon: normalize_horizon(horizon),
            selling,
            buying,
        }
    }

    /// A pair traded against itself carries no information
    pub fn is_self_pair(&self) -> bool {
        self.selling == self.buying
    }
}

impl fmt::Display for OrderbookKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.horizon, self.selling, self.buying)
    }
}

/// Any subscribable resource key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Account(AccountKey),
    Orderbook(OrderbookKey),
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKey::Account(key) => key.fmt(f),
            EntityKey::Orderbook(key) => key.fmt(f),
        }
    }
}

impl From<AccountKey> for EntityKey {
    fn from(key: AccountKey) -> Self {
        EntityKey::Account(key)
    }
}

impl From<OrderbookKey> for EntityKey {
    fn from(key: OrderbookKey) -> Self {
        EntityKey::Orderbook(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_key_normalizes_trailing_slash() {
        let a = AccountKey::new("https://horizon.stellar.org/", "GABC");
        let b = AccountKey::new("https://horizon.stellar.org", "GABC");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "https://horizon.stellar.org:GABC");
    }

    #[test]
    fn test_orderbook_key_is_ordered() {
        let usd = Asset::credit("USD", "GISSUER");
        let ab = OrderbookKey::new("https://h", Asset::Native, usd.clone());
        let ba = OrderbookKey::new("https://h", usd, Asset::Native);
        assert_ne!(ab, ba);
        assert_eq!(ab.to_string(), "https://h:XLM:USD:GISSUER");
    }

    #[test]
    fn test_self_pair() {
        let key = OrderbookKey::new("https://h", Asset::Native, Asset::Native);
        assert!(key.is_self_pair());
    }
}
