use serde::{Deserialize, Serialize};

use crate::asset::Asset;
use crate::values::Amount;

/// One aggregated price level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Amount,
    pub amount: Amount,
}

/// Order book snapshot for a (base, counter) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderbookRecord {
    #[serde(default)]
    pub bids: Vec<PriceLevel>,
    #[serde(default)]
    pub asks: Vec<PriceLevel>,
    pub base: Asset,
    pub counter: Asset,
}

impl OrderbookRecord {
    /// Book with no levels on either side
    pub fn empty(base: Asset, counter: Asset) -> Self {
        OrderbookRecord {
            bids: Vec::new(),
            asks: Vec::new(),
            base,
            counter,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }
}
