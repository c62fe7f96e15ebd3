use ledgerwatch_core::Asset;

/// Depth requested for order book reads
pub const ORDERBOOK_LIMIT: u32 = 100;

/// Query parameters selecting an order book
///
/// Native assets only carry a type; credit assets add code and issuer.
pub fn orderbook_query(selling: &Asset, buying: &Asset) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("limit", ORDERBOOK_LIMIT.to_string()),
        ("buying_asset_type", buying.asset_type().to_string()),
        ("selling_asset_type", selling.asset_type().to_string()),
    ];

    if let Some(issuer) = buying.issuer() {
        query.push(("buying_asset_code", buying.code().to_string()));
        query.push(("buying_asset_issuer", issuer.to_string()));
    }
    if let Some(issuer) = selling.issuer() {
        query.push(("selling_asset_code", selling.code().to_string()));
        query.push(("selling_asset_issuer", issuer.to_string()));
    }

    query
}
