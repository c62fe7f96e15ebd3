use reqwest::Client;

use crate::error::HorizonError;

/// Pick the Horizon base URL to use.
///
/// The primary wins whenever it answers with a 2xx. Otherwise the secondary
/// is probed and used if it answers with a 2xx; if neither does, the primary
/// is kept. A network error on the primary only counts as "not ok", a
/// network error on the secondary is returned.
pub async fn select_horizon(
    client: &Client,
    primary: &str,
    secondary: &str,
) -> Result<String, HorizonError> {
    match client.get(primary).send().await {
        Ok(resp) if resp.status().is_success() => return Ok(primary.to_string()),
        Ok(resp) => {
            tracing::warn!("Primary Horizon {} answered {}", primary, resp.status());
        }
        Err(e) => {
            tracing::warn!("Primary Horizon {} unreachable: {}", primary, e);
        }
    }

    let resp = client.get(secondary).send().await?;
    if resp.status().is_success() {
        tracing::info!("Failing over to secondary Horizon {}", secondary);
        Ok(secondary.to_string())
    } else {
        Ok(primary.to_string())
    }
}
