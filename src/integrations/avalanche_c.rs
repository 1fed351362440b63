use crate::integrations::http::{ProviderError, ProviderHttp};
use crate::services::balance::normalize_hex;

const AVAX_DECIMALS: u32 = 18;

// Internal helper that builds params for `eth_get_balance_params`.
fn eth_get_balance_params(address: &str) -> serde_json::Value {
    serde_json::json!([address, "latest"])
}

/// Reads the native AVAX balance straight from a C-Chain node.
///
/// Explorers can lag behind the chain head, so this is the authoritative
/// answer when an explorer reports zero.
pub async fn fetch_native_balance(
    http: &ProviderHttp,
    rpc_url: &str,
    address: &str,
) -> Result<f64, ProviderError> {
    if rpc_url.trim().is_empty() {
        return Err(ProviderError::NoData("C-Chain RPC not configured".to_string()));
    }
    let raw: String = http
        .rpc_call(rpc_url, "eth_getBalance", eth_get_balance_params(address))
        .await?;
    if !raw.trim().starts_with("0x") {
        return Err(ProviderError::Decode(format!(
            "eth_getBalance returned non-hex value {}",
            raw
        )));
    }
    Ok(normalize_hex(&raw, AVAX_DECIMALS))
}
