use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{
    crypto::address::{canonical_platform_address, is_valid_evm_address, looks_like_platform_address},
    error::{AppError, Result},
    models::{
        AddressKind, ApiResponse, Chain, ChainScanResult, CompositeResult, NativeBalanceEntry,
        ScanRequest, ScanStatus, WalletPosition, ALL_CHAINS, CHAIN_ALIASES,
    },
};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WalletScanQuery {
    pub address: Option<String>,
    pub chain: Option<String>,
    #[serde(rename = "pAddress", alias = "avalanchePAddress")]
    pub p_address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainResultSummary {
    pub chain: Chain,
    pub source: String,
    pub status: ScanStatus,
    pub token_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_balance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&ChainScanResult> for ChainResultSummary {
    fn from(result: &ChainScanResult) -> Self {
        Self {
            chain: result.chain,
            source: result.source.clone(),
            status: result.status,
            token_count: result.positions.len(),
            native_balance: result.native_balance.as_ref().map(|native| native.balance),
            error: result.error.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletScanResponse {
    pub address: String,
    pub chain: String,
    /// Native balance of the first scanned chain that reported one.
    pub native_balance: Option<NativeBalanceEntry>,
    pub native_balances: Vec<NativeBalanceEntry>,
    pub tokens: Vec<WalletPosition>,
    pub token_count: usize,
    pub chains_searched: Vec<Chain>,
    pub chain_results: Vec<ChainResultSummary>,
    pub fetched_at: String,
}

impl WalletScanResponse {
    pub fn from_composite(selector: &str, composite: CompositeResult) -> Self {
        Self {
            address: composite.address,
            chain: selector.to_string(),
            native_balance: composite.native_balances.first().cloned(),
            token_count: composite.positions.len(),
            chain_results: composite
                .chain_results
                .iter()
                .map(ChainResultSummary::from)
                .collect(),
            native_balances: composite.native_balances,
            tokens: composite.positions,
            chains_searched: composite.chains_scanned,
            fetched_at: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedChain {
    pub id: Chain,
    pub display_name: &'static str,
    pub native_symbol: &'static str,
    pub native_decimals: u32,
    pub address_kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ChainAlias {
    pub alias: &'static str,
    pub chains: Vec<Chain>,
}

#[derive(Debug, Serialize)]
pub struct SupportedChainsResponse {
    pub chains: Vec<SupportedChain>,
    pub aliases: Vec<ChainAlias>,
}

// Internal helper that parses or transforms values for `trimmed`.
fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validates the query and classifies the primary address. Runs before any
/// provider is contacted.
pub fn scan_request_from_query(query: WalletScanQuery) -> Result<ScanRequest> {
    let address = trimmed(query.address)
        .ok_or_else(|| AppError::BadRequest("address is required".to_string()))?;

    let (evm_address, mut platform_address) = if is_valid_evm_address(&address) {
        (Some(address.clone()), None)
    } else if looks_like_platform_address(&address) {
        (None, Some(canonical_platform_address(&address)))
    } else {
        return Err(AppError::BadRequest(format!(
            "Invalid wallet address: expected 0x + 40 hex characters or a P-Chain address, got '{}'",
            address
        )));
    };

    if let Some(p_address) = trimmed(query.p_address) {
        if !looks_like_platform_address(&p_address) {
            return Err(AppError::BadRequest(format!(
                "Invalid P-Chain address '{}'",
                p_address
            )));
        }
        platform_address = Some(canonical_platform_address(&p_address));
    }

    let selector = trimmed(query.chain)
        .map(|chain| chain.to_ascii_lowercase())
        .unwrap_or_else(|| "auto".to_string());

    Ok(ScanRequest {
        address,
        evm_address,
        platform_address,
        selector,
    })
}

/// GET /api/v1/wallet/scan
pub async fn scan_wallet(
    State(state): State<AppState>,
    Query(query): Query<WalletScanQuery>,
) -> Result<Json<WalletScanResponse>> {
    let request = scan_request_from_query(query)?;
    let composite = state.scanner.scan(&request).await?;
    tracing::info!(
        "Wallet scan for {} finished: {} positions from {} chains",
        request.address,
        composite.positions.len(),
        composite
            .chain_results
            .iter()
            .filter(|result| result.is_ok())
            .count()
    );
    Ok(Json(WalletScanResponse::from_composite(
        &request.selector,
        composite,
    )))
}

/// GET /api/v1/wallet/chains
pub async fn list_chains() -> Json<ApiResponse<SupportedChainsResponse>> {
    let chains = ALL_CHAINS
        .iter()
        .map(|chain| SupportedChain {
            id: *chain,
            display_name: chain.display_name(),
            native_symbol: chain.native_symbol(),
            native_decimals: chain.native_decimals(),
            address_kind: match chain.required_address() {
                AddressKind::Evm => "evm",
                AddressKind::TronFromEvm => "tron-from-evm",
                AddressKind::Platform => "platform",
            },
        })
        .collect();
    let aliases = CHAIN_ALIASES
        .iter()
        .map(|(alias, members)| ChainAlias {
            alias,
            chains: members.to_vec(),
        })
        .collect();
    Json(ApiResponse::success(SupportedChainsResponse { chains, aliases }))
}
