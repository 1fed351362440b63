use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::Config;
use crate::constants::{PRICE_SOURCE_TRONSCAN, SOURCE_TRONSCAN, TRON_NATIVE_TOKEN_ID};
use crate::crypto::address::to_tron_address;
use crate::integrations::http::ProviderError;
use crate::integrations::schema::{non_empty, FlexNumber};
use crate::integrations::{ChainProvider, ScanTarget};
use crate::models::{Chain, ChainHoldings, NativeBalanceEntry, PositionKind, WalletPosition};
use crate::services::fallback::{first_usable, Strategy};
use crate::services::scan_context::ScanContext;

const TRON_API_KEY_HEADER: &str = "TRON-PRO-API-KEY";
const TOKEN_LIST_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TronscanEndpoint {
    AssetOverview,
    AccountTokens,
}

impl Strategy for TronscanEndpoint {
    fn name(&self) -> &'static str {
        match self {
            TronscanEndpoint::AssetOverview => "token_asset_overview",
            TronscanEndpoint::AccountTokens => "account_tokens",
        }
    }
}

const TRONSCAN_ENDPOINTS: [TronscanEndpoint; 2] =
    [TronscanEndpoint::AssetOverview, TronscanEndpoint::AccountTokens];

impl TronscanEndpoint {
    // Internal helper that builds the URL for `url`.
    fn url(&self, base: &str, address: &str) -> String {
        let root = base.trim_end_matches('/');
        match self {
            TronscanEndpoint::AssetOverview => {
                format!("{}/api/account/token_asset_overview?address={}", root, address)
            }
            TronscanEndpoint::AccountTokens => format!(
                "{}/api/account/tokens?address={}&start=0&limit={}",
                root, address, TOKEN_LIST_LIMIT
            ),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct TronscanTokenList {
    #[serde(default, alias = "tokens")]
    data: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TronscanToken {
    #[serde(default)]
    token_id: Option<String>,
    #[serde(default)]
    token_name: Option<String>,
    #[serde(default)]
    token_abbr: Option<String>,
    #[serde(default, alias = "tokenDecimals")]
    token_decimal: Option<FlexNumber>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    balance: Option<FlexNumber>,
    #[serde(default, alias = "priceInUsd")]
    token_price_in_usd: Option<FlexNumber>,
    #[serde(default)]
    asset_in_usd: Option<FlexNumber>,
}

/// What one Tronscan row turned into.
#[derive(Debug)]
enum TronHolding {
    Native(f64),
    Token(WalletPosition),
}

/// TRX and TRC-10/TRC-20 balances from Tronscan for the Tron account that
/// shares the EVM account hash.
pub struct TronProvider {
    config: Arc<Config>,
}

impl TronProvider {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    // Internal helper that fetches data for `fetch_endpoint`.
    async fn fetch_endpoint(
        &self,
        ctx: &ScanContext,
        endpoint: TronscanEndpoint,
        tron_address: &str,
    ) -> Result<Option<ChainHoldings>, ProviderError> {
        let url = endpoint.url(&self.config.tronscan_api_url, tron_address);
        let mut headers: Vec<(&str, &str)> = Vec::new();
        if let Some(key) = self.config.tron_api_key.as_deref() {
            headers.push((TRON_API_KEY_HEADER, key));
        }

        let label = format!("tronscan {}", endpoint.name());
        let list: TronscanTokenList = ctx
            .retry
            .run_provider(&label, || ctx.http.get_json(&url, &headers))
            .await?;
        let Some(rows) = list.data else {
            return Ok(None);
        };
        Ok(Some(holdings_from_rows(rows, tron_address)))
    }
}

#[async_trait]
impl ChainProvider for TronProvider {
    fn source(&self) -> &'static str {
        SOURCE_TRONSCAN
    }

    async fn fetch(
        &self,
        ctx: &ScanContext,
        chain: Chain,
        target: &ScanTarget,
    ) -> Result<ChainHoldings, ProviderError> {
        if chain != Chain::Tron {
            return Err(ProviderError::NoData(format!("{} is not served by Tronscan", chain)));
        }
        let evm_address = target.evm()?;
        let tron_address = to_tron_address(evm_address).ok_or_else(|| {
            ProviderError::InvalidAddress(format!("cannot derive Tron address from {}", evm_address))
        })?;
        tracing::debug!("scanning tron account {} for {}", tron_address, evm_address);

        let tron_ref = tron_address.as_str();
        first_usable("tron holdings", &TRONSCAN_ENDPOINTS, move |endpoint| {
            self.fetch_endpoint(ctx, *endpoint, tron_ref)
        })
        .await
    }
}

// Internal helper that parses or transforms values for `holdings_from_rows`.
fn holdings_from_rows(rows: Vec<serde_json::Value>, tron_address: &str) -> ChainHoldings {
    let mut native = 0.0;
    let mut positions = Vec::new();
    for row in rows {
        let token = match serde_json::from_value::<TronscanToken>(row) {
            Ok(token) => token,
            Err(err) => {
                tracing::debug!("skipping malformed tronscan row: {}", err);
                continue;
            }
        };
        match classify_token(token, tron_address) {
            Some(TronHolding::Native(balance)) => native += balance,
            Some(TronHolding::Token(position)) => positions.push(position),
            None => {}
        }
    }

    let mut native_entry = NativeBalanceEntry::for_chain(Chain::Tron, tron_address, native);
    native_entry.explorer_url = Chain::Tron.address_url(tron_address);
    ChainHoldings {
        native_balance: Some(native_entry),
        positions,
    }
}

/// TRX shows up as the `_` sentinel, or as a trc10 row abbreviated `trx`
/// with id `0` on older endpoints.
fn is_native_trx(token: &TronscanToken, token_id: &str) -> bool {
    if token_id == TRON_NATIVE_TOKEN_ID {
        return true;
    }
    let abbr_is_trx = token
        .token_abbr
        .as_deref()
        .is_some_and(|abbr| abbr.trim().eq_ignore_ascii_case("trx"));
    let is_trc10 = token
        .token_type
        .as_deref()
        .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("trc10"));
    abbr_is_trx && is_trc10 && token_id == "0"
}

// Internal helper that parses or transforms values for `classify_token`.
fn classify_token(token: TronscanToken, tron_address: &str) -> Option<TronHolding> {
    let token_id = non_empty(token.token_id.as_deref())?;
    let price = token.token_price_in_usd.as_ref().and_then(FlexNumber::as_f64);

    if is_native_trx(&token, &token_id) {
        let decimals = token
            .token_decimal
            .as_ref()
            .and_then(FlexNumber::as_u32)
            .unwrap_or(Chain::Tron.native_decimals());
        let balance = token.balance.as_ref().map(|b| b.scaled(decimals)).unwrap_or(0.0);
        return Some(TronHolding::Native(balance));
    }

    let token_type = token.token_type.as_deref().unwrap_or_default().to_ascii_lowercase();
    if token_type != "trc10" && token_type != "trc20" {
        return None;
    }

    let decimals = token
        .token_decimal
        .as_ref()
        .and_then(FlexNumber::as_u32)
        .unwrap_or(0);
    let balance = token.balance.as_ref()?.scaled(decimals);
    let symbol = non_empty(token.token_abbr.as_deref())
        .map(|s| s.to_ascii_uppercase())
        .unwrap_or_else(|| token_id.clone());
    let name = non_empty(token.token_name.as_deref()).unwrap_or_else(|| symbol.clone());
    let explorer_url = if token_type == "trc20" {
        Chain::Tron.token_url(&token_id, tron_address)
    } else {
        format!("{}/token/{}", Chain::Tron.explorer_base(), token_id)
    };

    let mut position = WalletPosition::new(
        Chain::Tron,
        PositionKind::FungibleToken,
        token_id,
        symbol,
        name,
        decimals,
        balance,
        explorer_url,
    );
    position = match (price, token.asset_in_usd.as_ref().and_then(FlexNumber::as_f64)) {
        (Some(price), _) if price > 0.0 => position.with_price(price, PRICE_SOURCE_TRONSCAN),
        (_, Some(value)) if value > 0.0 => position.with_value(value, PRICE_SOURCE_TRONSCAN),
        _ => position,
    };
    Some(TronHolding::Token(position))
}
