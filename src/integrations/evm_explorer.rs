use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use url::Url;

use crate::config::{Config, ExplorerEndpoints};
use crate::constants::{
    EXPLORER_TOKEN_MAX_PAGES, EXPLORER_TOKEN_PAGE_SIZE, PRICE_SOURCE_EXPLORER, SOURCE_EVM_EXPLORER,
};
use crate::integrations::avalanche_c;
use crate::integrations::http::{looks_like_rate_limit, ProviderError};
use crate::integrations::schema::{non_empty, FlexNumber};
use crate::integrations::{ChainProvider, ScanTarget};
use crate::models::{Chain, ChainHoldings, NativeBalanceEntry, PositionKind, WalletPosition};
use crate::services::fallback::{first_usable, Strategy};
use crate::services::scan_context::ScanContext;

const DEFAULT_TOKEN_DECIMALS: u32 = 18;

/// Explorer API generations, tried in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExplorerApi {
    Legacy,
    V2,
}

impl Strategy for ExplorerApi {
    fn name(&self) -> &'static str {
        match self {
            ExplorerApi::Legacy => "legacy-api",
            ExplorerApi::V2 => "v2-api",
        }
    }
}

/// Token enumeration variants of the legacy `module=account` API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LegacyTokenAction {
    TokenList,
    AddressTokenBalance,
}

impl Strategy for LegacyTokenAction {
    fn name(&self) -> &'static str {
        match self {
            LegacyTokenAction::TokenList => "tokenlist",
            LegacyTokenAction::AddressTokenBalance => "addresstokenbalance",
        }
    }
}

const LEGACY_TOKEN_ACTIONS: [LegacyTokenAction; 2] = [
    LegacyTokenAction::TokenList,
    LegacyTokenAction::AddressTokenBalance,
];

#[derive(Debug, Deserialize)]
struct LegacyEnvelope {
    #[serde(default)]
    status: Option<FlexNumber>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    result: Value,
}

/// Token row of both legacy enumeration actions (Blockscout `tokenlist`,
/// Etherscan `addresstokenbalance`, and compatible clones).
#[derive(Debug, Default, Deserialize)]
struct LegacyTokenItem {
    #[serde(
        default,
        alias = "contractAddress",
        alias = "TokenAddress",
        alias = "tokenAddress",
        alias = "token_address",
        alias = "contract_address",
        alias = "address"
    )]
    contract: Option<String>,
    #[serde(
        default,
        alias = "TokenSymbol",
        alias = "tokenSymbol",
        alias = "token_symbol",
        alias = "Symbol",
        alias = "ticker"
    )]
    symbol: Option<String>,
    #[serde(
        default,
        alias = "TokenName",
        alias = "tokenName",
        alias = "token_name",
        alias = "Name",
        alias = "title"
    )]
    name: Option<String>,
    #[serde(
        default,
        alias = "TokenDivisor",
        alias = "tokenDecimal",
        alias = "tokenDecimals",
        alias = "token_decimals",
        alias = "divisor",
        alias = "Decimals"
    )]
    decimals: Option<FlexNumber>,
    #[serde(
        default,
        alias = "TokenQuantity",
        alias = "tokenQuantity",
        alias = "token_quantity",
        alias = "quantity",
        alias = "value",
        alias = "amount"
    )]
    balance: Option<FlexNumber>,
    #[serde(
        default,
        rename = "type",
        alias = "tokenType",
        alias = "TokenType",
        alias = "token_type",
        alias = "ercType"
    )]
    token_type: Option<String>,
    #[serde(
        default,
        alias = "TokenPriceUSD",
        alias = "tokenPriceUsd",
        alias = "priceUsd",
        alias = "price_usd",
        alias = "exchange_rate",
        alias = "usdPrice"
    )]
    price_usd: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
struct V2Address {
    #[serde(default)]
    coin_balance: Option<FlexNumber>,
}

#[derive(Debug, Deserialize)]
struct V2TokenBalance {
    #[serde(default)]
    token: V2Token,
    #[serde(default)]
    value: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
struct V2Token {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    address_hash: Option<String>,
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    decimals: Option<FlexNumber>,
    #[serde(default, rename = "type")]
    token_type: Option<String>,
    #[serde(default)]
    exchange_rate: Option<FlexNumber>,
}

/// One legacy `module=account` root and the key issued for it.
#[derive(Debug, Clone, Copy)]
struct LegacyApi<'a> {
    base: &'a str,
    api_key: Option<&'a str>,
}

impl LegacyApi<'_> {
    // Internal helper that builds the URL for `url`.
    fn url(&self, params: &[(&str, &str)]) -> Result<String, ProviderError> {
        let mut url = Url::parse(self.base).map_err(|e| {
            ProviderError::Transport(format!("invalid explorer URL {}: {}", self.base, e))
        })?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            if let Some(key) = self.api_key {
                pairs.append_pair("apikey", key);
            }
        }
        Ok(url.to_string())
    }
}

/// Native and token balances from Etherscan-style and Blockscout explorers.
pub struct EvmExplorerProvider {
    config: Arc<Config>,
}

impl EvmExplorerProvider {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Explorers can lag, so a zero C-Chain balance is re-read from a node.
    async fn reconcile_c_chain_native(
        &self,
        ctx: &ScanContext,
        address: &str,
        mut explored: ChainHoldings,
    ) -> ChainHoldings {
        let explorer_native = explored
            .native_balance
            .as_ref()
            .map(|native| native.balance)
            .unwrap_or(0.0);
        if explorer_native > 0.0 {
            return explored;
        }

        let rpc_url = self.config.avalanche_c_rpc_url.as_str();
        let lookup = ctx
            .retry
            .run_provider("avalanche-c eth_getBalance", || {
                avalanche_c::fetch_native_balance(&ctx.http, rpc_url, address)
            })
            .await;
        match lookup {
            Ok(balance) => {
                explored.native_balance =
                    Some(NativeBalanceEntry::for_chain(Chain::AvalancheC, address, balance));
            }
            Err(err) => {
                tracing::debug!("avalanche-c eth_getBalance fallback failed: {}", err);
            }
        }
        explored
    }
}

#[async_trait]
impl ChainProvider for EvmExplorerProvider {
    fn source(&self) -> &'static str {
        SOURCE_EVM_EXPLORER
    }

    async fn fetch(
        &self,
        ctx: &ScanContext,
        chain: Chain,
        target: &ScanTarget,
    ) -> Result<ChainHoldings, ProviderError> {
        if !chain.is_evm_explorer_chain() {
            return Err(ProviderError::NoData(format!(
                "{} is not served by EVM explorers",
                chain
            )));
        }
        let address = target.evm()?;
        let endpoints = self.config.explorer_endpoints(chain);
        let strategies = explorer_strategies(&endpoints);
        let label = format!("{} explorer", chain);
        let endpoints_ref = &endpoints;

        let explored = first_usable(&label, &strategies, move |api| {
            fetch_via(ctx, chain, *api, endpoints_ref, address)
        })
        .await?;

        if chain == Chain::AvalancheC {
            return Ok(self.reconcile_c_chain_native(ctx, address, explored).await);
        }
        Ok(explored)
    }
}

// Internal helper that supports `explorer_strategies` operations.
fn explorer_strategies(endpoints: &ExplorerEndpoints) -> Vec<ExplorerApi> {
    let mut strategies = Vec::new();
    if endpoints.legacy_api_url.is_some() {
        strategies.push(ExplorerApi::Legacy);
    }
    if endpoints.v2_api_url.is_some() {
        strategies.push(ExplorerApi::V2);
    }
    strategies
}

// Internal helper that fetches data for `fetch_via`.
async fn fetch_via(
    ctx: &ScanContext,
    chain: Chain,
    api: ExplorerApi,
    endpoints: &ExplorerEndpoints,
    address: &str,
) -> Result<Option<ChainHoldings>, ProviderError> {
    match (api, endpoints) {
        (
            ExplorerApi::Legacy,
            ExplorerEndpoints {
                legacy_api_url: Some(base),
                api_key,
                ..
            },
        ) => {
            let legacy = LegacyApi {
                base,
                api_key: api_key.as_deref(),
            };
            fetch_legacy(ctx, chain, legacy, address).await
        }
        (
            ExplorerApi::V2,
            ExplorerEndpoints {
                v2_api_url: Some(base),
                ..
            },
        ) => fetch_v2(ctx, chain, base, address).await,
        _ => Ok(None),
    }
}

/// Legacy holdings, usable only when token enumeration gave a definite
/// answer. A token lookup that could not run sends the scan on to v2.
async fn fetch_legacy(
    ctx: &ScanContext,
    chain: Chain,
    api: LegacyApi<'_>,
    address: &str,
) -> Result<Option<ChainHoldings>, ProviderError> {
    let (native, tokens) = tokio::join!(
        legacy_native_balance(ctx, api, address),
        legacy_tokens(ctx, chain, api, address)
    );

    let positions = match tokens {
        Ok(positions) => positions,
        Err(err) if err.is_absent() => {
            tracing::debug!("{} legacy API cannot enumerate tokens: {}", chain, err);
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    let native = match native {
        Ok(native) => native,
        Err(err) if err.is_absent() => None,
        Err(err) => return Err(err),
    };
    if native.is_none() && positions.is_empty() {
        return Ok(None);
    }

    Ok(Some(ChainHoldings {
        native_balance: native.map(|balance| NativeBalanceEntry::for_chain(chain, address, balance)),
        positions,
    }))
}

// Internal helper that fetches data for `legacy_native_balance`.
async fn legacy_native_balance(
    ctx: &ScanContext,
    api: LegacyApi<'_>,
    address: &str,
) -> Result<Option<f64>, ProviderError> {
    let url = api.url(&[
        ("module", "account"),
        ("action", "balance"),
        ("address", address),
        ("tag", "latest"),
    ])?;
    let envelope: LegacyEnvelope = ctx
        .retry
        .run_provider("legacy balance", || ctx.http.get_json(&url, &[]))
        .await?;
    let Some(result) = legacy_result(envelope)? else {
        return Ok(None);
    };
    let amount: FlexNumber = serde_json::from_value(result)
        .map_err(|e| ProviderError::Decode(format!("legacy balance: {}", e)))?;
    Ok(Some(amount.scaled(DEFAULT_TOKEN_DECIMALS)))
}

/// Tries each token action in turn. An explorer that answered "none found"
/// to any action settles it as empty; otherwise the failure is returned.
async fn legacy_tokens(
    ctx: &ScanContext,
    chain: Chain,
    api: LegacyApi<'_>,
    address: &str,
) -> Result<Vec<WalletPosition>, ProviderError> {
    let confirmed_empty = AtomicBool::new(false);
    let confirmed = &confirmed_empty;
    let label = format!("{} legacy tokens", chain);

    let lookup = first_usable(&label, &LEGACY_TOKEN_ACTIONS, move |action| {
        legacy_token_attempt(ctx, chain, api, address, *action, confirmed)
    })
    .await;

    match lookup {
        Ok(positions) => Ok(positions),
        Err(err) if confirmed_empty.load(Ordering::Relaxed) => {
            tracing::debug!("{} explorer reports no tokens ({})", chain, err);
            Ok(Vec::new())
        }
        Err(err) => Err(err),
    }
}

// Internal helper that fetches data for `legacy_token_attempt`.
async fn legacy_token_attempt(
    ctx: &ScanContext,
    chain: Chain,
    api: LegacyApi<'_>,
    address: &str,
    action: LegacyTokenAction,
    confirmed_empty: &AtomicBool,
) -> Result<Option<Vec<WalletPosition>>, ProviderError> {
    match legacy_token_rows(ctx, chain, api, address, action).await? {
        Some(positions) if !positions.is_empty() => Ok(Some(positions)),
        Some(_) => {
            confirmed_empty.store(true, Ordering::Relaxed);
            Ok(None)
        }
        None => Ok(None),
    }
}

/// Positions from one token action. `Some(empty)` is a definite "no
/// tokens"; `None` means the answer had no usable shape.
async fn legacy_token_rows(
    ctx: &ScanContext,
    chain: Chain,
    api: LegacyApi<'_>,
    address: &str,
    action: LegacyTokenAction,
) -> Result<Option<Vec<WalletPosition>>, ProviderError> {
    let max_pages = match action {
        LegacyTokenAction::TokenList => 1,
        LegacyTokenAction::AddressTokenBalance => EXPLORER_TOKEN_MAX_PAGES,
    };

    let mut rows: Vec<Value> = Vec::new();
    for page in 1..=max_pages {
        match legacy_token_page(ctx, api, address, action, page).await? {
            Some(batch) => {
                let full_page = batch.len() >= EXPLORER_TOKEN_PAGE_SIZE;
                rows.extend(batch);
                if !full_page {
                    break;
                }
            }
            None if page == 1 => return Ok(None),
            None => break,
        }
    }

    Ok(Some(
        parse_rows::<LegacyTokenItem>(rows)
            .into_iter()
            .filter_map(|item| legacy_token_position(chain, address, item))
            .collect(),
    ))
}

// Internal helper that fetches data for `legacy_token_page`.
async fn legacy_token_page(
    ctx: &ScanContext,
    api: LegacyApi<'_>,
    address: &str,
    action: LegacyTokenAction,
    page: usize,
) -> Result<Option<Vec<Value>>, ProviderError> {
    let page = page.to_string();
    let page_size = EXPLORER_TOKEN_PAGE_SIZE.to_string();
    let mut params = vec![
        ("module", "account"),
        ("action", action.name()),
        ("address", address),
    ];
    if action == LegacyTokenAction::AddressTokenBalance {
        params.push(("page", page.as_str()));
        params.push(("offset", page_size.as_str()));
    }
    let url = api.url(&params)?;
    let label = format!("legacy {}", action.name());
    let envelope: LegacyEnvelope = ctx
        .retry
        .run_provider(&label, || ctx.http.get_json(&url, &[]))
        .await?;

    match legacy_result(envelope)? {
        None => Ok(Some(Vec::new())),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Ok(None),
    }
}

// Internal helper that fetches data for `fetch_v2`.
async fn fetch_v2(
    ctx: &ScanContext,
    chain: Chain,
    base: &str,
    address: &str,
) -> Result<Option<ChainHoldings>, ProviderError> {
    let root = base.trim_end_matches('/');
    let address_url = format!("{}/api/v2/addresses/{}", root, address);
    let tokens_url = format!("{}/api/v2/addresses/{}/token-balances", root, address);

    let (summary, tokens) = tokio::join!(
        ctx.retry
            .run_provider("v2 address", || ctx.http.get_json::<V2Address>(&address_url, &[])),
        ctx.retry
            .run_provider("v2 token balances", || ctx.http.get_json::<Value>(&tokens_url, &[]))
    );

    let native = match summary {
        Ok(summary) => summary
            .coin_balance
            .map(|balance| balance.scaled(chain.native_decimals()))
            .unwrap_or(0.0),
        // Blockscout answers 404 for addresses it has never seen.
        Err(ProviderError::NotFound(_)) => 0.0,
        Err(err) => return Err(err),
    };
    let positions = match tokens {
        Ok(value) => parse_items::<V2TokenBalance>(value)
            .into_iter()
            .filter_map(|item| v2_token_position(chain, address, item))
            .collect(),
        Err(ProviderError::NotFound(_)) => Vec::new(),
        Err(err) => return Err(err),
    };

    Ok(Some(ChainHoldings {
        native_balance: Some(NativeBalanceEntry::for_chain(chain, address, native)),
        positions,
    }))
}

/// Unwraps the `{status, message, result}` envelope. `Ok(None)` is an
/// explicit "nothing found".
fn legacy_result(envelope: LegacyEnvelope) -> Result<Option<Value>, ProviderError> {
    let status = envelope.status.as_ref().map(FlexNumber::raw);
    match status.as_deref() {
        Some("1") | None => {
            if envelope.result.is_null() {
                Ok(None)
            } else {
                Ok(Some(envelope.result))
            }
        }
        _ => {
            let message = envelope.message.unwrap_or_default();
            let detail = match envelope.result.as_str() {
                Some(text) if !text.trim().is_empty() => format!("{} ({})", message, text.trim()),
                _ => message,
            };
            if looks_like_rate_limit(&detail) {
                return Err(ProviderError::RateLimited(detail));
            }
            let lower = detail.to_ascii_lowercase();
            if lower.contains("no ") && lower.contains("found") {
                return Ok(None);
            }
            Err(ProviderError::Rpc {
                code: 0,
                message: detail,
            })
        }
    }
}

// Internal helper that parses or transforms values for `parse_items`.
fn parse_items<T: DeserializeOwned>(value: Value) -> Vec<T> {
    let Value::Array(items) = value else {
        return Vec::new();
    };
    parse_rows(items)
}

/// Decodes rows one by one so one malformed row is skipped instead of
/// failing the whole list.
fn parse_rows<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                tracing::debug!("skipping malformed explorer token row: {}", err);
                None
            }
        })
        .collect()
}

// Internal helper that checks conditions for `is_fungible_type`.
fn is_fungible_type(token_type: Option<&str>) -> bool {
    let Some(kind) = token_type else {
        return true;
    };
    let lower = kind.to_ascii_lowercase();
    !(lower.contains("721") || lower.contains("1155") || lower.contains("404") || lower.contains("nft"))
}

// Internal helper that parses or transforms values for `legacy_token_position`.
fn legacy_token_position(chain: Chain, holder: &str, item: LegacyTokenItem) -> Option<WalletPosition> {
    if !is_fungible_type(item.token_type.as_deref()) {
        return None;
    }
    let contract = non_empty(item.contract.as_deref())?.to_ascii_lowercase();
    let decimals = item
        .decimals
        .as_ref()
        .and_then(FlexNumber::as_u32)
        .unwrap_or(DEFAULT_TOKEN_DECIMALS);
    let balance = item.balance.as_ref()?.scaled(decimals);
    let symbol = non_empty(item.symbol.as_deref()).unwrap_or_else(|| "UNKNOWN".to_string());
    let name = non_empty(item.name.as_deref()).unwrap_or_else(|| symbol.clone());

    let position = WalletPosition::new(
        chain,
        PositionKind::FungibleToken,
        contract.clone(),
        symbol,
        name,
        decimals,
        balance,
        chain.token_url(&contract, holder),
    );
    Some(match item.price_usd.as_ref().and_then(FlexNumber::as_f64) {
        Some(price) => position.with_price(price, PRICE_SOURCE_EXPLORER),
        None => position,
    })
}

// Internal helper that parses or transforms values for `v2_token_position`.
fn v2_token_position(chain: Chain, holder: &str, item: V2TokenBalance) -> Option<WalletPosition> {
    let token = item.token;
    if !is_fungible_type(token.token_type.as_deref()) {
        return None;
    }
    let contract = non_empty(token.address_hash.as_deref())
        .or_else(|| non_empty(token.address.as_deref()))?
        .to_ascii_lowercase();
    let decimals = token
        .decimals
        .as_ref()
        .and_then(FlexNumber::as_u32)
        .unwrap_or(DEFAULT_TOKEN_DECIMALS);
    let balance = item.value.as_ref()?.scaled(decimals);
    let symbol = non_empty(token.symbol.as_deref()).unwrap_or_else(|| "UNKNOWN".to_string());
    let name = non_empty(token.name.as_deref()).unwrap_or_else(|| symbol.clone());

    let position = WalletPosition::new(
        chain,
        PositionKind::FungibleToken,
        contract.clone(),
        symbol,
        name,
        decimals,
        balance,
        chain.token_url(&contract, holder),
    );
    Some(match token.exchange_rate.as_ref().and_then(FlexNumber::as_f64) {
        Some(price) => position.with_price(price, PRICE_SOURCE_EXPLORER),
        None => position,
    })
}
