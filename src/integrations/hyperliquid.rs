use std::collections::HashMap;

use async_trait::async_trait;
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::config::Config;
use crate::constants::{
    HYPERLIQUID_COLLATERAL_SYMBOL, HYPERLIQUID_DISPLAY_DECIMALS, HYPERLIQUID_STAKE_SYMBOL,
    PRICE_SOURCE_VENUE, SOURCE_HYPERLIQUID,
};
use crate::integrations::http::{ProviderError, ProviderHttp};
use crate::integrations::schema::{face_value, non_empty, FlexNumber};
use crate::integrations::{ChainProvider, ScanTarget};
use crate::models::{Chain, ChainHoldings, PositionKind, WalletPosition};
use crate::services::retry_policy::RetryPolicy;
use crate::services::scan_context::ScanContext;

/// Raw read access to the venue. Responses are returned undecoded; shape
/// handling lives in the provider.
#[async_trait]
pub trait VenueClient: Send + Sync {
    async fn spot_state(&self, user: &str) -> Result<Value, ProviderError>;
    async fn perp_state(&self, user: &str) -> Result<Value, ProviderError>;
    async fn vault_equities(&self, user: &str) -> Result<Value, ProviderError>;
    async fn vault_details(&self, vault_address: &str) -> Result<Value, ProviderError>;
    async fn delegator_summary(&self, user: &str) -> Result<Value, ProviderError>;
    async fn delegations(&self, user: &str) -> Result<Value, ProviderError>;
}

/// `POST /info` client for the Hyperliquid public API.
pub struct HyperliquidClient {
    http: ProviderHttp,
    retry: RetryPolicy,
    info_url: String,
}

impl HyperliquidClient {
    pub fn new(config: &Config, http: ProviderHttp) -> Self {
        Self {
            http,
            retry: RetryPolicy::from_config(config),
            info_url: format!("{}/info", config.hyperliquid_api_url.trim_end_matches('/')),
        }
    }

    // Internal helper that fetches data for `info`.
    async fn info(&self, request_type: &str, body: Value) -> Result<Value, ProviderError> {
        let label = format!("hyperliquid {}", request_type);
        self.retry
            .run_provider(&label, || self.http.post_json(&self.info_url, &body))
            .await
    }
}

#[async_trait]
impl VenueClient for HyperliquidClient {
    async fn spot_state(&self, user: &str) -> Result<Value, ProviderError> {
        self.info(
            "spotClearinghouseState",
            json!({ "type": "spotClearinghouseState", "user": user }),
        )
        .await
    }

    async fn perp_state(&self, user: &str) -> Result<Value, ProviderError> {
        self.info(
            "clearinghouseState",
            json!({ "type": "clearinghouseState", "user": user }),
        )
        .await
    }

    async fn vault_equities(&self, user: &str) -> Result<Value, ProviderError> {
        self.info(
            "userVaultEquities",
            json!({ "type": "userVaultEquities", "user": user }),
        )
        .await
    }

    async fn vault_details(&self, vault_address: &str) -> Result<Value, ProviderError> {
        self.info(
            "vaultDetails",
            json!({ "type": "vaultDetails", "vaultAddress": vault_address }),
        )
        .await
    }

    async fn delegator_summary(&self, user: &str) -> Result<Value, ProviderError> {
        self.info(
            "delegatorSummary",
            json!({ "type": "delegatorSummary", "user": user }),
        )
        .await
    }

    async fn delegations(&self, user: &str) -> Result<Value, ProviderError> {
        self.info("delegations", json!({ "type": "delegations", "user": user }))
            .await
    }
}

#[derive(Debug, Default, Deserialize)]
struct SpotBalance {
    #[serde(default, alias = "token_symbol", alias = "symbol", alias = "name")]
    coin: Option<String>,
    #[serde(default, alias = "balance", alias = "amount")]
    total: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerpState {
    #[serde(default)]
    asset_positions: Vec<Value>,
    #[serde(default)]
    margin_summary: Option<MarginSummary>,
    #[serde(default)]
    cross_margin_summary: Option<MarginSummary>,
    #[serde(default)]
    withdrawable: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarginSummary {
    #[serde(default)]
    account_value: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PerpPosition {
    #[serde(default)]
    coin: Option<String>,
    #[serde(default)]
    szi: Option<FlexNumber>,
    #[serde(default)]
    position_value: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VaultEquity {
    #[serde(default)]
    vault_address: Option<String>,
    #[serde(default)]
    equity: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DelegatorSummary {
    #[serde(default)]
    delegated: Option<FlexNumber>,
    #[serde(default)]
    undelegated: Option<FlexNumber>,
    #[serde(default)]
    total_pending_withdrawal: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
struct Delegation {
    #[serde(default)]
    amount: Option<FlexNumber>,
}

/// Spot, perpetual, vault and staking positions on the Hyperliquid venue.
pub struct HyperliquidProvider<C: VenueClient = HyperliquidClient> {
    client: C,
}

impl<C: VenueClient> HyperliquidProvider<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    // Internal helper that fetches data for `spot_positions`.
    async fn spot_positions(&self, user: &str) -> Result<Vec<WalletPosition>, ProviderError> {
        let state = self.client.spot_state(user).await?;
        Ok(spot_positions_from(&state, user))
    }

    // Internal helper that fetches data for `perp_positions`.
    async fn perp_positions(&self, user: &str) -> Result<Vec<WalletPosition>, ProviderError> {
        let state = self.client.perp_state(user).await?;
        let state: PerpState = serde_json::from_value(state)
            .map_err(|e| ProviderError::Decode(format!("clearinghouseState: {}", e)))?;
        Ok(perp_positions_from(state, user))
    }

    // Internal helper that fetches data for `vault_positions`.
    async fn vault_positions(
        &self,
        ctx: &ScanContext,
        user: &str,
    ) -> Result<Vec<WalletPosition>, ProviderError> {
        let equities = self.client.vault_equities(user).await?;
        let equities: Vec<(String, f64)> = parse_rows::<VaultEquity>(equities)
            .into_iter()
            .filter_map(|row| {
                let address = non_empty(row.vault_address.as_deref())?.to_ascii_lowercase();
                let equity = face_value(row.equity.as_ref());
                (equity > 0.0).then_some((address, equity))
            })
            .collect();

        let positions = join_all(equities.into_iter().map(|(address, equity)| async move {
            let name = self
                .vault_name(ctx, &address)
                .await
                .unwrap_or_else(|| fallback_vault_label(&address));
            WalletPosition::new(
                Chain::Hyperliquid,
                PositionKind::Vault,
                address.clone(),
                HYPERLIQUID_COLLATERAL_SYMBOL,
                name,
                HYPERLIQUID_DISPLAY_DECIMALS,
                equity,
                Chain::Hyperliquid.address_url(&address),
            )
            .with_value(equity, PRICE_SOURCE_VENUE)
        }))
        .await;
        Ok(positions)
    }

    /// Vault display name, looked up once per scan.
    async fn vault_name(&self, ctx: &ScanContext, vault_address: &str) -> Option<String> {
        if let Some(cached) = ctx.cache.vault_name(vault_address).await {
            return cached;
        }
        let name = match self.client.vault_details(vault_address).await {
            Ok(details) => details
                .get("name")
                .and_then(Value::as_str)
                .and_then(|name| non_empty(Some(name))),
            Err(err) => {
                tracing::debug!("vault details for {} unavailable: {}", vault_address, err);
                None
            }
        };
        ctx.cache.remember_vault_name(vault_address, name.clone()).await;
        name
    }

    /// The delegator summary wins; delegations are only summed when the
    /// summary is missing or empty.
    async fn staking_positions(&self, user: &str) -> Result<Vec<WalletPosition>, ProviderError> {
        let summary_err = match self.client.delegator_summary(user).await {
            Ok(summary) => {
                let total = summary_total(summary);
                if total > 0.0 {
                    return Ok(vec![staking_position(user, total)]);
                }
                None
            }
            Err(err) => Some(err),
        };

        match self.client.delegations(user).await {
            Ok(delegations) => {
                let total: f64 = parse_rows::<Delegation>(delegations)
                    .iter()
                    .map(|row| face_value(row.amount.as_ref()))
                    .filter(|amount| *amount > 0.0)
                    .sum();
                if total > 0.0 {
                    Ok(vec![staking_position(user, total)])
                } else {
                    Ok(Vec::new())
                }
            }
            Err(err) => match summary_err {
                Some(summary_err) => Err(summary_err),
                None => {
                    tracing::debug!("hyperliquid delegations unavailable for {}: {}", user, err);
                    Ok(Vec::new())
                }
            },
        }
    }
}

#[async_trait]
impl<C: VenueClient> ChainProvider for HyperliquidProvider<C> {
    fn source(&self) -> &'static str {
        SOURCE_HYPERLIQUID
    }

    async fn fetch(
        &self,
        ctx: &ScanContext,
        chain: Chain,
        target: &ScanTarget,
    ) -> Result<ChainHoldings, ProviderError> {
        if chain != Chain::Hyperliquid {
            return Err(ProviderError::NoData(format!("{} is not served by Hyperliquid", chain)));
        }
        let user = target.evm()?.to_ascii_lowercase();

        let (spot, perp, vaults, staking) = tokio::join!(
            self.spot_positions(&user),
            self.perp_positions(&user),
            self.vault_positions(ctx, &user),
            self.staking_positions(&user)
        );

        let mut positions = Vec::new();
        let mut failures = Vec::new();
        for (label, outcome) in [
            ("spot", spot),
            ("perp", perp),
            ("vaults", vaults),
            ("staking", staking),
        ] {
            match outcome {
                Ok(mut found) => positions.append(&mut found),
                Err(err) => {
                    tracing::warn!("hyperliquid {} query failed for {}: {}", label, user, err);
                    failures.push(format!("{}: {}", label, err));
                }
            }
        }
        if failures.len() == 4 {
            return Err(ProviderError::AllStrategiesFailed(failures.join("; ")));
        }

        Ok(ChainHoldings {
            native_balance: None,
            positions,
        })
    }
}

// Internal helper that parses or transforms values for `parse_rows`.
fn parse_rows<T: serde::de::DeserializeOwned>(value: Value) -> Vec<T> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }
}

/// Accepts `[...]`, `{balances: [...]}` or `{SYMBOL: amount | {total}}`.
fn spot_rows(state: &Value) -> Vec<(String, f64)> {
    let rows: Vec<(Option<String>, Option<FlexNumber>)> = match state {
        Value::Array(_) => parse_rows::<SpotBalance>(state.clone())
            .into_iter()
            .map(|row| (row.coin, row.total))
            .collect(),
        Value::Object(fields) => match fields.get("balances") {
            Some(balances) => return spot_rows(balances),
            None => fields
                .iter()
                .map(|(symbol, amount)| {
                    let amount = match amount {
                        Value::Object(_) => serde_json::from_value::<SpotBalance>(amount.clone())
                            .ok()
                            .and_then(|row| row.total),
                        other => serde_json::from_value::<FlexNumber>(other.clone()).ok(),
                    };
                    (Some(symbol.clone()), amount)
                })
                .collect(),
        },
        _ => Vec::new(),
    };

    rows.into_iter()
        .filter_map(|(symbol, amount)| {
            let symbol = non_empty(symbol.as_deref())?.to_ascii_uppercase();
            Some((symbol, face_value(amount.as_ref())))
        })
        .collect()
}

// Internal helper that parses or transforms values for `spot_positions_from`.
fn spot_positions_from(state: &Value, user: &str) -> Vec<WalletPosition> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, f64> = HashMap::new();
    for (symbol, amount) in spot_rows(state) {
        if !totals.contains_key(&symbol) {
            order.push(symbol.clone());
        }
        *totals.entry(symbol).or_insert(0.0) += amount;
    }

    order
        .into_iter()
        .filter_map(|symbol| {
            let balance = totals.get(&symbol).copied().unwrap_or(0.0);
            (balance > 0.0).then(|| {
                WalletPosition::new(
                    Chain::Hyperliquid,
                    PositionKind::FungibleToken,
                    format!("spot:{}", symbol),
                    symbol.clone(),
                    symbol,
                    HYPERLIQUID_DISPLAY_DECIMALS,
                    balance,
                    Chain::Hyperliquid.address_url(user),
                )
            })
        })
        .collect()
}

// Internal helper that parses or transforms values for `perp_positions_from`.
fn perp_positions_from(state: PerpState, user: &str) -> Vec<WalletPosition> {
    let explorer_url = Chain::Hyperliquid.address_url(user);
    let mut positions = Vec::new();

    for entry in state.asset_positions {
        let raw = entry.get("position").cloned().unwrap_or(entry);
        let Ok(position) = serde_json::from_value::<PerpPosition>(raw) else {
            continue;
        };
        let Some(coin) = non_empty(position.coin.as_deref()) else {
            continue;
        };
        let size = face_value(position.szi.as_ref());
        if size == 0.0 {
            continue;
        }
        let side = if size > 0.0 { "Long" } else { "Short" };
        let mut perp = WalletPosition::new(
            Chain::Hyperliquid,
            PositionKind::Perp,
            format!("perp:{}:{}", coin, side.to_ascii_lowercase()),
            coin.to_ascii_uppercase(),
            format!("{} {} Perp", coin.to_ascii_uppercase(), side),
            HYPERLIQUID_DISPLAY_DECIMALS,
            size.abs(),
            explorer_url.clone(),
        );
        if let Some(value) = position.position_value.as_ref().and_then(FlexNumber::as_f64) {
            perp = perp.with_value(value.abs(), PRICE_SOURCE_VENUE);
        }
        positions.push(perp);
    }

    let account_value = state
        .margin_summary
        .as_ref()
        .or(state.cross_margin_summary.as_ref())
        .and_then(|summary| summary.account_value.as_ref())
        .and_then(FlexNumber::as_f64)
        .filter(|value| *value > 0.0);
    let collateral = account_value
        .or_else(|| state.withdrawable.as_ref().and_then(FlexNumber::as_f64))
        .unwrap_or(0.0);
    if collateral > 0.0 {
        positions.push(
            WalletPosition::new(
                Chain::Hyperliquid,
                PositionKind::PerpCollateral,
                format!("perp-collateral:{}", HYPERLIQUID_COLLATERAL_SYMBOL),
                HYPERLIQUID_COLLATERAL_SYMBOL,
                "Perp Collateral (USDC)",
                HYPERLIQUID_DISPLAY_DECIMALS,
                collateral,
                explorer_url,
            )
            .with_value(collateral, PRICE_SOURCE_VENUE),
        );
    }
    positions
}

// Internal helper that parses or transforms values for `summary_total`.
fn summary_total(summary: Value) -> f64 {
    match serde_json::from_value::<DelegatorSummary>(summary) {
        Ok(summary) => {
            face_value(summary.delegated.as_ref())
                + face_value(summary.undelegated.as_ref())
                + face_value(summary.total_pending_withdrawal.as_ref())
        }
        Err(_) => 0.0,
    }
}

// Internal helper that builds the position for `staking_position`.
fn staking_position(user: &str, total: f64) -> WalletPosition {
    WalletPosition::new(
        Chain::Hyperliquid,
        PositionKind::Staking,
        format!("staking:{}", HYPERLIQUID_STAKE_SYMBOL),
        HYPERLIQUID_STAKE_SYMBOL,
        format!("Staked {}", HYPERLIQUID_STAKE_SYMBOL),
        HYPERLIQUID_DISPLAY_DECIMALS,
        total,
        Chain::Hyperliquid.address_url(user),
    )
}

/// `Vault 0x1234…abcd`.
fn fallback_vault_label(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 10 {
        return format!("Vault {}", address);
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("Vault {}…{}", head, tail)
}
