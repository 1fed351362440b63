use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use url::Url;

use crate::config::Config;
use crate::constants::{
    AVALANCHE_P_STAKING_MAX_PAGES, AVALANCHE_P_STAKING_PAGE_SIZE, SOURCE_AVALANCHE_P,
};
use crate::crypto::address::canonical_platform_address;
use crate::integrations::http::ProviderError;
use crate::integrations::schema::FlexNumber;
use crate::integrations::{ChainProvider, ScanTarget};
use crate::models::{Chain, ChainHoldings, NativeBalanceEntry, PositionKind, WalletPosition};
use crate::services::scan_context::ScanContext;

const STAKING_TX_TYPES: &str =
    "AddValidatorTx,AddDelegatorTx,AddPermissionlessValidatorTx,AddPermissionlessDelegatorTx";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformBalance {
    #[serde(default)]
    balance: Option<FlexNumber>,
    #[serde(default)]
    unlocked: Option<FlexNumber>,
    #[serde(default)]
    locked_stakeable: Option<FlexNumber>,
    #[serde(default)]
    locked_not_stakeable: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
struct PlatformStake {
    #[serde(default)]
    staked: Option<FlexNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StakingPage {
    #[serde(default)]
    transactions: Vec<StakingTx>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StakingTx {
    #[serde(default)]
    start_timestamp: Option<FlexNumber>,
    #[serde(default)]
    end_timestamp: Option<FlexNumber>,
    #[serde(default)]
    amount_staked: Value,
}

/// P-Chain balances in AVAX.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PlatformSnapshot {
    unlocked: f64,
    locked: f64,
    staked: f64,
}

impl PlatformSnapshot {
    // Internal helper that parses or transforms values for `from_balance`.
    fn from_balance(balance: &PlatformBalance, staked: f64) -> Self {
        let decimals = Chain::AvalancheP.native_decimals();
        let scaled = |value: Option<&FlexNumber>| value.map(|v| v.scaled(decimals)).unwrap_or(0.0);

        let locked = scaled(balance.locked_stakeable.as_ref())
            + scaled(balance.locked_not_stakeable.as_ref());
        let unlocked = match balance.unlocked.as_ref() {
            Some(value) => value.scaled(decimals),
            None => (scaled(balance.balance.as_ref()) - locked).max(0.0),
        };
        Self {
            unlocked,
            locked,
            staked,
        }
    }
}

/// Unlocked, locked and staked AVAX on the P-Chain, read over the
/// `platform.*` JSON-RPC methods with an indexer fallback for stake.
pub struct AvalanchePProvider {
    config: Arc<Config>,
}

impl AvalanchePProvider {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Calls `method` on each configured node until one answers.
    async fn rpc_first<T: DeserializeOwned + Send>(
        &self,
        ctx: &ScanContext,
        method: &str,
        params: Value,
    ) -> Result<T, ProviderError> {
        if self.config.avalanche_p_rpc_urls.is_empty() {
            return Err(ProviderError::NoData("no P-Chain RPC endpoints configured".to_string()));
        }

        let mut failures = Vec::new();
        for rpc_url in &self.config.avalanche_p_rpc_urls {
            let label = format!("{} via {}", method, rpc_url);
            let attempt = ctx
                .retry
                .run_provider(&label, || ctx.http.rpc_call::<T>(rpc_url, method, params.clone()))
                .await;
            match attempt {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::warn!("{} failed: {}", label, err);
                    failures.push(format!("{}: {}", rpc_url, err));
                }
            }
        }
        Err(ProviderError::AllStrategiesFailed(failures.join("; ")))
    }

    /// Sums stake of currently active staking transactions from the
    /// indexer, following at most a fixed number of pages.
    async fn indexed_stake(&self, ctx: &ScanContext, address: &str) -> Result<f64, ProviderError> {
        let bare = address.trim().trim_start_matches("P-");
        let base = self.config.avalanche_p_staking_api_url.trim_end_matches('/');
        let now = Utc::now().timestamp();
        let page_size = AVALANCHE_P_STAKING_PAGE_SIZE.to_string();

        let mut total = 0.0;
        let mut page_token: Option<String> = None;
        for _ in 0..AVALANCHE_P_STAKING_MAX_PAGES {
            let mut url = Url::parse(&format!("{}/transactions", base))
                .map_err(|e| ProviderError::Transport(format!("invalid staking API URL: {}", e)))?;
            {
                let mut pairs = url.query_pairs_mut();
                pairs.append_pair("addresses", bare);
                pairs.append_pair("txTypes", STAKING_TX_TYPES);
                pairs.append_pair("pageSize", &page_size);
                if let Some(token) = page_token.as_deref() {
                    pairs.append_pair("pageToken", token);
                }
            }
            let url = url.to_string();

            let page: StakingPage = ctx
                .retry
                .run_provider("p-chain staking index", || ctx.http.get_json(&url, &[]))
                .await?;
            total += active_stake(&page.transactions, now);

            match page.next_page_token.filter(|t| !t.trim().is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }
        Ok(total)
    }
}

#[async_trait]
impl ChainProvider for AvalanchePProvider {
    fn source(&self) -> &'static str {
        SOURCE_AVALANCHE_P
    }

    async fn fetch(
        &self,
        ctx: &ScanContext,
        chain: Chain,
        target: &ScanTarget,
    ) -> Result<ChainHoldings, ProviderError> {
        if chain != Chain::AvalancheP {
            return Err(ProviderError::NoData(format!("{} is not the P-Chain", chain)));
        }
        let address = canonical_platform_address(target.platform()?);
        let params = serde_json::json!({ "addresses": [address] });

        let balance: PlatformBalance = self
            .rpc_first(ctx, "platform.getBalance", params.clone())
            .await?;

        let staked = match self.rpc_first::<PlatformStake>(ctx, "platform.getStake", params).await {
            Ok(stake) => stake
                .staked
                .as_ref()
                .map(|v| v.scaled(Chain::AvalancheP.native_decimals()))
                .unwrap_or(0.0),
            Err(err) => {
                tracing::warn!("platform.getStake failed for {}, trying staking index: {}", address, err);
                match self.indexed_stake(ctx, &address).await {
                    Ok(staked) => staked,
                    Err(index_err) => {
                        tracing::warn!("p-chain staking index failed for {}: {}", address, index_err);
                        0.0
                    }
                }
            }
        };

        let snapshot = PlatformSnapshot::from_balance(&balance, staked);
        Ok(frame_holdings(&address, snapshot))
    }
}

/// Native entry carries unlocked AVAX; stake and the locked remainder
/// become positions.
fn frame_holdings(address: &str, snapshot: PlatformSnapshot) -> ChainHoldings {
    let chain = Chain::AvalancheP;
    let decimals = chain.native_decimals();
    let symbol = chain.native_symbol();
    let explorer_url = chain.address_url(address);

    let mut positions = Vec::new();
    if snapshot.staked > 0.0 {
        positions.push(WalletPosition::new(
            chain,
            PositionKind::Staking,
            format!("{}:staked", address),
            symbol,
            "Staked AVAX",
            decimals,
            snapshot.staked,
            explorer_url.clone(),
        ));
    }
    let locked_remainder = (snapshot.locked - snapshot.staked).max(0.0);
    if locked_remainder > 0.0 {
        positions.push(WalletPosition::new(
            chain,
            PositionKind::Stake,
            format!("{}:locked", address),
            symbol,
            "Locked AVAX",
            decimals,
            locked_remainder,
            explorer_url,
        ));
    }

    ChainHoldings {
        native_balance: Some(NativeBalanceEntry::for_chain(chain, address, snapshot.unlocked)),
        positions,
    }
}

// Internal helper that supports `active_stake` operations.
fn active_stake(transactions: &[StakingTx], now: i64) -> f64 {
    transactions
        .iter()
        .filter(|tx| {
            let start = tx.start_timestamp.as_ref().and_then(FlexNumber::as_i64).map(to_seconds);
            let end = tx.end_timestamp.as_ref().and_then(FlexNumber::as_i64).map(to_seconds);
            matches!((start, end), (Some(start), Some(end)) if start <= now && now < end)
        })
        .map(|tx| staked_amount(&tx.amount_staked))
        .sum()
}

// Internal helper that parses or transforms values for `to_seconds`.
fn to_seconds(timestamp: i64) -> i64 {
    if timestamp > 1_000_000_000_000 {
        timestamp / 1000
    } else {
        timestamp
    }
}

/// `amountStaked` is either a scalar nAVAX amount or a list of
/// `{amount, denomination}` asset amounts.
fn staked_amount(value: &Value) -> f64 {
    let default_decimals = Chain::AvalancheP.native_decimals();
    match value {
        Value::Array(items) => items.iter().map(staked_amount).sum(),
        Value::Object(fields) => {
            let decimals = fields
                .get("denomination")
                .and_then(|d| serde_json::from_value::<FlexNumber>(d.clone()).ok())
                .and_then(|d| d.as_u32())
                .unwrap_or(default_decimals);
            fields
                .get("amount")
                .and_then(|a| serde_json::from_value::<FlexNumber>(a.clone()).ok())
                .map(|a| a.scaled(decimals))
                .unwrap_or(0.0)
        }
        Value::String(_) | Value::Number(_) => serde_json::from_value::<FlexNumber>(value.clone())
            .map(|a| a.scaled(default_decimals))
            .unwrap_or(0.0),
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ADDRESS: &str = "P-avax1tnuesf6cqwnjw7fxjyk7lhch0vhf0v95wj5jvy";

    #[test]
    fn balance_snapshot_scales_navax() {
        let balance: PlatformBalance = serde_json::from_value(json!({
            "balance": "30000000000",
            "unlocked": "10000000000",
            "lockedStakeable": "15000000000",
            "lockedNotStakeable": "5000000000"
        }))
        .unwrap();
        let snapshot = PlatformSnapshot::from_balance(&balance, 12.0);
        assert_eq!(snapshot.unlocked, 10.0);
        assert_eq!(snapshot.locked, 20.0);
        assert_eq!(snapshot.staked, 12.0);
    }

    #[test]
    fn missing_unlocked_is_derived_from_total() {
        let balance: PlatformBalance = serde_json::from_value(json!({
            "balance": "3000000000",
            "lockedStakeable": "1000000000"
        }))
        .unwrap();
        let snapshot = PlatformSnapshot::from_balance(&balance, 0.0);
        assert_eq!(snapshot.unlocked, 2.0);
    }

    #[test]
    fn framing_reports_stake_and_locked_remainder() {
        let holdings = frame_holdings(
            ADDRESS,
            PlatformSnapshot {
                unlocked: 1.5,
                locked: 20.0,
                staked: 12.0,
            },
        );
        let native = holdings.native_balance.expect("native entry");
        assert_eq!(native.balance, 1.5);
        assert_eq!(native.symbol, "AVAX");
        assert_eq!(native.decimals, 9);

        assert_eq!(holdings.positions.len(), 2);
        assert_eq!(holdings.positions[0].position_kind, PositionKind::Staking);
        assert_eq!(holdings.positions[0].balance, 12.0);
        assert_eq!(holdings.positions[1].position_kind, PositionKind::Stake);
        assert_eq!(holdings.positions[1].balance, 8.0);
        assert!(holdings.positions[1].source_id.ends_with(":locked"));
    }

    #[test]
    fn fully_staked_locked_balance_is_not_double_counted() {
        let holdings = frame_holdings(
            ADDRESS,
            PlatformSnapshot {
                unlocked: 0.0,
                locked: 5.0,
                staked: 5.0,
            },
        );
        assert_eq!(holdings.positions.len(), 1);
        assert_eq!(holdings.positions[0].position_kind, PositionKind::Staking);
    }

    #[test]
    fn indexer_counts_only_active_stake() {
        let now = 1_700_000_000;
        let page: StakingPage = serde_json::from_value(json!({
            "transactions": [
                {
                    "startTimestamp": now - 100,
                    "endTimestamp": now + 100,
                    "amountStaked": [{ "assetId": "FvwEAhmxKfeiG8SnEvq42hc6whRyY3EFYAvebMqDNDGCgxN5Z", "amount": "2000000000000", "denomination": 9 }]
                },
                {
                    "startTimestamp": (now - 200) * 1000,
                    "endTimestamp": (now + 200) * 1000,
                    "amountStaked": "500000000"
                },
                {
                    "startTimestamp": now - 500,
                    "endTimestamp": now - 10,
                    "amountStaked": "9000000000"
                },
                {
                    "startTimestamp": now + 10,
                    "endTimestamp": now + 500,
                    "amountStaked": "9000000000"
                }
            ],
            "nextPageToken": ""
        }))
        .unwrap();
        assert_eq!(active_stake(&page.transactions, now), 2000.5);
    }

    #[test]
    fn staked_amount_tolerates_unknown_shapes() {
        assert_eq!(staked_amount(&Value::Null), 0.0);
        assert_eq!(staked_amount(&json!(true)), 0.0);
        assert_eq!(staked_amount(&json!(1000000000)), 1.0);
    }

    mod adapter {
        use super::*;
        use crate::integrations::testing::{scan_context, serve};
        use crate::models::ScanStatus;
        use axum::extract::{Query, State};
        use axum::http::StatusCode;
        use axum::routing::{get, post};
        use axum::{Json, Router};
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicUsize, Ordering};

        async fn throttled_node(State(hits): State<Arc<AtomicUsize>>) -> (StatusCode, &'static str) {
            hits.fetch_add(1, Ordering::SeqCst);
            (StatusCode::TOO_MANY_REQUESTS, "Too Many Requests")
        }

        async fn node_without_stake(Json(body): Json<Value>) -> Json<Value> {
            match body["method"].as_str() {
                Some("platform.getBalance") => Json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {
                        "balance": "3000000000",
                        "unlocked": "1000000000",
                        "lockedStakeable": "2000000000",
                        "lockedNotStakeable": "0"
                    }
                })),
                _ => Json(json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": -32601, "message": "the method does not exist/is not available" }
                })),
            }
        }

        async fn staking_index(
            State(pages): State<Arc<AtomicUsize>>,
            Query(params): Query<HashMap<String, String>>,
        ) -> Json<Value> {
            pages.fetch_add(1, Ordering::SeqCst);
            assert_eq!(
                params.get("addresses").map(String::as_str),
                Some(ADDRESS.trim_start_matches("P-"))
            );
            let now = Utc::now().timestamp();
            let active = |amount: &str| {
                json!({
                    "startTimestamp": now - 3_600,
                    "endTimestamp": now + 86_400,
                    "amountStaked": amount
                })
            };
            match params.get("pageToken").map(String::as_str) {
                None => Json(json!({
                    "transactions": [active("1500000000")],
                    "nextPageToken": "page-2"
                })),
                Some("page-2") => Json(json!({ "transactions": [active("500000000")] })),
                Some(_) => Json(json!({ "transactions": [] })),
            }
        }

        struct Fixture {
            provider: AvalanchePProvider,
            throttled_hits: Arc<AtomicUsize>,
            index_pages: Arc<AtomicUsize>,
        }

        async fn fixture() -> Fixture {
            let throttled_hits = Arc::new(AtomicUsize::new(0));
            let index_pages = Arc::new(AtomicUsize::new(0));
            let router = Router::new()
                .route("/throttled", post(throttled_node))
                .with_state(throttled_hits.clone())
                .route("/glacier/transactions", get(staking_index))
                .with_state(index_pages.clone())
                .route("/node", post(node_without_stake));
            let base = serve(router).await;
            let config = Config {
                avalanche_p_rpc_urls: vec![format!("{}/throttled", base), format!("{}/node", base)],
                avalanche_p_staking_api_url: format!("{}/glacier", base),
                ..Config::default()
            };
            Fixture {
                provider: AvalanchePProvider::new(Arc::new(config)),
                throttled_hits,
                index_pages,
            }
        }

        #[tokio::test]
        async fn rate_limited_endpoint_is_retried_then_skipped() {
            let fixture = fixture().await;
            let ctx = scan_context(2);
            let balance: PlatformBalance = fixture
                .provider
                .rpc_first(&ctx, "platform.getBalance", json!({ "addresses": [ADDRESS] }))
                .await
                .expect("second endpoint answers");
            assert_eq!(fixture.throttled_hits.load(Ordering::SeqCst), 2);
            assert_eq!(PlatformSnapshot::from_balance(&balance, 0.0).unlocked, 1.0);
        }

        #[tokio::test]
        async fn failed_get_stake_pages_through_staking_index() {
            let fixture = fixture().await;
            let target = ScanTarget {
                evm_address: None,
                platform_address: Some(ADDRESS.to_string()),
            };
            let result = fixture
                .provider
                .scan(&scan_context(1), Chain::AvalancheP, &target)
                .await;

            assert_eq!(result.status, ScanStatus::Ok, "{:?}", result.error);
            assert_eq!(fixture.index_pages.load(Ordering::SeqCst), 2);
            assert_eq!(result.native_balance.map(|n| n.balance), Some(1.0));
            assert_eq!(result.positions.len(), 1);
            assert_eq!(result.positions[0].position_kind, PositionKind::Staking);
            assert_eq!(result.positions[0].balance, 2.0);
        }
    }
}
