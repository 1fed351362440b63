use serde::{Deserialize, Serialize};

use super::chain::Chain;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositionKind {
    Native,
    FungibleToken,
    Stake,
    Lend,
    Vault,
    Perp,
    PerpCollateral,
    Staking,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPosition {
    /// Contract, account, vault or stake identifier the position came from.
    pub source_id: String,
    pub symbol: String,
    pub display_name: String,
    pub decimals: u32,
    pub balance: f64,
    pub chain: Chain,
    pub position_kind: PositionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_source: Option<String>,
    pub explorer_url: String,
}

impl WalletPosition {
    pub fn new(
        chain: Chain,
        position_kind: PositionKind,
        source_id: impl Into<String>,
        symbol: impl Into<String>,
        display_name: impl Into<String>,
        decimals: u32,
        balance: f64,
        explorer_url: impl Into<String>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            symbol: symbol.into(),
            display_name: display_name.into(),
            decimals,
            balance,
            chain,
            position_kind,
            price_usd: None,
            value_usd: None,
            price_source: None,
            explorer_url: explorer_url.into(),
        }
    }

    /// Attaches a USD price and derives the value from the balance.
    pub fn with_price(mut self, price_usd: f64, source: &str) -> Self {
        if price_usd.is_finite() && price_usd > 0.0 {
            self.price_usd = Some(price_usd);
            self.value_usd = Some(price_usd * self.balance);
            self.price_source = Some(source.to_string());
        }
        self
    }

    /// Sets a venue-reported USD value, backfilling the unit price.
    pub fn with_value(mut self, value_usd: f64, source: &str) -> Self {
        if value_usd.is_finite() && value_usd >= 0.0 {
            self.value_usd = Some(value_usd);
            if self.balance > 0.0 {
                self.price_usd = Some(value_usd / self.balance);
            }
            self.price_source = Some(source.to_string());
        }
        self
    }

    pub fn has_positive_balance(&self) -> bool {
        self.balance.is_finite() && self.balance > 0.0
    }

    /// Ranking weight: USD value when known, raw balance otherwise.
    pub fn weight(&self) -> f64 {
        self.value_usd.unwrap_or(self.balance)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeBalanceEntry {
    pub chain: Chain,
    pub symbol: String,
    pub balance: f64,
    pub decimals: u32,
    pub explorer_url: String,
}

impl NativeBalanceEntry {
    pub fn for_chain(chain: Chain, address: &str, balance: f64) -> Self {
        Self {
            chain,
            symbol: chain.native_symbol().to_string(),
            balance: if balance.is_finite() && balance > 0.0 {
                balance
            } else {
                0.0
            },
            decimals: chain.native_decimals(),
            explorer_url: chain.address_url(address),
        }
    }
}

/// What a provider found on one chain before it is wrapped into a result.
#[derive(Debug, Clone, Default)]
pub struct ChainHoldings {
    pub native_balance: Option<NativeBalanceEntry>,
    pub positions: Vec<WalletPosition>,
}

impl ChainHoldings {
    pub fn is_empty(&self) -> bool {
        self.native_balance.is_none() && self.positions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainScanResult {
    pub chain: Chain,
    pub source: String,
    pub status: ScanStatus,
    pub positions: Vec<WalletPosition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_balance: Option<NativeBalanceEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChainScanResult {
    pub fn ok(chain: Chain, source: &str, holdings: ChainHoldings) -> Self {
        let positions = holdings
            .positions
            .into_iter()
            .filter(WalletPosition::has_positive_balance)
            .collect();
        Self {
            chain,
            source: source.to_string(),
            status: ScanStatus::Ok,
            positions,
            native_balance: holdings.native_balance,
            error: None,
        }
    }

    pub fn failed(chain: Chain, source: &str, error: impl Into<String>) -> Self {
        Self {
            chain,
            source: source.to_string(),
            status: ScanStatus::Error,
            positions: Vec::new(),
            native_balance: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ScanStatus::Ok
    }
}

/// A chain that failed, as reported when no chain succeeded.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainFailure {
    pub chain: Chain,
    pub source: String,
    pub error: String,
}

/// Input to the chain resolver and scanner.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    /// Primary address as supplied, either EVM hex or a platform address.
    pub address: String,
    pub evm_address: Option<String>,
    pub platform_address: Option<String>,
    pub selector: String,
}

#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub address: String,
    pub chains_scanned: Vec<Chain>,
    pub chain_results: Vec<ChainScanResult>,
    pub native_balances: Vec<NativeBalanceEntry>,
    pub positions: Vec<WalletPosition>,
}
