pub mod avalanche_c;
pub mod avalanche_p;
pub mod evm_explorer;
pub mod http;
pub mod hyperliquid;
pub mod schema;
#[cfg(test)]
pub(crate) mod testing;
pub mod tron;

pub use avalanche_p::AvalanchePProvider;
pub use evm_explorer::EvmExplorerProvider;
pub use hyperliquid::{HyperliquidClient, HyperliquidProvider};
pub use tron::TronProvider;

use async_trait::async_trait;

use crate::models::{Chain, ChainHoldings, ChainScanResult};
use crate::services::scan_context::ScanContext;
use http::ProviderError;

/// The address forms available to adapters for one scan.
#[derive(Debug, Clone, Default)]
pub struct ScanTarget {
    pub evm_address: Option<String>,
    pub platform_address: Option<String>,
}

impl ScanTarget {
    pub fn evm(&self) -> Result<&str, ProviderError> {
        self.evm_address
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidAddress("EVM address required".to_string()))
    }

    pub fn platform(&self) -> Result<&str, ProviderError> {
        self.platform_address
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidAddress("platform address required".to_string()))
    }
}

/// One data source able to report holdings for one or more chains.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Identity reported as `source` in chain results.
    fn source(&self) -> &'static str;

    async fn fetch(
        &self,
        ctx: &ScanContext,
        chain: Chain,
        target: &ScanTarget,
    ) -> Result<ChainHoldings, ProviderError>;

    /// Never fails: provider errors become an error-status result.
    async fn scan(&self, ctx: &ScanContext, chain: Chain, target: &ScanTarget) -> ChainScanResult {
        match self.fetch(ctx, chain, target).await {
            Ok(holdings) => {
                tracing::debug!(
                    "{} scan via {} found {} positions",
                    chain,
                    self.source(),
                    holdings.positions.len()
                );
                ChainScanResult::ok(chain, self.source(), holdings)
            }
            Err(err) => {
                if err.is_absent() {
                    tracing::debug!("{} scan via {} found no data: {}", chain, self.source(), err);
                } else {
                    tracing::warn!("{} scan via {} failed: {}", chain, self.source(), err);
                }
                ChainScanResult::failed(chain, self.source(), err.to_string())
            }
        }
    }
}
