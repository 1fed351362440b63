use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::integrations::http::ProviderHttp;
use crate::integrations::{
    AvalanchePProvider, ChainProvider, EvmExplorerProvider, HyperliquidClient, HyperliquidProvider,
    ScanTarget, TronProvider,
};
use crate::models::chain::EVM_EXPLORER_CHAINS;
use crate::models::{
    Chain, ChainFailure, ChainScanResult, CompositeResult, ScanRequest, WalletPosition,
};
use crate::services::chain_resolver::{resolve_chains, AddressAvailability};
use crate::services::position_dedupe::dedupe_positions;
use crate::services::retry_policy::RetryPolicy;
use crate::services::scan_context::ScanContext;

const UNREGISTERED_SOURCE: &str = "none";

/// Fans a scan out to one provider per chain and folds the outcomes into
/// a single composite result.
pub struct WalletScanner {
    config: Arc<Config>,
    http: ProviderHttp,
    providers: HashMap<Chain, Arc<dyn ChainProvider>>,
}

impl WalletScanner {
    /// Scanner wired to the live providers.
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let http = ProviderHttp::new(Duration::from_secs(config.provider_timeout_secs))?;

        let explorer: Arc<dyn ChainProvider> = Arc::new(EvmExplorerProvider::new(config.clone()));
        let mut providers: HashMap<Chain, Arc<dyn ChainProvider>> = EVM_EXPLORER_CHAINS
            .iter()
            .map(|chain| (*chain, explorer.clone()))
            .collect();
        providers.insert(Chain::Tron, Arc::new(TronProvider::new(config.clone())));
        providers.insert(
            Chain::AvalancheP,
            Arc::new(AvalanchePProvider::new(config.clone())),
        );
        providers.insert(
            Chain::Hyperliquid,
            Arc::new(HyperliquidProvider::new(HyperliquidClient::new(
                &config,
                http.clone(),
            ))),
        );

        Ok(Self::with_providers(config, http, providers))
    }

    pub fn with_providers(
        config: Arc<Config>,
        http: ProviderHttp,
        providers: HashMap<Chain, Arc<dyn ChainProvider>>,
    ) -> Self {
        Self {
            config,
            http,
            providers,
        }
    }

    /// Resolves the selector, scans every resolved chain and composes the
    /// result. Fails only on a bad selector or when every chain failed.
    pub async fn scan(&self, request: &ScanRequest) -> Result<CompositeResult> {
        let availability = AddressAvailability {
            has_evm: request.evm_address.is_some(),
            has_platform: request.platform_address.is_some(),
            tron_from_evm: self.config.tron_from_evm,
        };
        let chains = resolve_chains(&request.selector, availability)?;
        tracing::info!(
            "Scanning {} across {} chains: {}",
            request.address,
            chains.len(),
            chains
                .iter()
                .map(Chain::id)
                .collect::<Vec<_>>()
                .join(",")
        );

        let ctx = Arc::new(ScanContext::new(
            self.http.clone(),
            RetryPolicy::from_config(&self.config),
        ));
        let target = Arc::new(ScanTarget {
            evm_address: request.evm_address.clone(),
            platform_address: request.platform_address.clone(),
        });

        let results = self.scan_chains(ctx, target, &chains).await;
        compose(
            request.address.clone(),
            chains,
            results,
            self.config.max_positions,
        )
    }

    /// One task per chain, each under the per-chain timeout. A panic or
    /// timeout becomes that chain's error result.
    async fn scan_chains(
        &self,
        ctx: Arc<ScanContext>,
        target: Arc<ScanTarget>,
        chains: &[Chain],
    ) -> Vec<ChainScanResult> {
        let limit = Duration::from_secs(self.config.chain_scan_timeout_secs);

        let scans = chains.iter().map(|&chain| {
            let provider = self.providers.get(&chain).cloned();
            let ctx = ctx.clone();
            let target = target.clone();
            async move {
                let Some(provider) = provider else {
                    tracing::warn!("No provider registered for {}", chain);
                    return ChainScanResult::failed(
                        chain,
                        UNREGISTERED_SOURCE,
                        "no provider registered for chain",
                    );
                };
                let source = provider.source();
                let handle = tokio::spawn(async move {
                    tokio::time::timeout(limit, provider.scan(&ctx, chain, &target)).await
                });
                match handle.await {
                    Ok(Ok(result)) => result,
                    Ok(Err(_)) => {
                        tracing::warn!("{} scan timed out after {}s", chain, limit.as_secs());
                        ChainScanResult::failed(
                            chain,
                            source,
                            format!("timed out after {}s", limit.as_secs()),
                        )
                    }
                    Err(err) => {
                        tracing::error!("{} scan task aborted: {}", chain, err);
                        ChainScanResult::failed(chain, source, format!("scan task aborted: {}", err))
                    }
                }
            }
        });

        join_all(scans).await
    }
}

/// Merges successful chains into the composite result, or fails with every
/// chain's error when nothing succeeded.
fn compose(
    address: String,
    chains: Vec<Chain>,
    results: Vec<ChainScanResult>,
    max_positions: usize,
) -> Result<CompositeResult> {
    if !results.iter().any(ChainScanResult::is_ok) {
        let failures = results
            .iter()
            .map(|result| ChainFailure {
                chain: result.chain,
                source: result.source.clone(),
                error: result
                    .error
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
            })
            .collect();
        return Err(AppError::ServiceUnavailable { address, failures });
    }

    let native_balances = results
        .iter()
        .filter(|result| result.is_ok())
        .filter_map(|result| result.native_balance.clone())
        .collect();
    let merged: Vec<WalletPosition> = results
        .iter()
        .filter(|result| result.is_ok())
        .flat_map(|result| result.positions.iter().cloned())
        .collect();

    let mut positions = dedupe_positions(merged);
    sort_positions(&mut positions);
    positions.truncate(max_positions);

    Ok(CompositeResult {
        address,
        chains_scanned: chains,
        chain_results: results,
        native_balances,
        positions,
    })
}

/// Descending by USD value (unpriced counts as zero), then by balance.
fn sort_positions(positions: &mut [WalletPosition]) {
    positions.sort_by(|a, b| {
        let a_value = a.value_usd.unwrap_or(0.0);
        let b_value = b.value_usd.unwrap_or(0.0);
        b_value
            .total_cmp(&a_value)
            .then_with(|| b.balance.total_cmp(&a.balance))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::http::ProviderError;
    use crate::models::{ChainHoldings, NativeBalanceEntry, PositionKind, ScanStatus};
    use async_trait::async_trait;

    const ADDRESS: &str = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045";

    enum Behavior {
        Holdings(f64),
        Fail,
        Hang,
        Panic,
    }

    struct FakeProvider {
        behavior: Behavior,
    }

    #[async_trait]
    impl ChainProvider for FakeProvider {
        fn source(&self) -> &'static str {
            "fake"
        }

        async fn fetch(
            &self,
            _ctx: &ScanContext,
            chain: Chain,
            target: &ScanTarget,
        ) -> std::result::Result<ChainHoldings, ProviderError> {
            match self.behavior {
                Behavior::Holdings(value) => Ok(ChainHoldings {
                    native_balance: Some(NativeBalanceEntry::for_chain(chain, target.evm()?, 1.0)),
                    positions: vec![WalletPosition::new(
                        chain,
                        PositionKind::FungibleToken,
                        format!("{}-token", chain),
                        "TKN",
                        format!("{} Token", chain.display_name()),
                        18,
                        value,
                        chain.address_url(target.evm()?),
                    )
                    .with_price(1.0, "explorer")],
                }),
                Behavior::Fail => Err(ProviderError::Http {
                    status: 502,
                    url: "https://explorer.invalid".to_string(),
                }),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(ChainHoldings::default())
                }
                Behavior::Panic => panic!("provider bug"),
            }
        }
    }

    fn scanner(
        entries: Vec<(Chain, Behavior)>,
        configure: impl FnOnce(&mut Config),
    ) -> WalletScanner {
        let mut config = Config::default();
        configure(&mut config);
        let http = ProviderHttp::new(Duration::from_secs(1)).expect("http client");
        let providers = entries
            .into_iter()
            .map(|(chain, behavior)| {
                let provider: Arc<dyn ChainProvider> = Arc::new(FakeProvider { behavior });
                (chain, provider)
            })
            .collect();
        WalletScanner::with_providers(Arc::new(config), http, providers)
    }

    fn request(selector: &str) -> ScanRequest {
        ScanRequest {
            address: ADDRESS.to_string(),
            evm_address: Some(ADDRESS.to_string()),
            platform_address: None,
            selector: selector.to_string(),
        }
    }

    #[tokio::test]
    async fn partial_failure_still_returns_successful_chains() {
        let scanner = scanner(
            vec![
                (Chain::Ethereum, Behavior::Holdings(10.0)),
                (Chain::Arbitrum, Behavior::Fail),
                (Chain::Optimism, Behavior::Holdings(30.0)),
                (Chain::Base, Behavior::Fail),
                (Chain::Polygon, Behavior::Holdings(20.0)),
            ],
            |_| {},
        );
        let chains = vec![
            Chain::Ethereum,
            Chain::Arbitrum,
            Chain::Optimism,
            Chain::Base,
            Chain::Polygon,
        ];
        let ctx = Arc::new(ScanContext::new(scanner.http.clone(), RetryPolicy::immediate(1)));
        let target = Arc::new(ScanTarget {
            evm_address: Some(ADDRESS.to_string()),
            platform_address: None,
        });

        let results = scanner.scan_chains(ctx, target, &chains).await;
        let composite = compose(ADDRESS.to_string(), chains, results, 500).expect("partial success");

        assert_eq!(composite.chain_results.len(), 5);
        let failed: Vec<Chain> = composite
            .chain_results
            .iter()
            .filter(|r| r.status == ScanStatus::Error)
            .map(|r| r.chain)
            .collect();
        assert_eq!(failed, vec![Chain::Arbitrum, Chain::Base]);

        let position_chains: Vec<Chain> = composite.positions.iter().map(|p| p.chain).collect();
        assert_eq!(
            position_chains,
            vec![Chain::Optimism, Chain::Polygon, Chain::Ethereum]
        );
        assert_eq!(composite.native_balances.len(), 3);
    }

    #[tokio::test]
    async fn all_chains_failing_is_service_unavailable() {
        let scanner = scanner(
            vec![(Chain::Ethereum, Behavior::Fail), (Chain::Tron, Behavior::Fail)],
            |_| {},
        );
        let err = scanner.scan(&request("ethereum")).await.unwrap_err();
        match err {
            AppError::ServiceUnavailable { address, failures } => {
                assert_eq!(address, ADDRESS);
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].chain, Chain::Ethereum);
                assert!(failures[0].error.contains("502"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn tron_with_evm_only_address_yields_one_result() {
        let scanner = scanner(vec![(Chain::Tron, Behavior::Holdings(5.0))], |_| {});
        let composite = scanner.scan(&request("tron")).await.expect("tron scan");
        assert_eq!(composite.chains_scanned, vec![Chain::Tron]);
        assert_eq!(composite.chain_results.len(), 1);
        assert_eq!(composite.positions.len(), 1);
    }

    #[tokio::test]
    async fn unsupported_selector_is_rejected_before_scanning() {
        let scanner = scanner(Vec::new(), |_| {});
        let err = scanner.scan(&request("avalanche-p")).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedChain(_)));
    }

    #[tokio::test]
    async fn hung_and_panicking_providers_become_error_results() {
        let scanner = scanner(
            vec![
                (Chain::Ethereum, Behavior::Hang),
                (Chain::Arbitrum, Behavior::Panic),
                (Chain::Base, Behavior::Holdings(1.0)),
            ],
            |config| config.chain_scan_timeout_secs = 1,
        );
        let composite = scanner.scan(&request("auto")).await.expect("base succeeds");

        let by_chain: HashMap<Chain, &ChainScanResult> = composite
            .chain_results
            .iter()
            .map(|r| (r.chain, r))
            .collect();
        assert!(by_chain[&Chain::Ethereum]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("timed out"));
        assert!(by_chain[&Chain::Arbitrum]
            .error
            .as_deref()
            .unwrap_or_default()
            .contains("aborted"));
        assert_eq!(by_chain[&Chain::Gnosis].source, UNREGISTERED_SOURCE);
        assert!(by_chain[&Chain::Base].is_ok());
    }

    #[test]
    fn positions_are_sorted_and_capped() {
        let make = |symbol: &str, balance: f64, price: Option<f64>| {
            let position = WalletPosition::new(
                Chain::Ethereum,
                PositionKind::FungibleToken,
                symbol.to_ascii_lowercase(),
                symbol,
                symbol,
                18,
                balance,
                "https://etherscan.io",
            );
            match price {
                Some(price) => position.with_price(price, "explorer"),
                None => position,
            }
        };
        let result = ChainScanResult::ok(
            Chain::Ethereum,
            "fake",
            ChainHoldings {
                native_balance: None,
                positions: vec![
                    make("DUST", 1_000.0, None),
                    make("WETH", 2.0, Some(3_000.0)),
                    make("USDC", 50.0, Some(1.0)),
                    make("JUNK", 5_000.0, None),
                ],
            },
        );

        let composite =
            compose(ADDRESS.to_string(), vec![Chain::Ethereum], vec![result], 3).expect("ok");
        let symbols: Vec<&str> = composite.positions.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["WETH", "USDC", "JUNK"]);
    }
}
