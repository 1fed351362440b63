use std::collections::HashMap;
use std::env;

use url::Url;

use crate::constants::{
    DEFAULT_AVALANCHE_C_RPC_URL, DEFAULT_AVALANCHE_P_RPC_URLS, DEFAULT_AVALANCHE_P_STAKING_API_URL,
    DEFAULT_HYPERLIQUID_API_URL, DEFAULT_TRONSCAN_API_URL, MAX_POSITIONS,
};
use crate::models::chain::{Chain, EVM_EXPLORER_CHAINS};

/// Explorer API roots for one EVM chain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExplorerEndpoints {
    /// Etherscan-compatible `/api?module=account` root.
    pub legacy_api_url: Option<String>,
    /// Blockscout host serving `/api/v2/...`.
    pub v2_api_url: Option<String>,
    /// Key sent as `apikey` to the legacy API of this chain only.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub cors_allowed_origins: String,

    // Scan limits
    pub provider_timeout_secs: u64,
    pub chain_scan_timeout_secs: u64,
    pub max_positions: usize,

    // Retry policy for rate-limited providers
    pub retry_max_attempts: usize,
    pub retry_delays_ms: Vec<u64>,

    // EVM explorers
    pub etherscan_api_key: Option<String>,
    pub explorers: HashMap<Chain, ExplorerEndpoints>,

    // Tron
    pub tronscan_api_url: String,
    pub tron_api_key: Option<String>,
    pub tron_from_evm: bool,

    // Avalanche
    pub avalanche_p_rpc_urls: Vec<String>,
    pub avalanche_p_staking_api_url: String,
    pub avalanche_c_rpc_url: String,

    // Trading venue
    pub hyperliquid_api_url: String,
}

// Internal helper that supports `default_explorer` operations.
fn default_explorer(chain: Chain) -> ExplorerEndpoints {
    let blockscout = |host: &str| ExplorerEndpoints {
        legacy_api_url: Some(format!("https://{}/api", host)),
        v2_api_url: Some(format!("https://{}", host)),
        api_key: None,
    };
    match chain {
        Chain::Ethereum => blockscout("eth.blockscout.com"),
        Chain::Arbitrum => blockscout("arbitrum.blockscout.com"),
        Chain::Optimism => blockscout("optimism.blockscout.com"),
        Chain::Base => blockscout("base.blockscout.com"),
        Chain::Polygon => blockscout("polygon.blockscout.com"),
        Chain::Gnosis => blockscout("gnosis.blockscout.com"),
        Chain::AvalancheC => ExplorerEndpoints {
            legacy_api_url: Some(
                "https://api.routescan.io/v2/network/mainnet/evm/43114/etherscan/api".to_string(),
            ),
            v2_api_url: None,
            api_key: None,
        },
        _ => ExplorerEndpoints::default(),
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: "development".to_string(),
            cors_allowed_origins: "*".to_string(),
            provider_timeout_secs: 10,
            chain_scan_timeout_secs: 25,
            max_positions: MAX_POSITIONS,
            retry_max_attempts: 3,
            retry_delays_ms: vec![750, 1_500, 3_000],
            etherscan_api_key: None,
            explorers: EVM_EXPLORER_CHAINS
                .iter()
                .map(|chain| (*chain, default_explorer(*chain)))
                .collect(),
            tronscan_api_url: DEFAULT_TRONSCAN_API_URL.to_string(),
            tron_api_key: None,
            tron_from_evm: true,
            avalanche_p_rpc_urls: DEFAULT_AVALANCHE_P_RPC_URLS
                .iter()
                .map(|url| url.to_string())
                .collect(),
            avalanche_p_staking_api_url: DEFAULT_AVALANCHE_P_STAKING_API_URL.to_string(),
            avalanche_c_rpc_url: DEFAULT_AVALANCHE_C_RPC_URL.to_string(),
            hyperliquid_api_url: DEFAULT_HYPERLIQUID_API_URL.to_string(),
        }
    }
}

// Internal helper that supports `env_non_empty` operations.
fn env_non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// Internal helper that parses or transforms values for `split_list`.
fn split_list(raw: &str) -> Vec<String> {
    raw.split([',', ';', '\n', '\r', ' '])
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

// Internal helper that supports `env_flag` operations.
fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(default)
}

/// Env prefix for a chain, e.g. `AVALANCHE_C` for `avalanche-c`.
fn chain_env_prefix(chain: Chain) -> String {
    chain.id().to_ascii_uppercase().replace('-', "_")
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        let mut explorers = defaults.explorers.clone();
        for chain in EVM_EXPLORER_CHAINS {
            let prefix = chain_env_prefix(chain);
            let entry = explorers.entry(chain).or_default();
            if let Some(url) = env_non_empty(&format!("{}_EXPLORER_API_URL", prefix)) {
                entry.legacy_api_url = Some(url);
            }
            if let Some(url) = env_non_empty(&format!("{}_EXPLORER_V2_URL", prefix)) {
                entry.v2_api_url = Some(url);
            }
            if let Some(key) = env_non_empty(&format!("{}_EXPLORER_API_KEY", prefix)) {
                entry.api_key = Some(key);
            }
        }

        let retry_delays_ms = match env_non_empty("RETRY_DELAYS_MS") {
            Some(raw) => split_list(&raw)
                .iter()
                .map(|value| value.parse::<u64>())
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.retry_delays_ms.clone(),
        };

        Ok(Config {
            host: env_non_empty("HOST").unwrap_or(defaults.host),
            port: env_non_empty("PORT")
                .unwrap_or_else(|| defaults.port.to_string())
                .parse()?,
            environment: env_non_empty("ENVIRONMENT").unwrap_or(defaults.environment),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or(defaults.cors_allowed_origins),

            provider_timeout_secs: env_non_empty("PROVIDER_TIMEOUT_SECS")
                .unwrap_or_else(|| defaults.provider_timeout_secs.to_string())
                .parse()?,
            chain_scan_timeout_secs: env_non_empty("CHAIN_SCAN_TIMEOUT_SECS")
                .unwrap_or_else(|| defaults.chain_scan_timeout_secs.to_string())
                .parse()?,
            max_positions: env_non_empty("MAX_POSITIONS")
                .unwrap_or_else(|| defaults.max_positions.to_string())
                .parse()?,

            retry_max_attempts: env_non_empty("RETRY_MAX_ATTEMPTS")
                .unwrap_or_else(|| defaults.retry_max_attempts.to_string())
                .parse()?,
            retry_delays_ms,

            etherscan_api_key: env_non_empty("ETHERSCAN_API_KEY"),
            explorers,

            tronscan_api_url: env_non_empty("TRONSCAN_API_URL").unwrap_or(defaults.tronscan_api_url),
            tron_api_key: env_non_empty("TRON_PRO_API_KEY"),
            tron_from_evm: env_flag("TRON_FROM_EVM", defaults.tron_from_evm),

            avalanche_p_rpc_urls: env_non_empty("AVALANCHE_P_RPC_URLS")
                .map(|raw| split_list(&raw))
                .unwrap_or(defaults.avalanche_p_rpc_urls),
            avalanche_p_staking_api_url: env_non_empty("AVALANCHE_P_STAKING_API_URL")
                .unwrap_or(defaults.avalanche_p_staking_api_url),
            avalanche_c_rpc_url: env_non_empty("AVALANCHE_C_RPC_URL")
                .unwrap_or(defaults.avalanche_c_rpc_url),

            hyperliquid_api_url: env_non_empty("HYPERLIQUID_API_URL")
                .unwrap_or(defaults.hyperliquid_api_url),
        })
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.provider_timeout_secs == 0 {
            anyhow::bail!("PROVIDER_TIMEOUT_SECS must be > 0");
        }
        if self.chain_scan_timeout_secs == 0 {
            anyhow::bail!("CHAIN_SCAN_TIMEOUT_SECS must be > 0");
        }
        if self.max_positions == 0 {
            anyhow::bail!("MAX_POSITIONS must be > 0");
        }
        if self.avalanche_p_rpc_urls.is_empty() {
            anyhow::bail!("AVALANCHE_P_RPC_URLS is empty");
        }

        if self.chain_scan_timeout_secs < self.provider_timeout_secs {
            tracing::warn!(
                "CHAIN_SCAN_TIMEOUT_SECS ({}) is below PROVIDER_TIMEOUT_SECS ({}); retries will be cut short",
                self.chain_scan_timeout_secs,
                self.provider_timeout_secs
            );
        }
        if self.retry_max_attempts == 0 {
            tracing::warn!("RETRY_MAX_ATTEMPTS is 0; treating as a single attempt");
        }
        if self.tron_api_key.is_none() {
            tracing::warn!("TRON_PRO_API_KEY not set; Tronscan requests may be throttled");
        }
        for chain in EVM_EXPLORER_CHAINS {
            let endpoints = self.explorer_endpoints(chain);
            if endpoints.legacy_api_url.is_none() && endpoints.v2_api_url.is_none() {
                tracing::warn!("No explorer configured for {}; scans will fail", chain);
            }
        }
        if self.cors_allowed_origins.trim().is_empty() {
            tracing::warn!("CORS_ALLOWED_ORIGINS is empty; requests may be blocked");
        }

        Ok(())
    }

    /// Endpoints for `chain`. `ETHERSCAN_API_KEY` only applies when the
    /// legacy root is an etherscan.io host and no per-chain key is set.
    pub fn explorer_endpoints(&self, chain: Chain) -> ExplorerEndpoints {
        let mut endpoints = self.explorers.get(&chain).cloned().unwrap_or_default();
        if endpoints.api_key.is_none()
            && endpoints.legacy_api_url.as_deref().is_some_and(is_etherscan_host)
        {
            endpoints.api_key = self.etherscan_api_key.clone();
        }
        endpoints
    }
}

// Internal helper that checks conditions for `is_etherscan_host`.
fn is_etherscan_host(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
        .is_some_and(|host| host == "etherscan.io" || host.ends_with(".etherscan.io"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_explorer_chain() {
        let config = Config::default();
        for chain in EVM_EXPLORER_CHAINS {
            let endpoints = config.explorer_endpoints(chain);
            assert!(endpoints.legacy_api_url.is_some(), "{} has no legacy api", chain);
        }
        assert!(config.explorer_endpoints(Chain::Base).v2_api_url.is_some());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn split_list_accepts_mixed_separators() {
        assert_eq!(
            split_list("https://a, https://b;https://c\nhttps://d"),
            vec!["https://a", "https://b", "https://c", "https://d"]
        );
    }

    #[test]
    fn chain_env_prefix_uses_screaming_snake_case() {
        assert_eq!(chain_env_prefix(Chain::AvalancheC), "AVALANCHE_C");
        assert_eq!(chain_env_prefix(Chain::Ethereum), "ETHEREUM");
    }

    #[test]
    fn etherscan_key_is_only_sent_to_etherscan_hosts() {
        let mut config = Config {
            etherscan_api_key: Some("SECRET".to_string()),
            ..Config::default()
        };
        assert_eq!(config.explorer_endpoints(Chain::Ethereum).api_key, None);
        assert_eq!(config.explorer_endpoints(Chain::AvalancheC).api_key, None);

        config.explorers.insert(
            Chain::Ethereum,
            ExplorerEndpoints {
                legacy_api_url: Some("https://api.etherscan.io/api".to_string()),
                ..ExplorerEndpoints::default()
            },
        );
        config.explorers.insert(
            Chain::Optimism,
            ExplorerEndpoints {
                legacy_api_url: Some("https://api-optimistic.etherscan.io/api".to_string()),
                ..ExplorerEndpoints::default()
            },
        );
        config.explorers.insert(
            Chain::Base,
            ExplorerEndpoints {
                legacy_api_url: Some("https://base.blockscout.com/api".to_string()),
                api_key: Some("BASE-KEY".to_string()),
                ..ExplorerEndpoints::default()
            },
        );
        assert_eq!(
            config.explorer_endpoints(Chain::Ethereum).api_key.as_deref(),
            Some("SECRET")
        );
        assert_eq!(
            config.explorer_endpoints(Chain::Optimism).api_key.as_deref(),
            Some("SECRET")
        );
        assert_eq!(
            config.explorer_endpoints(Chain::Base).api_key.as_deref(),
            Some("BASE-KEY")
        );
        assert!(!is_etherscan_host("https://notetherscan.io/api"));
    }

    #[test]
    fn validate_rejects_zero_limits() {
        let config = Config {
            max_positions: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
