use serde::{Deserialize, Serialize};
use std::fmt;

/// Every chain the scanner knows how to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Chain {
    Ethereum,
    Arbitrum,
    Optimism,
    Base,
    Polygon,
    Gnosis,
    AvalancheC,
    AvalancheP,
    Tron,
    Hyperliquid,
}

/// Which form of the wallet address a chain needs before it can be scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Evm,
    /// Tron account derived from the EVM address bytes.
    TronFromEvm,
    Platform,
}

/// Chains in the order they are scanned and reported for `auto`.
pub const ALL_CHAINS: [Chain; 10] = [
    Chain::Ethereum,
    Chain::Arbitrum,
    Chain::Optimism,
    Chain::Base,
    Chain::Polygon,
    Chain::Gnosis,
    Chain::AvalancheC,
    Chain::AvalancheP,
    Chain::Tron,
    Chain::Hyperliquid,
];

pub const EVM_EXPLORER_CHAINS: [Chain; 7] = [
    Chain::Ethereum,
    Chain::Arbitrum,
    Chain::Optimism,
    Chain::Base,
    Chain::Polygon,
    Chain::Gnosis,
    Chain::AvalancheC,
];

/// Selector aliases and the concrete chains they expand to.
pub const CHAIN_ALIASES: &[(&str, &[Chain])] = &[
    ("avalanche", &[Chain::AvalancheC, Chain::AvalancheP]),
    ("avax", &[Chain::AvalancheC, Chain::AvalancheP]),
    ("evm", &EVM_EXPLORER_CHAINS),
    ("eth", &[Chain::Ethereum]),
    ("mainnet", &[Chain::Ethereum]),
    ("arb", &[Chain::Arbitrum]),
    ("op", &[Chain::Optimism]),
    ("matic", &[Chain::Polygon]),
    ("xdai", &[Chain::Gnosis]),
    ("c-chain", &[Chain::AvalancheC]),
    ("avax-c", &[Chain::AvalancheC]),
    ("p-chain", &[Chain::AvalancheP]),
    ("avax-p", &[Chain::AvalancheP]),
    ("trx", &[Chain::Tron]),
    ("hl", &[Chain::Hyperliquid]),
    ("hyper", &[Chain::Hyperliquid]),
];

impl Chain {
    pub fn id(&self) -> &'static str {
        match self {
            Chain::Ethereum => "ethereum",
            Chain::Arbitrum => "arbitrum",
            Chain::Optimism => "optimism",
            Chain::Base => "base",
            Chain::Polygon => "polygon",
            Chain::Gnosis => "gnosis",
            Chain::AvalancheC => "avalanche-c",
            Chain::AvalancheP => "avalanche-p",
            Chain::Tron => "tron",
            Chain::Hyperliquid => "hyperliquid",
        }
    }

    pub fn from_id(value: &str) -> Option<Chain> {
        let normalized = value.trim().to_ascii_lowercase();
        ALL_CHAINS
            .iter()
            .copied()
            .find(|chain| chain.id() == normalized)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Chain::Ethereum => "Ethereum",
            Chain::Arbitrum => "Arbitrum One",
            Chain::Optimism => "OP Mainnet",
            Chain::Base => "Base",
            Chain::Polygon => "Polygon PoS",
            Chain::Gnosis => "Gnosis",
            Chain::AvalancheC => "Avalanche C-Chain",
            Chain::AvalancheP => "Avalanche P-Chain",
            Chain::Tron => "Tron",
            Chain::Hyperliquid => "Hyperliquid",
        }
    }

    pub fn native_symbol(&self) -> &'static str {
        match self {
            Chain::Ethereum | Chain::Arbitrum | Chain::Optimism | Chain::Base => "ETH",
            Chain::Polygon => "POL",
            Chain::Gnosis => "XDAI",
            Chain::AvalancheC | Chain::AvalancheP => "AVAX",
            Chain::Tron => "TRX",
            Chain::Hyperliquid => "HYPE",
        }
    }

    pub fn native_decimals(&self) -> u32 {
        match self {
            // P-Chain amounts are denominated in nAVAX.
            Chain::AvalancheP => 9,
            Chain::Tron => 6,
            _ => 18,
        }
    }

    pub fn required_address(&self) -> AddressKind {
        match self {
            Chain::AvalancheP => AddressKind::Platform,
            Chain::Tron => AddressKind::TronFromEvm,
            _ => AddressKind::Evm,
        }
    }

    pub fn is_evm_explorer_chain(&self) -> bool {
        EVM_EXPLORER_CHAINS.contains(self)
    }

    /// Web explorer base used to build `explorerUrl` links.
    pub fn explorer_base(&self) -> &'static str {
        match self {
            Chain::Ethereum => "https://etherscan.io",
            Chain::Arbitrum => "https://arbiscan.io",
            Chain::Optimism => "https://optimistic.etherscan.io",
            Chain::Base => "https://basescan.org",
            Chain::Polygon => "https://polygonscan.com",
            Chain::Gnosis => "https://gnosisscan.io",
            Chain::AvalancheC => "https://snowtrace.io",
            Chain::AvalancheP => "https://subnets.avax.network/p-chain",
            Chain::Tron => "https://tronscan.org/#",
            Chain::Hyperliquid => "https://app.hyperliquid.xyz/explorer",
        }
    }

    pub fn address_url(&self, address: &str) -> String {
        format!("{}/address/{}", self.explorer_base(), address)
    }

    pub fn token_url(&self, contract: &str, holder: &str) -> String {
        match self {
            Chain::Tron => format!("{}/token20/{}", self.explorer_base(), contract),
            Chain::AvalancheP | Chain::Hyperliquid => self.address_url(holder),
            _ => format!("{}/token/{}?a={}", self.explorer_base(), contract, holder),
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

pub fn alias_members(alias: &str) -> Option<&'static [Chain]> {
    let normalized = alias.trim().to_ascii_lowercase();
    CHAIN_ALIASES
        .iter()
        .find(|(name, _)| *name == normalized)
        .map(|(_, members)| *members)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_ids_round_trip_through_from_id() {
        for chain in ALL_CHAINS {
            assert_eq!(Chain::from_id(chain.id()), Some(chain));
        }
        assert_eq!(Chain::from_id(" Avalanche-C "), Some(Chain::AvalancheC));
        assert_eq!(Chain::from_id("solana"), None);
    }

    #[test]
    fn serde_uses_kebab_case_ids() {
        let encoded = serde_json::to_string(&Chain::AvalancheP).expect("serialize chain");
        assert_eq!(encoded, "\"avalanche-p\"");
    }

    #[test]
    fn avalanche_alias_expands_to_both_chains() {
        let members = alias_members("AVALANCHE").expect("alias exists");
        assert_eq!(members, &[Chain::AvalancheC, Chain::AvalancheP]);
        assert!(alias_members("ethereum").is_none());
    }

    #[test]
    fn token_url_follows_chain_conventions() {
        assert_eq!(
            Chain::Ethereum.token_url("0xtoken", "0xholder"),
            "https://etherscan.io/token/0xtoken?a=0xholder"
        );
        assert_eq!(
            Chain::Tron.token_url("TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t", "Tholder"),
            "https://tronscan.org/#/token20/TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t"
        );
    }
}
