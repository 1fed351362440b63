/// Application constants

// API version
pub const API_VERSION: &str = "v1";

// Response bounds
pub const MAX_POSITIONS: usize = 500;

// Provider identities reported in `chainResults[].source`
pub const SOURCE_EVM_EXPLORER: &str = "evm-explorer";
pub const SOURCE_TRONSCAN: &str = "tronscan";
pub const SOURCE_AVALANCHE_P: &str = "avalanche-p-rpc";
pub const SOURCE_HYPERLIQUID: &str = "hyperliquid";

// Price sources attached to positions
pub const PRICE_SOURCE_EXPLORER: &str = "explorer";
pub const PRICE_SOURCE_TRONSCAN: &str = "tronscan";
pub const PRICE_SOURCE_VENUE: &str = "hyperliquid";

// Default provider endpoints
pub const DEFAULT_TRONSCAN_API_URL: &str = "https://apilist.tronscanapi.com";
pub const DEFAULT_AVALANCHE_P_RPC_URLS: [&str; 2] = [
    "https://api.avax.network/ext/bc/P",
    "https://avalanche-p-chain-rpc.publicnode.com",
];
pub const DEFAULT_AVALANCHE_P_STAKING_API_URL: &str =
    "https://glacier-api.avax.network/v1/networks/mainnet/blockchains/p-chain";
pub const DEFAULT_AVALANCHE_C_RPC_URL: &str = "https://api.avax.network/ext/bc/C/rpc";
pub const DEFAULT_HYPERLIQUID_API_URL: &str = "https://api.hyperliquid.xyz";

// Tron
pub const TRON_NATIVE_TOKEN_ID: &str = "_";

// Avalanche P-Chain
pub const AVALANCHE_P_STAKING_MAX_PAGES: usize = 5;
pub const AVALANCHE_P_STAKING_PAGE_SIZE: usize = 100;

// EVM explorers
pub const EXPLORER_TOKEN_PAGE_SIZE: usize = 100;
pub const EXPLORER_TOKEN_MAX_PAGES: usize = 10;

// Hyperliquid
pub const HYPERLIQUID_COLLATERAL_SYMBOL: &str = "USDC";
pub const HYPERLIQUID_STAKE_SYMBOL: &str = "HYPE";
pub const HYPERLIQUID_DISPLAY_DECIMALS: u32 = 8;
