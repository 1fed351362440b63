// Scan pipeline services
pub mod balance;
pub mod chain_resolver;
pub mod fallback;
pub mod position_dedupe;
pub mod retry_policy;
pub mod scan_context;
pub mod wallet_scanner;

// Re-export for convenience
pub use wallet_scanner::WalletScanner;
