// src/models/mod.rs
pub mod chain;
pub mod wallet;

pub use chain::{AddressKind, Chain, ALL_CHAINS, CHAIN_ALIASES};
pub use wallet::{
    ChainFailure, ChainHoldings, ChainScanResult, CompositeResult, NativeBalanceEntry,
    PositionKind, ScanRequest, ScanStatus, WalletPosition,
};

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}
