// src/api/mod.rs
pub mod health;
pub mod wallet;

use std::sync::Arc;

use crate::config::Config;
use crate::services::WalletScanner;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub scanner: Arc<WalletScanner>,
}
