use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::integrations::http::ProviderHttp;
use crate::services::retry_policy::RetryPolicy;

/// Memoized lookups shared by the adapters of one scan. Dropped with the
/// scan, so nothing leaks between requests.
#[derive(Debug, Default)]
pub struct ScanCache {
    vault_names: RwLock<HashMap<String, Option<String>>>,
}

impl ScanCache {
    // Internal helper that parses or transforms values for `cache_key`.
    fn cache_key(vault_address: &str) -> String {
        vault_address.trim().to_ascii_lowercase()
    }

    /// `Some(None)` means the lookup already ran and found no name.
    pub async fn vault_name(&self, vault_address: &str) -> Option<Option<String>> {
        let guard = self.vault_names.read().await;
        guard.get(&Self::cache_key(vault_address)).cloned()
    }

    pub async fn remember_vault_name(&self, vault_address: &str, name: Option<String>) {
        let mut guard = self.vault_names.write().await;
        guard.insert(Self::cache_key(vault_address), name);
    }
}

/// Everything an adapter needs for one scan request.
#[derive(Debug)]
pub struct ScanContext {
    pub http: ProviderHttp,
    pub retry: RetryPolicy,
    pub cache: ScanCache,
}

impl ScanContext {
    pub fn new(http: ProviderHttp, retry: RetryPolicy) -> Self {
        Self {
            http,
            retry,
            cache: ScanCache::default(),
        }
    }
}
