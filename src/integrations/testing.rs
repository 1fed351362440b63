//! Loopback HTTP fixtures for adapter tests.

use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::integrations::http::ProviderHttp;
use crate::services::retry_policy::RetryPolicy;
use crate::services::scan_context::ScanContext;

/// Serves `router` on an ephemeral loopback port and returns its base URL.
pub async fn serve(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind loopback listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{}", addr)
}

/// Scan context whose retries never sleep.
pub fn scan_context(max_attempts: usize) -> ScanContext {
    ScanContext::new(
        ProviderHttp::new(Duration::from_secs(5)).expect("http client"),
        RetryPolicy::immediate(max_attempts),
    )
}
