//! Shared `reqwest::Client` construction.
//!
//! Grounded on the teacher's `utils::http_client::install_rustls_provider`
//! idiom: installing the crypto provider once, defensively, since more than
//! one collaborator (the fetcher, the webhook dispatcher) builds its own
//! client.

use std::sync::OnceLock;
use std::time::Duration;

use tracing::debug;

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

/// Build a `reqwest::Client` with a fixed request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Client {
    install_rustls_provider();
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
