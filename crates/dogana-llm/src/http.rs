//! Shared HTTP client construction for consistent timeout and TLS configuration.

use std::time::Duration;

/// Build the HTTP client used by the provider backends.
///
/// Config: 30s connect timeout, `request_timeout` overall timeout, rustls TLS,
/// `dogana/{version}` user-agent, redirect limit 10.
pub(crate) fn default_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .timeout(request_timeout)
        .user_agent(concat!("dogana/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
}
