use crate::config::HttpConfig;
use reqwest::Client;
use std::time::Duration;

pub fn build_provider_client(http: &HttpConfig) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(http.timeout_secs))
        .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|err| {
            tracing::warn!("falling back to default HTTP client: {err}");
            Client::new()
        })
}
