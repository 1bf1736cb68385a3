//! HTTP client wrapper for the upstream feeds.

use std::time::Duration;

use reqwest::Client;

use crate::config::FeedsConfig;
use crate::error::FetchError;

/// HTTP client for the exchange feeds.
///
/// Carries one `reqwest::Client` configured with the total request timeout
/// and `User-Agent` from [`FeedsConfig`]. The exchange rejects requests
/// without a browser-like agent header.
#[derive(Debug, Clone)]
pub struct FeedClient {
    client: Client,
    market_watch_url: String,
    symbols_url: String,
}

impl FeedClient {
    /// Build a client from feed configuration.
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Network` if the underlying client cannot be
    /// constructed.
    pub fn new(config: &FeedsConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            market_watch_url: config.market_watch_url.clone(),
            symbols_url: config.symbols_url.clone(),
        })
    }

    /// Market-watch endpoint this client targets.
    #[must_use]
    pub fn market_watch_url(&self) -> &str {
        &self.market_watch_url
    }

    /// Symbol directory endpoint this client targets.
    #[must_use]
    pub fn symbols_url(&self) -> &str {
        &self.symbols_url
    }

    /// GET a URL and return the body as text.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response.text().await?)
    }
}
