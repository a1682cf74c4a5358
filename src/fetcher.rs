use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

/// Errors raised while retrieving a remote document.
#[derive(Debug, Error)]
pub enum FetchError {
    /// DNS, connection, timeout, or body read failure
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response while `strict_status` is enabled
    #[error("{url} returned HTTP status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to create HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

pub struct Fetcher {
    client: Client,
    strict_status: bool,
}

impl Fetcher {
    pub fn new(config: &Config) -> Result<Self, FetchError> {
        let mut builder = Client::builder().user_agent(config.user_agent.as_str());
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(FetchError::Client)?;

        Ok(Self {
            client,
            strict_status: config.strict_status,
        })
    }

    /// Fetch `url` and return the whole response body.
    ///
    /// Unless `strict_status` is set, a non-success status is only logged and
    /// the body is still returned for parsing.
    pub async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        info!("Fetching {}", url);

        let transport = |source: reqwest::Error| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url).send().await.map_err(transport)?;

        let status = response.status();
        if !status.is_success() {
            if self.strict_status {
                return Err(FetchError::HttpStatus {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            warn!(
                url = %url,
                status = status.as_u16(),
                "Non-success status, parsing body anyway"
            );
        }

        let bytes = response.bytes().await.map_err(transport)?;
        Ok(bytes.to_vec())
    }
}
