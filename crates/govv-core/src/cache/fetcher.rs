use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client};
use tracing::debug;

use super::error::FetchError;
use super::request::{Request, Response};

/// HTTP request timeout in seconds for the default network fetcher.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The network side of the cache manager.
pub trait Fetcher: Send + Sync + 'static {
    /// Perform the request. Any HTTP response, whatever its status, is `Ok`;
    /// only transport failures are errors.
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response, FetchError>> + Send;
}

/// `Fetcher` backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        if request.is_navigation() {
            builder = builder.header(header::ACCEPT, "text/html,application/xhtml+xml");
        }

        let response = builder.send().await?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %url, status, bytes = body.len(), "Fetched from network");

        Ok(Response {
            url,
            status,
            headers,
            body,
        })
    }
}
