use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode};

use super::SourceAuth;
use crate::error::IoError;

/// Fetches whole objects by URL.
///
/// Template tile sources go through this trait so tests can substitute
/// canned responses for the network.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// GET `url` and return the body of a successful response.
    ///
    /// Any non-success status is an error; 404 maps to
    /// [`IoError::NotFound`].
    async fn fetch(&self, url: &str) -> Result<Bytes, IoError>;
}

/// reqwest-backed [`TileFetcher`].
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    auth: SourceAuth,
}

impl HttpFetcher {
    /// Create a fetcher sharing `client`'s connection pool.
    pub fn new(client: Client, auth: SourceAuth) -> Self {
        Self { client, auth }
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, IoError> {
        let response = self
            .auth
            .apply(self.client.get(url))
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .bytes()
                .await
                .map_err(|e| IoError::Connection(e.to_string())),
            StatusCode::NOT_FOUND => Err(IoError::NotFound(url.to_string())),
            status => Err(IoError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }
}

/// Build the shared HTTP client used for tile fetches and range reads.
///
/// A zero timeout disables the per-request deadline.
pub fn create_http_client(timeout: std::time::Duration) -> Result<Client, IoError> {
    let mut builder = Client::builder().user_agent(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    if !timeout.is_zero() {
        builder = builder.timeout(timeout);
    }
    builder
        .build()
        .map_err(|e| IoError::Connection(e.to_string()))
}
