use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, StatusCode};
use tracing::trace;

use super::range_reader::{check_bounds, range_header};
use super::{RangeReader, SourceAuth};
use crate::error::IoError;

/// HTTP-backed implementation of RangeReader.
///
/// Issues one `Range` request per read. The object size is not probed up
/// front: archive readers know every offset they need from the header, so a
/// HEAD request would only add a round-trip.
#[derive(Clone)]
pub struct HttpRangeReader {
    client: Client,
    url: String,
    auth: SourceAuth,
}

impl HttpRangeReader {
    /// Create a reader for `url`, sending `auth` with every request.
    pub fn new(client: Client, url: impl Into<String>, auth: SourceAuth) -> Self {
        Self {
            client,
            url: url.into(),
            auth,
        }
    }

    /// Get the request URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RangeReader for HttpRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        trace!(url = %self.url, offset, len, "range request");

        let request = self
            .client
            .get(&self.url)
            .header(header::RANGE, range_header(offset, len)?);
        let response = self
            .auth
            .apply(request)
            .send()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::PARTIAL_CONTENT | StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(IoError::NotFound(self.url.clone())),
            StatusCode::RANGE_NOT_SATISFIABLE => {
                return Err(IoError::RangeOutOfBounds {
                    offset,
                    requested: len as u64,
                    size: 0,
                })
            }
            other => {
                return Err(IoError::Status {
                    url: self.url.clone(),
                    status: other.as_u16(),
                })
            }
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?;

        // Servers that ignore Range answer 200 with the whole object.
        let data = if status == StatusCode::OK {
            check_bounds(offset, len, body.len() as u64)?;
            body.slice(offset as usize..offset as usize + len)
        } else {
            body
        };

        if data.len() != len {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: offset + data.len() as u64,
            });
        }

        Ok(data)
    }

    fn size(&self) -> Option<u64> {
        None
    }

    fn identifier(&self) -> &str {
        &self.url
    }
}
