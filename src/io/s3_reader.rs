use async_trait::async_trait;
use aws_sdk_s3::Client;
use bytes::Bytes;

use super::range_reader::range_header;
use super::RangeReader;
use crate::error::IoError;

/// Bucket and key parsed from an `s3://bucket/key` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    /// Parse an `s3://bucket/key` URL.
    pub fn parse(url: &str) -> Result<Self, IoError> {
        let rest = url
            .strip_prefix("s3://")
            .ok_or_else(|| IoError::InvalidLocation(url.to_string()))?;
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(IoError::InvalidLocation(url.to_string())),
        }
    }
}

/// S3-backed implementation of RangeReader.
///
/// Reads byte ranges from objects in S3 or S3-compatible storage (MinIO,
/// R2, etc.) with ranged GetObject calls.
#[derive(Clone)]
pub struct S3RangeReader {
    client: Client,
    location: S3Location,
    identifier: String,
}

impl S3RangeReader {
    /// Create a reader for an object. No request is made until the first read.
    pub fn new(client: Client, location: S3Location) -> Self {
        let identifier = format!("s3://{}/{}", location.bucket, location.key);
        Self {
            client,
            location,
            identifier,
        }
    }
}

#[async_trait]
impl RangeReader for S3RangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let resp = self
            .client
            .get_object()
            .bucket(&self.location.bucket)
            .key(&self.location.key)
            .range(range_header(offset, len)?)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false)
                    || e.raw_response()
                        .map(|r| r.status().as_u16() == 404)
                        .unwrap_or(false);
                if missing {
                    IoError::NotFound(self.identifier.clone())
                } else {
                    IoError::S3(e.to_string())
                }
            })?;

        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| IoError::Connection(e.to_string()))?
            .into_bytes();

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
        &self.identifier
    }
}

/// Create an S3 client with an optional custom endpoint.
///
/// Region and credentials come from the standard AWS environment. Custom
/// endpoints (MinIO and friends) get path-style addressing.
pub async fn create_s3_client(endpoint_url: Option<&str>) -> Client {
    let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(endpoint) = endpoint_url {
        config_loader = config_loader.endpoint_url(endpoint);
    }
    let sdk_config = config_loader.load().await;

    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(endpoint_url.is_some())
        .build();

    Client::from_conf(s3_config)
}
