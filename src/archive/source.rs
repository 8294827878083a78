use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IoError;
use crate::io::{FileRangeReader, HttpRangeReader, RangeReader, S3Location, S3RangeReader, SourceAuth};

/// Trait for creating range readers from archive URLs.
///
/// This abstraction lets the archive cache work with different storage
/// backends (HTTP, S3, local files) and lets tests supply in-memory
/// archives.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Create a range reader for the archive at `url`.
    async fn open_reader(&self, url: &str) -> Result<Arc<dyn RangeReader>, IoError>;
}

/// Backend kind selected from an archive URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveLocation {
    Http(String),
    S3(S3Location),
    File(std::path::PathBuf),
}

impl ArchiveLocation {
    /// Classify `url` by scheme. Strings without a scheme are file paths.
    pub fn parse(url: &str) -> Result<Self, IoError> {
        match url::Url::parse(url) {
            Ok(parsed) => match parsed.scheme() {
                "http" | "https" => Ok(ArchiveLocation::Http(url.to_string())),
                "s3" => S3Location::parse(url).map(ArchiveLocation::S3),
                "file" => parsed
                    .to_file_path()
                    .map(ArchiveLocation::File)
                    .map_err(|_| IoError::InvalidLocation(url.to_string())),
                _ => Err(IoError::InvalidLocation(url.to_string())),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(ArchiveLocation::File(std::path::PathBuf::from(url)))
            }
            Err(_) => Err(IoError::InvalidLocation(url.to_string())),
        }
    }
}

/// [`ArchiveSource`] that dispatches on the URL scheme.
///
/// `http(s)://` archives are read with range requests carrying the
/// configured credentials, `s3://bucket/key` archives need an S3 client,
/// and anything else is treated as a local path.
#[derive(Clone)]
pub struct UrlArchiveSource {
    http: reqwest::Client,
    auth: SourceAuth,
    s3: Option<aws_sdk_s3::Client>,
}

impl UrlArchiveSource {
    pub fn new(http: reqwest::Client, auth: SourceAuth) -> Self {
        Self {
            http,
            auth,
            s3: None,
        }
    }

    /// Enable `s3://` archives.
    pub fn with_s3_client(mut self, client: aws_sdk_s3::Client) -> Self {
        self.s3 = Some(client);
        self
    }
}

#[async_trait]
impl ArchiveSource for UrlArchiveSource {
    async fn open_reader(&self, url: &str) -> Result<Arc<dyn RangeReader>, IoError> {
        match ArchiveLocation::parse(url)? {
            ArchiveLocation::Http(url) => Ok(Arc::new(HttpRangeReader::new(
                self.http.clone(),
                url,
                self.auth.clone(),
            ))),
            ArchiveLocation::S3(location) => {
                let client = self.s3.clone().ok_or_else(|| {
                    IoError::InvalidLocation(format!("{} (no S3 client configured)", url))
                })?;
                Ok(Arc::new(S3RangeReader::new(client, location)))
            }
            ArchiveLocation::File(path) => Ok(Arc::new(FileRangeReader::open(path).await?)),
        }
    }
}
