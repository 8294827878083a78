mod auth;
mod fetch;
mod file_reader;
mod http_reader;
mod range_reader;
mod s3_reader;

pub use auth::SourceAuth;
pub use fetch::{create_http_client, HttpFetcher, TileFetcher};
pub use file_reader::FileRangeReader;
pub use http_reader::HttpRangeReader;
pub use range_reader::{read_i32_le, read_u32_le, read_u64_le, RangeReader};
pub use s3_reader::{create_s3_client, S3Location, S3RangeReader};
