use std::io::Read;

use bytes::Bytes;
use flate2::read::GzDecoder;

use super::header::Compression;
use crate::error::ArchiveError;

/// Undo the archive-level compression of a directory or tile payload.
///
/// `Unknown` is passed through untouched: writers use it for payloads whose
/// encoding the archive does not describe.
pub fn decompress(data: Bytes, compression: Compression) -> Result<Bytes, ArchiveError> {
    match compression {
        Compression::None | Compression::Unknown => Ok(data),
        Compression::Gzip => {
            let mut out = Vec::with_capacity(data.len() * 4);
            GzDecoder::new(&data[..])
                .read_to_end(&mut out)
                .map_err(|e| ArchiveError::Decompression(e.to_string()))?;
            Ok(Bytes::from(out))
        }
        Compression::Brotli | Compression::Zstd => Err(ArchiveError::UnsupportedCompression(
            format!("{:?}", compression).to_lowercase(),
        )),
    }
}
