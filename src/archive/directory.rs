//! Archive directories.
//!
//! A directory is a varint-encoded, column-oriented list of entries sorted by
//! tile id:
//!
//! ```text
//! count
//! tile_id deltas    (count varints, first relative to 0)
//! run lengths       (count varints)
//! lengths           (count varints)
//! offsets           (count varints: 0 = directly after the previous entry,
//!                    otherwise offset + 1)
//! ```
//!
//! An entry with run length 0 points at a leaf directory; any other entry
//! covers `run_length` consecutive tile ids sharing the same bytes.

use crate::error::ArchiveError;

/// One directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub tile_id: u64,
    pub offset: u64,
    pub length: u32,
    pub run_length: u32,
}

impl Entry {
    /// True when this entry references a leaf directory instead of tile data.
    pub fn is_leaf_pointer(&self) -> bool {
        self.run_length == 0
    }
}

/// Decoded directory, entries sorted by tile id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<Entry>,
}

impl Directory {
    /// Build a directory from entries already sorted by tile id.
    pub fn from_entries(entries: Vec<Entry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Decode an uncompressed directory.
    pub fn parse(bytes: &[u8]) -> Result<Self, ArchiveError> {
        let mut reader = VarintReader::new(bytes);
        let count = reader.next()? as usize;

        // Every entry takes at least one byte in each of the four columns.
        if count.saturating_mul(4) > bytes.len() {
            return Err(ArchiveError::InvalidDirectory(format!(
                "entry count {} exceeds directory size {}",
                count,
                bytes.len()
            )));
        }

        let mut entries = Vec::with_capacity(count);
        let mut tile_id = 0u64;
        for _ in 0..count {
            tile_id = tile_id
                .checked_add(reader.next()?)
                .ok_or_else(|| ArchiveError::InvalidDirectory("tile id overflow".into()))?;
            entries.push(Entry {
                tile_id,
                offset: 0,
                length: 0,
                run_length: 0,
            });
        }
        for entry in entries.iter_mut() {
            entry.run_length = reader.next_u32()?;
        }
        for entry in entries.iter_mut() {
            entry.length = reader.next_u32()?;
        }
        for i in 0..count {
            let value = reader.next()?;
            entries[i].offset = match (value, i) {
                (0, 0) => {
                    return Err(ArchiveError::InvalidDirectory(
                        "first entry cannot continue a previous one".into(),
                    ))
                }
                (0, _) => entries[i - 1]
                    .offset
                    .checked_add(entries[i - 1].length as u64)
                    .ok_or_else(|| {
                        ArchiveError::InvalidDirectory(format!("entry {} offset overflows", i))
                    })?,
                (v, _) => v - 1,
            };
        }

        Ok(Self { entries })
    }

    /// Encode into the uncompressed on-disk form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_varint(&mut out, self.entries.len() as u64);

        let mut last_id = 0;
        for entry in &self.entries {
            write_varint(&mut out, entry.tile_id - last_id);
            last_id = entry.tile_id;
        }
        for entry in &self.entries {
            write_varint(&mut out, entry.run_length as u64);
        }
        for entry in &self.entries {
            write_varint(&mut out, entry.length as u64);
        }
        for (i, entry) in self.entries.iter().enumerate() {
            let contiguous = i > 0 && {
                let prev = &self.entries[i - 1];
                prev.offset.checked_add(prev.length as u64) == Some(entry.offset)
            };
            write_varint(&mut out, if contiguous { 0 } else { entry.offset + 1 });
        }
        out
    }

    /// Find the entry responsible for `tile_id`.
    ///
    /// Returns the entry whose run covers the id, or the closest preceding
    /// leaf pointer. `None` means the tile is not in this directory.
    pub fn find_tile(&self, tile_id: u64) -> Option<&Entry> {
        let idx = self.entries.partition_point(|e| e.tile_id <= tile_id);
        let entry = self.entries.get(idx.checked_sub(1)?)?;
        if entry.is_leaf_pointer() || tile_id - entry.tile_id < entry.run_length as u64 {
            Some(entry)
        } else {
            None
        }
    }
}

// =============================================================================
// Varints
// =============================================================================

struct VarintReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> VarintReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn next(&mut self) -> Result<u64, ArchiveError> {
        let mut value = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = *self.bytes.get(self.pos).ok_or_else(|| {
                ArchiveError::InvalidDirectory("unexpected end of directory".into())
            })?;
            self.pos += 1;

            if shift >= 64 {
                return Err(ArchiveError::InvalidDirectory("varint too long".into()));
            }
            value |= ((byte & 0x7F) as u64) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    fn next_u32(&mut self) -> Result<u32, ArchiveError> {
        let value = self.next()?;
        u32::try_from(value)
            .map_err(|_| ArchiveError::InvalidDirectory(format!("value {} exceeds u32", value)))
    }
}

fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}
