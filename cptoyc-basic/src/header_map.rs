//! Header map loader
//!
//! A header map is a dense on-disk table mapping header names to file
//! paths, acting like a directory of symlinks to the `#include`
//! resolution process. The format is little-endian with a byte-swap
//! flag set on load when the magic reads reversed.

use crate::{BasicResult, FileEntry, FileManager, HeaderMapError, SourceBuffer};

/// "pamh" on disk, read as a little-endian word.
const HMAP_MAGIC: u32 = 0x686d6170;
const HMAP_VERSION: u16 = 1;
const HMAP_EMPTY_BUCKET_KEY: u32 = 0;

const HEADER_SIZE: usize = 24;
const BUCKET_SIZE: usize = 12;

/// One hash bucket: string-pool offsets of the key and of the value's
/// prefix and suffix halves. A zero key marks an empty bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HMapBucket {
    key: u32,
    prefix: u32,
    suffix: u32,
}

/// A loaded, validated header map.
pub struct HeaderMap {
    buffer: SourceBuffer,
    needs_byte_swap: bool,
    strings_offset: u32,
    num_entries: u32,
    num_buckets: u32,
    max_value_length: u32,
}

impl std::fmt::Debug for HeaderMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeaderMap")
            .field("file", &self.buffer.name())
            .field("num_entries", &self.num_entries)
            .field("num_buckets", &self.num_buckets)
            .finish()
    }
}

/// The case-folded probe hash: `sum(tolower(c) * 13)`.
fn hash_hmap_key(key: &str) -> u32 {
    key.bytes()
        .fold(0u32, |acc, b| acc.wrapping_add(b.to_ascii_lowercase() as u32 * 13))
}

impl HeaderMap {
    /// Attempt to load `entry` as a header map. Returns `Ok(None)` when
    /// the file does not look like one at all; a recognizable header
    /// with bad fields is an error.
    pub fn from_file_entry(entry: &FileEntry) -> BasicResult<Option<HeaderMap>> {
        let buffer = SourceBuffer::from_file(entry.name())?;
        Self::from_buffer(buffer)
    }

    /// Same, for an in-memory buffer (used by tests).
    pub fn from_buffer(buffer: SourceBuffer) -> BasicResult<Option<HeaderMap>> {
        let bytes = buffer.bytes();
        if bytes.len() < HEADER_SIZE {
            return Ok(None);
        }

        let raw_magic = read_u32_le(bytes, 0);
        let needs_byte_swap = if raw_magic == HMAP_MAGIC {
            false
        } else if raw_magic.swap_bytes() == HMAP_MAGIC {
            true
        } else {
            return Ok(None);
        };

        let path = buffer.name().to_string();
        let swap16 = |v: u16| if needs_byte_swap { v.swap_bytes() } else { v };
        let swap32 = |v: u32| if needs_byte_swap { v.swap_bytes() } else { v };

        let version = swap16(read_u16_le(bytes, 4));
        if version != HMAP_VERSION {
            return Err(HeaderMapError::BadVersion { path, version }.into());
        }
        let reserved = swap16(read_u16_le(bytes, 6));
        if reserved != 0 {
            return Err(HeaderMapError::BadReserved {
                path,
                value: reserved,
            }
            .into());
        }

        let strings_offset = swap32(read_u32_le(bytes, 8));
        let num_entries = swap32(read_u32_le(bytes, 12));
        let num_buckets = swap32(read_u32_le(bytes, 16));
        let max_value_length = swap32(read_u32_le(bytes, 20));

        if num_buckets == 0 || !num_buckets.is_power_of_two() {
            return Err(HeaderMapError::BadBucketCount {
                path,
                count: num_buckets,
            }
            .into());
        }
        if HEADER_SIZE + num_buckets as usize * BUCKET_SIZE > bytes.len() {
            return Err(HeaderMapError::Truncated { path }.into());
        }

        Ok(Some(HeaderMap {
            buffer,
            needs_byte_swap,
            strings_offset,
            num_entries,
            num_buckets,
            max_value_length,
        }))
    }

    /// The filename of the header map itself.
    pub fn file_name(&self) -> &str {
        self.buffer.name()
    }

    pub fn num_entries(&self) -> u32 {
        self.num_entries
    }

    pub fn max_value_length(&self) -> u32 {
        self.max_value_length
    }

    /// Look `filename` up (case-insensitively); on a hit, concatenate
    /// the stored prefix and suffix and resolve the result through the
    /// file manager.
    pub fn lookup_file<'fm>(
        &self,
        filename: &str,
        fm: &'fm mut FileManager,
    ) -> Option<&'fm FileEntry> {
        let path = self.lookup_path(filename)?;
        fm.get_file(&path)
    }

    /// The concatenated `prefix + suffix` for `filename`, if present.
    pub fn lookup_path(&self, filename: &str) -> Option<String> {
        let mask = self.num_buckets - 1;
        let mut bucket_no = hash_hmap_key(filename) & mask;
        // A malformed map can have no empty bucket; never probe a
        // bucket twice.
        for _ in 0..self.num_buckets {
            let bucket = self.bucket(bucket_no)?;
            if bucket.key == HMAP_EMPTY_BUCKET_KEY {
                return None;
            }
            if let Some(key) = self.string(bucket.key) {
                if key.eq_ignore_ascii_case(filename) {
                    let prefix = self.string(bucket.prefix)?;
                    let suffix = self.string(bucket.suffix)?;
                    return Some(format!("{prefix}{suffix}"));
                }
            }
            bucket_no = (bucket_no + 1) & mask;
        }
        None
    }

    fn bucket(&self, bucket_no: u32) -> Option<HMapBucket> {
        if bucket_no >= self.num_buckets {
            return None;
        }
        let bytes = self.buffer.bytes();
        let base = HEADER_SIZE + bucket_no as usize * BUCKET_SIZE;
        let swap32 = |v: u32| {
            if self.needs_byte_swap {
                v.swap_bytes()
            } else {
                v
            }
        };
        Some(HMapBucket {
            key: swap32(read_u32_le(bytes, base)),
            prefix: swap32(read_u32_le(bytes, base + 4)),
            suffix: swap32(read_u32_le(bytes, base + 8)),
        })
    }

    /// A NUL-terminated string at `index` into the string pool.
    fn string(&self, index: u32) -> Option<&str> {
        let bytes = self.buffer.bytes();
        let start = self.strings_offset as usize + index as usize;
        if start >= bytes.len() {
            return None;
        }
        let rest = &bytes[start..];
        let end = rest.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&rest[..end]).ok()
    }
}

fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
