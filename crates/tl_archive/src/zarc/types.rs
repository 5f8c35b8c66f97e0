//! Base types for structure of ZARC archives.

use binrw::{BinRead, BinWrite};
use bon::Builder;

use crate::error::{Error, Result};
use crate::io::{parse_u24, parse_u40, write_u24, write_u40};

/// Case folding applied to paths before they are hashed
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum PathCase {
    /// Paths are hashed as they are
    #[default]
    None = 0,

    /// Paths are lower cased
    Lower = 1,

    /// Paths are upper cased
    Upper = 2,
}

impl PathCase {
    /// Folds `path` according to this rule.
    pub fn apply(self, path: &str) -> String {
        match self {
            PathCase::None => path.to_owned(),
            PathCase::Lower => path.to_ascii_lowercase(),
            PathCase::Upper => path.to_ascii_uppercase(),
        }
    }
}

impl TryFrom<u32> for PathCase {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            0 => Ok(PathCase::None),
            1 => Ok(PathCase::Lower),
            2 => Ok(PathCase::Upper),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown ZARC path case {other}"
            ))),
        }
    }
}

/// Encoding of paths before they were hashed
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub enum PathEncoding {
    /// 8-bit ASCII
    #[default]
    Ascii = 1,
}

/// Options for how a ZARC archive is written
#[derive(Debug, Clone, Copy, Builder)]
pub struct ZArcOptions {
    /// Size of a compression block
    #[builder(default = 65536)]
    pub block_alignment: u32,

    /// Entry data starts at a multiple of this
    #[builder(default = 16)]
    pub file_alignment: u32,

    /// Case folding applied to paths before hashing
    #[builder(default)]
    pub path_case: PathCase,
}

impl Default for ZArcOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// ZARC header
///
/// Always big endian.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
#[brw(big, magic = b"ZARC")]
pub struct ZArcHeader {
    /// Format version, always [`ZArcHeader::VERSION`]
    pub version: u32,

    /// Offset of the first byte after the block size table
    pub end_of_header: u32,

    /// Size of a content record, always [`ZArcContent::SIZE`]
    pub content_size: u32,

    /// Number of content records
    pub content_count: u32,

    /// Unknown
    pub unknown: u32,

    /// Raw [`PathEncoding`]
    pub path_encoding: u32,

    /// Size of a compression block
    pub block_alignment: u32,

    /// Alignment of entry data, and the unit of [`ZArcContent::block_offset`]
    pub file_alignment: u32,

    /// Raw [`PathCase`]
    pub path_case: u32,
}

impl ZArcHeader {
    /// Encoded size of the header
    pub const SIZE: u64 = 40;

    /// The only supported version
    pub const VERSION: u32 = 2;
}

impl Default for ZArcHeader {
    fn default() -> Self {
        Self {
            version: Self::VERSION,
            end_of_header: Self::SIZE as u32,
            content_size: ZArcContent::SIZE as u32,
            content_count: 0,
            unknown: 0,
            path_encoding: PathEncoding::Ascii as u32,
            block_alignment: 65536,
            file_alignment: 16,
            path_case: PathCase::None as u32,
        }
    }
}

/// ZARC content record, sorted by hash so the engine can binary search it
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[brw(big)]
pub struct ZArcContent {
    /// [`crate::hash::zarc_hash64`] of the path
    pub hash: u64,

    /// Size of the data once decoded
    #[br(parse_with = parse_u40)]
    #[bw(write_with = write_u40)]
    pub uncompressed_length: u64,

    /// Unknown
    pub unknown: u32,

    /// Index of the entry's first block in the block size table
    #[br(parse_with = parse_u24)]
    #[bw(write_with = write_u24)]
    pub block_index: u32,

    /// Start of the entry's data in units of the file alignment
    pub block_offset: u32,
}

impl ZArcContent {
    /// Encoded size
    pub const SIZE: u64 = 24;
}
