//! Base types for structure of TLDAT headers.

use binrw::{BinRead, BinResult, BinWrite, Endian};
use bon::Builder;

use crate::error::Warning;
use crate::io::{read_uint, write_uint};

/// Width of the offset and length fields of a [`TlDatHeader`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FieldWidth {
    /// 32-bit fields, used by older releases
    Bits32,

    /// 64-bit fields
    #[default]
    Bits64,
}

impl FieldWidth {
    /// Size of one field in bytes
    pub const fn bytes(self) -> usize {
        match self {
            FieldWidth::Bits32 => 4,
            FieldWidth::Bits64 => 8,
        }
    }
}

/// Options for how a TLDAT header is read and written
#[derive(Debug, Clone, Copy, Builder)]
pub struct TlDatOptions {
    /// Width of the header fields
    #[builder(default)]
    pub width: FieldWidth,

    /// Byte order of the whole header
    #[builder(default = Endian::Little)]
    pub endian: Endian,
}

impl Default for TlDatOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[binrw::parser(reader, endian)]
fn parse_field(width: FieldWidth) -> BinResult<u64> {
    Ok(read_uint(reader, endian, width.bytes())?)
}

#[binrw::writer(writer, endian)]
fn write_field(value: &u64, width: FieldWidth) -> BinResult<()> {
    Ok(write_uint(writer, *value, endian, width.bytes())?)
}

/// TLDAT header
///
/// A creation time followed by four (offset, length) pairs whose width depends on
/// [`FieldWidth`]. Offsets are relative to the position of the field itself.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq)]
#[brw(import(width: FieldWidth))]
pub struct TlDatHeader {
    /// Windows FILETIME of when the header was written
    pub creation_time: u64,

    /// Offset of the hash index, relative to [`TlDatHeader::HASH_INDEX_BASE`]
    #[br(parse_with = parse_field, args(width))]
    #[bw(write_with = write_field, args(width))]
    pub hash_offset: u64,

    /// Number of hash index entries
    #[br(parse_with = parse_field, args(width))]
    #[bw(write_with = write_field, args(width))]
    pub hash_len: u64,

    /// Unused
    #[br(parse_with = parse_field, args(width))]
    #[bw(write_with = write_field, args(width))]
    pub virtual_hash_offset: u64,

    /// Unused
    #[br(parse_with = parse_field, args(width))]
    #[bw(write_with = write_field, args(width))]
    pub virtual_hash_len: u64,

    /// Offset of the file records, relative to [`TlDatHeader::file_base`]
    #[br(parse_with = parse_field, args(width))]
    #[bw(write_with = write_field, args(width))]
    pub file_offset: u64,

    /// Number of file records
    #[br(parse_with = parse_field, args(width))]
    #[bw(write_with = write_field, args(width))]
    pub file_len: u64,

    /// Unused
    #[br(parse_with = parse_field, args(width))]
    #[bw(write_with = write_field, args(width))]
    pub virtual_pack_offset: u64,

    /// Unused
    #[br(parse_with = parse_field, args(width))]
    #[bw(write_with = write_field, args(width))]
    pub virtual_pack_len: u64,
}

impl TlDatHeader {
    /// Position of the `hash_offset` field
    pub const HASH_INDEX_BASE: u64 = 0x8;

    /// Encoded size of the header
    pub const fn size(width: FieldWidth) -> u64 {
        8 + 8 * width.bytes() as u64
    }

    /// Position of the `file_offset` field
    pub const fn file_base(width: FieldWidth) -> u64 {
        8 + 4 * width.bytes() as u64
    }
}

/// Element of the hash index, sorted by hash so the engine can binary search it
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct HashIndexEntry {
    /// Name hash of the entry
    pub hash: u32,

    /// Index into the file records
    pub index: u32,
}

impl HashIndexEntry {
    /// Encoded size
    pub const SIZE: u64 = 8;
}

/// TLDAT file record
///
/// Always 40 bytes with 64-bit fields, whatever the header's [`FieldWidth`].
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq)]
pub struct TlDatRecord {
    /// Size of the data once decoded
    pub length: u64,

    /// Size of the data inside the blob
    pub compressed_length: u64,

    /// Start of the data inside the blob
    pub offset: u64,

    /// Name hash, including the extension
    pub hash: u32,

    /// Extension bytes, NUL padded
    pub extension: [u8; 10],

    /// Number of used bytes in `extension`
    pub extension_length: u8,

    /// Padding
    pub unknown: u8,
}

impl TlDatRecord {
    /// Encoded size
    pub const SIZE: u64 = 40;

    /// Longest extension a record can hold
    pub const MAX_EXTENSION_LENGTH: usize = 9;

    /// The stored extension, cut at its declared length or the first NUL.
    pub fn extension(&self) -> &[u8] {
        let length = usize::from(self.extension_length).min(Self::MAX_EXTENSION_LENGTH);
        let buffer = &self.extension[..length];
        match buffer.iter().position(|&b| b == 0) {
            Some(nul) => &buffer[..nul],
            None => buffer,
        }
    }

    /// Stores `extension`, truncating it when it does not fit.
    pub fn set_extension(&mut self, extension: &str) -> Option<Warning> {
        let bytes = extension.as_bytes();
        let length = bytes.len().min(Self::MAX_EXTENSION_LENGTH);

        self.extension = [0; 10];
        self.extension[..length].copy_from_slice(&bytes[..length]);
        self.extension_length = length as u8;

        (bytes.len() > Self::MAX_EXTENSION_LENGTH).then(|| Warning::ExtensionTruncated {
            hash: self.hash,
            extension: extension.to_owned(),
        })
    }
}
