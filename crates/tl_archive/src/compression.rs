//! Chunked block decompression.
//!
//! Entry payloads are compressed in blocks of a fixed alignment (usually 65536 bytes). A table
//! records the compressed size of every block, where a size of zero means the block is stored as
//! is. Two variants exist:
//!
//! - The **TLZC** envelope wraps a single payload. It carries its own 24 byte header and either a
//!   raw deflate stream or a table of 16-bit block sizes followed by LZMA blocks that share one
//!   set of decoder properties.
//! - **ZARC** keeps one block size table for the whole archive. Every compressed block is a
//!   complete LZMA-alone stream with its own properties and decoded length.

use std::io::{self, Cursor, Read, Write};

use binrw::{BinRead, BinWrite, Endian};
use flate2::read::DeflateDecoder;
use tracing::{debug, instrument};
use xz2::{read::XzDecoder, stream::Stream};

use crate::error::{Error, Result};
use crate::io::{capacity_for, read_uint, write_uint};

/// Block alignment used by TLZC LZMA envelopes
pub const TLZC_BLOCK_ALIGNMENT: u32 = 65536;

/// Size of LZMA decoder properties
const LZMA_PROPERTIES_SIZE: usize = 5;

/// Size of an LZMA-alone header: properties followed by the decoded length
const LZMA_HEADER_SIZE: usize = LZMA_PROPERTIES_SIZE + 8;

/// Compression used inside a TLZC envelope
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TlzcMethod {
    /// A raw deflate stream
    Deflate = 2,

    /// LZMA blocks sharing one set of properties
    LzmaBlocks = 4,
}

impl TryFrom<u8> for TlzcMethod {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            2 => Ok(TlzcMethod::Deflate),
            4 => Ok(TlzcMethod::LzmaBlocks),
            other => Err(Error::UnsupportedFormat(format!(
                "unknown TLZC compression type {other}"
            ))),
        }
    }
}

/// TLZC envelope header
///
/// Always little endian, always 24 bytes, and always starts with `"TLZC"`.
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq)]
#[brw(little, magic = b"TLZC")]
pub struct TlzcHeader {
    /// Unknown
    pub unknown0: u8,

    /// Raw compression type, see [`TlzcMethod`]
    pub method: u8,

    /// Unknown
    pub unknown1: u16,

    /// Size of the envelope
    pub compressed_size: u32,

    /// Size of the payload once decoded
    pub uncompressed_size: u32,

    /// Reserved
    pub reserved: [u32; 2],
}

impl TlzcHeader {
    /// Encoded size of the header
    pub const SIZE: usize = 24;

    /// Reads a header from the start of `reader`.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = [0u8; Self::SIZE];
        reader.read_exact(&mut raw).map_err(Error::from_io)?;
        Self::read(&mut Cursor::new(raw)).map_err(|err| Error::from_binrw(err, "TLZC"))
    }

    /// The compression type of the payload
    pub fn method(&self) -> Result<TlzcMethod> {
        TlzcMethod::try_from(self.method)
    }
}

/// Whether `bytes` starts with a TLZC envelope.
pub fn is_tlzc(bytes: &[u8]) -> bool {
    bytes.starts_with(b"TLZC")
}

/// A reader over a decoded payload
pub enum BlockReader<R: Read> {
    /// Deflate payloads are decoded as they are read
    Deflate(Box<DeflateDecoder<R>>),

    /// Block payloads are decoded up front
    Decoded(Cursor<Vec<u8>>),
}

impl<R: Read> BlockReader<R> {
    /// Decodes the rest of the payload into memory.
    pub fn into_vec(self) -> Result<Vec<u8>> {
        match self {
            BlockReader::Deflate(mut r) => {
                let mut buffer = Vec::new();
                r.read_to_end(&mut buffer).map_err(Error::from_io)?;
                Ok(buffer)
            }
            BlockReader::Decoded(r) => Ok(r.into_inner()),
        }
    }
}

impl<R: Read> Read for BlockReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            BlockReader::Deflate(r) => r.read(buf),
            BlockReader::Decoded(r) => r.read(buf),
        }
    }
}

/// Opens a TLZC envelope, `reader` must be positioned at its magic.
#[instrument(skip(reader), err)]
pub fn decode_tlzc<R: Read>(mut reader: R) -> Result<BlockReader<R>> {
    let header = TlzcHeader::read_from(&mut reader)?;
    let method = header.method()?;
    debug!(
        "TLZC {method:?}: {} -> {} bytes",
        header.compressed_size, header.uncompressed_size
    );

    Ok(match method {
        TlzcMethod::Deflate => BlockReader::Deflate(Box::new(DeflateDecoder::new(reader))),
        TlzcMethod::LzmaBlocks => BlockReader::Decoded(Cursor::new(decode_tlzc_blocks(
            &mut reader,
            u64::from(header.uncompressed_size),
        )?)),
    })
}

/// Number of blocks needed to hold `length` bytes.
pub fn block_count(length: u64, alignment: u32) -> u64 {
    match alignment {
        0 => 0,
        alignment => length.div_ceil(u64::from(alignment)),
    }
}

fn decode_tlzc_blocks<R: Read>(reader: &mut R, length: u64) -> Result<Vec<u8>> {
    let mut properties = [0u8; LZMA_PROPERTIES_SIZE];
    reader.read_exact(&mut properties).map_err(Error::from_io)?;

    let sizes = (0..block_count(length, TLZC_BLOCK_ALIGNMENT))
        .map(|_| read_uint(reader, Endian::Little, 2).map(|size| size as u32))
        .collect::<io::Result<Vec<_>>>()
        .map_err(Error::from_io)?;

    let mut output = Vec::with_capacity(capacity_for(length));
    let mut remaining = length;
    for size in sizes {
        let block = remaining.min(u64::from(TLZC_BLOCK_ALIGNMENT));

        if size == 0 {
            copy_stored(reader, &mut output, block)?;
        } else {
            let mut header = [0u8; LZMA_HEADER_SIZE];
            header[..LZMA_PROPERTIES_SIZE].copy_from_slice(&properties);
            header[LZMA_PROPERTIES_SIZE..].copy_from_slice(&block.to_le_bytes());

            let compressed = read_block(reader, u64::from(size))?;
            output.extend_from_slice(&decode_lzma(&header, &compressed, block)?);
        }

        remaining -= block;
    }

    Ok(output)
}

/// Decodes the blocks of one ZARC entry.
///
/// `sizes` is the slice of the archive's block size table belonging to the entry and `reader`
/// must be positioned at the entry's data.
#[instrument(skip(reader, sizes), fields(blocks = sizes.len()), err)]
pub fn decode_zarc_blocks<R: Read>(
    mut reader: R,
    sizes: &[u32],
    alignment: u32,
    length: u64,
) -> Result<Vec<u8>> {
    let blocks_len = u64::from(alignment).saturating_mul(sizes.len() as u64);
    let mut output = Vec::with_capacity(capacity_for(length.min(blocks_len)));
    let mut remaining = length;

    for &size in sizes {
        let mut block = remaining.min(u64::from(alignment));

        if size == 0 {
            copy_stored(&mut reader, &mut output, block)?;
        } else {
            let mut header = [0u8; LZMA_HEADER_SIZE];
            reader.read_exact(&mut header).map_err(Error::from_io)?;
            let mut decoded_len = [0u8; 8];
            decoded_len.copy_from_slice(&header[LZMA_PROPERTIES_SIZE..]);
            let decoded_len = u64::from_le_bytes(decoded_len);
            if decoded_len > block {
                return Err(Error::UnsupportedFormat(format!(
                    "LZMA block decodes to {decoded_len} bytes, at most {block} expected"
                )));
            }
            block = decoded_len;

            let compressed = read_block(&mut reader, u64::from(size))?;
            output.extend_from_slice(&decode_lzma(&header, &compressed, block)?);
        }

        remaining = remaining.saturating_sub(block);
    }

    Ok(output)
}

/// Bytes an entry of `length` decoded bytes occupies in a ZARC archive given its block sizes.
pub fn zarc_compressed_len(sizes: &[u32], alignment: u32, length: u64) -> u64 {
    let mut remaining = length;
    sizes
        .iter()
        .map(|&size| {
            let block = remaining.min(u64::from(alignment));
            remaining -= block;
            match size {
                0 => block,
                size => LZMA_HEADER_SIZE as u64 + u64::from(size),
            }
        })
        .sum()
}

fn read_block<R: Read>(reader: &mut R, size: u64) -> Result<Vec<u8>> {
    let mut compressed = Vec::with_capacity(capacity_for(size));
    reader
        .take(size)
        .read_to_end(&mut compressed)
        .map_err(Error::from_io)?;
    if (compressed.len() as u64) < size {
        return Err(Error::Truncated);
    }
    Ok(compressed)
}

fn copy_stored<R: Read>(reader: &mut R, output: &mut Vec<u8>, len: u64) -> Result<()> {
    let copied = io::copy(&mut reader.take(len), output).map_err(Error::from_io)?;
    if copied < len {
        return Err(Error::Truncated);
    }
    Ok(())
}

fn decode_lzma(header: &[u8; LZMA_HEADER_SIZE], compressed: &[u8], len: u64) -> Result<Vec<u8>> {
    let stream = Stream::new_lzma_decoder(u64::MAX).map_err(io::Error::from)?;
    let mut decoder = XzDecoder::new_stream(Cursor::new(header).chain(compressed), stream);

    let mut output = Vec::with_capacity(capacity_for(len));
    decoder
        .take(len)
        .read_to_end(&mut output)
        .map_err(Error::from_io)?;
    if (output.len() as u64) < len {
        return Err(Error::Truncated);
    }
    Ok(output)
}

/// Per-block compressed sizes, stored with a width derived from the block alignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockSizeTable {
    stride: u8,
    sizes: Vec<u32>,
}

impl BlockSizeTable {
    /// Width in bytes of one table element for blocks of `alignment` bytes.
    ///
    /// Alignments of 0 and 1 have no usable width and are rejected.
    pub fn stride_for(alignment: u32) -> Result<u8> {
        if alignment <= 1 {
            return Err(Error::UnsupportedBlockAlignment(alignment));
        }
        Ok((1 + alignment.wrapping_sub(1).ilog2() / 8) as u8)
    }

    /// A table of `count` zero entries, meaning every block is stored.
    pub fn zeroed(alignment: u32, count: usize) -> Result<Self> {
        Ok(Self {
            stride: Self::stride_for(alignment)?,
            sizes: vec![0; count],
        })
    }

    /// Reads as many elements as fit in `byte_len` bytes.
    pub fn read<R: Read>(
        reader: &mut R,
        alignment: u32,
        byte_len: u64,
        endian: Endian,
    ) -> Result<Self> {
        let stride = Self::stride_for(alignment)?;
        let count = byte_len / u64::from(stride);

        let sizes = (0..count)
            .map(|_| read_uint(reader, endian, usize::from(stride)).map(|size| size as u32))
            .collect::<io::Result<Vec<_>>>()
            .map_err(Error::from_io)?;

        Ok(Self { stride, sizes })
    }

    /// Writes every element with the table's stride.
    pub fn write<W: Write>(&self, writer: &mut W, endian: Endian) -> Result<()> {
        for &size in &self.sizes {
            write_uint(writer, u64::from(size), endian, usize::from(self.stride))?;
        }
        Ok(())
    }

    /// Width in bytes of one element
    pub fn stride(&self) -> u8 {
        self.stride
    }

    /// All block sizes
    pub fn sizes(&self) -> &[u32] {
        &self.sizes
    }

    /// Encoded size of the table
    pub fn byte_len(&self) -> u64 {
        self.sizes.len() as u64 * u64::from(self.stride)
    }

    /// The `count` sizes starting at block `index`.
    pub fn blocks(&self, index: usize, count: usize) -> Result<&[u32]> {
        index
            .checked_add(count)
            .and_then(|end| self.sizes.get(index..end))
            .ok_or(Error::Truncated)
    }
}
