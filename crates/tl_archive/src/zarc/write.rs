//! Writing ZARC archives

use std::io::{self, Read, Seek, Write};

use binrw::{BinWrite, Endian};
use tracing::{debug, instrument};

use super::types::{PathEncoding, ZArcContent, ZArcHeader};
use super::{check_block_alignment, ZArcArchive, ZArcEntry};
use crate::compression::{block_count, BlockSizeTable};
use crate::error::{Error, Result};
use crate::io::{align, write_align};

/// Fill byte between entries
const FILL: u8 = 0xEE;

/// Largest value of the 24-bit block index
const MAX_BLOCK_INDEX: u64 = 0xFF_FFFF;

/// Largest value of the 40-bit length
const MAX_LENGTH: u64 = 0xFF_FFFF_FFFF;

impl ZArcArchive {
    /// Writes the archive to `writer`, which must be positioned at its start.
    ///
    /// Content records are sorted by hash. Entry data is stored without compression, so every
    /// element of the block size table is zero.
    #[instrument(skip_all, fields(entries = self.len()), err)]
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let options = self.options;
        check_block_alignment(options.block_alignment)?;
        let unit = u64::from(options.file_alignment.max(1));

        let mut entries: Vec<&ZArcEntry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.hash);

        let total_blocks: u64 = entries
            .iter()
            .map(|entry| block_count(entry.source.payload_len(), options.block_alignment))
            .sum();
        let table = BlockSizeTable::zeroed(options.block_alignment, total_blocks as usize)?;

        let end_of_header =
            ZArcHeader::SIZE + ZArcContent::SIZE * entries.len() as u64 + table.byte_len();
        let header = ZArcHeader {
            end_of_header: u32::try_from(end_of_header).map_err(|_| too_large("header"))?,
            content_count: entries.len() as u32,
            path_encoding: PathEncoding::Ascii as u32,
            block_alignment: options.block_alignment,
            file_alignment: options.file_alignment,
            path_case: options.path_case as u32,
            ..Default::default()
        };

        let contents = Self::layout(&entries, align(end_of_header, unit), unit, options.block_alignment)?;
        debug!(
            "{} blocks, data starts at {:#X}",
            total_blocks,
            align(end_of_header, unit)
        );

        header.write(writer)?;
        for content in &contents {
            content.write(writer)?;
        }
        table.write(writer, Endian::Big)?;

        for (entry, content) in entries.iter().zip(&contents) {
            write_align(writer, unit, FILL)?;
            let expected = content.uncompressed_length;
            let copied =
                io::copy(&mut entry.source.open_payload()?.take(expected), writer).map_err(Error::from_io)?;
            if copied < expected {
                return Err(Error::Truncated);
            }
        }
        write_align(writer, unit, FILL)?;

        Ok(())
    }

    /// Assigns every entry its first block and its data offset, starting at `data_start`.
    fn layout(
        entries: &[&ZArcEntry],
        data_start: u64,
        unit: u64,
        block_alignment: u32,
    ) -> Result<Vec<ZArcContent>> {
        let mut position = data_start;
        let mut block_index = 0u64;

        entries
            .iter()
            .map(|entry| {
                let length = entry.source.payload_len();
                if length > MAX_LENGTH {
                    return Err(too_large("entry"));
                }
                if block_index > MAX_BLOCK_INDEX {
                    return Err(too_large("block size table"));
                }

                let content = ZArcContent {
                    hash: entry.hash,
                    uncompressed_length: length,
                    unknown: 0,
                    block_index: block_index as u32,
                    block_offset: u32::try_from(position / unit)
                        .map_err(|_| too_large("archive"))?,
                };

                block_index += block_count(length, block_alignment);
                position = align(position + length, unit);
                Ok(content)
            })
            .collect()
    }
}

fn too_large(what: &str) -> Error {
    Error::UnsupportedFormat(format!("{what} too large for a ZARC archive"))
}
