//! Reading ZARC archives

use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use binrw::{BinRead, Endian};
use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use super::types::{PathCase, PathEncoding, ZArcContent, ZArcHeader, ZArcOptions};
use super::{check_block_alignment, ZArcArchive, ZArcEntry};
use crate::compression::{block_count, BlockSizeTable};
use crate::error::{Error, Result};
use crate::source::DataSource;

impl ZArcArchive {
    /// Reads the archive at `path`. Entry data is read from the same file on demand.
    #[instrument(err)]
    pub fn read_from(path: &Path) -> Result<ZArcArchive> {
        let mut reader = BufReader::new(File::open(path)?);
        Self::read_from_reader(&mut reader, Some(path))
    }

    /// Reads an archive from `reader`, resolving entry data against `blob`.
    pub fn read_from_reader<R: Read + Seek>(
        reader: &mut R,
        blob: Option<&Path>,
    ) -> Result<ZArcArchive> {
        let header = ZArcHeader::read(reader).map_err(|err| Error::from_binrw(err, "ZARC"))?;

        if header.version != ZArcHeader::VERSION {
            return Err(Error::UnsupportedFormat(format!(
                "unsupported ZARC version {}",
                header.version
            )));
        }
        if u64::from(header.content_size) != ZArcContent::SIZE {
            return Err(Error::UnsupportedFormat(format!(
                "unexpected ZARC content record size {}",
                header.content_size
            )));
        }
        if header.path_encoding != PathEncoding::Ascii as u32 {
            warn!("unknown ZARC path encoding {}", header.path_encoding);
        }
        check_block_alignment(header.block_alignment)?;

        let options = ZArcOptions {
            block_alignment: header.block_alignment,
            file_alignment: header.file_alignment,
            path_case: PathCase::try_from(header.path_case)?,
        };
        debug!("{} entries, {options:?}", header.content_count);

        let contents = (0..header.content_count)
            .map(|_| ZArcContent::read(reader).map_err(|err| Error::from_binrw(err, "ZARC")))
            .collect::<Result<Vec<_>>>()?;

        let table_len = u64::from(header.end_of_header).saturating_sub(reader.stream_position()?);
        let table = BlockSizeTable::read(reader, header.block_alignment, table_len, Endian::Big)?;
        debug!(
            "{} blocks with a stride of {}",
            table.sizes().len(),
            table.stride()
        );

        let mut archive = ZArcArchive {
            entries: IndexMap::with_capacity(contents.len()),
            options,
        };

        for content in contents {
            let blocks = block_count(content.uncompressed_length, header.block_alignment);
            let block_sizes = table
                .blocks(content.block_index as usize, blocks as usize)?
                .to_vec();

            archive.add_entry(ZArcEntry {
                hash: content.hash,
                source: DataSource::BlobBlocks {
                    blob: blob.map(Path::to_path_buf),
                    offset: u64::from(header.file_alignment) * u64::from(content.block_offset),
                    length: content.uncompressed_length,
                    alignment: header.block_alignment,
                    block_sizes,
                },
            })?;
        }

        Ok(archive)
    }
}
