//! Reading TLDAT headers

use std::{
    io::{Read, Seek, SeekFrom},
    path::Path,
};

use binrw::BinRead;
use indexmap::IndexMap;
use tracing::{debug, instrument};

use super::types::{HashIndexEntry, TlDatHeader, TlDatOptions, TlDatRecord};
use super::{TlDatArchive, TlDatEntry};
use crate::error::{Error, Result};
use crate::source::DataSource;

impl TlDatArchive {
    /// Reads a header, resolving entry data against `blob`.
    ///
    /// Without a blob the entries can be listed and rewritten, but not opened.
    #[instrument(skip(reader), err)]
    pub fn read_from<R: Read + Seek>(
        reader: &mut R,
        blob: Option<&Path>,
        options: TlDatOptions,
    ) -> Result<TlDatArchive> {
        let header = TlDatHeader::read_options(reader, options.endian, (options.width,))
            .map_err(|err| Error::from_binrw(err, "TLDAT"))?;
        debug!(
            "{} hash index entries, {} records",
            header.hash_len, header.file_len
        );

        let records = Self::get_records(reader, &header, options)?;

        reader.seek(SeekFrom::Start(section_start(
            TlDatHeader::HASH_INDEX_BASE,
            header.hash_offset,
            "hash index",
        )?))?;

        let mut archive = TlDatArchive {
            entries: IndexMap::new(),
            creation_time: header.creation_time,
            options,
        };

        for _ in 0..header.hash_len {
            let index = HashIndexEntry::read_options(reader, options.endian, ())
                .map_err(|err| Error::from_binrw(err, "TLDAT"))?;

            let record = records.get(index.index as usize).ok_or_else(|| {
                Error::UnsupportedFormat(format!(
                    "hash {:08X} refers to missing record {}",
                    index.hash, index.index
                ))
            })?;

            archive.add_entry(TlDatEntry {
                hash: index.hash,
                extension: String::from_utf8_lossy(record.extension()).into_owned(),
                source: DataSource::BlobRange {
                    blob: blob.map(Path::to_path_buf),
                    offset: record.offset,
                    length: record.length,
                    compressed_length: record.compressed_length,
                },
                record_index: Some(index.index),
            })?;
        }

        Ok(archive)
    }

    fn get_records<R: Read + Seek>(
        reader: &mut R,
        header: &TlDatHeader,
        options: TlDatOptions,
    ) -> Result<Vec<TlDatRecord>> {
        reader.seek(SeekFrom::Start(section_start(
            TlDatHeader::file_base(options.width),
            header.file_offset,
            "file records",
        )?))?;

        (0..header.file_len)
            .map(|_| {
                TlDatRecord::read_options(reader, options.endian, ())
                    .map_err(|err| Error::from_binrw(err, "TLDAT"))
            })
            .collect()
    }
}

fn section_start(base: u64, offset: u64, section: &str) -> Result<u64> {
    base.checked_add(offset).ok_or_else(|| {
        Error::UnsupportedFormat(format!("{section} offset {offset:#X} is out of range"))
    })
}
