//! Writing TLDAT headers

use std::io::{self, Seek, SeekFrom, Write};

use binrw::BinWrite;
use tracing::{instrument, warn};

use super::types::{HashIndexEntry, TlDatHeader, TlDatRecord};
use super::{TlDatArchive, TlDatEntry};
use crate::error::{Error, Result, Warning};
use crate::io::TemporarySeek;
use crate::source::DataSource;

impl TlDatArchive {
    /// Writes the header to `header`, appending the data of entries that do not yet live in a
    /// blob to the end of `blob`.
    ///
    /// Entries read from a blob keep their offset and stored size, so `blob` should be the blob
    /// they were read from. The hash index is written in ascending hash order whatever the order
    /// of the entries. Conditions that do not stop the write are returned.
    #[instrument(skip_all, fields(entries = self.len()), err)]
    pub fn write<W: Write + Seek, B: Write + Seek>(
        &self,
        header: &mut W,
        blob: &mut B,
    ) -> Result<Vec<Warning>> {
        let options = self.options;
        let start = header.stream_position()?;

        let mut raw = TlDatHeader {
            creation_time: self.creation_time,
            ..Default::default()
        };
        raw.write_options(header, options.endian, (options.width,))?;

        let mut entries: Vec<&TlDatEntry> = self.entries.values().collect();
        entries.sort_by_key(|entry| entry.hash);

        raw.hash_offset = header.stream_position()? - start - TlDatHeader::HASH_INDEX_BASE;
        raw.hash_len = entries.len() as u64;
        for (index, entry) in entries.iter().enumerate() {
            HashIndexEntry {
                hash: entry.hash,
                index: index as u32,
            }
            .write_options(header, options.endian, ())?;
        }

        raw.file_offset = header.stream_position()? - start - TlDatHeader::file_base(options.width);
        raw.file_len = entries.len() as u64;

        let mut warnings = Vec::new();
        for entry in entries {
            let mut record = Self::place_entry(entry, blob)?;
            if let Some(warning) = record.set_extension(&entry.extension) {
                warn!("{warning}");
                warnings.push(warning);
            }
            record.write_options(header, options.endian, ())?;
        }

        let mut header = TemporarySeek::new(header, SeekFrom::Start(start))?;
        raw.write_options(&mut *header, options.endian, (options.width,))?;

        Ok(warnings)
    }

    /// Builds the record of `entry`, copying its data to the end of `blob` if it is not there yet.
    fn place_entry<B: Write + Seek>(entry: &TlDatEntry, blob: &mut B) -> Result<TlDatRecord> {
        if let DataSource::BlobRange {
            offset,
            length,
            compressed_length,
            ..
        } = entry.source
        {
            return Ok(TlDatRecord {
                length,
                compressed_length,
                offset,
                hash: entry.hash,
                ..Default::default()
            });
        }

        let offset = blob.seek(SeekFrom::End(0))?;
        let copied = io::copy(&mut entry.source.open_read()?, blob).map_err(Error::from_io)?;

        Ok(TlDatRecord {
            length: copied,
            compressed_length: copied,
            offset,
            hash: entry.hash,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use binrw::Endian;
    use pretty_assertions::{assert_eq, assert_str_eq};
    use tracing_test::traced_test;

    use crate::error::{Result, Warning};
    use crate::source::DataSource;
    use crate::tldat::{FieldWidth, TlDatArchive, TlDatEntry, TlDatOptions};

    #[traced_test]
    #[test]
    fn empty_write() -> Result<()> {
        #[rustfmt::skip]
        let expected = [
            0x00, 0x80, 0x3E, 0xD5, 0xDE, 0xB1, 0x9D, 0x01,
            0x40, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x20, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let mut archive = TlDatArchive::default();
        archive.set_creation_time(0x019D_B1DE_D53E_8000);

        let mut header = Cursor::new(Vec::new());
        let mut blob = Cursor::new(Vec::new());
        let warnings = archive.write(&mut header, &mut blob)?;

        assert!(warnings.is_empty());
        assert!(blob.get_ref().is_empty());
        assert_str_eq!(
            format!("{:02X?}", header.get_ref()),
            format!("{:02X?}", expected)
        );
        Ok(())
    }

    #[traced_test]
    #[test]
    fn index_is_sorted_by_hash() -> Result<()> {
        #[rustfmt::skip]
        let expected = [
            // Header (40)
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x20,
            0x00, 0x00, 0x00, 0x02,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x20,
            0x00, 0x00, 0x00, 0x02,
            0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00,
            // Hash index (16)
            0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x01,
            // Records (80)
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x02,
            0x42, 0x49, 0x4E, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x03, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x04,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03,
            0x00, 0x00, 0x00, 0x05,
            0x44, 0x41, 0x54, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x03, 0x00,
        ];

        let mut archive = TlDatArchive::new(
            TlDatOptions::builder()
                .width(FieldWidth::Bits32)
                .endian(Endian::Big)
                .build(),
        );
        archive.set_creation_time(0);
        archive.add_entry(TlDatEntry::new(5, "DAT", DataSource::from(b"five".to_vec())))?;
        archive.add_entry(TlDatEntry::new(2, "BIN", DataSource::from(b"two".to_vec())))?;

        let mut header = Cursor::new(Vec::new());
        let mut blob = Cursor::new(Vec::new());
        archive.write(&mut header, &mut blob)?;

        assert_eq!(blob.get_ref().as_slice(), b"twofive");
        assert_str_eq!(
            format!("{:02X?}", header.get_ref()),
            format!("{:02X?}", expected)
        );
        Ok(())
    }

    #[traced_test]
    #[test]
    fn long_extension_warns() -> Result<()> {
        let mut archive = TlDatArchive::default();
        archive.add_entry(TlDatEntry::new(
            1,
            "EXTENSION1",
            DataSource::from(Vec::new()),
        ))?;

        let warnings = archive.write(&mut Cursor::new(Vec::new()), &mut Cursor::new(Vec::new()))?;
        assert_eq!(
            warnings,
            [Warning::ExtensionTruncated {
                hash: 1,
                extension: "EXTENSION1".into()
            }]
        );
        assert!(logs_contain("too long"));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn blob_entries_keep_their_place() -> Result<()> {
        let mut archive = TlDatArchive::default();
        archive.add_entry(TlDatEntry::new(
            7,
            "DDS",
            DataSource::BlobRange {
                blob: None,
                offset: 0x1000,
                length: 0x80,
                compressed_length: 0x40,
            },
        ))?;
        archive.add_entry(TlDatEntry::new(3, "TXT", DataSource::from(b"new".to_vec())))?;

        let mut header = Cursor::new(Vec::new());
        let mut blob = Cursor::new(vec![0xAA; 0x1040]);
        archive.write(&mut header, &mut blob)?;

        assert_eq!(blob.get_ref().len(), 0x1043);
        assert_eq!(&blob.get_ref()[0x1040..], b"new");

        header.set_position(0);
        let read = TlDatArchive::read_from(&mut header, None, TlDatOptions::default())?;
        assert_eq!(
            read.by_hash(7)?.source,
            DataSource::BlobRange {
                blob: None,
                offset: 0x1000,
                length: 0x80,
                compressed_length: 0x40,
            }
        );
        assert_eq!(
            read.by_hash(3)?.source,
            DataSource::BlobRange {
                blob: None,
                offset: 0x1040,
                length: 3,
                compressed_length: 3,
            }
        );
        Ok(())
    }
}
