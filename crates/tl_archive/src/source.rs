//! Where the bytes of an entry live.
//!
//! A [`DataSource`] only holds a path to its backing file. Streams are opened on demand and
//! dropped after use, so sources can be shared freely between threads.

use std::{
    fs::File,
    io::{self, BufReader, Cursor, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use tracing::{instrument, warn};

use crate::compression::{decode_tlzc, decode_zarc_blocks, is_tlzc, zarc_compressed_len};
use crate::error::{Error, Result, Warning};
use crate::io::{capacity_for, ZeroFill};

/// The backing of an entry's data
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    /// A loose file on disk, stored as is
    File {
        /// Location of the file
        path: PathBuf,
        /// Size of the file when the source was created
        length: u64,
    },

    /// A byte range inside a TLDAT blob, wrapped in a TLZC envelope when the lengths differ
    BlobRange {
        /// The blob holding the data, if one was supplied
        blob: Option<PathBuf>,
        /// Start of the data inside the blob
        offset: u64,
        /// Size of the data once decoded
        length: u64,
        /// Size of the data inside the blob
        compressed_length: u64,
    },

    /// Block compressed data inside a ZARC archive
    BlobBlocks {
        /// The archive holding the data
        blob: Option<PathBuf>,
        /// Start of the data inside the archive
        offset: u64,
        /// Size of the data once decoded
        length: u64,
        /// Block alignment of the archive
        alignment: u32,
        /// Compressed size of each of the entry's blocks
        block_sizes: Vec<u32>,
    },

    /// Bytes held in memory
    Memory(Vec<u8>),
}

impl DataSource {
    /// A source for the file at `path`, measuring it now.
    pub fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let length = std::fs::metadata(&path)?.len();
        Ok(DataSource::File { path, length })
    }

    /// Size of the data once decoded, known without opening anything
    pub fn len(&self) -> u64 {
        match self {
            DataSource::File { length, .. }
            | DataSource::BlobRange { length, .. }
            | DataSource::BlobBlocks { length, .. } => *length,
            DataSource::Memory(data) => data.len() as u64,
        }
    }

    /// Whether the data is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the stored bytes differ from the decoded ones
    pub fn is_compressed(&self) -> bool {
        match self {
            DataSource::BlobRange {
                length,
                compressed_length,
                ..
            } => length != compressed_length,
            DataSource::BlobBlocks { block_sizes, .. } => block_sizes.iter().any(|&s| s != 0),
            DataSource::File { .. } | DataSource::Memory(_) => false,
        }
    }

    /// Bytes read by [`DataSource::open_read_raw`]
    pub fn raw_len(&self) -> u64 {
        match self {
            DataSource::BlobRange {
                compressed_length, ..
            } => *compressed_length,
            DataSource::BlobBlocks {
                length,
                alignment,
                block_sizes,
                ..
            } => zarc_compressed_len(block_sizes, *alignment, *length),
            other => other.len(),
        }
    }

    /// Opens the decoded data.
    ///
    /// TLZC envelopes are unwrapped for blob ranges whose lengths differ, ZARC blocks are decoded
    /// and a TLZC envelope nested inside them is unwrapped as well.
    #[instrument(skip(self), err)]
    pub fn open_read(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            DataSource::BlobRange { .. } if self.is_compressed() => {
                Ok(Box::new(decode_tlzc(self.open_read_raw()?)?))
            }
            DataSource::BlobBlocks { .. } => {
                let decoded = self.decode_blocks()?;
                if decoded.len() > 4 && is_tlzc(&decoded) {
                    return Ok(Box::new(decode_tlzc(Cursor::new(decoded))?));
                }
                Ok(Box::new(Cursor::new(decoded)))
            }
            _ => self.open_read_raw(),
        }
    }

    /// Opens the data exactly as it is stored, without decoding anything.
    #[instrument(skip(self), err)]
    pub fn open_read_raw(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            DataSource::File { path, .. } => Ok(Box::new(BufReader::new(File::open(path)?))),
            DataSource::BlobRange { blob, offset, .. } | DataSource::BlobBlocks { blob, offset, .. } => {
                let blob = blob.as_deref().ok_or(Error::MissingBlob)?;
                Ok(Box::new(open_range(blob, *offset, self.raw_len())?))
            }
            DataSource::Memory(data) => Ok(Box::new(data.as_slice())),
        }
    }

    /// Size of [`DataSource::open_payload`]
    pub fn payload_len(&self) -> u64 {
        match self {
            DataSource::BlobRange {
                compressed_length, ..
            } => *compressed_length,
            other => other.len(),
        }
    }

    /// Opens the data the way a container stores it as a single payload.
    ///
    /// ZARC blocks are decoded but a TLZC envelope, either a nested one or the one of a blob
    /// range, is left in place.
    #[instrument(skip(self), err)]
    pub fn open_payload(&self) -> Result<Box<dyn Read + '_>> {
        match self {
            DataSource::BlobBlocks { .. } => Ok(Box::new(Cursor::new(self.decode_blocks()?))),
            _ => self.open_read_raw(),
        }
    }

    /// Reads the decoded data into memory.
    pub fn read_to_vec(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(capacity_for(self.len()));
        self.open_read()?
            .read_to_end(&mut buffer)
            .map_err(Error::from_io)?;
        Ok(buffer)
    }

    /// Points a blob backed source at another blob.
    pub fn set_blob(&mut self, path: Option<PathBuf>) {
        match self {
            DataSource::BlobRange { blob, .. } | DataSource::BlobBlocks { blob, .. } => *blob = path,
            DataSource::File { .. } | DataSource::Memory(_) => {}
        }
    }

    fn decode_blocks(&self) -> Result<Vec<u8>> {
        let DataSource::BlobBlocks {
            length,
            alignment,
            block_sizes,
            ..
        } = self
        else {
            return Err(Error::UnsupportedFormat("not a block backed source".into()));
        };
        decode_zarc_blocks(self.open_read_raw()?, block_sizes, *alignment, *length)
    }
}

impl From<Vec<u8>> for DataSource {
    fn from(value: Vec<u8>) -> Self {
        DataSource::Memory(value)
    }
}

/// Opens `len` bytes of `path` starting at `offset`, zero filling whatever lies past its end.
fn open_range(path: &Path, offset: u64, len: u64) -> io::Result<ZeroFill<io::Take<BufReader<File>>>> {
    let file = File::open(path)?;
    let available = file.metadata()?.len().saturating_sub(offset);
    if available < len {
        warn!(
            "{}: {}",
            path.display(),
            Warning::ZeroFilled {
                declared: len,
                available,
            }
        );
    }

    let mut reader = BufReader::new(file);
    reader.seek(SeekFrom::Start(offset))?;
    Ok(ZeroFill::new(reader.take(len), len))
}

#[cfg(test)]
mod test {
    use std::io::{Read, Write};

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;

    #[traced_test]
    #[test]
    fn blob_range_past_end_is_zero_filled() -> Result<()> {
        let mut blob = tempfile::NamedTempFile::new()?;
        blob.write_all(b"xxxx0123456789")?;

        let source = DataSource::BlobRange {
            blob: Some(blob.path().to_path_buf()),
            offset: 4,
            length: 1000,
            compressed_length: 1000,
        };

        let mut buffer = Vec::new();
        source.open_read()?.read_to_end(&mut buffer)?;
        assert_eq!(buffer.len(), 1000);
        assert_eq!(&buffer[..10], b"0123456789");
        assert_eq!(buffer[10..].iter().filter(|&&b| b == 0).count(), 990);
        assert!(logs_contain("zero-filled"));
        Ok(())
    }

    #[test]
    fn blob_range_without_blob() {
        let source = DataSource::BlobRange {
            blob: None,
            offset: 0,
            length: 1,
            compressed_length: 1,
        };
        assert!(matches!(source.open_read(), Err(Error::MissingBlob)));
    }

    #[test]
    fn file_source_reads_file() -> Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(b"loose file")?;

        let source = DataSource::from_path(file.path())?;
        assert_eq!(source.len(), 10);
        assert!(!source.is_compressed());
        assert_eq!(source.read_to_vec()?, b"loose file");
        Ok(())
    }

    #[test]
    fn lengths_of_block_source() {
        let source = DataSource::BlobBlocks {
            blob: None,
            offset: 0,
            length: 70000,
            alignment: 65536,
            block_sizes: vec![0, 200],
        };
        assert_eq!(source.len(), 70000);
        assert_eq!(source.raw_len(), 65536 + 213);
        assert_eq!(source.payload_len(), 70000);
        assert!(source.is_compressed());

        let stored = DataSource::BlobBlocks {
            blob: None,
            offset: 0,
            length: 0,
            alignment: 65536,
            block_sizes: vec![],
        };
        assert_eq!(stored.raw_len(), 0);
    }

    #[test]
    fn memory_source() -> Result<()> {
        let source = DataSource::from(b"in memory".to_vec());
        assert_eq!(source.len(), 9);
        assert_eq!(source.read_to_vec()?, b"in memory");
        Ok(())
    }
}
