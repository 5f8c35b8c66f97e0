//! Error types that can be emitted from this library

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent warpper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent warpper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// Bad magic, version or record size
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The input ended before the declared amount of data was read
    #[error("unexpected end of input")]
    Truncated,

    /// An entry with the same name hash already exists in the container
    #[error("an entry with hash {0:#X} already exists")]
    DuplicateHash(u64),

    /// The checksum of decrypted data did not match the stored one
    #[error("decryption failed: expected hash {expected:#010X}, got {actual:#010X}")]
    DecryptionFailed {
        /// Hash stored alongside the ciphertext
        expected: u32,
        /// Hash of the decrypted data
        actual: u32,
    },

    /// unable to find requested entry
    #[error("unable to find requested entry")]
    EntryNotFound(#[from] EntryNotFoundError),

    /// The entry refers to a data blob, but no blob was supplied when reading the container
    #[error("entry data lives in a blob that was not provided")]
    MissingBlob,

    /// Two encrypted blob ranges overlap, so they cannot be processed independently
    #[error("blob ranges {first:?} and {second:?} overlap")]
    OverlappingRanges {
        /// The range starting first
        first: std::ops::Range<u64>,
        /// The range overlapping it
        second: std::ops::Range<u64>,
    },

    /// A block alignment of 1 yields a zero-width block size table
    #[error("block alignment {0} is not supported")]
    UnsupportedBlockAlignment(u32),
}

/// Error type to provide further information when an entry has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find requested entry")]
pub enum EntryNotFoundError {
    /// by hash {0:#X}
    #[error("by hash {0:#X}")]
    Hash(u64),

    /// by name {0}
    #[error("by name {0}")]
    Name(String),
}

impl Error {
    /// Maps an unexpected end of file to [`Error::Truncated`], keeping other errors as they are.
    pub(crate) fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::Truncated,
            _ => Error::IOError(err),
        }
    }

    /// Maps a bad magic to [`Error::UnsupportedFormat`].
    pub(crate) fn from_binrw(err: binrw::Error, format: &str) -> Self {
        match err {
            binrw::Error::BadMagic { .. } => {
                Error::UnsupportedFormat(format!("not a {format} file"))
            }
            binrw::Error::Io(io) => Error::from_io(io),
            binrw::Error::Backtrace(backtrace) => Error::from_binrw(*backtrace.error, format),
            other => Error::BinRWError(other),
        }
    }
}

/// Conditions that are reported but never interrupt an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// An extension was longer than a file record can hold and was cut short
    ExtensionTruncated {
        /// Name hash of the affected entry
        hash: u32,
        /// The extension as given
        extension: String,
    },

    /// The container declared a version other than the one this library writes
    UnexpectedVersion {
        /// Version found in the file
        found: u32,
    },

    /// Declared entry data extends past the end of the backing blob
    ZeroFilled {
        /// Bytes the header declared
        declared: u64,
        /// Bytes actually present
        available: u64,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::ExtensionTruncated { hash, extension } => write!(
                f,
                "extension '{extension}' of {hash:08X} is too long and was truncated"
            ),
            Warning::UnexpectedVersion { found } => write!(f, "unexpected version {found}"),
            Warning::ZeroFilled {
                declared,
                available,
            } => write!(
                f,
                "{declared} bytes declared but only {available} available, remainder zero-filled"
            ),
        }
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
