//! TLDAT header and blob pairs.
//!
//! The header (`FILEHEADER.TOFHDB`) describes every entry, the blob (`TLFILE.TLDAT`) holds their
//! data back to back. Entries are keyed by the [`name_hash32`] of their upper cased file name and
//! remember the extension separately, since the name itself is not stored.

mod decrypt;
mod read;
pub mod types;
mod write;

use std::{
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{EntryNotFoundError, Error, Result};
use crate::hash::{name_hash32_str, HashOptions};
use crate::source::DataSource;

pub use decrypt::{decrypt_blob, decrypt_header};
pub use types::{FieldWidth, TlDatOptions};

/// Seconds between 1601-01-01 and 1970-01-01
const FILETIME_UNIX_OFFSET: u64 = 11_644_473_600;

/// The current time as a Windows FILETIME.
pub fn filetime_now() -> u64 {
    let since_epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (since_epoch.as_secs() + FILETIME_UNIX_OFFSET) * 10_000_000
        + u64::from(since_epoch.subsec_nanos() / 100)
}

/// The extension of `name` without its leading period, or an empty string.
pub(crate) fn extension_of(name: &str) -> &str {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or_default()
}

/// An entry of a TLDAT header
#[derive(Debug, Clone, PartialEq)]
pub struct TlDatEntry {
    /// Hash of the entry's file name, including the extension
    pub hash: u32,

    /// File extension, without a leading period
    pub extension: String,

    /// The entry's data
    pub source: DataSource,

    record_index: Option<u32>,
}

impl TlDatEntry {
    /// Creates an entry from its parts.
    pub fn new(hash: u32, extension: impl Into<String>, source: DataSource) -> Self {
        Self {
            hash,
            extension: extension.into(),
            source,
            record_index: None,
        }
    }

    /// Creates an entry named `name`, hashing it case insensitively.
    pub fn from_name(name: &str, source: DataSource) -> Self {
        Self::new(
            name_hash32_str(name, HashOptions::IGNORE_CASE),
            extension_of(name),
            source,
        )
    }

    /// Creates an entry for a loose file, named after the file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::from_name(&name, DataSource::from_path(path)?))
    }

    /// Position of the entry's record in the header it was read from
    pub fn record_index(&self) -> Option<u32> {
        self.record_index
    }
}

/// A TLDAT header together with where its entries' data lives
///
/// ```no_run
/// use std::fs::File;
/// use std::path::Path;
/// use tl_archive::tldat::{TlDatArchive, TlDatOptions};
///
/// fn list(header: &Path, blob: &Path) -> tl_archive::error::Result<()> {
///     let archive = TlDatArchive::read_from(
///         &mut File::open(header)?,
///         Some(blob),
///         TlDatOptions::default(),
///     )?;
///
///     for entry in archive.entries() {
///         println!("{:08X}.{} {} bytes", entry.hash, entry.extension, entry.source.len());
///     }
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TlDatArchive {
    entries: IndexMap<u32, TlDatEntry>,
    creation_time: u64,
    options: TlDatOptions,
}

impl Default for TlDatArchive {
    fn default() -> Self {
        Self::new(TlDatOptions::default())
    }
}

impl TlDatArchive {
    /// An empty archive, created now.
    pub fn new(options: TlDatOptions) -> Self {
        Self {
            entries: IndexMap::new(),
            creation_time: filetime_now(),
            options,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = &TlDatEntry> {
        self.entries.values()
    }

    /// Windows FILETIME stored in the header
    pub fn creation_time(&self) -> u64 {
        self.creation_time
    }

    /// Replaces the creation time written to the header.
    pub fn set_creation_time(&mut self, creation_time: u64) {
        self.creation_time = creation_time;
    }

    /// Layout options used when writing
    pub fn options(&self) -> TlDatOptions {
        self.options
    }

    /// Replaces the layout options used when writing.
    pub fn set_options(&mut self, options: TlDatOptions) {
        self.options = options;
    }

    /// Adds an entry, failing if its hash is already present.
    pub fn add_entry(&mut self, entry: TlDatEntry) -> Result<()> {
        if self.entries.contains_key(&entry.hash) {
            return Err(Error::DuplicateHash(u64::from(entry.hash)));
        }
        self.entries.insert(entry.hash, entry);
        Ok(())
    }

    /// Adds an entry, replacing one with the same hash in place. Returns the replaced entry.
    pub fn add_or_update_entry(&mut self, entry: TlDatEntry) -> Option<TlDatEntry> {
        let replaced = self.entries.insert(entry.hash, entry);
        if let Some(old) = &replaced {
            debug!("replaced entry {:08X}", old.hash);
        }
        replaced
    }

    /// The entry with `hash`
    pub fn try_get_entry(&self, hash: u32) -> Option<&TlDatEntry> {
        self.entries.get(&hash)
    }

    /// The entry with `hash`, if its extension matches ignoring ASCII case
    pub fn try_get_entry_with_extension(&self, hash: u32, extension: &str) -> Option<&TlDatEntry> {
        self.entries
            .get(&hash)
            .filter(|entry| entry.extension.eq_ignore_ascii_case(extension))
    }

    /// The entry named `name`
    pub fn try_get_entry_by_name(&self, name: &str) -> Option<&TlDatEntry> {
        self.try_get_entry_with_extension(
            name_hash32_str(name, HashOptions::IGNORE_CASE),
            extension_of(name),
        )
    }

    /// Search for an entry by hash
    pub fn by_hash(&self, hash: u32) -> Result<&TlDatEntry> {
        self.try_get_entry(hash)
            .ok_or(Error::EntryNotFound(EntryNotFoundError::Hash(u64::from(hash))))
    }

    /// Search for an entry by name
    pub fn by_name(&self, name: &str) -> Result<&TlDatEntry> {
        self.try_get_entry_by_name(name)
            .ok_or_else(|| Error::EntryNotFound(EntryNotFoundError::Name(name.to_owned())))
    }

    /// Orders the entries by ascending hash.
    pub fn sort_entries_by_hash(&mut self) {
        self.entries.sort_keys();
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Points every blob backed entry at `blob`.
    pub fn set_blob(&mut self, blob: Option<&Path>) {
        let blob: Option<PathBuf> = blob.map(Path::to_path_buf);
        for entry in self.entries.values_mut() {
            entry.source.set_blob(blob.clone());
        }
    }
}
