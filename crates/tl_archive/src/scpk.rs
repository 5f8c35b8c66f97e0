//! SCPK script packs.
//!
//! A header, a table of `(hash, offset)` pairs sorted by hash and one script record per entry.
//! The byte order of the whole pack is given by its magic: `KPCS` for little endian, `SCPK` for
//! big endian. Every offset is relative to the structure holding it.

use std::io::{self, Read, Seek, SeekFrom, Write};

use binrw::{BinRead, BinWrite, Endian};
use bon::Builder;
use indexmap::IndexMap;
use tracing::{debug, instrument, warn};

use crate::error::{EntryNotFoundError, Error, Result, Warning};
use crate::hash::{name_hash32_str, HashOptions};
use crate::io::{align, capacity_for, read_cstring, write_align};
use crate::source::DataSource;

/// Magic of a little endian pack
const MAGIC_LITTLE: &[u8; 4] = b"KPCS";

/// Magic of a big endian pack
const MAGIC_BIG: &[u8; 4] = b"SCPK";

/// Scripts and names are aligned to this
const ALIGNMENT: u64 = 4;

/// Size of the header, including the magic
const HEADER_SIZE: u64 = 16;

/// Options for how a script pack is written
#[derive(Debug, Clone, Copy, Builder)]
pub struct ScpkOptions {
    /// Byte order of the pack
    #[builder(default = Endian::Little)]
    pub endian: Endian,

    /// Whether names are upper cased before hashing
    #[builder(default = true)]
    pub ignore_case: bool,
}

impl Default for ScpkOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ScpkOptions {
    fn hash_options(&self) -> HashOptions {
        if self.ignore_case {
            HashOptions::IGNORE_CASE
        } else {
            HashOptions::NONE
        }
    }
}

/// Header following the magic
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
struct ScpkHeader {
    version: u32,
    entries_offset: u32,
    count: u32,
}

impl ScpkHeader {
    const VERSION: u32 = 100;
}

/// Element of the entry table
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq)]
struct ScpkIndexEntry {
    hash: u32,

    /// Relative to this element
    offset: u32,
}

impl ScpkIndexEntry {
    const SIZE: u64 = 8;
}

/// Record preceding the name and code of a script
#[derive(BinRead, BinWrite, Debug, Copy, Clone, PartialEq)]
struct ScriptRecord {
    /// Always 0
    unknown1: u32,

    /// Always 0x10
    unknown2: u32,

    /// Offset of the code, relative to this record
    offset: u32,

    /// Size of the code plus [`ScriptRecord::SIZE`]
    size: u32,
}

impl ScriptRecord {
    const SIZE: u64 = 16;
}

/// A compiled script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptEntry {
    /// Hash of the name
    pub hash: u32,

    /// Name of the script, without an extension
    pub name: String,

    /// The compiled code
    pub source: DataSource,
}

impl ScriptEntry {
    /// Creates an entry from its parts.
    pub fn new(hash: u32, name: impl Into<String>, source: DataSource) -> Self {
        Self {
            hash,
            name: name.into(),
            source,
        }
    }
}

/// A script pack
#[derive(Debug, Clone, Default)]
pub struct ScriptPack {
    entries: IndexMap<u32, ScriptEntry>,
    options: ScpkOptions,
}

impl ScriptPack {
    /// An empty pack
    pub fn new(options: ScpkOptions) -> Self {
        Self {
            entries: IndexMap::new(),
            options,
        }
    }

    /// Number of scripts
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no scripts
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The scripts in insertion order
    pub fn entries(&self) -> impl Iterator<Item = &ScriptEntry> {
        self.entries.values()
    }

    /// Layout options, as read or as used when writing
    pub fn options(&self) -> ScpkOptions {
        self.options
    }

    /// Replaces the layout options used when writing.
    pub fn set_options(&mut self, options: ScpkOptions) {
        self.options = options;
    }

    /// Hash of `name` as this pack computes it.
    pub fn hash_name(&self, name: &str) -> u32 {
        name_hash32_str(name, self.options.hash_options())
    }

    /// Adds an entry, failing if its hash is already present.
    pub fn add_entry(&mut self, entry: ScriptEntry) -> Result<()> {
        if self.entries.contains_key(&entry.hash) {
            return Err(Error::DuplicateHash(u64::from(entry.hash)));
        }
        self.entries.insert(entry.hash, entry);
        Ok(())
    }

    /// Adds an entry, replacing one with the same hash in place. Returns the replaced entry.
    pub fn add_or_update_entry(&mut self, entry: ScriptEntry) -> Option<ScriptEntry> {
        let replaced = self.entries.insert(entry.hash, entry);
        if let Some(old) = &replaced {
            debug!("replaced script {}", old.name);
        }
        replaced
    }

    /// Adds a script named `name`, hashing the name.
    pub fn add_script(&mut self, name: &str, source: DataSource) -> Result<()> {
        self.add_entry(ScriptEntry::new(self.hash_name(name), name, source))
    }

    /// The script with `hash`
    pub fn try_get_entry(&self, hash: u32) -> Option<&ScriptEntry> {
        self.entries.get(&hash)
    }

    /// The script named `name`
    pub fn try_get_entry_by_name(&self, name: &str) -> Option<&ScriptEntry> {
        self.try_get_entry(self.hash_name(name))
    }

    /// Search for a script by name
    pub fn by_name(&self, name: &str) -> Result<&ScriptEntry> {
        self.try_get_entry_by_name(name)
            .ok_or_else(|| Error::EntryNotFound(EntryNotFoundError::Name(name.to_owned())))
    }

    /// Removes every script.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Reads a pack, loading every script into memory.
    ///
    /// The byte order is taken from the magic. Whether names were hashed case insensitively is
    /// detected from the stored hashes.
    #[instrument(skip(reader), err)]
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<ScriptPack> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic).map_err(Error::from_io)?;
        let endian = match &magic {
            MAGIC_LITTLE => Endian::Little,
            MAGIC_BIG => Endian::Big,
            _ => return Err(Error::UnsupportedFormat("not a SCPK file".into())),
        };

        let header = ScpkHeader::read_options(reader, endian, ())
            .map_err(|err| Error::from_binrw(err, "SCPK"))?;
        if header.version != ScpkHeader::VERSION {
            let warning = Warning::UnexpectedVersion {
                found: header.version,
            };
            warn!("{warning}");
        }
        debug!("{} scripts, {endian:?}", header.count);

        reader.seek(SeekFrom::Start(u64::from(header.entries_offset)))?;
        let index = (0..header.count)
            .map(|_| {
                ScpkIndexEntry::read_options(reader, endian, ())
                    .map_err(|err| Error::from_binrw(err, "SCPK"))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut scripts = Vec::with_capacity(index.len());
        for (i, entry) in index.iter().enumerate() {
            let record_start = HEADER_SIZE + ScpkIndexEntry::SIZE * i as u64 + u64::from(entry.offset);
            reader.seek(SeekFrom::Start(record_start))?;

            let record = ScriptRecord::read_options(reader, endian, ())
                .map_err(|err| Error::from_binrw(err, "SCPK"))?;
            let name = String::from_utf8_lossy(&read_cstring(reader).map_err(Error::from_io)?)
                .into_owned();

            let size = u64::from(record.size)
                .checked_sub(ScriptRecord::SIZE)
                .ok_or_else(|| {
                    Error::UnsupportedFormat(format!("script {name} has an invalid size"))
                })?;

            reader.seek(SeekFrom::Start(record_start + u64::from(record.offset)))?;
            let mut code = Vec::with_capacity(capacity_for(size));
            reader
                .by_ref()
                .take(size)
                .read_to_end(&mut code)
                .map_err(Error::from_io)?;
            if (code.len() as u64) < size {
                return Err(Error::Truncated);
            }

            scripts.push(ScriptEntry::new(entry.hash, name, DataSource::Memory(code)));
        }

        let case_sensitive = scripts.iter().any(|script| {
            script.hash != name_hash32_str(&script.name, HashOptions::IGNORE_CASE)
                && script.hash == name_hash32_str(&script.name, HashOptions::NONE)
        });

        let mut pack = ScriptPack::new(ScpkOptions {
            endian,
            ignore_case: !case_sensitive,
        });
        for script in scripts {
            pack.add_entry(script)?;
        }
        Ok(pack)
    }

    /// Writes the pack, sorting the entry table by hash.
    #[instrument(skip_all, fields(entries = self.len()), err)]
    pub fn write<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let endian = self.options.endian;

        let mut scripts: Vec<&ScriptEntry> = self.entries.values().collect();
        scripts.sort_by_key(|script| script.hash);

        writer.write_all(match endian {
            Endian::Little => MAGIC_LITTLE,
            Endian::Big => MAGIC_BIG,
        })?;
        ScpkHeader {
            version: ScpkHeader::VERSION,
            entries_offset: HEADER_SIZE as u32,
            count: scripts.len() as u32,
        }
        .write_options(writer, endian, ())?;

        let mut position = HEADER_SIZE + ScpkIndexEntry::SIZE * scripts.len() as u64;
        let mut records = Vec::with_capacity(scripts.len());
        for (i, script) in scripts.iter().enumerate() {
            let record_start = align(position, ALIGNMENT);
            let name_end = record_start + ScriptRecord::SIZE + script.name.len() as u64 + 1;
            let code_start = align(name_end, ALIGNMENT);
            let size = script.source.len();

            ScpkIndexEntry {
                hash: script.hash,
                offset: offset32(record_start - HEADER_SIZE - ScpkIndexEntry::SIZE * i as u64)?,
            }
            .write_options(writer, endian, ())?;

            records.push((
                ScriptRecord {
                    unknown1: 0,
                    unknown2: 0x10,
                    offset: offset32(code_start - record_start)?,
                    size: offset32(size + ScriptRecord::SIZE)?,
                },
                size,
            ));
            position = code_start + size;
        }

        for (script, (record, size)) in scripts.iter().zip(records) {
            pad(writer, ALIGNMENT)?;
            record.write_options(writer, endian, ())?;
            writer.write_all(script.name.as_bytes())?;
            writer.write_all(&[0])?;
            pad(writer, ALIGNMENT)?;

            let copied = io::copy(&mut script.source.open_read()?.take(size), writer)
                .map_err(Error::from_io)?;
            if copied < size {
                return Err(Error::Truncated);
            }
        }
        pad(writer, ALIGNMENT)?;

        Ok(())
    }
}

fn offset32(value: u64) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::UnsupportedFormat("script pack too large".into()))
}

fn pad<W: Write + Seek>(writer: &mut W, alignment: u64) -> Result<()> {
    write_align(writer, alignment, 0)?;
    Ok(())
}
