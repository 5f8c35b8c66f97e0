pub mod decrypt;
pub mod extract;
pub mod insert;
pub mod pack;

use std::path::Path;

use binrw::Endian;
use clap::Args;
use miette::Result;
use tl_archive::{
    hash::parse_hash_file_name,
    source::DataSource,
    tldat::{FieldWidth, TlDatEntry, TlDatOptions},
};
use tracing::warn;

#[derive(clap::Subcommand)]
pub enum TlDatCommands {
    /// Extract a TLDAT pair into a directory
    Extract(extract::ExtractArgs),
    /// Pack a directory into a new TLDAT pair
    Pack(pack::PackArgs),
    /// Add or replace files of an existing TLDAT pair
    Insert(insert::InsertArgs),
    /// Decrypt an encrypted TLDAT pair in place
    Decrypt(decrypt::DecryptArgs),
}

impl TlDatCommands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            TlDatCommands::Extract(extract) => extract.handle(),
            TlDatCommands::Pack(pack) => pack.handle(),
            TlDatCommands::Insert(insert) => insert.handle(),
            TlDatCommands::Decrypt(decrypt) => decrypt.handle(),
        }
    }
}

/// Header layout flags shared by the TLDAT commands
#[derive(Args, Clone, Copy)]
pub struct LayoutArgs {
    /// Header fields are 32 bits wide (Xillia, Zestiria)
    #[arg(long, default_value_t = false)]
    bit32: bool,

    /// Header is big endian
    #[arg(long, default_value_t = false)]
    big_endian: bool,
}

impl LayoutArgs {
    pub fn options(&self) -> TlDatOptions {
        TlDatOptions::builder()
            .width(if self.bit32 {
                FieldWidth::Bits32
            } else {
                FieldWidth::Bits64
            })
            .endian(if self.big_endian {
                Endian::Big
            } else {
                Endian::Little
            })
            .build()
    }
}

/// The entry for a loose file.
///
/// Files named `$XXXXXXXX.EXT` keep the hash in their name. Returns `None` when such a name does
/// not hold a valid hash.
pub(crate) fn entry_for_file(path: &Path) -> Result<Option<TlDatEntry>> {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    if !name.starts_with('$') {
        return Ok(Some(TlDatEntry::from_path(path)?));
    }

    let Some(hash) = parse_hash_file_name(&name).and_then(|hash| u32::try_from(hash).ok()) else {
        warn!("could not parse hash from {}, skipping", path.display());
        return Ok(None);
    };
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Some(TlDatEntry::new(
        hash,
        extension,
        DataSource::from_path(path)?,
    )))
}
