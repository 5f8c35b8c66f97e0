use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs::{self, OpenOptions},
    io::Cursor,
    path::PathBuf,
};
use tl_archive::tldat::TlDatArchive;
use tracing::info;

use super::{entry_for_file, LayoutArgs};
use crate::commands::walk_files;

#[derive(Args)]
pub struct InsertArgs {
    /// The header to update, usually FILEHEADER.TOFHDB
    #[arg(long, value_name = "FILE")]
    header: PathBuf,

    /// The blob to append to, usually TLFILE.TLDAT
    #[arg(long, value_name = "FILE")]
    blob: PathBuf,

    /// A directory of files to add or replace
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    #[command(flatten)]
    layout: LayoutArgs,
}

impl InsertArgs {
    pub fn handle(&self) -> Result<()> {
        let options = self.layout.options();
        let header = fs::read(&self.header)
            .into_diagnostic()
            .context(format!("path: {}", &self.header.display()))?;
        let mut archive =
            TlDatArchive::read_from(&mut Cursor::new(header), Some(&self.blob), options)?;

        let mut added = 0;
        let mut replaced = 0;
        for file in walk_files(&self.directory)? {
            let Some(entry) = entry_for_file(&file)? else {
                continue;
            };

            info!("inserting {}", file.display());
            match archive.add_or_update_entry(entry) {
                Some(_) => replaced += 1,
                None => added += 1,
            }
        }

        // Existing data stays where it is, new data goes to the end of the blob.
        let mut blob = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.blob)
            .into_diagnostic()
            .context(format!("opening {}", self.blob.display()))?;
        let mut header = Cursor::new(Vec::new());
        archive.write(&mut header, &mut blob)?;

        fs::write(&self.header, header.into_inner())
            .into_diagnostic()
            .context(format!("writing {}", self.header.display()))?;
        info!("added {added}, replaced {replaced}");

        Ok(())
    }
}
