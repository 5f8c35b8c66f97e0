use clap::Args;
use miette::{Context, IntoDiagnostic, Result};
use std::{
    fs,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tl_archive::{source::DataSource, tldat::TlDatArchive};
use tracing::{error, info};

use super::{entry_for_file, LayoutArgs};
use crate::commands::{create_output, walk_files};

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target directory for FILEHEADER.TOFHDB and TLFILE.TLDAT
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    #[command(flatten)]
    layout: LayoutArgs,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        let files = walk_files(&self.directory)?;
        let mut archive = TlDatArchive::new(self.layout.options());

        for file in files {
            let Some(entry) = entry_for_file(&file)? else {
                continue;
            };

            if let Some(existing) = archive.try_get_entry(entry.hash) {
                let conflict = match &existing.source {
                    DataSource::File { path, .. } => path.display().to_string(),
                    _ => format!("{:08X}", existing.hash),
                };
                error!("cannot import {} because it conflicts with {conflict}", file.display());
                continue;
            }

            info!("packing {}", file.display());
            archive.add_entry(entry)?;
        }

        fs::create_dir_all(&self.output)
            .into_diagnostic()
            .context(format!("creating {}", self.output.display()))?;
        let mut header = BufWriter::new(create_output(
            &self.output.join("FILEHEADER.TOFHDB"),
            self.overwrite,
        )?);
        let mut blob = BufWriter::new(create_output(
            &self.output.join("TLFILE.TLDAT"),
            self.overwrite,
        )?);

        let warnings = archive.write(&mut header, &mut blob)?;
        header.flush().into_diagnostic()?;
        blob.flush().into_diagnostic()?;
        info!("packed {} entries, {} warnings", archive.len(), warnings.len());

        Ok(())
    }
}
