use clap::Args;
use miette::{miette, Context, IntoDiagnostic, Result};
use std::{
    fs,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tl_archive::{
    hash::parse_hash_file_name,
    source::DataSource,
    zarc::{ZArcArchive, ZArcEntry, ZArcOptions},
};
use tracing::{error, info};

use crate::commands::{create_output, relative_name, walk_files, PathCaseArg};

#[derive(Args)]
pub struct PackArgs {
    /// An input directory
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target ZARC file
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Case folding applied to paths before hashing
    #[arg(long, value_enum, default_value_t = PathCaseArg::Lower)]
    path_case: PathCaseArg,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        info!("creating {}", &self.file.display());

        let files = walk_files(&self.directory)?;
        let mut archive = ZArcArchive::new(
            ZArcOptions::builder()
                .path_case(self.path_case.into())
                .build(),
        );

        for file in files {
            let name = relative_name(&self.directory, &file)?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy())
                .unwrap_or_default();

            let hash = if file_name.starts_with('$') {
                match parse_hash_file_name(&name) {
                    Some(hash) => hash,
                    None => {
                        error!("could not parse hash from {}, skipping", file.display());
                        continue;
                    }
                }
            } else {
                archive.hash_path(&name)
            };

            if archive.try_get_entry(hash).is_some() {
                error!("cannot import {name} because its hash {hash:016X} is taken");
                continue;
            }

            info!("merging {name}");
            archive.add_entry(ZArcEntry::new(hash, DataSource::from_path(&file)?))?;
        }

        if archive.is_empty() {
            return Err(miette!("no files to pack"));
        }

        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .into_diagnostic()
                .context(format!("creating {}", parent.display()))?;
        }

        let mut out = BufWriter::new(create_output(&self.file, self.overwrite)?);
        archive.write(&mut out).context("finalizing zarc file")?;
        out.flush().into_diagnostic()?;

        Ok(())
    }
}
