use binrw::Endian;
use clap::Args;
use miette::{miette, IntoDiagnostic, Result};
use std::{
    io::{BufWriter, Write},
    path::PathBuf,
};
use tl_archive::{
    scpk::{ScpkOptions, ScriptPack},
    source::DataSource,
};
use tracing::{error, info};

use super::SCRIPT_EXTENSION;
use crate::commands::{create_output, walk_files};

#[derive(Args)]
pub struct PackArgs {
    /// A directory of .LUAC files
    #[arg(short, long, value_name = "DIR")]
    directory: PathBuf,

    /// A target script pack
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Write a big endian pack (PS3)
    #[arg(long, default_value_t = false)]
    big_endian: bool,

    /// Hash names case sensitively (Zestiria)
    #[arg(long, default_value_t = false)]
    case_sensitive: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl PackArgs {
    pub fn handle(&self) -> Result<()> {
        let mut pack = ScriptPack::new(
            ScpkOptions::builder()
                .endian(if self.big_endian {
                    Endian::Big
                } else {
                    Endian::Little
                })
                .ignore_case(!self.case_sensitive)
                .build(),
        );

        let scripts = walk_files(&self.directory)?.into_iter().filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
        });
        for script in scripts {
            let Some(name) = script.file_stem().and_then(|stem| stem.to_str()) else {
                error!("{} is not a valid script name, skipping", script.display());
                continue;
            };

            info!("packing {name}");
            if let Err(err) = pack.add_script(name, DataSource::from_path(&script)?) {
                error!("cannot import {}: {err}", script.display());
            }
        }

        if pack.is_empty() {
            return Err(miette!("no .{SCRIPT_EXTENSION} files in {}", self.directory.display()));
        }

        let mut out = BufWriter::new(create_output(&self.file, self.overwrite)?);
        pack.write(&mut out)?;
        out.flush().into_diagnostic()?;
        info!("packed {} scripts", pack.len());

        Ok(())
    }
}
