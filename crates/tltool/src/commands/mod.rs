pub mod dlc;
pub mod hash;
pub mod names;
pub mod scpk;
pub mod tldat;
pub mod zarc;

use std::{
    fs::{self, File},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
};

use clap::ValueEnum;
use miette::{miette, Context, IntoDiagnostic, Result};
use owo_colors::OwoColorize;
use rayon::prelude::*;
use tl_archive::{source::DataSource, zarc::PathCase};
use tracing::{error, info};
use walkdir::WalkDir;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle TLDAT header and blob pairs
    Tldat {
        #[command(subcommand)]
        command: tldat::TlDatCommands,
    },
    /// Handle DLC header packages
    Dlc {
        #[command(subcommand)]
        command: dlc::DlcCommands,
    },
    /// Handle ZARC archives
    Zarc {
        #[command(subcommand)]
        command: zarc::ZArcCommands,
    },
    /// Handle SCPK script packs
    Scpk {
        #[command(subcommand)]
        command: scpk::ScpkCommands,
    },
    /// Print the hashes of names
    Hash(hash::HashArgs),
    /// Rename extracted `$HASH` files that a dictionary resolves
    UpdateNames(names::UpdateNamesArgs),
    /// Look up the names of `$HASH` file names in a dictionary
    QueryNames(names::QueryNamesArgs),
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Tldat { command } => command.handle(),
            Commands::Dlc { command } => command.handle(),
            Commands::Zarc { command } => command.handle(),
            Commands::Scpk { command } => command.handle(),
            Commands::Hash(hash) => hash.handle(),
            Commands::UpdateNames(update) => update.handle(),
            Commands::QueryNames(query) => query.handle(),
        }
    }
}

/// Case folding of ZARC paths, as a command line value
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum PathCaseArg {
    None,
    #[default]
    Lower,
    Upper,
}

impl From<PathCaseArg> for PathCase {
    fn from(value: PathCaseArg) -> Self {
        match value {
            PathCaseArg::None => PathCase::None,
            PathCaseArg::Lower => PathCase::Lower,
            PathCaseArg::Upper => PathCase::Upper,
        }
    }
}

/// Creates `path`, refusing to replace an existing file unless `overwrite` is set.
pub(crate) fn create_output(path: &Path, overwrite: bool) -> Result<File> {
    let file = if overwrite {
        File::create(path)
    } else {
        File::create_new(path)
    };
    file.into_diagnostic()
        .context(format!("creating {}", path.display()))
}

/// Every file below `directory`, in a stable order.
pub(crate) fn walk_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let files = WalkDir::new(directory)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| !e.file_type().is_dir())
        .map(|e| e.into_path())
        .collect::<Vec<_>>();

    if files.is_empty() {
        return Err(miette!("{} is empty", directory.display()));
    }
    Ok(files)
}

/// Path of `file` relative to `directory` with `/` separators.
pub(crate) fn relative_name(directory: &Path, file: &Path) -> Result<String> {
    let name = file.strip_prefix(directory).into_diagnostic()?;
    let name = name
        .to_str()
        .ok_or(miette!("unable to convert {} to a string", name.display()))?;
    Ok(name.replace('\\', "/"))
}

/// Writes the decoded data of `source` to `path`, creating parent directories.
pub(crate) fn extract_to(path: &Path, source: &DataSource, overwrite: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .into_diagnostic()
            .context(format!("creating {}", parent.display()))?;
    }

    let mut out = BufWriter::new(create_output(path, overwrite)?);
    io::copy(&mut source.open_read()?, &mut out)
        .into_diagnostic()
        .context(format!("writing {}", path.display()))?;
    out.flush().into_diagnostic()?;
    Ok(())
}

/// Runs `work` over `jobs` in parallel.
///
/// A failing job does not stop the others. Every failure is logged and listed once all jobs are
/// done, and the batch as a whole then fails.
pub(crate) fn run_batch<T, F>(verb: &str, jobs: Vec<(String, T)>, work: F) -> Result<()>
where
    T: Send,
    F: Fn(&str, T) -> Result<()> + Sync,
{
    let total = jobs.len();
    let failures: Vec<String> = jobs
        .into_par_iter()
        .filter_map(|(label, job)| match work(&label, job) {
            Ok(()) => {
                info!("{verb} {label}");
                None
            }
            Err(err) => {
                error!("{label}: {err:?}");
                Some(label)
            }
        })
        .collect();

    println!("✅ {verb} {} of {total}", (total - failures.len()).green());
    for label in &failures {
        println!("❌ {}", label.red());
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(miette!("{} of {total} entries failed", failures.len()))
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn batch_keeps_going_after_failures() {
        let jobs = (0..8).map(|i| (format!("job{i}"), i)).collect();
        let done = std::sync::atomic::AtomicUsize::new(0);

        let result = run_batch("ran", jobs, |_, i| {
            if i % 3 == 0 {
                return Err(miette!("job {i} failed"));
            }
            done.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(done.into_inner(), 5);
    }

    #[test]
    fn relative_names_use_forward_slashes() -> Result<()> {
        let directory = Path::new("root");
        let file = directory.join("data").join("chr").join("chr0001.hac");
        assert_eq!(relative_name(directory, &file)?, "data/chr/chr0001.hac");
        Ok(())
    }

    #[derive(clap::Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Commands,
    }

    fn run(args: &[&str]) -> Result<()> {
        use clap::Parser;

        let cli = Cli::try_parse_from(std::iter::once("tltool").chain(args.iter().copied()))
            .into_diagnostic()?;
        cli.command.handle()
    }

    fn write_tree(root: &Path, files: &[(&str, &[u8])]) -> Result<()> {
        for (name, data) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).into_diagnostic()?;
            fs::write(path, data).into_diagnostic()?;
        }
        Ok(())
    }

    #[test]
    fn tldat_pack_then_extract() -> Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let (input, packed, output) = (dir.path().join("in"), dir.path().join("packed"), dir.path().join("out"));
        write_tree(
            &input,
            &[("chr/chr0001.hac", b"model"), ("$0000ABCD.DAT", b"unnamed")],
        )?;
        let dictionary = dir.path().join("names.txt");
        fs::write(&dictionary, "CHR0001.HAC\n").into_diagnostic()?;

        run(&["tldat", "pack", "-d", input.to_str().unwrap(), "-o", packed.to_str().unwrap()])?;
        run(&[
            "tldat",
            "extract",
            "--header",
            packed.join("FILEHEADER.TOFHDB").to_str().unwrap(),
            "--blob",
            packed.join("TLFILE.TLDAT").to_str().unwrap(),
            "-d",
            output.to_str().unwrap(),
            "--dictionary",
            dictionary.to_str().unwrap(),
        ])?;

        assert_eq!(fs::read(output.join("HAC/CHR0001.HAC")).into_diagnostic()?, b"model");
        assert_eq!(fs::read(output.join("DAT/$0000ABCD.DAT")).into_diagnostic()?, b"unnamed");
        Ok(())
    }

    #[test]
    fn zarc_pack_then_extract() -> Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let (input, output) = (dir.path().join("in"), dir.path().join("out"));
        let archive = dir.path().join("data.zarc");
        write_tree(
            &input,
            &[("data/map/field01.dat", b"field"), ("sound/bgm.bin", b"music")],
        )?;
        let dictionary = dir.path().join("paths.txt");
        fs::write(&dictionary, "DATA/MAP/FIELD01.DAT\n").into_diagnostic()?;

        run(&["zarc", "pack", "-d", input.to_str().unwrap(), "-f", archive.to_str().unwrap()])?;
        run(&[
            "zarc",
            "extract",
            "-f",
            archive.to_str().unwrap(),
            "-d",
            output.to_str().unwrap(),
            "--dictionary",
            dictionary.to_str().unwrap(),
        ])?;

        assert_eq!(fs::read(output.join("data/map/field01.dat")).into_diagnostic()?, b"field");
        let unnamed = format!("${:016X}.bin", tl_archive::zarc_hash64(b"sound/bgm.bin"));
        assert_eq!(fs::read(output.join(unnamed)).into_diagnostic()?, b"music");
        Ok(())
    }

    #[test]
    fn scpk_pack_then_unpack() -> Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let (input, output) = (dir.path().join("in"), dir.path().join("out"));
        let pack = dir.path().join("script.scpackr");
        write_tree(
            &input,
            &[("BTL_MAIN.LUAC", b"\x1BLua battle"), ("readme.txt", b"skipped")],
        )?;

        run(&["scpk", "pack", "-d", input.to_str().unwrap(), "-f", pack.to_str().unwrap(), "--big-endian"])?;
        run(&["scpk", "unpack", "-f", pack.to_str().unwrap(), "-d", output.to_str().unwrap()])?;

        assert_eq!(&fs::read(&pack).into_diagnostic()?[..4], b"SCPK");
        assert_eq!(fs::read(output.join("BTL_MAIN.LUAC")).into_diagnostic()?, b"\x1BLua battle");
        assert!(!output.join("readme.LUAC").exists());
        Ok(())
    }

    #[test]
    fn update_names_renames_resolved_files() -> Result<()> {
        use tl_archive::hash::{name_hash32_str, HashOptions};

        let dir = tempfile::tempdir().into_diagnostic()?;
        let extracted = dir.path().join("out");
        let hash = name_hash32_str("CHR0001.HAC", HashOptions::IGNORE_CASE);
        let unresolved = format!("HAC/${hash:08X}.HAC");
        write_tree(
            &extracted,
            &[(unresolved.as_str(), b"model"), ("DAT/$0000ABCD.DAT", b"unnamed")],
        )?;
        let dictionary = dir.path().join("names.txt");
        fs::write(&dictionary, "chr0001.hac\nOTHER.DAT\n").into_diagnostic()?;

        run(&[
            "update-names",
            "-d",
            extracted.to_str().unwrap(),
            "--dictionary",
            dictionary.to_str().unwrap(),
        ])?;
        run(&[
            "query-names",
            "--dictionary",
            dictionary.to_str().unwrap(),
            &format!("${hash:08X}.HAC"),
            "$0000ABCD.DAT",
        ])?;

        assert_eq!(fs::read(extracted.join("HAC/CHR0001.HAC")).into_diagnostic()?, b"model");
        assert!(!extracted.join(&unresolved).exists());
        assert_eq!(fs::read(extracted.join("DAT/$0000ABCD.DAT")).into_diagnostic()?, b"unnamed");
        Ok(())
    }

    #[test]
    fn update_names_builds_zarc_paths() -> Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let extracted = dir.path().join("out");
        let unresolved = format!("${:016X}.bin", tl_archive::zarc_hash64(b"data/map/field01.dat"));
        write_tree(&extracted, &[(unresolved.as_str(), b"field")])?;
        let dictionary = dir.path().join("paths.txt");
        fs::write(&dictionary, "DATA/MAP/FIELD01.DAT\n").into_diagnostic()?;

        run(&[
            "update-names",
            "-d",
            extracted.to_str().unwrap(),
            "--dictionary",
            dictionary.to_str().unwrap(),
            "--hash-type",
            "zarc-lower",
        ])?;

        assert_eq!(fs::read(extracted.join("data/map/field01.dat")).into_diagnostic()?, b"field");
        assert!(!extracted.join(&unresolved).exists());
        Ok(())
    }

    #[test]
    fn tldat_decrypt_failure_keeps_header() -> Result<()> {
        use tl_archive::crypt::{encrypt, EncryptHeader};

        let dir = tempfile::tempdir().into_diagnostic()?;
        let keys_path = dir.path().join("FILEHEADER.TOFHDA");
        let header_path = dir.path().join("FILEHEADER.TOFHDB");
        let blob_path = dir.path().join("TLFILE.TLDAT");

        // Every record is encrypted.
        let material: Vec<u8> = (0..16u64)
            .flat_map(|slot| (0x4000 | slot << 16).to_le_bytes())
            .collect();
        let keys = EncryptHeader::new(material.clone());

        let mut header = Vec::new();
        for field in [0u64, 0x40, 2, 0, 0, 0x30, 2, 0, 0] {
            header.extend_from_slice(&field.to_le_bytes());
        }
        for (hash, index) in [(2u32, 1u32), (5, 0)] {
            header.extend_from_slice(&hash.to_le_bytes());
            header.extend_from_slice(&index.to_le_bytes());
        }
        // The two records share bytes 8..16 of the blob.
        for (offset, hash, extension) in [(0u64, 5u32, b"DAT"), (8, 2, b"HAC")] {
            for field in [16u64, 16, offset] {
                header.extend_from_slice(&field.to_le_bytes());
            }
            header.extend_from_slice(&hash.to_le_bytes());
            let mut padded = [0u8; 10];
            padded[..3].copy_from_slice(extension);
            header.extend_from_slice(&padded);
            header.extend_from_slice(&[3, 0]);
        }
        encrypt(&mut header, keys.header_key()?);

        fs::write(&keys_path, &material).into_diagnostic()?;
        fs::write(&header_path, &header).into_diagnostic()?;
        fs::write(&blob_path, [0x55u8; 32]).into_diagnostic()?;

        let result = run(&[
            "tldat",
            "decrypt",
            "--keys",
            keys_path.to_str().unwrap(),
            "--header",
            header_path.to_str().unwrap(),
            "--blob",
            blob_path.to_str().unwrap(),
        ]);

        assert!(result.is_err());
        assert!(fs::read(&header_path).into_diagnostic()? == header);
        assert_eq!(fs::read(&blob_path).into_diagnostic()?, [0x55u8; 32]);
        Ok(())
    }

    #[test]
    fn existing_outputs_are_kept() -> Result<()> {
        let dir = tempfile::tempdir().into_diagnostic()?;
        let path = dir.path().join("out.bin");
        fs::write(&path, b"old").into_diagnostic()?;

        assert!(create_output(&path, false).is_err());
        extract_to(&path, &DataSource::from(b"new".to_vec()), true)?;
        assert_eq!(fs::read(&path).into_diagnostic()?, b"new");
        Ok(())
    }
}
