use std::fs::{self, File};
use std::io::BufReader;

use binrw::Endian;
use miette::{IntoDiagnostic, Result};
use pretty_assertions::assert_eq;
use tl_archive::{
    hash::{name_hash32_str, HashOptions},
    scpk::{ScpkOptions, ScriptPack},
    source::DataSource,
};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn pack_scripts_from_directory() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let scripts = [
        ("BTL_MAIN", b"\x1BLuaQ battle".to_vec()),
        ("fld_town01", b"\x1BLuaQ town".to_vec()),
        ("sys", b"\x1BLuaQ".to_vec()),
    ];
    for (name, code) in &scripts {
        fs::write(dir.path().join(format!("{name}.LUAC")), code).into_diagnostic()?;
    }

    for endian in [Endian::Little, Endian::Big] {
        let mut pack = ScriptPack::new(ScpkOptions::builder().endian(endian).build());
        for (name, _) in &scripts {
            let path = dir.path().join(format!("{name}.LUAC"));
            pack.add_script(name, DataSource::from_path(path)?)?;
        }

        let path = dir.path().join("script.scpackr");
        pack.write(&mut File::create(&path).into_diagnostic()?)?;

        let read = ScriptPack::read(&mut BufReader::new(File::open(&path).into_diagnostic()?))?;
        assert_eq!(read.len(), scripts.len());
        assert!(read.options().ignore_case);

        let hashes: Vec<u32> = read.entries().map(|script| script.hash).collect();
        assert!(hashes.windows(2).all(|pair| pair[0] < pair[1]));

        for (name, code) in &scripts {
            let script = read.by_name(name)?;
            assert_eq!(&script.name, name);
            assert_eq!(
                script.hash,
                name_hash32_str(&name.to_uppercase(), HashOptions::NONE)
            );
            assert_eq!(&script.source.read_to_vec()?, code);
        }
    }
    Ok(())
}
