use std::fs::{self, File};
use std::io::{Cursor, Write};

use flate2::{write::DeflateEncoder, Compression};
use miette::{IntoDiagnostic, Result};
use pretty_assertions::assert_eq;
use tl_archive::{
    compression::TlzcHeader,
    source::DataSource,
    zarc::{PathCase, ZArcArchive, ZArcEntry, ZArcOptions},
};
use tracing_test::traced_test;
use xz2::{
    stream::{LzmaOptions, Stream},
    write::XzEncoder,
};

fn sample(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i % 253) as u8 ^ seed).collect()
}

fn u32_at(bytes: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

/// LZMA-alone stream of `data`: 5 property bytes, 8 length bytes, then the body.
fn lzma_alone(data: &[u8]) -> Vec<u8> {
    let options = LzmaOptions::new_preset(6).unwrap();
    let stream = Stream::new_lzma_encoder(&options).unwrap();
    let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
    encoder.write_all(data).unwrap();
    let mut encoded = encoder.finish().unwrap();
    encoded[5..13].copy_from_slice(&(data.len() as u64).to_le_bytes());
    encoded
}

#[traced_test]
#[test]
fn round_trip_through_file() -> Result<()> {
    let dir = tempfile::tempdir().into_diagnostic()?;
    let path = dir.path().join("data.zarc");

    let paths = ["data/chr/chr0001.hac", "data/map/field01.dat", "sound/bgm.bin"];
    let mut archive = ZArcArchive::new(ZArcOptions::builder().path_case(PathCase::Lower).build());
    archive.add_entry(ZArcEntry::new(
        archive.hash_path(paths[0]),
        DataSource::from(sample(100, 1)),
    ))?;
    archive.add_entry(ZArcEntry::new(
        archive.hash_path(paths[1]),
        DataSource::from(sample(150_000, 2)),
    ))?;
    archive.add_entry(ZArcEntry::new(
        archive.hash_path(paths[2]),
        DataSource::from(Vec::new()),
    ))?;

    archive.write(&mut File::create(&path).into_diagnostic()?)?;

    let written = fs::read(&path).into_diagnostic()?;
    assert_eq!(&written[..4], b"ZARC");
    // One block, three blocks and none, with 2-byte table elements
    assert_eq!(u32_at(&written, 8), 40 + 24 * 3 + 2 * 4);
    assert_eq!(written.len() % 16, 0);

    let hashes: Vec<u64> = (0..3)
        .map(|i| {
            let start = 40 + 24 * i;
            u64::from_be_bytes(written[start..start + 8].try_into().unwrap())
        })
        .collect();
    assert!(hashes.windows(2).all(|pair| pair[0] < pair[1]));

    let read = ZArcArchive::read_from(&path)?;
    assert_eq!(read.len(), 3);
    assert_eq!(read.options().path_case, PathCase::Lower);
    for path in paths {
        let expected = archive.by_path(path)?.source.read_to_vec()?;
        let actual = read.by_path(&path.to_uppercase())?.source.read_to_vec()?;
        assert!(actual == expected, "{path}");
    }
    Ok(())
}

/// Builds an archive with one entry of `payload` whose first block is LZMA compressed and whose
/// remaining block is stored.
fn compressed_archive(payload: &[u8]) -> Vec<u8> {
    let first = lzma_alone(&payload[..65536]);
    let hash = 0x0123_4567_89AB_CDEFu64;

    let mut output = Vec::new();
    output.extend_from_slice(b"ZARC");
    for field in [2u32, 40 + 24 + 4, 24, 1, 0, 1, 65536, 16, 0] {
        output.extend_from_slice(&field.to_be_bytes());
    }

    output.extend_from_slice(&hash.to_be_bytes());
    output.extend_from_slice(&(payload.len() as u64).to_be_bytes()[3..]);
    output.extend_from_slice(&0u32.to_be_bytes());
    output.extend_from_slice(&[0, 0, 0]);
    output.extend_from_slice(&5u32.to_be_bytes());

    output.extend_from_slice(&((first.len() - 13) as u16).to_be_bytes());
    output.extend_from_slice(&0u16.to_be_bytes());

    output.resize(80, 0xEE);
    output.extend_from_slice(&first);
    output.extend_from_slice(&payload[65536..]);
    output
}

#[traced_test]
#[test]
fn compressed_blocks_are_decoded() -> Result<()> {
    let payload = sample(70000, 3);
    let mut file = tempfile::NamedTempFile::new().into_diagnostic()?;
    file.write_all(&compressed_archive(&payload)).into_diagnostic()?;

    let archive = ZArcArchive::read_from(file.path())?;
    let entry = archive.by_hash(0x0123_4567_89AB_CDEF)?;
    assert!(entry.source.is_compressed());
    assert_eq!(entry.source.len(), 70000);

    let first = entry.source.read_to_vec()?;
    let second = entry.source.read_to_vec()?;
    assert!(first == payload);
    assert!(first == second);

    // Rewriting stores the decoded data.
    let mut rewritten = Cursor::new(Vec::new());
    archive.write(&mut rewritten)?;
    let rewritten = rewritten.into_inner();
    assert_eq!(&rewritten[64..68], &[0, 0, 0, 0]);
    assert!(rewritten[80..80 + payload.len()] == payload[..]);
    Ok(())
}

#[traced_test]
#[test]
fn nested_tlzc_is_unwrapped() -> Result<()> {
    let payload = sample(3000, 4);
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&payload).into_diagnostic()?;
    let body = encoder.finish().into_diagnostic()?;

    let mut envelope = Cursor::new(Vec::new());
    binrw::BinWrite::write(
        &TlzcHeader {
            method: 2,
            compressed_size: (TlzcHeader::SIZE + body.len()) as u32,
            uncompressed_size: payload.len() as u32,
            ..Default::default()
        },
        &mut envelope,
    )
    .into_diagnostic()?;
    envelope.get_mut().extend_from_slice(&body);

    let mut archive = ZArcArchive::default();
    archive.add_entry(ZArcEntry::new(7, DataSource::from(envelope.into_inner())))?;

    let mut file = tempfile::NamedTempFile::new().into_diagnostic()?;
    archive.write(file.as_file_mut())?;

    let read = ZArcArchive::read_from(file.path())?;
    let entry = read.by_hash(7)?;
    assert!(!entry.source.is_compressed());
    assert!(entry.source.read_to_vec()? == payload);
    Ok(())
}
