//! Decrypting TLDAT headers and blobs in place.

use std::ops::Range;

use rayon::prelude::*;
use tracing::{debug, instrument, warn};

use super::TlDatArchive;
use crate::crypt::{self, EncryptHeader};
use crate::error::{Error, Result};
use crate::source::DataSource;

/// Decrypts the raw bytes of a data header with the key from `keys`.
pub fn decrypt_header(keys: &EncryptHeader, header: &mut [u8]) -> Result<()> {
    crypt::decrypt(header, keys.header_key()?);
    Ok(())
}

/// Decrypts every encrypted entry of `archive` inside `blob`.
///
/// Each entry covers its own range of the blob, so entries are decrypted in parallel. Ranges
/// reaching past the end of the blob are cut short. Entries sharing a record are decrypted once,
/// any other overlap fails with [`Error::OverlappingRanges`] before anything is modified.
/// Returns the number of entries decrypted.
#[instrument(skip_all, fields(entries = archive.len(), blob = blob.len()), err)]
pub fn decrypt_blob(archive: &TlDatArchive, keys: &EncryptHeader, blob: &mut [u8]) -> Result<usize> {
    let blob_len = blob.len() as u64;
    let mut ranges: Vec<(Range<u64>, u32, u64)> = Vec::new();

    for entry in archive.entries() {
        let (
            DataSource::BlobRange {
                offset,
                compressed_length,
                ..
            },
            Some(index),
        ) = (&entry.source, entry.record_index())
        else {
            continue;
        };

        let Some(key) = keys.file_key(index)? else {
            continue;
        };

        let end = offset.saturating_add(*compressed_length).min(blob_len);
        let start = (*offset).min(end);
        if end - start < *compressed_length {
            warn!(
                "entry {:08X} reaches past the end of the blob and was cut short",
                entry.hash
            );
        }
        if start < end {
            ranges.push((start..end, index, key));
        }
    }

    ranges.sort_by_key(|(range, index, _)| (range.start, *index));
    ranges.dedup_by(|next, prev| next.1 == prev.1);

    for pair in ranges.windows(2) {
        if pair[1].0.start < pair[0].0.end {
            return Err(Error::OverlappingRanges {
                first: pair[0].0.clone(),
                second: pair[1].0.clone(),
            });
        }
    }

    let mut slices = Vec::with_capacity(ranges.len());
    let mut rest = blob;
    let mut position = 0u64;
    for (range, _, key) in &ranges {
        let (_, tail) = std::mem::take(&mut rest).split_at_mut((range.start - position) as usize);
        let (slice, tail) = tail.split_at_mut((range.end - range.start) as usize);
        slices.push((slice, *key));
        rest = tail;
        position = range.end;
    }

    debug!("decrypting {} entries", slices.len());
    slices
        .into_par_iter()
        .for_each(|(slice, key)| crypt::decrypt(slice, key));

    Ok(ranges.len())
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;
    use crate::crypt::{archive_key, encrypt};
    use crate::tldat::TlDatEntry;

    /// Key material where every record index gets `archive_key(index, index + 1)`, except
    /// index 2 which is stored in the clear.
    fn keys() -> EncryptHeader {
        let mut data = vec![0u8; 8 * 16];
        for index in 0..16u32 {
            let permuted = (index & !0xF) | ((index >> 2) & 3) | (4 * (3 - (index & 3)));
            let key = match index {
                2 => 0,
                _ => archive_key(index as u8, index as u8 + 1) | 0x4000,
            };
            let slot = 8 * permuted as usize;
            data[slot..slot + 8].copy_from_slice(&key.to_le_bytes());
        }
        EncryptHeader::new(data)
    }

    fn blob_entry(hash: u32, index: u32, offset: u64, length: u64) -> TlDatEntry {
        let mut entry = TlDatEntry::new(
            hash,
            "DAT",
            DataSource::BlobRange {
                blob: None,
                offset,
                length,
                compressed_length: length,
            },
        );
        entry.record_index = Some(index);
        entry
    }

    #[traced_test]
    #[test]
    fn decrypts_encrypted_entries_only() -> Result<()> {
        let plain: Vec<u8> = (0..100u8).collect();
        let keys = keys();

        let mut archive = TlDatArchive::default();
        archive.add_entry(blob_entry(10, 0, 0, 40))?;
        archive.add_entry(blob_entry(11, 1, 40, 35))?;
        archive.add_entry(blob_entry(12, 2, 75, 25))?;

        let mut blob = plain.clone();
        encrypt(&mut blob[0..40], keys.file_key(0)?.unwrap_or_default());
        encrypt(&mut blob[40..75], keys.file_key(1)?.unwrap_or_default());

        assert_eq!(decrypt_blob(&archive, &keys, &mut blob)?, 2);
        assert_eq!(blob, plain);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn overlapping_ranges_are_rejected() -> Result<()> {
        let mut archive = TlDatArchive::default();
        archive.add_entry(blob_entry(10, 0, 0, 40))?;
        archive.add_entry(blob_entry(11, 1, 32, 16))?;

        let mut blob = vec![0x55u8; 64];
        assert!(matches!(
            decrypt_blob(&archive, &keys(), &mut blob),
            Err(Error::OverlappingRanges { first, second }) if first == (0..40) && second == (32..48)
        ));
        assert!(blob.iter().all(|&b| b == 0x55));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn ranges_past_the_end_are_clipped() -> Result<()> {
        let keys = keys();
        let mut archive = TlDatArchive::default();
        archive.add_entry(blob_entry(10, 0, 16, 1000))?;
        archive.add_entry(blob_entry(11, 1, 5000, 10))?;

        let plain = vec![0x11u8; 48];
        let mut blob = plain.clone();
        encrypt(&mut blob[16..], keys.file_key(0)?.unwrap_or_default());

        assert_eq!(decrypt_blob(&archive, &keys, &mut blob)?, 1);
        assert_eq!(blob, plain);
        assert!(logs_contain("cut short"));
        Ok(())
    }

    #[test]
    fn header_key_decrypts_header() -> Result<()> {
        let mut material = vec![0u8; 128];
        material[96] = 0x04;
        material[32] = 0x90;
        let keys = EncryptHeader::new(material);

        let plain = b"not much of a header, but enough".to_vec();
        let mut header = plain.clone();
        encrypt(&mut header, archive_key(4, 9));

        decrypt_header(&keys, &mut header)?;
        assert_eq!(header, plain);
        Ok(())
    }
}
