//! Stream ciphers used to obfuscate data headers, data blobs and DLC headers.
//!
//! Both ciphers XOR the data with a rolling key that is advanced once per word. The key update
//! depends on the plaintext word, so encryption and decryption differ only in which side of the
//! XOR is fed back.

use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::hash::{name_hash32, HashOptions};

/// Seed values combined pairwise into an archive key
pub const KEY_TABLE: [u64; 16] = [
    0x551B_8A2E_CD61_97EF, 0x186A_57F3_9470_0E34, 0x3E9F_2E30_2712_B938, 0xE14C_2303_CCC5_51F2,
    0xCCF3_8CA1_F5C1_7133, 0x2353_622F_23B1_C9DB, 0x34AF_ADAC_84AE_7417, 0x0A5D_CACA_1D93_65EB,
    0xF262_BECF_99CD_3C0F, 0x0312_5B4B_2F48_1962, 0xCD5E_C403_9782_A7AA, 0x7E33_B2FC_317E_77F3,
    0xBEFB_5409_BB40_D4FA, 0x3368_C49E_410E_24EF, 0x1E96_9361_7E3E_6BBF, 0x9C35_278E_3589_12B1,
];

const KEY_STEP: u64 = 0x4E33_62BF_7A4C_7C26;

/// Derives an archive key from two 4-bit indices into [`KEY_TABLE`].
///
/// Only the low four bits of each index are used. Equal indices yield a zero key.
pub fn archive_key(k1: u8, k2: u8) -> u64 {
    KEY_TABLE[usize::from(k1 & 0xF)] ^ KEY_TABLE[usize::from(k2 & 0xF)]
}

#[inline]
fn advance(key: u64, plain: u64) -> u64 {
    let mut key = key ^ KEY_STEP;
    key ^= key << 13;
    key ^= key >> 7;
    let folded = (plain as u32) | ((plain >> 32) as u32);
    key ^ ((key << 17) ^ (folded as i32 as i64 as u64))
}

fn process(data: &mut [u8], mut key: u64, encrypt: bool) {
    // Words are only processed up to the last full 16 bytes.
    let words = data.len() - data.len() % 16;

    for chunk in data[..words].chunks_exact_mut(8) {
        let mut temp = u64::from_le_bytes([
            chunk[0], chunk[1], chunk[2], chunk[3], chunk[4], chunk[5], chunk[6], chunk[7],
        ]);
        chunk.copy_from_slice(&(temp ^ key).to_le_bytes());

        if !encrypt {
            temp ^= key;
        }
        key = advance(key, temp);
    }

    for (i, b) in data.iter_mut().enumerate().skip(words) {
        *b ^= (key >> (8 * (i & 7))) as u8;
    }
}

/// Encrypts `data` in place with the archive cipher.
pub fn encrypt(data: &mut [u8], key: u64) {
    process(data, key, true)
}

/// Decrypts `data` in place with the archive cipher.
pub fn decrypt(data: &mut [u8], key: u64) {
    process(data, key, false)
}

/// The encryption header (`FILEHEADER.TOFHDA`) that carries the key material for a data header
/// and its blob.
#[derive(Debug, Clone)]
pub struct EncryptHeader {
    data: Vec<u8>,
}

impl EncryptHeader {
    /// Wraps the raw contents of an encryption header.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    fn read_u32(&self, offset: usize) -> Result<u32> {
        let bytes = self
            .data
            .get(offset..offset + 4)
            .ok_or(Error::Truncated)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_u64(&self, offset: usize) -> Result<u64> {
        let bytes = self
            .data
            .get(offset..offset + 8)
            .ok_or(Error::Truncated)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(word))
    }

    /// The key that decrypts the data header.
    pub fn header_key(&self) -> Result<u64> {
        let a = self.read_u32(96)?;
        let b = self.read_u32(32)?;
        Ok(archive_key((a & 0xF) as u8, ((b >> 4) & 0xF) as u8))
    }

    /// The key for the file record at `index`, or `None` when that file is stored in the clear.
    #[instrument(skip(self), err)]
    pub fn file_key(&self, index: u32) -> Result<Option<u64>> {
        let permuted = (index & !0xF) | ((index >> 2) & 3) | (4 * (3 - (index & 3)));
        let key = self.read_u64(8 * permuted as usize)?;

        if key & 0x4000 == 0 {
            debug!("file {index} is not encrypted");
            return Ok(None);
        }
        Ok(Some(key))
    }
}

/// The DLC header package cipher.
///
/// An encrypted package starts with [`DlcHeader::MAGIC`], followed by the [`HashOptions::NO_XOR`]
/// name hash of the plaintext and then the ciphertext.
pub struct DlcHeader;

impl DlcHeader {
    /// Marks an encrypted package
    pub const MAGIC: u32 = 0x5FAB_6C8D;

    /// Initial value of the rolling key
    pub const KEY: u32 = 0x7AB5_8E6F;

    /// Decrypts a whole package.
    ///
    /// Returns `None` when `bytes` is not encrypted. A checksum mismatch fails with
    /// [`Error::DecryptionFailed`] and no data is returned.
    #[instrument(skip_all, err)]
    pub fn decrypt(bytes: &[u8]) -> Result<Option<Vec<u8>>> {
        let Some(magic) = bytes.get(..4) else {
            return Ok(None);
        };
        if u32::from_le_bytes([magic[0], magic[1], magic[2], magic[3]]) != Self::MAGIC {
            return Ok(None);
        }

        let expected = bytes.get(4..8).ok_or(Error::Truncated)?;
        let expected = u32::from_le_bytes([expected[0], expected[1], expected[2], expected[3]]);

        let mut plain = bytes[8..].to_vec();
        dlc_decrypt(&mut plain, Self::KEY);

        let actual = name_hash32(&plain, HashOptions::NO_XOR);
        if actual != expected {
            return Err(Error::DecryptionFailed { expected, actual });
        }
        Ok(Some(plain))
    }

    /// Builds an encrypted package from `plain`.
    pub fn encrypt(plain: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(plain.len() + 8);
        output.extend_from_slice(&Self::MAGIC.to_le_bytes());
        output.extend_from_slice(&name_hash32(plain, HashOptions::NO_XOR).to_le_bytes());
        output.extend_from_slice(plain);
        dlc_encrypt(&mut output[8..], Self::KEY);
        output
    }
}

#[inline]
fn dlc_advance(key: u32, plain: [u8; 4]) -> u32 {
    let key = key
        ^ (u32::from(plain[1])
            | (u32::from(plain[3]) << 8)
            | (u32::from(plain[0]) << 16)
            | (u32::from(plain[2]) << 24));
    u32::from(b'A')
        .wrapping_mul(key)
        .wrapping_add(key >> 2)
        .wrapping_sub(0x61C8_8647)
}

fn dlc_process(data: &mut [u8], mut key: u32, encrypt: bool) {
    let words = data.len() - data.len() % 4;

    for chunk in data[..words].chunks_exact_mut(4) {
        let before = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let word = u32::from_le_bytes(before) ^ key;
        chunk.copy_from_slice(&word.to_le_bytes());

        let plain = if encrypt {
            before
        } else {
            [chunk[0], chunk[1], chunk[2], chunk[3]]
        };
        key = dlc_advance(key, plain);
    }

    for (i, b) in data.iter_mut().enumerate().skip(words) {
        *b ^= (key >> (8 * (i & 3))) as u8;
    }
}

/// Decrypts `data` in place with the DLC header cipher.
pub fn dlc_decrypt(data: &mut [u8], key: u32) {
    dlc_process(data, key, false)
}

/// Encrypts `data` in place with the DLC header cipher.
pub fn dlc_encrypt(data: &mut [u8], key: u32) {
    dlc_process(data, key, true)
}

#[cfg(test)]
mod test {
    use pretty_assertions::{assert_eq, assert_str_eq};
    use tracing_test::traced_test;

    use super::*;

    fn hex(data: &[u8]) -> String {
        data.iter().map(|b| format!("{b:02x}")).collect()
    }

    #[test]
    fn key_from_indices() {
        assert_eq!(archive_key(3, 7), 0xEB11_E9C9_D156_3419);
        assert_eq!(archive_key(3, 7), archive_key(7, 3));
        assert_eq!(archive_key(5, 5), 0);
    }

    #[test]
    fn encrypt_known_vector() {
        let mut data: Vec<u8> = (0..37).collect();
        encrypt(&mut data, archive_key(3, 7));
        assert_str_eq!(
            hex(&data),
            "193554d2cdec17ec639f0be31658f977c55ef46e471f896f58f7f3897a704ab2febce4fd35"
        );

        decrypt(&mut data, archive_key(3, 7));
        assert_eq!(data, (0..37).collect::<Vec<u8>>());
    }

    #[test]
    fn short_input_uses_initial_key() {
        let mut data = b"Hello, World!".to_vec();
        encrypt(&mut data, archive_key(3, 7));
        assert_str_eq!(hex(&data), "51513abda6c531bc76463ab5e8");
    }

    #[test]
    fn zero_length_is_noop() {
        let mut data: [u8; 0] = [];
        decrypt(&mut data, archive_key(1, 2));
        encrypt(&mut data, archive_key(1, 2));
        assert!(data.is_empty());
    }

    #[test]
    fn archive_cipher_is_involution() {
        let original: Vec<u8> = (0..300u32).map(|i| (i * 7 + 3) as u8).collect();

        for len in [1, 7, 8, 9, 15, 16, 17, 31, 32, 33, 64, 255, 300] {
            for (k1, k2) in [(0, 1), (3, 7), (15, 2)] {
                let mut data = original[..len].to_vec();
                encrypt(&mut data, archive_key(k1, k2));
                decrypt(&mut data, archive_key(k1, k2));
                assert_eq!(data, &original[..len], "len {len} keys {k1},{k2}");
            }
        }
    }

    #[test]
    fn header_key_from_offsets() -> Result<()> {
        let mut data = vec![0u8; 128];
        data[96] = 0x13; // low nibble 3
        data[32] = 0x70; // second nibble 7
        let header = EncryptHeader::new(data);
        assert_eq!(header.header_key()?, archive_key(3, 7));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn file_key_uses_permuted_index() -> Result<()> {
        let mut data = vec![0u8; 8 * 16];
        // Index 0 maps to slot 12, index 5 to slot 9.
        data[8 * 12..8 * 13].copy_from_slice(&0x1234_0000_0000_4000u64.to_le_bytes());
        data[8 * 9..8 * 10].copy_from_slice(&0x0000_0000_0000_0001u64.to_le_bytes());
        let header = EncryptHeader::new(data);

        assert_eq!(header.file_key(0)?, Some(0x1234_0000_0000_4000));
        assert_eq!(header.file_key(5)?, None);
        assert!(matches!(header.file_key(16), Err(Error::Truncated)));
        Ok(())
    }

    #[test]
    fn dlc_known_vector() {
        let mut data = b"DLC header payload!!xyz".to_vec();
        dlc_encrypt(&mut data, DlcHeader::KEY);
        assert_str_eq!(
            hex(&data),
            "2bc2f65a4c7970072f128d4f9ee299d881a8cfb4e6ba9c"
        );

        dlc_decrypt(&mut data, DlcHeader::KEY);
        assert_eq!(data, b"DLC header payload!!xyz");
    }

    #[traced_test]
    #[test]
    fn dlc_header_round_trip() -> Result<()> {
        let package = DlcHeader::encrypt(b"DLC header payload!!xyz");
        assert_eq!(&package[..4], &DlcHeader::MAGIC.to_le_bytes());
        assert_eq!(&package[4..8], &0xC312_A332u32.to_le_bytes());

        let plain = DlcHeader::decrypt(&package)?;
        assert_eq!(plain.as_deref(), Some(&b"DLC header payload!!xyz"[..]));
        Ok(())
    }

    #[traced_test]
    #[test]
    fn dlc_header_checksum_mismatch() {
        let mut package = DlcHeader::encrypt(b"DLC header payload!!xyz");
        package[10] ^= 0xFF;

        assert!(matches!(
            DlcHeader::decrypt(&package),
            Err(Error::DecryptionFailed {
                expected: 0xC312_A332,
                ..
            })
        ));
    }

    #[traced_test]
    #[test]
    fn dlc_header_plain_input() -> Result<()> {
        assert_eq!(DlcHeader::decrypt(b"plain text")?, None);
        assert_eq!(DlcHeader::decrypt(b"")?, None);
        Ok(())
    }
}
