//! Name hashes used to build lookup keys.
//!
//! Two functions are in use:
//!
//! - [`name_hash32`] keys TLDAT and SCPK entries. It is seeded with zero and mixes every byte with
//!   the golden ratio constant. TLDAT and SCPK names are folded to ASCII uppercase first
//!   ([`HashOptions::IGNORE_CASE`]), and DLC headers use the value without the final XOR as a
//!   checksum ([`HashOptions::NO_XOR`]).
//! - [`zarc_hash64`] keys ZARC entries. Each half is a reflected CRC-32 with its own polynomial;
//!   the halves are combined into one 64-bit value. Case folding of the path happens before
//!   hashing, according to the archive's [`crate::zarc::PathCase`].

use crc::{Algorithm, Crc, Digest};

const GOLDEN_RATIO: u32 = 0x61C8_8647;

/// Options for [`name_hash32`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashOptions {
    ignore_case: bool,
    no_xor: bool,
}

impl HashOptions {
    /// Plain hash
    pub const NONE: HashOptions = HashOptions {
        ignore_case: false,
        no_xor: false,
    };

    /// Fold ASCII lowercase to uppercase before mixing each byte
    pub const IGNORE_CASE: HashOptions = HashOptions {
        ignore_case: true,
        no_xor: false,
    };

    /// Keep the raw updated value instead of XOR-ing it into the state
    pub const NO_XOR: HashOptions = HashOptions {
        ignore_case: false,
        no_xor: true,
    };

    /// Whether ASCII case is folded
    pub const fn ignore_case(self) -> bool {
        self.ignore_case
    }

    /// Whether the XOR step is skipped
    pub const fn no_xor(self) -> bool {
        self.no_xor
    }
}

impl std::ops::BitOr for HashOptions {
    type Output = HashOptions;

    fn bitor(self, rhs: Self) -> Self::Output {
        HashOptions {
            ignore_case: self.ignore_case || rhs.ignore_case,
            no_xor: self.no_xor || rhs.no_xor,
        }
    }
}

#[inline]
const fn to_upper(b: u8) -> u8 {
    if b.wrapping_sub(b'a') < 26 {
        b - 0x20
    } else {
        b
    }
}

#[inline]
fn mix(hash: u32, b: u8, options: HashOptions) -> u32 {
    let b = if options.ignore_case { to_upper(b) } else { b };
    let next = u32::from(b)
        .wrapping_add(hash << 6)
        .wrapping_add(hash >> 2)
        .wrapping_sub(GOLDEN_RATIO);

    if options.no_xor {
        next
    } else {
        hash ^ next
    }
}

/// Computes the 32-bit name hash of `bytes`.
pub fn name_hash32(bytes: &[u8], options: HashOptions) -> u32 {
    bytes.iter().fold(0, |hash, &b| mix(hash, b, options))
}

/// Computes the 32-bit name hash of the ASCII bytes of `name`.
pub fn name_hash32_str(name: &str, options: HashOptions) -> u32 {
    name_hash32(name.as_bytes(), options)
}

/// Incremental form of [`name_hash32`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NameHasher {
    hash: u32,
    options: HashOptions,
}

impl NameHasher {
    /// Creates a hasher seeded with zero.
    pub fn new(options: HashOptions) -> Self {
        Self { hash: 0, options }
    }

    /// Mixes `bytes` into the running hash.
    pub fn update(&mut self, bytes: &[u8]) {
        self.hash = bytes
            .iter()
            .fold(self.hash, |hash, &b| mix(hash, b, self.options));
    }

    /// The hash of everything processed so far.
    pub fn finish(&self) -> u32 {
        self.hash
    }

    /// Starts over from the seed.
    pub fn reset(&mut self) {
        self.hash = 0;
    }
}

const UPPER_MASK: u32 = 0x1021_5681;
const LOWER_MASK: u32 = (((UPPER_MASK as u64) | ((UPPER_MASK as u64) << 32)) >> 16) as u32;

/// A reflected CRC-32 whose shift register is XOR-ed with `mask` for every set low bit.
const fn reflected(mask: u32) -> Algorithm<u32> {
    Algorithm {
        width: 32,
        // The crc crate takes the normal form and reflects it itself.
        poly: mask.reverse_bits(),
        init: 0xFFFF_FFFF,
        refin: true,
        refout: true,
        xorout: 0xFFFF_FFFF,
        check: 0,
        residue: 0,
    }
}

const ZARC_LOWER_ALGORITHM: Algorithm<u32> = reflected(LOWER_MASK);
const ZARC_UPPER_ALGORITHM: Algorithm<u32> = reflected(UPPER_MASK);

static ZARC_LOWER: Crc<u32> = Crc::<u32>::new(&ZARC_LOWER_ALGORITHM);
static ZARC_UPPER: Crc<u32> = Crc::<u32>::new(&ZARC_UPPER_ALGORITHM);

#[inline]
fn combine(lower: u32, upper: u32) -> u64 {
    (u64::from(upper) << 32) | u64::from(lower)
}

/// Computes the 64-bit ZARC hash of `bytes`.
pub fn zarc_hash64(bytes: &[u8]) -> u64 {
    combine(ZARC_LOWER.checksum(bytes), ZARC_UPPER.checksum(bytes))
}

/// Incremental form of [`zarc_hash64`]
pub struct ZArcHasher {
    lower: Digest<'static, u32>,
    upper: Digest<'static, u32>,
}

impl Default for ZArcHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl ZArcHasher {
    /// Creates a hasher in its initial state.
    pub fn new() -> Self {
        Self {
            lower: ZARC_LOWER.digest(),
            upper: ZARC_UPPER.digest(),
        }
    }

    /// Feeds `bytes` into both halves.
    pub fn update(&mut self, bytes: &[u8]) {
        self.lower.update(bytes);
        self.upper.update(bytes);
    }

    /// Consumes the hasher and returns the combined hash.
    pub fn finish(self) -> u64 {
        combine(self.lower.finalize(), self.upper.finalize())
    }

    /// Starts over from the initial state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

/// Recovers the hash from a fallback name such as `$0000ABCD.DAT` or `dir/$00000000DEADBEEF.bin`.
///
/// Returns `None` when the file stem does not start with `$` or is not valid hexadecimal.
pub fn parse_hash_file_name(name: &str) -> Option<u64> {
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let stem = match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(dot) => &file_name[..dot],
    };

    let digits = stem.strip_prefix('$')?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
