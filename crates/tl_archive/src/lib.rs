//! This library handles reading from and creating the **TLDAT**, **ZARC** and **SCPK** containers
//! used by the *Tales of* series, along with the name hashes, ciphers and block compression they
//! rely on.
//!
//! The game engine binary searches the hash tables of these containers, so sort order, field
//! widths and hash values must match exactly what the engine expects.
//!
//! # TLDAT
//!
//! A TLDAT container is split in two files: a header (`FILEHEADER.TOFHDB`) describing every
//! entry, and a blob (`TLFILE.TLDAT`) holding the entry data back to back. Header fields are
//! either 32 or 64 bits wide depending on the release, shown here with 64-bit fields.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Creation Time          | 8 bytes: Windows FILETIME                                  |
//! | 0x0008         | Hash Offset            | Offset of the hash index, relative to 0x0008               |
//! | 0x0010         | Hash Count             | Number of hash index entries                               |
//! | 0x0018         | Virtual Hash Offset    | Unused                                                     |
//! | 0x0020         | Virtual Hash Count     | Unused                                                     |
//! | 0x0028         | File Offset            | Offset of the file records, relative to 0x0028             |
//! | 0x0030         | File Count             | Number of file records                                     |
//! | 0x0038         | Virtual Pack Offset    | Unused                                                     |
//! | 0x0040         | Virtual Pack Count     | Unused                                                     |
//!
//! With 32-bit fields the file offset is relative to 0x0018 instead.
//!
//! The hash index is a list of `(hash: u32, record: u32)` pairs sorted by hash. The hash is the
//! [`hash::name_hash32`] of the upper cased file name, extension included. Each file record is
//! 40 bytes:
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Length                 | 8 bytes: Size once decoded                                 |
//! | 0x0008         | Compressed Length      | 8 bytes: Size inside the blob                              |
//! | 0x0010         | Offset                 | 8 bytes: Start of the data inside the blob                 |
//! | 0x0018         | Hash                   | 4 bytes: Name hash                                         |
//! | 0x001C         | Extension              | 10 bytes: NUL padded extension                             |
//! | 0x0026         | Extension Length       | 1 byte: At most 9                                          |
//! | 0x0027         | Padding                | 1 byte                                                     |
//!
//! When the lengths differ the data is wrapped in a TLZC envelope. Headers and blobs of some
//! releases are encrypted, see [`crypt`].
//!
//! # ZARC
//!
//! A single big endian file.
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "ZARC"                                            |
//! | 0x0004         | Version                | 4 bytes: Always 2                                          |
//! | 0x0008         | End Of Header          | 4 bytes: End of the block size table                       |
//! | 0x000C         | Content Size           | 4 bytes: Always 24                                         |
//! | 0x0010         | Content Count          | 4 bytes: Number of content records                         |
//! | 0x0014         | Unknown                | 4 bytes                                                    |
//! | 0x0018         | Path Encoding          | 4 bytes: 1 for ASCII                                       |
//! | 0x001C         | Block Alignment        | 4 bytes: Size of a compression block                       |
//! | 0x0020         | File Alignment         | 4 bytes: Alignment of entry data                           |
//! | 0x0024         | Path Case              | 4 bytes: 0 none, 1 lower, 2 upper                          |
//!
//! Content records follow the header, sorted by [`hash::zarc_hash64`]:
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Hash                   | 8 bytes: Hash of the case folded path                      |
//! | 0x0008         | Length                 | 5 bytes: Size once decoded                                 |
//! | 0x000D         | Unknown                | 4 bytes                                                    |
//! | 0x0011         | Block Index            | 3 bytes: First block in the block size table               |
//! | 0x0014         | Block Offset           | 4 bytes: Start of the data in units of the file alignment  |
//!
//! Then comes the block size table, one element per block of every entry. Its element width
//! depends on the block alignment: 1 byte up to 256, 2 up to 65536, 3 up to 2^24 and 4 above.
//! A size of zero marks a stored block, any other size an LZMA-alone stream.
//!
//! # SCPK
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "KPCS" little endian, "SCPK" big endian           |
//! | 0x0004         | Version                | 4 bytes: 100                                               |
//! | 0x0008         | Entries Offset         | 4 bytes: Always 16                                         |
//! | 0x000C         | Entry Count            | 4 bytes                                                    |
//!
//! Entries are `(hash: u32, offset: u32)` pairs sorted by hash, the offset relative to the pair.
//! It points to a script record: two unknown words, the code offset relative to the record, the
//! code size plus 16, then the NUL terminated name. Records and code are 4-byte aligned.
//!
//! # TLZC
//!
//! | Offset (bytes) | Field                  | Description                                                |
//! |----------------|------------------------|------------------------------------------------------------|
//! | 0x0000         | Magic number           | 4 bytes: "TLZC"                                            |
//! | 0x0004         | Unknown                | 1 byte                                                     |
//! | 0x0005         | Compression            | 1 byte: 2 deflate, 4 LZMA blocks                           |
//! | 0x0006         | Unknown                | 2 bytes                                                    |
//! | 0x0008         | Compressed Size        | 4 bytes                                                    |
//! | 0x000C         | Uncompressed Size      | 4 bytes                                                    |
//! | 0x0010         | Reserved               | 8 bytes                                                    |
//!
//! Deflate payloads follow directly. LZMA payloads start with 5 bytes of decoder properties and
//! a table of 16-bit block sizes, one per 65536 bytes of output, followed by the blocks.

pub mod compression;
pub mod crypt;
pub mod error;
pub mod hash;
mod io;
pub mod scpk;
pub mod source;
pub mod tldat;
pub mod zarc;

pub use crypt::{DlcHeader, EncryptHeader};
pub use error::{Error, Result, Warning};
pub use hash::{name_hash32, zarc_hash64, HashOptions};
pub use scpk::{ScpkOptions, ScriptPack};
pub use source::DataSource;
pub use tldat::{TlDatArchive, TlDatOptions};
pub use zarc::{ZArcArchive, ZArcOptions};
