//! Binary helpers shared by the container readers and writers.

use std::io::{self, Read, Seek, SeekFrom, Write};

use binrw::{BinResult, Endian};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};

/// Largest buffer reserved up front for a length read from a container
const MAX_PREALLOCATION: u64 = 1 << 24;

/// Capacity to reserve for `len` bytes of container data. Buffers grow past the cap as data
/// actually arrives.
pub(crate) fn capacity_for(len: u64) -> usize {
    len.min(MAX_PREALLOCATION) as usize
}

/// Rounds `value` up to the next multiple of `alignment`.
pub(crate) fn align(value: u64, alignment: u64) -> u64 {
    if alignment <= 1 {
        return value;
    }
    value.div_ceil(alignment) * alignment
}

/// Pads `writer` with `fill` up to the next multiple of `alignment` and returns the new position.
pub(crate) fn write_align<W: Write + Seek>(writer: &mut W, alignment: u64, fill: u8) -> io::Result<u64> {
    let position = writer.stream_position()?;
    let aligned = align(position, alignment);
    if aligned > position {
        io::copy(
            &mut io::repeat(fill).take(aligned - position),
            writer,
        )?;
    }
    Ok(aligned)
}

/// Moves a stream to another position and puts it back when dropped.
pub(crate) struct TemporarySeek<'a, S: Seek> {
    inner: &'a mut S,
    restore: u64,
}

impl<'a, S: Seek> TemporarySeek<'a, S> {
    pub fn new(inner: &'a mut S, pos: SeekFrom) -> io::Result<Self> {
        let restore = inner.stream_position()?;
        inner.seek(pos)?;
        Ok(Self { inner, restore })
    }
}

impl<S: Seek> Drop for TemporarySeek<'_, S> {
    fn drop(&mut self) {
        if let Err(err) = self.inner.seek(SeekFrom::Start(self.restore)) {
            tracing::error!("unable to restore stream position {}: {err}", self.restore);
        }
    }
}

impl<S: Seek> std::ops::Deref for TemporarySeek<'_, S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        self.inner
    }
}

impl<S: Seek> std::ops::DerefMut for TemporarySeek<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner
    }
}

/// A reader that yields exactly `len` bytes, padding with zeros once `inner` runs dry.
pub struct ZeroFill<R> {
    inner: R,
    remaining: u64,
    exhausted: bool,
}

impl<R: Read> ZeroFill<R> {
    pub(crate) fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            remaining: len,
            exhausted: false,
        }
    }
}

impl<R: Read> Read for ZeroFill<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = buf.len().min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let read = if self.exhausted {
            0
        } else {
            self.inner.read(&mut buf[..want])?
        };

        let read = if read == 0 {
            self.exhausted = true;
            buf[..want].fill(0);
            want
        } else {
            read
        };

        self.remaining -= read as u64;
        Ok(read)
    }
}

/// Reads a 24-bit unsigned integer.
#[binrw::parser(reader, endian)]
pub(crate) fn parse_u24() -> BinResult<u32> {
    let value = match endian {
        Endian::Big => reader.read_uint::<BigEndian>(3)?,
        Endian::Little => reader.read_uint::<LittleEndian>(3)?,
    };
    Ok(value as u32)
}

/// Writes the low 24 bits of an unsigned integer.
#[binrw::writer(writer, endian)]
pub(crate) fn write_u24(value: &u32) -> BinResult<()> {
    let value = u64::from(*value & 0x00FF_FFFF);
    match endian {
        Endian::Big => writer.write_uint::<BigEndian>(value, 3)?,
        Endian::Little => writer.write_uint::<LittleEndian>(value, 3)?,
    }
    Ok(())
}

/// Reads a 40-bit unsigned integer.
#[binrw::parser(reader, endian)]
pub(crate) fn parse_u40() -> BinResult<u64> {
    Ok(match endian {
        Endian::Big => reader.read_uint::<BigEndian>(5)?,
        Endian::Little => reader.read_uint::<LittleEndian>(5)?,
    })
}

/// Writes the low 40 bits of an unsigned integer.
#[binrw::writer(writer, endian)]
pub(crate) fn write_u40(value: &u64) -> BinResult<()> {
    let value = *value & 0xFF_FFFF_FFFF;
    match endian {
        Endian::Big => writer.write_uint::<BigEndian>(value, 5)?,
        Endian::Little => writer.write_uint::<LittleEndian>(value, 5)?,
    }
    Ok(())
}

/// Reads an unsigned integer of `width` bytes (1 to 8) in the given byte order.
pub(crate) fn read_uint<R: Read>(reader: &mut R, endian: Endian, width: usize) -> io::Result<u64> {
    match endian {
        Endian::Big => reader.read_uint::<BigEndian>(width),
        Endian::Little => reader.read_uint::<LittleEndian>(width),
    }
}

/// Writes the low `width` bytes (1 to 8) of `value` in the given byte order.
pub(crate) fn write_uint<W: Write>(
    writer: &mut W,
    value: u64,
    endian: Endian,
    width: usize,
) -> io::Result<()> {
    let value = if width >= 8 {
        value
    } else {
        value & ((1u64 << (width * 8)) - 1)
    };
    match endian {
        Endian::Big => writer.write_uint::<BigEndian>(value, width),
        Endian::Little => writer.write_uint::<LittleEndian>(value, width),
    }
}

/// Reads a NUL-terminated byte string, without the terminator.
pub(crate) fn read_cstring<R: Read>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut raw = Vec::new();
    loop {
        let char = reader.read_u8()?;
        if char == b'\0' {
            break;
        }
        raw.push(char);
    }
    Ok(raw)
}
