//! Serialization of the individual binary block types.
//!
//! Each structure here maps one-to-one onto a fixed-layout block of the file.
//! Writers take any [`Write`] sink and propagate stream errors unwrapped;
//! readers distinguish a malformed field ([`DecodeError::Format`]) from a
//! stream that simply ran out of bytes ([`DecodeError::Truncated`]).

use crate::consts;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use snafu::Snafu;
use std::io::{self, Read, Write};

#[derive(Debug, Snafu)]
pub enum DecodeError {
    #[snafu(display("stream does not start with a GIF89a signature"))]
    Signature,

    #[snafu(display("unexpected value {found:#04x} in {field}"))]
    Format { field: &'static str, found: u8 },

    #[snafu(display("stream truncated while reading {what}"))]
    Truncated { what: &'static str },

    #[snafu(display("unknown block introducer {byte:#04x}"))]
    UnknownBlock { byte: u8 },

    #[snafu(display("unknown extension label {label:#04x}"))]
    UnknownExtension { label: u8 },

    #[snafu(display("corrupt compressed image data: {source}"))]
    ImageData { source: crate::lzw::LzwError },

    #[snafu(display("read failed: {source}"))]
    Io { source: io::Error },
}

fn stream_error(e: io::Error, what: &'static str) -> DecodeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        DecodeError::Truncated { what }
    } else {
        DecodeError::Io { source: e }
    }
}

pub(crate) fn read_u8<R: Read>(r: &mut R, what: &'static str) -> Result<u8, DecodeError> {
    r.read_u8().map_err(|e| stream_error(e, what))
}

pub(crate) fn read_u16<R: Read>(r: &mut R, what: &'static str) -> Result<u16, DecodeError> {
    r.read_u16::<LittleEndian>().map_err(|e| stream_error(e, what))
}

pub(crate) fn read_exact<R: Read>(
    r: &mut R,
    buf: &mut [u8],
    what: &'static str,
) -> Result<(), DecodeError> {
    r.read_exact(buf).map_err(|e| stream_error(e, what))
}

/// Reads one byte, treating a clean end of stream as `None`.
///
/// Only valid at a block boundary, where the format tolerates the trailer
/// being missing entirely.
pub(crate) fn read_u8_or_eof<R: Read>(r: &mut R) -> Result<Option<u8>, DecodeError> {
    match r.read_u8() {
        Ok(byte) => Ok(Some(byte)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(DecodeError::Io { source: e }),
    }
}

pub(crate) fn write_signature<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(consts::SIGNATURE)
}

pub(crate) fn read_signature<R: Read>(r: &mut R) -> Result<(), DecodeError> {
    let mut magic = [0u8; 6];
    read_exact(r, &mut magic, "signature")?;
    if &magic != consts::SIGNATURE {
        return Err(DecodeError::Signature);
    }
    Ok(())
}

/// The 7-byte block following the signature.
///
/// Packed byte: bit 7 flags a global color table, bits 0-2 encode its size
/// as `log2(len) - 1`. The remaining fields are unused by this crate and
/// written as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalScreenDescriptor {
    pub width: u16,
    pub height: u16,
    pub packed_fields: u8,
    pub background_color_index: u8,
    pub aspect_ratio: u8,
}

impl LogicalScreenDescriptor {
    pub fn new(width: u16, height: u16, packed_fields: u8) -> Self {
        Self {
            width,
            height,
            packed_fields,
            background_color_index: 0,
            aspect_ratio: 0,
        }
    }

    pub fn has_global_table(&self) -> bool {
        self.packed_fields & 0x80 != 0
    }

    /// Size field of the packed byte, valid only if the table flag is set.
    pub fn table_size_bits(&self) -> u8 {
        self.packed_fields & 0b0000_0111
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u16::<LittleEndian>(self.width)?;
        w.write_u16::<LittleEndian>(self.height)?;
        w.write_u8(self.packed_fields)?;
        w.write_u8(self.background_color_index)?;
        w.write_u8(self.aspect_ratio)
    }

    pub fn from_reader<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            width: read_u16(r, "screen descriptor width")?,
            height: read_u16(r, "screen descriptor height")?,
            packed_fields: read_u8(r, "screen descriptor flags")?,
            background_color_index: read_u8(r, "background color index")?,
            aspect_ratio: read_u8(r, "pixel aspect ratio")?,
        })
    }
}

/// The 9-byte block opening each frame, preceded on the wire by the
/// image-separator byte.
///
/// `write_to` emits the separator; `from_reader` assumes the caller has
/// already consumed it while dispatching the block loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDescriptor {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub packed_fields: u8,
}

impl ImageDescriptor {
    pub fn new(width: u16, height: u16, packed_fields: u8) -> Self {
        Self {
            left: 0,
            top: 0,
            width,
            height,
            packed_fields,
        }
    }

    pub fn has_local_table(&self) -> bool {
        self.packed_fields & 0x80 != 0
    }

    pub fn table_size_bits(&self) -> u8 {
        self.packed_fields & 0b0000_0111
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(consts::IMAGE_SEPARATOR)?;
        w.write_u16::<LittleEndian>(self.left)?;
        w.write_u16::<LittleEndian>(self.top)?;
        w.write_u16::<LittleEndian>(self.width)?;
        w.write_u16::<LittleEndian>(self.height)?;
        w.write_u8(self.packed_fields)
    }

    pub fn from_reader<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        Ok(Self {
            left: read_u16(r, "image descriptor left")?,
            top: read_u16(r, "image descriptor top")?,
            width: read_u16(r, "image descriptor width")?,
            height: read_u16(r, "image descriptor height")?,
            packed_fields: read_u8(r, "image descriptor flags")?,
        })
    }
}

/// Per-frame display metadata, written once before every image descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphicControlExtension {
    pub packed_fields: u8,
    /// Display time in hundredths of a second.
    pub duration: u16,
    pub transparent_color_index: u8,
}

impl GraphicControlExtension {
    const BLOCK_SIZE: u8 = 4;

    pub fn new(duration: u16) -> Self {
        Self {
            packed_fields: 0x08,
            duration,
            transparent_color_index: 0,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_u8(consts::EXTENSION_INTRODUCER)?;
        w.write_u8(consts::GRAPHIC_CONTROL_LABEL)?;
        w.write_u8(Self::BLOCK_SIZE)?;
        w.write_u8(self.packed_fields)?;
        w.write_u16::<LittleEndian>(self.duration)?;
        w.write_u8(self.transparent_color_index)?;
        w.write_u8(0)
    }

    /// Reads the body; the introducer and label bytes are already consumed.
    pub fn from_reader<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let size = read_u8(r, "graphic control block size")?;
        if size != Self::BLOCK_SIZE {
            return Err(DecodeError::Format {
                field: "graphic control block size",
                found: size,
            });
        }
        let ext = Self {
            packed_fields: read_u8(r, "graphic control flags")?,
            duration: read_u16(r, "frame duration")?,
            transparent_color_index: read_u8(r, "transparent color index")?,
        };
        let terminator = read_u8(r, "graphic control terminator")?;
        if terminator != 0 {
            return Err(DecodeError::Format {
                field: "graphic control terminator",
                found: terminator,
            });
        }
        Ok(ext)
    }
}

/// Writes the NETSCAPE2.0 looping extension. `repeat == 0` loops forever.
pub(crate) fn write_loop_extension<W: Write>(w: &mut W, repeat: u16) -> io::Result<()> {
    w.write_u8(consts::EXTENSION_INTRODUCER)?;
    w.write_u8(consts::APPLICATION_LABEL)?;
    w.write_u8(consts::NETSCAPE.len() as u8)?;
    w.write_all(consts::NETSCAPE)?;
    // one 3-byte sub-block: sub-id 1, then the loop count
    w.write_u8(3)?;
    w.write_u8(1)?;
    w.write_u16::<LittleEndian>(repeat)?;
    w.write_u8(0)
}

/// Reads an application extension body (introducer and label consumed).
///
/// Returns the loop count for a NETSCAPE2.0 block. Foreign applications are
/// tolerated: their payload is skipped and `None` is returned.
pub(crate) fn read_application_extension<R: Read>(
    r: &mut R,
) -> Result<Option<u16>, DecodeError> {
    let size = read_u8(r, "application extension block size")?;
    if size as usize != consts::NETSCAPE.len() {
        return Err(DecodeError::Format {
            field: "application extension block size",
            found: size,
        });
    }
    let mut identifier = [0u8; 11];
    read_exact(r, &mut identifier, "application identifier")?;

    let payload = read_sub_blocks(r)?;
    if &identifier != consts::NETSCAPE {
        return Ok(None);
    }
    match payload.as_slice() {
        [1, lo, hi] => Ok(Some(u16::from_le_bytes([*lo, *hi]))),
        [found, ..] => Err(DecodeError::Format {
            field: "loop extension sub-block id",
            found: *found,
        }),
        [] => Err(DecodeError::Format {
            field: "loop extension payload",
            found: 0,
        }),
    }
}

/// Writes `data` as a run of length-prefixed sub-blocks plus a terminator.
///
/// Chunking is mandatory for any payload size; an empty payload still gets
/// its terminator byte.
pub(crate) fn write_sub_blocks<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    for chunk in data.chunks(255) {
        w.write_u8(chunk.len() as u8)?;
        w.write_all(chunk)?;
    }
    w.write_u8(0)
}

/// Reads a run of length-prefixed sub-blocks up to its zero terminator.
pub(crate) fn read_sub_blocks<R: Read>(r: &mut R) -> Result<Vec<u8>, DecodeError> {
    let mut data = Vec::new();
    loop {
        let len = read_u8(r, "sub-block length")?;
        if len == 0 {
            return Ok(data);
        }
        let start = data.len();
        data.resize(start + len as usize, 0);
        read_exact(r, &mut data[start..], "sub-block data")?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_count(payload_len: usize) -> usize {
        let mut out = Vec::new();
        write_sub_blocks(&mut out, &vec![0xAB; payload_len]).unwrap();
        // walk the length prefixes
        let mut chunks = 0;
        let mut pos = 0;
        loop {
            let len = out[pos] as usize;
            pos += 1 + len;
            if len == 0 {
                break;
            }
            chunks += 1;
        }
        assert_eq!(pos, out.len(), "terminator must be the last byte");
        chunks
    }

    #[test]
    fn sub_block_chunk_counts() {
        assert_eq!(chunk_count(255), 1);
        assert_eq!(chunk_count(256), 2);
        assert_eq!(chunk_count(510), 2);
    }

    #[test]
    fn sub_blocks_round_trip() {
        for len in [0usize, 1, 254, 255, 256, 1000] {
            let payload: Vec<u8> = (0..len).map(|i| i as u8).collect();
            let mut out = Vec::new();
            write_sub_blocks(&mut out, &payload).unwrap();
            let back = read_sub_blocks(&mut &out[..]).unwrap();
            assert_eq!(back, payload);
        }
    }

    #[test]
    fn sub_block_truncation_is_detected() {
        let mut out = Vec::new();
        write_sub_blocks(&mut out, &[1, 2, 3, 4]).unwrap();
        out.truncate(3);
        let err = read_sub_blocks(&mut &out[..]).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn descriptors_round_trip() {
        let lsd = LogicalScreenDescriptor::new(320, 200, 0x80 | 0b101);
        let mut out = Vec::new();
        lsd.write_to(&mut out).unwrap();
        assert_eq!(out.len(), 7);
        assert_eq!(LogicalScreenDescriptor::from_reader(&mut &out[..]).unwrap(), lsd);
        assert!(lsd.has_global_table());
        assert_eq!(lsd.table_size_bits(), 0b101);

        let desc = ImageDescriptor::new(320, 200, 0);
        let mut out = Vec::new();
        desc.write_to(&mut out).unwrap();
        assert_eq!(out.len(), 10);
        assert_eq!(out[0], consts::IMAGE_SEPARATOR);
        assert_eq!(ImageDescriptor::from_reader(&mut &out[1..]).unwrap(), desc);
    }

    #[test]
    fn graphic_control_rejects_bad_block_size() {
        let gce = GraphicControlExtension::new(10);
        let mut out = Vec::new();
        gce.write_to(&mut out).unwrap();
        assert_eq!(out.len(), 8);

        // corrupt the block-size byte (after introducer + label)
        out[2] = 5;
        let err = GraphicControlExtension::from_reader(&mut &out[2..]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Format {
                field: "graphic control block size",
                found: 5,
            }
        ));
    }

    #[test]
    fn loop_extension_round_trip() {
        let mut out = Vec::new();
        write_loop_extension(&mut out, 7).unwrap();
        assert_eq!(out.len(), 19);
        let repeat = read_application_extension(&mut &out[2..]).unwrap();
        assert_eq!(repeat, Some(7));
    }

    #[test]
    fn foreign_application_extension_is_skipped() {
        let mut out = Vec::new();
        out.push(11);
        out.extend_from_slice(b"XMP DataXMP");
        out.extend_from_slice(&[2, 0xDE, 0xAD, 0]);
        let repeat = read_application_extension(&mut &out[..]).unwrap();
        assert_eq!(repeat, None);
    }
}
