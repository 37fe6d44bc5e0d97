//! Encoder/decoder for animated, palette-based GIF89a images.
//!
//! A GIF file is an ordered sequence of typed binary blocks. This crate reads
//! and writes that sequence for callers that already have pixel data as
//! numeric arrays, and recovers index buffers plus timing metadata from
//! existing files.
//!
//! # File layout
//!
//! ```plain
//! Header(6)                       "GIF89a", verbatim
//! LogicalScreenDescriptor(7)      canvas size + global-table flag/size
//! GlobalColorTable                0 or 3 * 2^(k+1) bytes, k in 0..=7
//! ApplicationExtension            NETSCAPE2.0 loop count
//! { GraphicControlExtension       frame duration in 1/100ths of a second
//!   ImageDescriptor
//!   [LocalColorTable]
//!   codeSize(1)
//!   LZW-compressed sub-blocks }*  one group per frame
//! Trailer(1)                      0x3B
//! ```
//!
//! All multi-byte integers are little-endian. Every pixel is stored as an
//! index into the color table that applies to its frame: the frame's local
//! table if present, otherwise the global one. Tables hold 2..=256 RGB
//! triples, always a power of two.
//!
//! # Example
//!
//! ```
//! use giflet::{Gif, GifOptions};
//!
//! let mut gif = Gif::with_options(
//!     2,
//!     2,
//!     GifOptions {
//!         bit_depth: 2,
//!         ..GifOptions::default()
//!     },
//! );
//! gif.add_frame(&[0.0, 85.0, 170.0, 255.0]).unwrap();
//!
//! let mut bytes = Vec::new();
//! gif.to_writer(&mut bytes).unwrap();
//!
//! let parsed = Gif::from_reader(&bytes[..]).unwrap();
//! assert_eq!(parsed.frames().len(), 1);
//! ```

pub mod block;
pub mod gif;
pub mod lzw;
pub mod palette;
pub mod quant;

mod frame;

pub use block::DecodeError;
pub use frame::Frame;
pub use gif::{Gif, GifOptions};
pub use lzw::LzwError;
pub use palette::ColorTable;
pub use quant::QuantizeError;

pub mod consts {
    /// Fixed 6-byte signature opening every file.
    pub const SIGNATURE: &[u8; 6] = b"GIF89a";

    /// Final byte of every file.
    pub const TRAILER: u8 = 0x3B;

    /// First byte of a graphic block; an image descriptor follows.
    pub const IMAGE_SEPARATOR: u8 = 0x2C;

    /// First byte of every extension block; a label byte follows.
    pub const EXTENSION_INTRODUCER: u8 = 0x21;

    /// Label of the graphic control extension (per-frame duration).
    pub const GRAPHIC_CONTROL_LABEL: u8 = 0xF9;

    /// Label of the comment extension (free-form data, skipped on read).
    pub const COMMENT_LABEL: u8 = 0xFE;

    /// Label of the application extension (carries the loop count).
    pub const APPLICATION_LABEL: u8 = 0xFF;

    /// 11-byte identifier of the looping application extension.
    pub const NETSCAPE: &[u8; 11] = b"NETSCAPE2.0";

    /// Smallest LZW minimum code size the format permits.
    pub const MIN_CODE_SIZE: u8 = 2;
}
