//! The container: global metadata plus the ordered frame list, with
//! whole-file encode and decode.

use crate::block::{self, DecodeError, GraphicControlExtension, LogicalScreenDescriptor};
use crate::consts;
use crate::frame::Frame;
use crate::palette::{palette_to_rgb, ColorTable};
use crate::quant::{self, QuantizeError};
use byteorder::WriteBytesExt;
use std::io::{self, Read, Write};

/// Construction parameters for a fresh container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GifOptions {
    /// Bit depth of the global grayscale table; table length is `2^bit_depth`.
    pub bit_depth: u8,
    /// Default frame duration in hundredths of a second.
    pub duration: u16,
    /// Animation loop count; 0 loops forever.
    pub repeat: u16,
    /// Apply Floyd-Steinberg dithering when quantizing appended frames.
    pub dither: bool,
}

impl Default for GifOptions {
    fn default() -> Self {
        Self {
            bit_depth: 8,
            duration: 10,
            repeat: 0,
            dither: true,
        }
    }
}

/// An animated image: canvas size, optional global color table, loop count
/// and an ordered list of [`Frame`]s.
///
/// Built fresh for writing, or reconstructed by [`Gif::from_reader`]. The
/// canvas size is fixed for the whole file.
#[derive(Debug, Clone)]
pub struct Gif {
    width: u16,
    height: u16,
    global_table: Option<ColorTable>,
    repeat: u16,
    default_duration: u16,
    dither: bool,
    frames: Vec<Frame>,
}

impl Gif {
    pub fn new(width: u16, height: u16) -> Self {
        Self::with_options(width, height, GifOptions::default())
    }

    pub fn with_options(width: u16, height: u16, options: GifOptions) -> Self {
        Self {
            width,
            height,
            global_table: Some(ColorTable::grayscale(options.bit_depth)),
            repeat: options.repeat,
            default_duration: options.duration,
            dither: options.dither,
            frames: Vec::new(),
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn repeat(&self) -> u16 {
        self.repeat
    }

    pub fn global_table(&self) -> Option<&ColorTable> {
        self.global_table.as_ref()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Appends a frame whose indices the caller has already computed.
    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    /// Appends a grayscale frame from raw values in `[0, 255]`, quantized
    /// against the global table. `values` is row-major, `width * height`
    /// entries.
    pub fn add_frame(&mut self, values: &[f64]) -> Result<(), QuantizeError> {
        let table = self.global_table.as_ref().ok_or(QuantizeError::MissingColorTable)?;
        let levels = table.len() as u16;
        let indices = self.bucketize(values, levels)?;
        self.frames.push(Frame::new(
            self.width,
            self.height,
            indices,
            self.default_duration,
        ));
        Ok(())
    }

    /// Appends an RGB frame by posterizing three same-shape channels.
    ///
    /// The posterized table is attached to the new frame as its local color
    /// table, so the frame resolves against its own palette regardless of the
    /// global one.
    pub fn add_rgb_frame(
        &mut self,
        channels: [&[f64]; 3],
        levels: [u16; 3],
    ) -> Result<(), QuantizeError> {
        let table = ColorTable::posterized(levels)?;
        let r = self.bucketize(channels[0], levels[0])?;
        let g = self.bucketize(channels[1], levels[1])?;
        let b = self.bucketize(channels[2], levels[2])?;
        let indices = quant::mix_rgb_indices(&r, &g, &b, levels);

        self.frames.push(
            Frame::new(self.width, self.height, indices, self.default_duration)
                .with_local_table(table),
        );
        Ok(())
    }

    /// Recovers frame `index` as three per-channel arrays, resolved through
    /// the frame's local table if it has one, else the global table.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn frame_rgb(&self, index: usize) -> Result<[Vec<u8>; 3], QuantizeError> {
        let frame = &self.frames[index];
        let table = frame
            .local_table()
            .or(self.global_table.as_ref())
            .ok_or(QuantizeError::MissingColorTable)?;
        palette_to_rgb(frame.indices(), table)
    }

    fn bucketize(&self, values: &[f64], levels: u16) -> Result<Vec<u8>, QuantizeError> {
        if self.dither {
            quant::quantize_channel_dithered(values, usize::from(self.width), levels)
        } else {
            quant::quantize_channel(values, levels)
        }
    }

    fn global_code_size(&self) -> u8 {
        self.global_table
            .as_ref()
            .map(ColorTable::code_size)
            .unwrap_or(consts::MIN_CODE_SIZE)
    }

    /// Serializes the whole file: signature, screen descriptor, global table,
    /// loop extension, every frame in order, trailer.
    ///
    /// Never fails on content; only underlying stream errors propagate.
    pub fn to_writer<W: Write>(&self, w: &mut W) -> io::Result<()> {
        block::write_signature(w)?;

        let packed = match &self.global_table {
            Some(table) => 0x80 | table.size_bits(),
            None => 0,
        };
        LogicalScreenDescriptor::new(self.width, self.height, packed).write_to(w)?;
        if let Some(table) = &self.global_table {
            table.write_to(w)?;
        }
        block::write_loop_extension(w, self.repeat)?;

        let code_size = self.global_code_size();
        for frame in &self.frames {
            frame.write_to(w, code_size)?;
        }
        w.write_u8(consts::TRAILER)
    }

    /// Parses a complete file from the stream.
    ///
    /// After the fixed preamble the parser loops over one-byte block
    /// introducers: the trailer (or a clean end of stream) finishes the
    /// parse, an image separator yields a frame, an extension introducer
    /// dispatches on its label. Extensions may appear in any order before
    /// the frame they modify, so the most recently parsed graphic control
    /// extension is held in a pending slot and applied to the next frame.
    pub fn from_reader<R: Read>(mut r: R) -> Result<Self, DecodeError> {
        block::read_signature(&mut r)?;
        let descriptor = LogicalScreenDescriptor::from_reader(&mut r)?;
        let global_table = if descriptor.has_global_table() {
            Some(ColorTable::from_reader(&mut r, descriptor.table_size_bits())?)
        } else {
            None
        };

        let mut gif = Self {
            width: descriptor.width,
            height: descriptor.height,
            global_table,
            repeat: 0,
            default_duration: GifOptions::default().duration,
            dither: GifOptions::default().dither,
            frames: Vec::new(),
        };

        let mut pending_duration: Option<u16> = None;
        loop {
            let byte = match block::read_u8_or_eof(&mut r)? {
                None => break,
                Some(byte) => byte,
            };
            match byte {
                consts::TRAILER => break,
                consts::IMAGE_SEPARATOR => {
                    let mut frame = Frame::from_reader(&mut r)?;
                    frame.set_duration(
                        pending_duration.take().unwrap_or(gif.default_duration),
                    );
                    gif.frames.push(frame);
                }
                consts::EXTENSION_INTRODUCER => {
                    let label = block::read_u8(&mut r, "extension label")?;
                    match label {
                        consts::GRAPHIC_CONTROL_LABEL => {
                            let ext = GraphicControlExtension::from_reader(&mut r)?;
                            pending_duration = Some(ext.duration);
                        }
                        consts::COMMENT_LABEL => {
                            block::read_sub_blocks(&mut r)?;
                        }
                        consts::APPLICATION_LABEL => {
                            if let Some(repeat) = block::read_application_extension(&mut r)? {
                                gif.repeat = repeat;
                            }
                        }
                        label => return Err(DecodeError::UnknownExtension { label }),
                    }
                }
                byte => return Err(DecodeError::UnknownBlock { byte }),
            }
        }
        Ok(gif)
    }
}
