//! One displayable image inside the container.

use crate::block::{self, DecodeError, GraphicControlExtension, ImageDescriptor};
use crate::lzw;
use crate::palette::ColorTable;
use byteorder::WriteBytesExt;
use std::io::{self, Read, Write};

/// A graphic block: an index buffer, an optional local color table that
/// overrides the global one for this frame only, and a display duration.
///
/// Frames are displayed in list order and never reference each other. Every
/// index must be below the length of the table that applies to the frame;
/// violating that is a caller-side programming error, not something the
/// container detects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    width: u16,
    height: u16,
    indices: Vec<u8>,
    local_table: Option<ColorTable>,
    duration: u16,
}

impl Frame {
    /// `indices` is row-major and must hold exactly `width * height` entries.
    pub fn new(width: u16, height: u16, indices: Vec<u8>, duration: u16) -> Self {
        debug_assert_eq!(indices.len(), usize::from(width) * usize::from(height));
        Self {
            width,
            height,
            indices,
            local_table: None,
            duration,
        }
    }

    pub fn with_local_table(mut self, table: ColorTable) -> Self {
        self.local_table = Some(table);
        self
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn local_table(&self) -> Option<&ColorTable> {
        self.local_table.as_ref()
    }

    /// Display time in hundredths of a second.
    pub fn duration(&self) -> u16 {
        self.duration
    }

    pub(crate) fn set_duration(&mut self, duration: u16) {
        self.duration = duration;
    }

    /// Writes the graphic control extension, image descriptor, optional local
    /// table, code-size byte and the compressed index stream.
    ///
    /// `global_code_size` is used when the frame has no local table.
    pub(crate) fn write_to<W: Write>(&self, w: &mut W, global_code_size: u8) -> io::Result<()> {
        GraphicControlExtension::new(self.duration).write_to(w)?;

        let packed = match &self.local_table {
            Some(table) => 0x80 | table.size_bits(),
            None => 0,
        };
        ImageDescriptor::new(self.width, self.height, packed).write_to(w)?;

        let code_size = match &self.local_table {
            Some(table) => {
                table.write_to(w)?;
                table.code_size()
            }
            None => global_code_size,
        };
        w.write_u8(code_size)?;
        block::write_sub_blocks(w, &lzw::encode(&self.indices, code_size))
    }

    /// Reads everything after the image-separator byte. The duration is
    /// assigned afterwards by the container from the pending graphic control
    /// extension.
    pub(crate) fn from_reader<R: Read>(r: &mut R) -> Result<Self, DecodeError> {
        let desc = ImageDescriptor::from_reader(r)?;
        let local_table = if desc.has_local_table() {
            Some(ColorTable::from_reader(r, desc.table_size_bits())?)
        } else {
            None
        };

        let code_size = block::read_u8(r, "minimum code size")?;
        if !(2..=8).contains(&code_size) {
            return Err(DecodeError::Format {
                field: "minimum code size",
                found: code_size,
            });
        }

        let data = block::read_sub_blocks(r)?;
        let indices =
            lzw::decode(&data, code_size).map_err(|source| DecodeError::ImageData { source })?;

        Ok(Self {
            width: desc.width,
            height: desc.height,
            indices,
            local_table,
            duration: 0,
        })
    }
}
