//! Color tables and the palette side of quantization.

use crate::block::{read_exact, DecodeError};
use crate::quant::{
    BadLevelCountSnafu, IndexOutOfRangeSnafu, QuantizeError, TooManyEntriesSnafu,
    TooManyLevelsSnafu,
};
use itertools::iproduct;
use snafu::ensure;
use std::io::{self, Read, Write};

/// An ordered list of RGB triples, the palette a frame's indices select from.
///
/// The length is always a power of two in 2..=256, which is what the packed
/// descriptor fields can express. Tables are value objects: once attached to
/// a frame or container they are never mutated, only replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorTable {
    entries: Vec<[u8; 3]>,
}

impl ColorTable {
    /// Builds a table from explicit entries, padding with black up to the
    /// next power of two (minimum 2).
    pub fn from_entries(mut entries: Vec<[u8; 3]>) -> Result<Self, QuantizeError> {
        ensure!(
            entries.len() <= 256,
            TooManyEntriesSnafu {
                entries: entries.len()
            }
        );
        let padded = entries.len().next_power_of_two().max(2);
        entries.resize(padded, [0, 0, 0]);
        Ok(Self { entries })
    }

    /// Evenly spaced gray values from 0 to 255, `2^bit_depth` of them.
    ///
    /// # Panics
    ///
    /// Panics if `bit_depth` is not in 1..=8.
    pub fn grayscale(bit_depth: u8) -> Self {
        assert!(
            (1..=8).contains(&bit_depth),
            "grayscale bit depth must be in 1..=8, got {bit_depth}"
        );
        let n = 1usize << bit_depth;
        let entries = (0..n)
            .map(|i| {
                let v = level_value(i, n);
                [v, v, v]
            })
            .collect();
        Self { entries }
    }

    /// One entry per posterized RGB combination, blue fastest-varying, padded
    /// with black to the next power of two.
    ///
    /// The enumeration order is load-bearing: it must match the mixed-radix
    /// index [`crate::quant::quantize_rgb`] produces.
    pub fn posterized(levels: [u16; 3]) -> Result<Self, QuantizeError> {
        for &l in &levels {
            ensure!(l >= 1, BadLevelCountSnafu { levels: l });
        }
        let product = levels.iter().map(|&l| u32::from(l)).product::<u32>();
        ensure!(product <= 256, TooManyLevelsSnafu { levels });

        let entries = iproduct!(0..levels[0], 0..levels[1], 0..levels[2])
            .map(|(r, g, b)| {
                [
                    level_value(usize::from(r), usize::from(levels[0])),
                    level_value(usize::from(g), usize::from(levels[1])),
                    level_value(usize::from(b), usize::from(levels[2])),
                ]
            })
            .collect();
        Self::from_entries(entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<[u8; 3]> {
        self.entries.get(index).copied()
    }

    /// Size field for the packed descriptor byte: `log2(len) - 1`.
    pub(crate) fn size_bits(&self) -> u8 {
        self.entries.len().trailing_zeros() as u8 - 1
    }

    /// Bit width the entropy coder starts from for indices into this table.
    pub fn code_size(&self) -> u8 {
        (self.entries.len().trailing_zeros() as u8).max(crate::consts::MIN_CODE_SIZE)
    }

    pub(crate) fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        for entry in &self.entries {
            w.write_all(entry)?;
        }
        Ok(())
    }

    pub(crate) fn from_reader<R: Read>(r: &mut R, size_bits: u8) -> Result<Self, DecodeError> {
        let len = 1usize << (size_bits + 1);
        let mut entries = vec![[0u8; 3]; len];
        for entry in &mut entries {
            read_exact(r, entry, "color table")?;
        }
        Ok(Self { entries })
    }
}

/// Looks every index up in `table`, returning one array per channel with the
/// same shape as `indices`.
pub fn palette_to_rgb(
    indices: &[u8],
    table: &ColorTable,
) -> Result<[Vec<u8>; 3], QuantizeError> {
    let mut channels = [
        Vec::with_capacity(indices.len()),
        Vec::with_capacity(indices.len()),
        Vec::with_capacity(indices.len()),
    ];
    for &index in indices {
        let [r, g, b] = table.get(usize::from(index)).ok_or_else(|| {
            IndexOutOfRangeSnafu {
                index: usize::from(index),
                table_len: table.len(),
            }
            .build()
        })?;
        channels[0].push(r);
        channels[1].push(g);
        channels[2].push(b);
    }
    Ok(channels)
}

/// `round(255 * i / (n - 1))`, the representative value of level `i` of `n`.
fn level_value(i: usize, n: usize) -> u8 {
    if n <= 1 {
        return 0;
    }
    (255.0 * i as f64 / (n - 1) as f64).round() as u8
}
