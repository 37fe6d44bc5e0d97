//! The LZW entropy codec used for per-frame index streams.
//!
//! Codes start one bit wider than the minimum code size and grow as the
//! dictionary fills, up to 12 bits. When the dictionary reaches 4096 entries
//! the encoder emits a clear code and starts over; the decoder mirrors that.
//! Codes are packed least-significant-bit first.
//!
//! The contract with the container layer is a plain round trip:
//! `decode(&encode(x, c), c) == x` for any minimum code size `c` in 2..=8 and
//! any `x` whose values are all below `2^c`.

use snafu::Snafu;
use std::collections::HashMap;

const MAX_CODE_WIDTH: u32 = 12;

#[derive(Debug, Snafu)]
pub enum LzwError {
    #[snafu(display("code {code} has no dictionary entry"))]
    InvalidCode { code: u16 },
}

/// Compresses `data` with the given minimum code size.
///
/// Every value in `data` must be below `2^min_code_size`; violating that is a
/// caller-side programming error.
pub fn encode(data: &[u8], min_code_size: u8) -> Vec<u8> {
    debug_assert!((2..=8).contains(&min_code_size));
    let clear: u16 = 1 << min_code_size;
    let end = clear + 1;
    debug_assert!(data.iter().all(|&b| u16::from(b) < clear));

    let singles = |table: &mut HashMap<Vec<u8>, u16>| {
        table.clear();
        table.extend((0..clear).map(|n| (vec![n as u8], n)));
    };

    let mut table = HashMap::new();
    singles(&mut table);
    let mut next_code = end + 1;

    let mut packer = BitPacker::new(min_code_size, clear);
    packer.pack(clear);

    let mut local: Vec<u8> = Vec::new();
    for &byte in data {
        local.push(byte);
        if table.contains_key(&local) {
            continue;
        }
        let prefix = &local[..local.len() - 1];
        packer.pack(table[prefix]);
        table.insert(std::mem::take(&mut local), next_code);
        next_code += 1;
        local.push(byte);

        if next_code >> MAX_CODE_WIDTH != 0 {
            packer.pack(clear);
            singles(&mut table);
            next_code = end + 1;
        }
    }
    if !local.is_empty() {
        packer.pack(table[&local]);
    }
    packer.pack(end);
    packer.finish()
}

/// Decompresses an index stream produced with the given minimum code size.
pub fn decode(data: &[u8], min_code_size: u8) -> Result<Vec<u8>, LzwError> {
    debug_assert!((2..=8).contains(&min_code_size));
    let clear: u16 = 1 << min_code_size;
    let end = clear + 1;

    // codes below `clear` map to single bytes; the two control codes get
    // empty placeholders so that entry index == code
    let initial = |entries: &mut Vec<Vec<u8>>| {
        entries.clear();
        entries.extend((0..clear).map(|n| vec![n as u8]));
        entries.push(Vec::new());
        entries.push(Vec::new());
    };

    let mut entries: Vec<Vec<u8>> = Vec::new();
    initial(&mut entries);

    let mut out = Vec::new();
    let mut last: Vec<u8> = Vec::new();

    for code in Codes::new(data, min_code_size) {
        if code == clear {
            initial(&mut entries);
            last.clear();
        } else if code == end {
            break;
        } else if usize::from(code) == entries.len() {
            // the code for the entry currently being formed: it must expand
            // to the previous output plus its own first byte
            let first = *last.first().ok_or(LzwError::InvalidCode { code })?;
            let mut entry = last;
            entry.push(first);
            entries.push(entry.clone());
            out.extend_from_slice(&entry);
            last = entry;
        } else {
            let entry = entries
                .get(usize::from(code))
                .filter(|e| !e.is_empty())
                .ok_or(LzwError::InvalidCode { code })?
                .clone();
            if !last.is_empty() && entries.len() < (1 << MAX_CODE_WIDTH) {
                let mut formed = last;
                formed.push(entry[0]);
                entries.push(formed);
            }
            out.extend_from_slice(&entry);
            last = entry;
        }
    }
    Ok(out)
}

/// Packs codes into bytes, least-significant bit first, tracking the same
/// dictionary growth as the decoder so both sides agree on code widths.
struct BitPacker {
    clear: u16,
    min_width: u32,
    bits: u32,
    n_bits: u32,
    out: Vec<u8>,
    highest_code: u16,
    width: u32,
}

impl BitPacker {
    fn new(min_code_size: u8, clear: u16) -> Self {
        Self {
            clear,
            min_width: u32::from(min_code_size) + 1,
            bits: 0,
            n_bits: 0,
            out: Vec::new(),
            highest_code: clear + 1,
            width: u32::from(min_code_size) + 1,
        }
    }

    fn pack(&mut self, code: u16) {
        self.bits |= u32::from(code) << self.n_bits;
        self.n_bits += self.width;
        while self.n_bits > 7 {
            self.out.push((self.bits & 0xFF) as u8);
            self.bits >>= 8;
            self.n_bits -= 8;
        }
        if code == self.clear {
            self.highest_code = self.clear + 1;
            self.width = self.min_width;
        } else {
            self.highest_code += 1;
            if self.highest_code >> self.width != 0 {
                self.width += 1;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.n_bits > 0 {
            self.out.push(self.bits as u8);
        }
        self.out
    }
}

/// Iterator yielding variable-width codes from packed bytes.
struct Codes<'a> {
    data: &'a [u8],
    bits: u32,
    n_bits: u32,
    clear: u16,
    min_width: u32,
    highest_code: u16,
    width: u32,
}

impl<'a> Codes<'a> {
    fn new(data: &'a [u8], min_code_size: u8) -> Self {
        let clear = 1u16 << min_code_size;
        Self {
            data,
            bits: 0,
            n_bits: 0,
            clear,
            min_width: u32::from(min_code_size) + 1,
            highest_code: clear + 1,
            width: u32::from(min_code_size) + 1,
        }
    }
}

impl Iterator for Codes<'_> {
    type Item = u16;

    fn next(&mut self) -> Option<u16> {
        if 8 * self.data.len() as u32 + self.n_bits < self.width {
            return None;
        }
        while self.n_bits < self.width {
            let (&byte, rest) = self.data.split_first()?;
            self.data = rest;
            self.bits |= u32::from(byte) << self.n_bits;
            self.n_bits += 8;
        }
        let code = (self.bits & ((1 << self.width) - 1)) as u16;
        self.bits >>= self.width;
        self.n_bits -= self.width;

        if code == self.clear {
            self.highest_code = self.clear + 1;
            self.width = self.min_width;
        } else if self.highest_code < (1 << MAX_CODE_WIDTH) - 1 {
            self.highest_code += 1;
            if self.highest_code >> self.width != 0 {
                self.width += 1;
            }
        }
        Some(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_stream() {
        // codes: CLEAR(3b) 0(3b) 6(3b) 0(3b) END(4b) == 16 bits
        assert_eq!(encode(&[0, 0, 0, 0], 2), vec![0x84, 0x51]);
        assert_eq!(decode(&[0x84, 0x51], 2).unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn round_trip_all_code_sizes() {
        for code_size in 2..=8u8 {
            let max = (1u16 << code_size) as usize;
            let data: Vec<u8> = (0..2000).map(|i| ((i * 7 + i / 5) % max) as u8).collect();
            let encoded = encode(&data, code_size);
            assert_eq!(decode(&encoded, code_size).unwrap(), data, "code size {code_size}");
        }
    }

    #[test]
    fn round_trip_through_dictionary_reset() {
        // enough distinct sequences to overflow 4096 dictionary entries and
        // force a mid-stream clear code
        let data: Vec<u8> = (0..40_000u32)
            .map(|i| (i.wrapping_mul(2654435761) >> 24) as u8)
            .collect();
        let encoded = encode(&data, 8);
        assert_eq!(decode(&encoded, 8).unwrap(), data);
    }

    #[test]
    fn round_trip_long_runs() {
        let mut data = vec![5u8; 10_000];
        data.extend(std::iter::repeat(2).take(10_000));
        let encoded = encode(&data, 3);
        assert!(encoded.len() < data.len() / 10);
        assert_eq!(decode(&encoded, 3).unwrap(), data);
    }

    #[test]
    fn empty_input() {
        let encoded = encode(&[], 2);
        assert_eq!(decode(&encoded, 2).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn invalid_code_is_rejected() {
        // CLEAR then a code far beyond the dictionary: pack 4 then 7 at 3 bits
        let bytes = vec![0b00_111_100u8];
        let err = decode(&bytes, 2).unwrap_err();
        assert!(matches!(err, LzwError::InvalidCode { .. }));
    }
}
