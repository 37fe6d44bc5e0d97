//! Bucketization of continuous channel values into palette indices.
//!
//! The plain path maps each value to its nearest of `levels` evenly spaced
//! buckets and is strictly monotonic in the input. The dithered path trades
//! that monotonicity for Floyd-Steinberg error diffusion, which hides banding
//! in photographic material.

use snafu::{ensure, Snafu};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum QuantizeError {
    #[snafu(display("posterization levels {levels:?} require more than 256 palette entries"))]
    TooManyLevels { levels: [u16; 3] },

    #[snafu(display("a color table holds at most 256 entries, got {entries}"))]
    TooManyEntries { entries: usize },

    #[snafu(display("each channel needs at least one level, got {levels}"))]
    BadLevelCount { levels: u16 },

    #[snafu(display("palette index {index} out of range for a {table_len}-entry color table"))]
    IndexOutOfRange { index: usize, table_len: usize },

    #[snafu(display("frame has neither a local nor a global color table"))]
    MissingColorTable,
}

/// Maps each value in `[0, 255]` to its bucket index in `[0, levels)`.
pub fn quantize_channel(values: &[f64], levels: u16) -> Result<Vec<u8>, QuantizeError> {
    ensure!((1..=256).contains(&levels), BadLevelCountSnafu { levels });
    let conversion = f64::from(levels - 1) / 255.0;
    Ok(values
        .iter()
        .map(|&v| (conversion * v.clamp(0.0, 255.0) + 0.5) as u8)
        .collect())
}

/// Bucketizes a row-major `width`-wide channel with Floyd-Steinberg error
/// diffusion: quantization error flows right 7/16, down-left 3/16, down 5/16
/// and down-right 1/16.
pub fn quantize_channel_dithered(
    values: &[f64],
    width: usize,
    levels: u16,
) -> Result<Vec<u8>, QuantizeError> {
    ensure!((1..=256).contains(&levels), BadLevelCountSnafu { levels });
    if levels == 1 {
        return Ok(vec![0; values.len()]);
    }
    debug_assert!(width > 0 && values.len() % width == 0);

    let conversion = f64::from(levels - 1) / 255.0;
    let height = values.len() / width;
    let mut working = values.to_vec();
    let mut out = vec![0u8; values.len()];

    for y in 0..height {
        for x in 0..width {
            let at = y * width + x;
            let value = working[at].clamp(0.0, 255.0);
            let bucket = (conversion * value + 0.5).floor();
            out[at] = bucket as u8;

            let error = working[at] - bucket / conversion;
            if x + 1 < width {
                working[at + 1] += 0.4375 * error;
            }
            if y + 1 < height {
                if x > 0 {
                    working[at + width - 1] += 0.1875 * error;
                }
                working[at + width] += 0.3125 * error;
                if x + 1 < width {
                    working[at + width + 1] += 0.0625 * error;
                }
            }
        }
    }
    Ok(out)
}

/// Quantizes three same-shape channels and combines them into one flat
/// palette-index array.
///
/// The combination is mixed-radix with blue fastest-varying, matching
/// [`crate::ColorTable::posterized`]'s enumeration:
/// `index = l_b*l_g*r + l_b*g + b`.
pub fn quantize_rgb(
    channels: [&[f64]; 3],
    levels: [u16; 3],
) -> Result<Vec<u8>, QuantizeError> {
    let product = levels.iter().map(|&l| u32::from(l)).product::<u32>();
    ensure!(product <= 256, TooManyLevelsSnafu { levels });

    let r = quantize_channel(channels[0], levels[0])?;
    let g = quantize_channel(channels[1], levels[1])?;
    let b = quantize_channel(channels[2], levels[2])?;
    Ok(mix_rgb_indices(&r, &g, &b, levels))
}

/// Mixed-radix combination of per-channel bucket indices.
pub fn mix_rgb_indices(r: &[u8], g: &[u8], b: &[u8], levels: [u16; 3]) -> Vec<u8> {
    let g_radix = u32::from(levels[2]);
    let r_radix = u32::from(levels[2]) * u32::from(levels[1]);
    r.iter()
        .zip(g)
        .zip(b)
        .map(|((&r, &g), &b)| {
            (r_radix * u32::from(r) + g_radix * u32::from(g) + u32::from(b)) as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::{palette_to_rgb, ColorTable};

    #[test]
    fn bucketization_is_monotonic_and_bounded() {
        for levels in [2u16, 3, 5, 16, 256] {
            let values: Vec<f64> = (0..=255).map(f64::from).collect();
            let buckets = quantize_channel(&values, levels).unwrap();
            assert!(buckets.windows(2).all(|w| w[0] <= w[1]));
            assert_eq!(buckets[0], 0);
            assert_eq!(buckets[255], (levels - 1) as u8);
        }
    }

    #[test]
    fn zero_levels_is_rejected() {
        assert!(matches!(
            quantize_channel(&[0.0], 0).unwrap_err(),
            QuantizeError::BadLevelCount { levels: 0 }
        ));
        assert!(matches!(
            quantize_channel_dithered(&[0.0], 1, 0).unwrap_err(),
            QuantizeError::BadLevelCount { levels: 0 }
        ));
    }

    #[test]
    fn mixed_radix_is_symmetric_with_the_posterized_table() {
        let levels = [3u16, 4, 2];
        let table = ColorTable::posterized(levels).unwrap();
        for r in 0..levels[0] as u8 {
            for g in 0..levels[1] as u8 {
                for b in 0..levels[2] as u8 {
                    let index = mix_rgb_indices(&[r], &[g], &[b], levels)[0];
                    let entry = table.get(usize::from(index)).unwrap();
                    let expected = [
                        (255.0 * f64::from(r) / f64::from(levels[0] - 1)).round() as u8,
                        (255.0 * f64::from(g) / f64::from(levels[1] - 1)).round() as u8,
                        (255.0 * f64::from(b) / f64::from(levels[2] - 1)).round() as u8,
                    ];
                    assert_eq!(entry, expected, "({r},{g},{b})");
                }
            }
        }
    }

    #[test]
    fn quantize_then_restore_stays_within_tolerance() {
        let levels = [6u16, 7, 6];
        let table = ColorTable::posterized(levels).unwrap();
        let r: Vec<f64> = (0..256).map(f64::from).collect();
        let g: Vec<f64> = (0..256).rev().map(f64::from).collect();
        let b: Vec<f64> = (0..256).map(|i| f64::from(i % 128) * 2.0).collect();

        let indices = quantize_rgb([&r, &g, &b], levels).unwrap();
        let restored = palette_to_rgb(&indices, &table).unwrap();

        for (channel, (original, levels)) in
            restored.iter().zip([(&r, levels[0]), (&g, levels[1]), (&b, levels[2])])
        {
            let tolerance = 255.0 / f64::from(levels - 1) / 2.0 + 1.0;
            for (&restored, &original) in channel.iter().zip(original) {
                assert!(
                    (f64::from(restored) - original).abs() <= tolerance,
                    "{restored} vs {original}"
                );
            }
        }
    }

    #[test]
    fn oversized_level_product_is_rejected() {
        let err = quantize_rgb([&[0.0], &[0.0], &[0.0]], [8, 8, 8]).unwrap_err();
        assert!(matches!(err, QuantizeError::TooManyLevels { levels: [8, 8, 8] }));
    }

    #[test]
    fn dithering_preserves_flat_extremes() {
        // exact endpoint values incur no quantization error to diffuse
        let values = vec![255.0; 9];
        assert_eq!(quantize_channel_dithered(&values, 3, 4).unwrap(), vec![3; 9]);
        let values = vec![0.0; 9];
        assert_eq!(quantize_channel_dithered(&values, 3, 4).unwrap(), vec![0; 9]);
    }

    #[test]
    fn dithering_averages_toward_the_input() {
        // mid-gray between two 2-level buckets: dithering should produce a
        // mix of 0s and 1s rather than a constant plane
        let values = vec![127.5; 64];
        let buckets = quantize_channel_dithered(&values, 8, 2).unwrap();
        let ones = buckets.iter().filter(|&&b| b == 1).count();
        assert!((16..=48).contains(&ones), "got {ones} ones");
    }
}
