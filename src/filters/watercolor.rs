//! Watercolor filter: separable box blur followed by per-channel
//! posterization.
//!
//! The blur runs as two passes — horizontal then vertical — each
//! averaging a `2r+1` window per channel (edges clamp the window to the
//! image). Radius 0 skips the blur entirely. Posterization then snaps
//! every channel to `floor(c / factor) * factor`, which is lossy and
//! order-independent per pixel. Blur must come first: quantization
//! boundaries land on smoothed gradients instead of sharp pixel edges,
//! which is what produces the soft "paint pooling" look.

use rayon::prelude::*;

use super::params::WatercolorParams;
use crate::buffer::PixelBuffer;

pub fn apply(input: &PixelBuffer, params: &WatercolorParams) -> PixelBuffer {
    let mut out = if params.blur_radius == 0 {
        input.clone()
    } else {
        box_blur(input, params.blur_radius)
    };
    posterize(&mut out, params.color_reduction_factor);
    out
}

/// Separable box blur over all four channels.
fn box_blur(input: &PixelBuffer, radius: u32) -> PixelBuffer {
    let horizontal = blur_rows(input, radius);
    let transposed = transpose(&horizontal);
    let vertical = blur_rows(&transposed, radius);
    transpose(&vertical)
}

/// Blur each row independently with a clamped `2r+1` window.
fn blur_rows(input: &PixelBuffer, radius: u32) -> PixelBuffer {
    let width = input.width() as usize;
    let radius = radius as usize;
    let mut out = input.clone();
    let src = input.as_bytes();
    let stride = width * 4;

    out.rows_mut()
        .enumerate()
        .par_bridge()
        .for_each(|(y, row)| {
            let src_row = &src[y * stride..(y + 1) * stride];
            for x in 0..width {
                let lo = x.saturating_sub(radius);
                let hi = (x + radius).min(width - 1);
                let window = (hi - lo + 1) as u32;
                let mut sums = [0u32; 4];
                for px in src_row[lo * 4..(hi + 1) * 4].chunks_exact(4) {
                    for (sum, &ch) in sums.iter_mut().zip(px) {
                        *sum += ch as u32;
                    }
                }
                let dst = &mut row[x * 4..x * 4 + 4];
                for (d, sum) in dst.iter_mut().zip(sums) {
                    // Rounded integer average keeps the pass deterministic.
                    *d = ((sum + window / 2) / window) as u8;
                }
            }
        });

    out
}

/// Swap rows and columns so the vertical pass can reuse [`blur_rows`].
fn transpose(input: &PixelBuffer) -> PixelBuffer {
    let width = input.width();
    let height = input.height();
    let mut pixels = vec![0u8; input.as_bytes().len()];
    for y in 0..height {
        for x in 0..width {
            let dst = (x as usize * height as usize + y as usize) * 4;
            pixels[dst..dst + 4].copy_from_slice(&input.pixel(x, y));
        }
    }
    // Dimensions swap; the byte length is unchanged, so this cannot fail.
    PixelBuffer::from_rgba(height, width, pixels).expect("transpose preserves length")
}

/// Snap every channel to `floor(c / factor) * factor`.
fn posterize(buffer: &mut PixelBuffer, factor: u32) {
    let factor = factor.clamp(1, 255) as u8;
    if factor == 1 {
        return;
    }
    for row in buffer.rows_mut() {
        for px in row.chunks_exact_mut(4) {
            for ch in px.iter_mut() {
                *ch = (*ch / factor) * factor;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.extend_from_slice(&[
                    (x * 16 % 256) as u8,
                    (y * 16 % 256) as u8,
                    ((x + y) * 8 % 256) as u8,
                    255,
                ]);
            }
        }
        PixelBuffer::from_rgba(width, height, pixels).unwrap()
    }

    #[test]
    fn zero_radius_factor_one_is_identity() {
        let input = gradient(17, 11);
        let out = apply(
            &input,
            &WatercolorParams {
                blur_radius: 0,
                color_reduction_factor: 1,
            },
        );
        assert_eq!(out, input);
    }

    #[test]
    fn blur_preserves_uniform_color() {
        let input = PixelBuffer::filled(10, 10, [60, 120, 180, 255]).unwrap();
        let out = box_blur(&input, 3);
        assert_eq!(out, input);
    }

    #[test]
    fn posterize_buckets_channels() {
        let mut buf = PixelBuffer::filled(1, 1, [0, 31, 200, 255]).unwrap();
        posterize(&mut buf, 32);
        // 0→0, 31→0, 200→192, 255→224
        assert_eq!(buf.pixel(0, 0), [0, 0, 192, 224]);
    }

    #[test]
    fn posterize_factor_zero_treated_as_identity() {
        let mut buf = PixelBuffer::filled(2, 2, [13, 77, 201, 255]).unwrap();
        posterize(&mut buf, 0);
        assert_eq!(buf.pixel(1, 1), [13, 77, 201, 255]);
    }

    #[test]
    fn blur_smooths_a_sharp_edge() {
        // Black | white split: after blurring, the pixel next to the seam
        // must land strictly between the two extremes.
        let mut input = PixelBuffer::filled(10, 4, [0, 0, 0, 255]).unwrap();
        for y in 0..4 {
            for x in 5..10 {
                input.set_pixel(x, y, [255, 255, 255, 255]);
            }
        }
        let out = box_blur(&input, 2);
        let [r, ..] = out.pixel(4, 2);
        assert!(r > 0 && r < 255, "seam pixel should be mid-gray, got {r}");
    }

    #[test]
    fn deterministic_across_invocations() {
        let input = gradient(23, 19);
        let params = WatercolorParams::default();
        assert_eq!(apply(&input, &params), apply(&input, &params));
    }

    #[test]
    fn output_dimensions_match_input() {
        let out = apply(&gradient(13, 7), &WatercolorParams::default());
        assert_eq!((out.width(), out.height()), (13, 7));
    }

    #[test]
    fn transpose_roundtrip() {
        let input = gradient(9, 5);
        assert_eq!(transpose(&transpose(&input)), input);
    }
}
