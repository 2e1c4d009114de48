//! Oil-painting filter: a kernel-mode (intensity-histogram) filter.
//!
//! For each interior pixel, every neighbor in the `(2r+1)²` window is
//! binned by quantized intensity `floor(mean(R,G,B) · (levels−1) / 255)`,
//! accumulating a count and RGB sums per bin. The output pixel takes the
//! average color of the most populated bin — the mode of the intensity
//! histogram — which flattens texture into the characteristic posterized
//! brush-stroke patches. Ties go to the lowest bin index (first seen in
//! scan order).
//!
//! Border pixels (within `oil_radius` of any edge) are copied through
//! from the source unchanged. The kiosk's original implementation left
//! them zero-initialized, giving every print a black picture-frame
//! artifact; copy-through is the deliberate fix and is pinned by
//! `uniform_input_is_preserved_including_border`.

use rayon::prelude::*;

use super::params::OilPaintingParams;
use crate::buffer::PixelBuffer;

pub fn apply(input: &PixelBuffer, params: &OilPaintingParams) -> PixelBuffer {
    let width = input.width() as usize;
    let height = input.height() as usize;
    let radius = params.oil_radius as usize;
    let levels = params.oil_intensity.max(1) as usize;

    // Border pixels (and everything, until overwritten) come from the source.
    let mut output = input.clone();
    if width <= 2 * radius || height <= 2 * radius {
        return output;
    }

    let src = input.as_bytes();
    let stride = width * 4;

    output
        .rows_mut()
        .enumerate()
        .skip(radius)
        .take(height - 2 * radius)
        .par_bridge()
        .for_each(|(y, row)| {
            let mut counts = vec![0u32; levels];
            let mut sums = vec![[0u32; 3]; levels];

            for x in radius..width - radius {
                counts.fill(0);
                for s in sums.iter_mut() {
                    *s = [0; 3];
                }

                for ny in y - radius..=y + radius {
                    let row_base = ny * stride;
                    for nx in x - radius..=x + radius {
                        let i = row_base + nx * 4;
                        let r = src[i] as u32;
                        let g = src[i + 1] as u32;
                        let b = src[i + 2] as u32;
                        // floor(mean(R,G,B) * (levels-1) / 255) in integers.
                        let bin = ((r + g + b) as usize * (levels - 1) / 765).min(levels - 1);
                        counts[bin] += 1;
                        sums[bin][0] += r;
                        sums[bin][1] += g;
                        sums[bin][2] += b;
                    }
                }

                // Mode of the histogram; strict comparison keeps the
                // lowest bin on ties.
                let mut mode = 0;
                for (bin, &count) in counts.iter().enumerate().skip(1) {
                    if count > counts[mode] {
                        mode = bin;
                    }
                }

                let count = counts[mode].max(1);
                let dst = &mut row[x * 4..x * 4 + 4];
                dst[0] = (sums[mode][0] / count) as u8;
                dst[1] = (sums[mode][1] / count) as u8;
                dst[2] = (sums[mode][2] / count) as u8;
                dst[3] = src[y * stride + x * 4 + 3];
            }
        });

    output
}
