//! The canonical in-memory image representation.
//!
//! Every component of the pipeline — filters, engine, queue, workers —
//! speaks [`PixelBuffer`]: width, height, and interleaved RGBA bytes.
//! Decoding camera captures or file uploads into this shape (and encoding
//! results back out) happens at the CLI edge; nothing inside the core
//! touches an image file.
//!
//! Buffers are validated on construction. A zero dimension or a byte
//! length that disagrees with `width * height * 4` is rejected with
//! [`BufferError`] — the queue refuses such input outright rather than
//! creating a job that is doomed to fail mid-flight.
//!
//! Transformations never write into their input: each filter allocates a
//! fresh output buffer. Several of them read neighbor pixels while
//! writing, so aliasing input and output would corrupt the neighborhood
//! reads.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum BufferError {
    #[error("image has zero width or height ({width}x{height})")]
    ZeroDimension { width: u32, height: u32 },
    #[error("pixel data length {actual} does not match {width}x{height}x4 = {expected}")]
    LengthMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// An owned RGBA image: `width * height` pixels, four bytes each.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap existing interleaved RGBA bytes, validating the invariant
    /// `pixels.len() == width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::ZeroDimension { width, height });
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(BufferError::LengthMismatch {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// A buffer filled with a single RGBA color.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, BufferError> {
        if width == 0 || height == 0 {
            return Err(BufferError::ZeroDimension { width, height });
        }
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 4);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels (`width * height`).
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.pixels
    }

    /// Byte offset of the pixel at `(x, y)`. Callers must stay in bounds.
    #[inline]
    pub fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    /// The RGBA quadruple at `(x, y)`.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = self.offset(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        let i = self.offset(x, y);
        self.pixels[i..i + 4].copy_from_slice(&rgba);
    }

    /// Mutable view of the raw bytes, split into rows of `width * 4`.
    ///
    /// Filters hand these rows to rayon: each parallel task owns a
    /// disjoint output row, so parallel passes stay deterministic.
    pub fn rows_mut(&mut self) -> std::slice::ChunksMut<'_, u8> {
        let stride = self.width as usize * 4;
        self.pixels.chunks_mut(stride)
    }
}

/// Clamp a float channel value to the valid byte range, rounding.
#[inline]
pub fn clamp_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_rgba_accepts_matching_length() {
        let buf = PixelBuffer::from_rgba(2, 3, vec![0; 24]).unwrap();
        assert_eq!(buf.width(), 2);
        assert_eq!(buf.height(), 3);
        assert_eq!(buf.pixel_count(), 6);
    }

    #[test]
    fn from_rgba_rejects_zero_width() {
        let err = PixelBuffer::from_rgba(0, 3, vec![]).unwrap_err();
        assert_eq!(err, BufferError::ZeroDimension { width: 0, height: 3 });
    }

    #[test]
    fn from_rgba_rejects_zero_height() {
        let err = PixelBuffer::from_rgba(3, 0, vec![0; 12]).unwrap_err();
        assert_eq!(err, BufferError::ZeroDimension { width: 3, height: 0 });
    }

    #[test]
    fn from_rgba_rejects_length_mismatch() {
        let err = PixelBuffer::from_rgba(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            BufferError::LengthMismatch {
                width: 2,
                height: 2,
                expected: 16,
                actual: 15,
            }
        );
    }

    #[test]
    fn filled_replicates_color() {
        let buf = PixelBuffer::filled(2, 2, [10, 20, 30, 255]).unwrap();
        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(buf.pixel(x, y), [10, 20, 30, 255]);
            }
        }
    }

    #[test]
    fn set_pixel_roundtrip() {
        let mut buf = PixelBuffer::filled(3, 3, [0, 0, 0, 255]).unwrap();
        buf.set_pixel(1, 2, [9, 8, 7, 6]);
        assert_eq!(buf.pixel(1, 2), [9, 8, 7, 6]);
        assert_eq!(buf.pixel(1, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn rows_mut_yields_height_rows() {
        let mut buf = PixelBuffer::filled(4, 3, [1, 2, 3, 4]).unwrap();
        let rows: Vec<_> = buf.rows_mut().collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == 16));
    }

    #[test]
    fn clamp_channel_rounds_and_clamps() {
        assert_eq!(clamp_channel(-4.0), 0);
        assert_eq!(clamp_channel(127.4), 127);
        assert_eq!(clamp_channel(127.5), 128);
        assert_eq!(clamp_channel(300.0), 255);
    }
}
