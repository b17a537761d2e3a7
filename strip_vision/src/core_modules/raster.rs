// THEORY:
// `Raster` is the "dumb" pixel container for both the input image and the output
// image being reassembled. It knows its extent and channel layout and nothing about
// filtering.
//
// Key architectural principles:
// 1.  **Row-Range Access**: The distributed filter only ever needs row count, column
//     count, channel count, and a way to borrow a contiguous run of rows. `rows()`
//     hands out a `RasterView` that borrows the parent instead of copying.
// 2.  **Position Awareness**: A `RasterView` remembers where it sits inside its parent.
//     The convolution engine uses that to read real neighbour rows across a strip
//     boundary and to pad with zeros only at the true image border.
// 3.  **Interop at the Edge**: Conversions to and from the `image` crate live here so
//     the rest of the engine deals in plain interleaved bytes.

use crate::core_modules::error::{FilterError, Result};
use image::{DynamicImage, RgbImage};
use std::ops::Range;

/// Widest pixel the engine handles (RGBA).
pub const MAX_CHANNELS: usize = 4;

fn check_channels(channels: usize) -> Result<()> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(FilterError::ImageShape {
            reason: format!("unsupported channel count {channels}"),
        });
    }
    Ok(())
}

/// Row-major, channel-interleaved 8-bit image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl Raster {
    pub fn new(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        check_channels(channels)?;
        let expected = width * height * channels;
        if data.len() != expected {
            return Err(FilterError::ImageShape {
                reason: format!(
                    "{width}x{height}x{channels} needs {expected} bytes, buffer holds {}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Trusted constructor for buffers the engine sized itself.
    pub(crate) fn from_parts(width: usize, height: usize, channels: usize, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width * height * channels);
        Self {
            width,
            height,
            channels,
            data,
        }
    }

    /// An all-zero raster, used as the coordinator's output canvas.
    pub fn blank(width: usize, height: usize, channels: usize) -> Result<Self> {
        check_channels(channels)?;
        Ok(Self {
            width,
            height,
            channels,
            data: vec![0u8; width * height * channels],
        })
    }

    /// Builds a raster where every pixel holds the same channel values.
    pub fn filled(width: usize, height: usize, pixel: &[u8]) -> Result<Self> {
        check_channels(pixel.len())?;
        let data = pixel
            .iter()
            .copied()
            .cycle()
            .take(width * height * pixel.len())
            .collect();
        Ok(Self {
            width,
            height,
            channels: pixel.len(),
            data,
        })
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width: width as usize,
            height: height as usize,
            channels: 3,
            data: image.into_raw(),
        }
    }

    pub fn from_dynamic_image(image: &DynamicImage) -> Self {
        Self::from_rgb_image(image.to_rgb8())
    }

    pub fn into_rgb_image(self) -> Result<RgbImage> {
        if self.channels != 3 {
            return Err(FilterError::ImageShape {
                reason: format!("cannot export {} channel raster as RGB", self.channels),
            });
        }
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width as u32, height as u32, self.data).ok_or_else(|| {
            FilterError::ImageShape {
                reason: format!("buffer does not fit a {width}x{height} RGB image"),
            }
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width * self.channels
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let stride = self.stride();
        &self.data[y * stride..(y + 1) * stride]
    }

    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = y * self.stride() + x * self.channels;
        &self.data[start..start + self.channels]
    }

    /// Borrows a contiguous run of rows.
    pub fn rows(&self, range: Range<usize>) -> Result<RasterView<'_>> {
        if range.start > range.end || range.end > self.height {
            return Err(FilterError::ImageShape {
                reason: format!(
                    "row range {}..{} is outside an image of height {}",
                    range.start, range.end, self.height
                ),
            });
        }
        Ok(RasterView {
            parent: self,
            start_row: range.start,
            row_count: range.end - range.start,
        })
    }

    /// Borrows the whole raster.
    pub fn view(&self) -> RasterView<'_> {
        RasterView {
            parent: self,
            start_row: 0,
            row_count: self.height,
        }
    }

    /// Overwrites `bytes.len() / stride` rows starting at `start_row`.
    pub fn write_rows(&mut self, start_row: usize, bytes: &[u8]) -> Result<()> {
        let stride = self.stride();
        if stride == 0 || bytes.len() % stride != 0 {
            return Err(FilterError::ImageShape {
                reason: format!(
                    "{} bytes is not a whole number of {stride}-byte rows",
                    bytes.len()
                ),
            });
        }
        let start = start_row * stride;
        let end = start + bytes.len();
        if end > self.data.len() {
            return Err(FilterError::ImageShape {
                reason: format!(
                    "{} row(s) at {start_row} overflow an image of height {}",
                    bytes.len() / stride,
                    self.height
                ),
            });
        }
        self.data[start..end].copy_from_slice(bytes);
        Ok(())
    }
}

/// A borrowed run of rows inside a parent `Raster`.
#[derive(Debug, Clone, Copy)]
pub struct RasterView<'a> {
    parent: &'a Raster,
    start_row: usize,
    row_count: usize,
}

impl<'a> RasterView<'a> {
    pub fn parent(&self) -> &'a Raster {
        self.parent
    }

    pub fn start_row(&self) -> usize {
        self.start_row
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn width(&self) -> usize {
        self.parent.width
    }

    pub fn channels(&self) -> usize {
        self.parent.channels
    }

    pub fn bytes(&self) -> &'a [u8] {
        let stride = self.parent.stride();
        &self.parent.data[self.start_row * stride..(self.start_row + self.row_count) * stride]
    }

    /// Copies the viewed rows into a standalone raster. The copy no longer sees the
    /// parent's neighbouring rows.
    pub fn to_raster(&self) -> Raster {
        Raster {
            width: self.parent.width,
            height: self.row_count,
            channels: self.parent.channels,
            data: self.bytes().to_vec(),
        }
    }
}
