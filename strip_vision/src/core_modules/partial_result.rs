// THEORY:
// A `PartialResult` is the only thing a worker ever sends back: one computed strip
// plus the metadata that says where it goes. Instead of trusting raw memory layout,
// it has an explicit wire form that is checked when it arrives:
//
//     offset  0  u32 LE  start_row
//     offset  4  u32 LE  width
//     offset  8  u32 LE  height
//     offset 12  u32 LE  channels
//     offset 16  ..      height * width * channels pixel bytes
//
// Metadata always precedes the payload inside a single frame, so a receiver can
// never pair one worker's header with another worker's pixels.

use crate::core_modules::error::{FilterError, Result};
use crate::core_modules::raster::Raster;
use std::ops::Range;

pub const HEADER_LEN: usize = 16;

/// One computed strip in transit from a worker to the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialResult {
    pub start_row: usize,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub pixel_bytes: Vec<u8>,
}

impl PartialResult {
    pub fn from_strip(start_row: usize, strip: Raster) -> Self {
        Self {
            start_row,
            width: strip.width(),
            height: strip.height(),
            channels: strip.channels(),
            pixel_bytes: strip.into_bytes(),
        }
    }

    pub fn rows(&self) -> Range<usize> {
        self.start_row..self.start_row + self.height
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut frame = Vec::with_capacity(HEADER_LEN + self.pixel_bytes.len());
        for (name, value) in [
            ("start_row", self.start_row),
            ("width", self.width),
            ("height", self.height),
            ("channels", self.channels),
        ] {
            let value = u32::try_from(value).map_err(|_| {
                FilterError::transport(format!(
                    "{name} {value} does not fit the 32-bit wire header"
                ))
            })?;
            frame.extend_from_slice(&value.to_le_bytes());
        }
        frame.extend_from_slice(&self.pixel_bytes);
        Ok(frame)
    }

    /// Decodes a frame received from `rank`. Only the frame's self-consistency is
    /// checked here; placement against the image is the assembler's job.
    pub fn decode(rank: usize, frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_LEN {
            return Err(FilterError::malformed(
                rank,
                format!(
                    "frame of {} bytes is shorter than the {HEADER_LEN}-byte header",
                    frame.len()
                ),
            ));
        }

        let field = |index: usize| {
            let offset = index * 4;
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&frame[offset..offset + 4]);
            u32::from_le_bytes(bytes) as usize
        };
        let (start_row, width, height, channels) = (field(0), field(1), field(2), field(3));

        let payload = &frame[HEADER_LEN..];
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or_else(|| FilterError::malformed(rank, "strip dimensions overflow"))?;
        if payload.len() != expected {
            return Err(FilterError::malformed(
                rank,
                format!(
                    "{width}x{height}x{channels} strip needs {expected} payload bytes, \
                     frame carries {}",
                    payload.len()
                ),
            ));
        }

        Ok(Self {
            start_row,
            width,
            height,
            channels,
            pixel_bytes: payload.to_vec(),
        })
    }
}
