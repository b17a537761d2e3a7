// THEORY:
// `OutputAssembly` is the coordinator's half of the gather protocol. It owns the output
// canvas and a per-row "filled" bitmap. Every incoming `PartialResult` is checked
// against the image and against what has already arrived before a single byte is
// copied. Placement comes from the strip's own `start_row`, never from arrival order.
//
// Any violation is fatal: there is no repair path and no partial-success mode.

use crate::core_modules::error::{FilterError, Result};
use crate::core_modules::partial_result::PartialResult;
use crate::core_modules::raster::Raster;

/// The output image under construction.
pub struct OutputAssembly {
    canvas: Raster,
    filled: Vec<bool>,
}

impl OutputAssembly {
    pub fn new(width: usize, height: usize, channels: usize) -> Result<Self> {
        Ok(Self {
            canvas: Raster::blank(width, height, channels)?,
            filled: vec![false; height],
        })
    }

    /// Validates `partial` from `rank` and copies it into place.
    pub fn stitch(&mut self, rank: usize, partial: &PartialResult) -> Result<()> {
        if partial.width != self.canvas.width() || partial.channels != self.canvas.channels() {
            return Err(FilterError::malformed(
                rank,
                format!(
                    "strip is {} px x {} ch, image is {} px x {} ch",
                    partial.width,
                    partial.channels,
                    self.canvas.width(),
                    self.canvas.channels()
                ),
            ));
        }
        if partial.height == 0 {
            return Err(FilterError::malformed(rank, "strip has no rows"));
        }
        let expected = partial.width * partial.height * partial.channels;
        if partial.pixel_bytes.len() != expected {
            return Err(FilterError::malformed(
                rank,
                format!("expected {expected} payload bytes, got {}", partial.pixel_bytes.len()),
            ));
        }

        let rows = partial.rows();
        if rows.end > self.canvas.height() {
            return Err(FilterError::malformed(
                rank,
                format!(
                    "rows {}..{} fall outside an image of height {}",
                    rows.start,
                    rows.end,
                    self.canvas.height()
                ),
            ));
        }
        if let Some(row) = rows.clone().find(|&row| self.filled[row]) {
            return Err(FilterError::malformed(
                rank,
                format!("row {row} was already filled by an earlier strip"),
            ));
        }

        self.canvas.write_rows(rows.start, &partial.pixel_bytes)?;
        self.filled[rows].iter_mut().for_each(|filled| *filled = true);
        Ok(())
    }

    pub fn missing_rows(&self) -> usize {
        self.filled.iter().filter(|filled| !**filled).count()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_rows() == 0
    }

    /// Hands back the finished image, or fails if any row never arrived.
    pub fn finish(self) -> Result<Raster> {
        match self.missing_rows() {
            0 => Ok(self.canvas),
            missing_rows => Err(FilterError::IncompleteAssembly { missing_rows }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(start_row: usize, rows: usize, value: u8) -> PartialResult {
        let raster = Raster::filled(4, rows, &[value, value, value]).unwrap();
        PartialResult::from_strip(start_row, raster)
    }

    #[test]
    fn stitches_strips_by_start_row_regardless_of_arrival_order() {
        let mut assembly = OutputAssembly::new(4, 5, 3).unwrap();
        assembly.stitch(1, &strip(4, 1, 40)).unwrap();
        assembly.stitch(2, &strip(2, 2, 20)).unwrap();
        assert!(!assembly.is_complete());
        assembly.stitch(1, &strip(0, 2, 10)).unwrap();

        let image = assembly.finish().unwrap();
        assert_eq!(image.pixel(0, 0), &[10, 10, 10]);
        assert_eq!(image.pixel(3, 3), &[20, 20, 20]);
        assert_eq!(image.pixel(1, 4), &[40, 40, 40]);
    }

    #[test]
    fn rejects_strips_past_the_bottom_edge() {
        let mut assembly = OutputAssembly::new(4, 5, 3).unwrap();
        assert!(matches!(
            assembly.stitch(3, &strip(4, 2, 1)),
            Err(FilterError::MalformedPartialResult { rank: 3, .. })
        ));
    }

    #[test]
    fn rejects_overlapping_strips() {
        let mut assembly = OutputAssembly::new(4, 5, 3).unwrap();
        assembly.stitch(1, &strip(0, 3, 1)).unwrap();
        assert!(matches!(
            assembly.stitch(2, &strip(2, 2, 1)),
            Err(FilterError::MalformedPartialResult { rank: 2, .. })
        ));
    }

    #[test]
    fn rejects_shape_mismatches() {
        let mut assembly = OutputAssembly::new(4, 5, 3).unwrap();
        let narrow = PartialResult::from_strip(0, Raster::blank(3, 1, 3).unwrap());
        assert!(assembly.stitch(1, &narrow).is_err());

        let mut short = strip(0, 1, 1);
        short.pixel_bytes.pop();
        assert!(assembly.stitch(1, &short).is_err());

        assert!(assembly.stitch(1, &strip(1, 0, 1)).is_err());
    }

    #[test]
    fn unfinished_assembly_reports_missing_rows() {
        let mut assembly = OutputAssembly::new(4, 5, 3).unwrap();
        assembly.stitch(1, &strip(0, 3, 1)).unwrap();
        assert_eq!(
            assembly.finish(),
            Err(FilterError::IncompleteAssembly { missing_rows: 2 })
        );
    }
}
