// THEORY:
// The convolution engine is the CPU-bound hot path of the whole system. It slides a
// `Kernel` over a `RasterView` and produces an output strip of exactly the same
// extent ("same" padding), so strips computed independently can be stacked back into
// a full image with no gaps.
//
// Key architectural principles:
// 1.  **Border Policy**: Neighbourhoods that fall outside the parent image read zero.
//     Neighbourhoods that cross a strip boundary but stay inside the image read the
//     parent's real rows, so partition-then-combine equals whole-image convolution.
//     A view over a standalone raster is padded with zeros on all four sides.
// 2.  **Allocation-Free Inner Loop**: Accumulators live on the stack and every read
//     is a slice of the parent buffer. The only allocation is the output strip.
// 3.  **Row Parallelism**: Output rows are independent, so they are split across the
//     rayon pool. Threads share only read-only input and kernel data; the end of the
//     parallel iterator is the barrier before the strip is handed back.
// 4.  **Explicit Narrowing**: Sums are accumulated in `f32` and then narrowed to `u8`
//     by a fixed, documented `Narrowing` policy.

use crate::core_modules::error::FilterError;
use crate::core_modules::kernel::Kernel;
use crate::core_modules::raster::{MAX_CHANNELS, Raster, RasterView};
use rayon::prelude::*;
use std::fmt;
use std::str::FromStr;

/// How an out-of-range weighted sum becomes an 8-bit channel value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Narrowing {
    /// Truncate toward zero, then keep the low 8 bits. `-1` becomes `255` and
    /// `256` becomes `0`.
    #[default]
    Wrap,
    /// Round to nearest, then clamp to `0..=255`.
    Saturate,
}

impl Narrowing {
    #[inline]
    pub fn narrow(self, sum: f32) -> u8 {
        match self {
            Narrowing::Wrap => (sum as i64) as u8,
            Narrowing::Saturate => sum.round().clamp(0.0, 255.0) as u8,
        }
    }
}

impl FromStr for Narrowing {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wrap" => Ok(Narrowing::Wrap),
            "saturate" | "clip" | "clamp" => Ok(Narrowing::Saturate),
            other => Err(FilterError::InvalidConfig {
                reason: format!("unknown narrowing policy '{other}' (expected wrap or saturate)"),
            }),
        }
    }
}

impl fmt::Display for Narrowing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Narrowing::Wrap => write!(f, "wrap"),
            Narrowing::Saturate => write!(f, "saturate"),
        }
    }
}

/// Convolves the rows covered by `view`, returning a raster with the view's extent.
pub fn convolve(view: RasterView<'_>, kernel: &Kernel, narrowing: Narrowing) -> Raster {
    let source = view.parent();
    let stride = source.stride();
    let mut output = vec![0u8; view.row_count() * stride];

    if stride > 0 {
        output
            .par_chunks_mut(stride)
            .enumerate()
            .for_each(|(local_row, out_row)| {
                convolve_row(source, kernel, view.start_row() + local_row, out_row, narrowing);
            });
    }

    Raster::from_parts(source.width(), view.row_count(), source.channels(), output)
}

/// Convolves an entire raster. This is the single-participant path.
pub fn convolve_raster(raster: &Raster, kernel: &Kernel, narrowing: Narrowing) -> Raster {
    convolve(raster.view(), kernel, narrowing)
}

fn convolve_row(
    source: &Raster,
    kernel: &Kernel,
    y: usize,
    out_row: &mut [u8],
    narrowing: Narrowing,
) {
    let width = source.width() as isize;
    let height = source.height() as isize;
    let channels = source.channels();
    let stride = source.stride();
    let size = kernel.size();
    let radius = kernel.radius() as isize;
    let data = source.as_bytes();
    let weights = kernel.weights();

    for (x, out_pixel) in out_row.chunks_exact_mut(channels).enumerate() {
        let mut sum = [0.0f32; MAX_CHANNELS];

        for m in 0..size {
            let sy = y as isize + m as isize - radius;
            if sy < 0 || sy >= height {
                continue;
            }
            let row = &data[sy as usize * stride..(sy as usize + 1) * stride];
            let kernel_row = &weights[m * size..(m + 1) * size];

            for (n, &weight) in kernel_row.iter().enumerate() {
                let sx = x as isize + n as isize - radius;
                if sx < 0 || sx >= width {
                    continue;
                }
                let offset = sx as usize * channels;
                for (acc, &value) in sum.iter_mut().zip(&row[offset..offset + channels]) {
                    *acc += value as f32 * weight;
                }
            }
        }

        for (out, &acc) in out_pixel.iter_mut().zip(sum.iter()) {
            *out = narrowing.narrow(acc);
        }
    }
}
