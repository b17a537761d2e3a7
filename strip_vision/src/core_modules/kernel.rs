// THEORY:
// The `Kernel` is the one piece of state every participant shares. It is built
// exactly once, by the coordinator, then replicated verbatim to every worker and
// never mutated again.
//
// The high-pass kernel is the simplest member of its family: every weight is -1
// except the center, which is `size² - 1`. The weights therefore sum to zero, so a
// flat region of the image produces no response while edges are amplified.

use crate::core_modules::error::{FilterError, Result};
use std::fmt;

/// A square, odd-sized convolution matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    size: usize,
    weights: Vec<f32>,
}

impl Kernel {
    /// Builds the high-pass kernel of the given size.
    pub fn high_pass(size: usize) -> Result<Self> {
        Self::check_size(size)?;

        let center = size / 2;
        let center_weight = (size * size - 1) as f32;
        let mut weights = vec![-1.0f32; size * size];
        weights[center * size + center] = center_weight;

        Ok(Self { size, weights })
    }

    /// Rebuilds a kernel from its broadcast form, validating the shape on arrival.
    pub fn from_weights(size: usize, weights: Vec<f32>) -> Result<Self> {
        if size % 2 == 0 || size < 3 {
            return Err(FilterError::MalformedKernel {
                reason: format!("size {size} is not an odd number >= 3"),
            });
        }
        if weights.len() != size * size {
            return Err(FilterError::MalformedKernel {
                reason: format!(
                    "expected {} weights for a {size}x{size} kernel, got {}",
                    size * size,
                    weights.len()
                ),
            });
        }
        Ok(Self { size, weights })
    }

    /// Checks a requested size without building anything.
    pub(crate) fn check_size(size: usize) -> Result<()> {
        if size % 2 == 0 || size < 3 {
            return Err(FilterError::InvalidKernelSize { size });
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of padding rows/columns needed on each side: `(size - 1) / 2`.
    pub fn radius(&self) -> usize {
        (self.size - 1) / 2
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn weight(&self, row: usize, col: usize) -> f32 {
        self.weights[row * self.size + col]
    }

    pub fn sum(&self) -> f32 {
        self.weights.iter().sum()
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (row_index, row) in self.weights.chunks(self.size).enumerate() {
            if row_index > 0 {
                write!(f, ";\n ")?;
            }
            let cells: Vec<String> = row.iter().map(|w| format!("{w}")).collect();
            write!(f, "{}", cells.join(", "))?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_zero_for_every_valid_size() {
        for size in (3..=41).step_by(2) {
            let kernel = Kernel::high_pass(size).unwrap();
            assert_eq!(kernel.sum(), 0.0, "size {size}");
            assert_eq!(kernel.weights().len(), size * size);
        }
    }

    #[test]
    fn rejects_even_and_small_sizes() {
        for size in [0, 1, 2, 4, 6, 10, 64] {
            assert_eq!(
                Kernel::high_pass(size),
                Err(FilterError::InvalidKernelSize { size })
            );
        }
    }

    #[test]
    fn three_by_three_matches_the_classic_laplacian_like_mask() {
        let kernel = Kernel::high_pass(3).unwrap();
        assert_eq!(
            kernel.weights(),
            &[-1.0, -1.0, -1.0, -1.0, 8.0, -1.0, -1.0, -1.0, -1.0]
        );
        assert_eq!(kernel.radius(), 1);
        assert_eq!(kernel.to_string(), "[-1, -1, -1;\n -1, 8, -1;\n -1, -1, -1]");
    }

    #[test]
    fn center_of_larger_kernel_holds_the_positive_weight() {
        let kernel = Kernel::high_pass(5).unwrap();
        assert_eq!(kernel.weight(2, 2), 24.0);
        assert_eq!(kernel.weight(0, 0), -1.0);
        assert_eq!(kernel.weight(4, 3), -1.0);
        assert_eq!(kernel.radius(), 2);
    }

    #[test]
    fn rebuilding_from_weights_validates_shape() {
        let original = Kernel::high_pass(3).unwrap();
        let rebuilt = Kernel::from_weights(3, original.weights().to_vec()).unwrap();
        assert_eq!(rebuilt, original);

        assert!(matches!(
            Kernel::from_weights(3, vec![0.0; 8]),
            Err(FilterError::MalformedKernel { .. })
        ));
        assert!(matches!(
            Kernel::from_weights(4, vec![0.0; 16]),
            Err(FilterError::MalformedKernel { .. })
        ));
    }
}
