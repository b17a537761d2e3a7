// THEORY:
// Every failure the distributed filter can hit funnels into one `FilterError`.
// There is no partial-success mode: a run either assembles the full output image
// or stops with one of these variants. Construction-time problems (a bad kernel
// size, a bad config) surface before any participant does work; protocol problems
// surface mid-run and terminate it.

use thiserror::Error;

/// All the ways a filtering run can fail.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// The requested kernel size is even or smaller than 3.
    #[error("invalid kernel size {size}: it must be an odd number >= 3")]
    InvalidKernelSize { size: usize },

    /// A broadcast kernel did not describe a square odd-sized matrix.
    #[error("malformed kernel: {reason}")]
    MalformedKernel { reason: String },

    /// A worker's strip fell outside the image, had the wrong shape, or overlapped
    /// rows that were already filled.
    #[error("malformed partial result from rank {rank}: {reason}")]
    MalformedPartialResult { rank: usize, reason: String },

    /// A send or receive failed at the transport boundary.
    #[error("transport failure: {reason}")]
    TransportFailure { reason: String },

    /// Gathering finished but some rows never arrived.
    #[error("output image incomplete: {missing_rows} row(s) were never filled")]
    IncompleteAssembly { missing_rows: usize },

    /// A blocking convolution task panicked or was cancelled.
    #[error("participant task failed: {reason}")]
    TaskFailed { reason: String },

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A pixel buffer whose length disagrees with its declared dimensions.
    #[error("image shape mismatch: {reason}")]
    ImageShape { reason: String },
}

impl FilterError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::TransportFailure {
            reason: reason.into(),
        }
    }

    pub fn malformed(rank: usize, reason: impl Into<String>) -> Self {
        Self::MalformedPartialResult {
            rank,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FilterError>;
