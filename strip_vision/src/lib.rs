// THEORY:
// This file is the main entry point for the `strip_vision` library crate.
// It exposes `DistributedFilter` and its configuration (`FilterConfig`,
// `Narrowing`) as the high-level interface, together with the building blocks a
// caller may want to drive directly: the `Kernel`, the convolution engine, the
// `StripPlanner`, and the `Transport` seam the participants talk over.
//
// Timing and progress reporting live in `observer`, outside the filtering path.

pub mod core_modules;
pub mod observer;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::error::{FilterError, Result};
pub use pipeline::{DistributedFilter, FilterConfig, FilterReport};
