pub mod assembly;
pub mod convolution;
pub mod error;
pub mod kernel;
pub mod partial_result;
pub mod participant;
pub mod raster;
pub mod strip_planner;
pub mod transport;
