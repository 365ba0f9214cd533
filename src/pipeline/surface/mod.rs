//! Surface extraction for one subject: marching-cubes with a distance-error
//! driven retry, sphere interpolation, model-predicted smoothing, and final
//! QC flagging.

pub mod orchestrator;
pub mod types;

pub use orchestrator::SurfaceExtractor;
pub use types::*;
