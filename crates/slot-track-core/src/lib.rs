//! Geometry and I/O primitives for the slot-tracking pipeline.
//!
//! This crate is intentionally small and purely geometric. It does *not*
//! depend on any concrete pose estimator or image type.

mod intrinsics;
mod logger;
mod posefile;
mod transform;

pub use intrinsics::{Intrinsics, IntrinsicsError};
pub use logger::init_with_level;
pub use posefile::{read_matrix, write_matrix, PoseFileError};
pub use transform::RigidTransform;
