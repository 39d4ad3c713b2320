//! Frame-to-frame 6-DoF object tracking orchestration.
//!
//! The pose estimator itself is a pluggable collaborator behind the
//! [`PoseEstimator`] trait; this crate sequences registration and tracking
//! across an ordered frame stream, derives camera-frame poses for
//! object-local anchor points ("slots"), and persists every frame's result
//! to a deterministic file layout with optional debug overlays.

mod artifacts;
mod cloud;
mod debug;
mod estimator;
mod frame;
mod mesh;
mod slots;
mod source_dir;
mod tracker;
mod vis;

pub use artifacts::{ArtifactError, ArtifactWriter};
pub use cloud::{depth_to_points, write_ply, ColoredPoint};
pub use debug::DebugSinks;
pub use estimator::{EstimatorError, PoseEstimator, ReplayEstimator};
pub use frame::{DepthMap, FrameError, FrameSource, ObjectMask, MIN_DEPTH};
pub use mesh::{MeshError, Obb, TriMesh};
pub use slots::{derive_slot_poses, parse_slot_coords, SlotCoord};
pub use source_dir::DirFrameSource;
pub use tracker::{FrameResult, RunSummary, TrackError, Tracker, TrackerConfig};
pub use vis::{DisplaySink, VisError, Visualizer};

pub use slot_track_core::{Intrinsics, RigidTransform};
