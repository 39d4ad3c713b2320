//! The tracking orchestrator.
//!
//! One registration on the first frame establishes tracking state; every
//! later frame is an incremental track. There is no path back to the
//! unregistered state within a run — if tracking drifts, recovery is a
//! deliberate manual restart, never an automatic re-registration.

use image::RgbImage;
use log::{info, warn};
use slot_track_core::RigidTransform;

use crate::artifacts::{ArtifactError, ArtifactWriter};
use crate::estimator::{EstimatorError, PoseEstimator};
use crate::frame::{DepthMap, FrameError, FrameSource};
use crate::slots::{derive_slot_poses, SlotCoord};
use crate::vis::Visualizer;

const RIGID_TOL: f64 = 1e-4;

#[derive(thiserror::Error, Debug)]
pub enum TrackError {
    #[error("registration failed on frame {frame_id}")]
    Registration {
        frame_id: String,
        #[source]
        source: EstimatorError,
    },
    #[error("tracking failed on frame {frame_id}")]
    Tracking {
        frame_id: String,
        #[source]
        source: EstimatorError,
    },
    #[error("could not acquire frame {frame_id}")]
    Acquire {
        frame_id: String,
        #[source]
        source: FrameError,
    },
    #[error("artifact write failed for frame {frame_id}")]
    Artifact {
        frame_id: String,
        #[source]
        source: ArtifactError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackerState {
    Uninitialized,
    Tracking,
}

#[derive(Clone, Copy, Debug)]
pub struct TrackerConfig {
    /// Refinement iterations for the one-shot registration.
    pub register_iterations: usize,
    /// Refinement iterations for each incremental track.
    pub track_iterations: usize,
    /// Extra acquisition attempts for a non-first frame before it is
    /// skipped. Tracking state is never advanced on incomplete data.
    pub acquire_retries: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            register_iterations: 5,
            track_iterations: 2,
            acquire_retries: 2,
        }
    }
}

/// Everything derived for one frame. Written out immediately, then
/// discardable; nothing is accumulated in memory across frames.
#[derive(Clone, Debug)]
pub struct FrameResult {
    pub index: usize,
    pub frame_id: String,
    pub object_pose: RigidTransform,
    pub slot_poses: Vec<RigidTransform>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: usize,
    pub frames_skipped: usize,
    pub last_frame_id: Option<String>,
}

/// Drives one estimator over one frame stream.
///
/// Owns exactly one pose value ("current object pose in camera frame"),
/// created by registration and overwritten by each track. The estimator's
/// internal history is reached only through its two operations.
pub struct Tracker<S: FrameSource, E: PoseEstimator> {
    source: S,
    estimator: E,
    slots: Vec<SlotCoord>,
    config: TrackerConfig,
    state: TrackerState,
    current_pose: Option<RigidTransform>,
}

impl<S: FrameSource, E: PoseEstimator> Tracker<S, E> {
    pub fn new(source: S, estimator: E, slots: Vec<SlotCoord>, config: TrackerConfig) -> Self {
        Self {
            source,
            estimator,
            slots,
            config,
            state: TrackerState::Uninitialized,
            current_pose: None,
        }
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn current_pose(&self) -> Option<&RigidTransform> {
        self.current_pose.as_ref()
    }

    /// Process every frame in order, writing artifacts for each and
    /// feeding the visualizer when one is attached.
    ///
    /// Registration failure on the first frame is fatal. Visualization
    /// failures are logged and never abort artifact writing.
    pub fn run(
        &mut self,
        writer: &ArtifactWriter,
        mut vis: Option<&mut Visualizer>,
    ) -> Result<RunSummary, TrackError> {
        let count = self.source.frame_count();
        let mut summary = RunSummary::default();

        for index in 0..count {
            let frame_id = self.source.id_of(index).to_string();
            info!("frame {index}/{count} ({frame_id})");

            let Some((color, depth)) = self.acquire(index, &frame_id)? else {
                warn!("frame {frame_id}: skipped after repeated acquisition failures");
                summary.frames_skipped += 1;
                continue;
            };

            let result = self.estimate(index, &frame_id, &color, &depth)?;

            writer
                .write_frame(&result)
                .map_err(|source| TrackError::Artifact {
                    frame_id: frame_id.clone(),
                    source,
                })?;

            if let Some(v) = vis.as_deref_mut() {
                if let Err(err) = v.process(&color, &depth, &result) {
                    warn!("frame {frame_id}: visualization failed: {err}");
                }
            }

            summary.frames_processed += 1;
            summary.last_frame_id = Some(frame_id);
        }

        Ok(summary)
    }

    fn estimate(
        &mut self,
        index: usize,
        frame_id: &str,
        color: &RgbImage,
        depth: &DepthMap,
    ) -> Result<FrameResult, TrackError> {
        let k = *self.source.intrinsics();
        let pose = match self.state {
            TrackerState::Uninitialized => {
                let mask =
                    self.source
                        .mask_at(index)
                        .map_err(|source| TrackError::Acquire {
                            frame_id: frame_id.to_string(),
                            source,
                        })?;
                let pose = self
                    .estimator
                    .register(&k, color, depth, &mask, self.config.register_iterations)
                    .map_err(|source| TrackError::Registration {
                        frame_id: frame_id.to_string(),
                        source,
                    })?;
                self.state = TrackerState::Tracking;
                pose
            }
            TrackerState::Tracking => self
                .estimator
                .track(color, depth, &k, self.config.track_iterations)
                .map_err(|source| TrackError::Tracking {
                    frame_id: frame_id.to_string(),
                    source,
                })?,
        };

        if !pose.is_rigid(RIGID_TOL) {
            // Defective estimator output; recorded as-is, never replaced
            // with a default pose.
            warn!("frame {frame_id}: estimator returned a non-rigid pose");
        }
        self.current_pose = Some(pose);

        Ok(FrameResult {
            index,
            frame_id: frame_id.to_string(),
            object_pose: pose,
            slot_poses: derive_slot_poses(&pose, &self.slots),
        })
    }

    /// Acquire color and depth for a frame.
    ///
    /// The first frame must acquire or the run aborts; later frames retry
    /// and are then skipped without touching tracking state.
    fn acquire(
        &mut self,
        index: usize,
        frame_id: &str,
    ) -> Result<Option<(RgbImage, DepthMap)>, TrackError> {
        let attempts = 1 + self.config.acquire_retries;
        let mut last_err = None;
        for attempt in 0..attempts {
            match self.try_acquire(index) {
                Ok(frame) => return Ok(Some(frame)),
                Err(err) => {
                    if attempt + 1 < attempts {
                        warn!("frame {frame_id}: acquisition attempt {attempt} failed: {err}");
                    }
                    last_err = Some(err);
                }
            }
        }

        let source = last_err.unwrap_or(FrameError::OutOfRange {
            index,
            count: self.source.frame_count(),
        });
        if index == 0 {
            return Err(TrackError::Acquire {
                frame_id: frame_id.to_string(),
                source,
            });
        }
        Ok(None)
    }

    fn try_acquire(&mut self, index: usize) -> Result<(RgbImage, DepthMap), FrameError> {
        let color = self.source.color_at(index)?;
        let depth = self.source.depth_at(index)?;
        if depth.width() != color.width() || depth.height() != color.height() {
            return Err(FrameError::SizeMismatch {
                id: self.source.id_of(index).to_string(),
                kind: "depth",
                got_w: depth.width(),
                got_h: depth.height(),
                want_w: color.width(),
                want_h: color.height(),
            });
        }
        Ok((color, depth))
    }
}
