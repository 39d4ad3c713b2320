use std::fs;
use std::path::{Path, PathBuf};

use image::RgbImage;
use slot_track_core::{read_matrix, Intrinsics, PoseFileError, RigidTransform};

use crate::frame::{DepthMap, ObjectMask};

#[derive(thiserror::Error, Debug)]
pub enum EstimatorError {
    #[error("track called before register")]
    NotRegistered,
    #[error("register called twice in one run")]
    AlreadyRegistered,
    #[error("estimator ran out of recorded poses after {consumed} frames")]
    Exhausted { consumed: usize },
    #[error("estimation failed: {reason}")]
    Failed { reason: String },
    #[error(transparent)]
    PoseFile(#[from] PoseFileError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// The pose estimation collaborator.
///
/// Both operations advance adapter-internal tracking history, so neither is
/// idempotent and calls must not overlap. The orchestrator only ever sees
/// the returned pose, never the internal state.
pub trait PoseEstimator {
    /// One-shot pose estimation from a masked frame. Valid only as the
    /// first call of a run; establishes the adapter's tracking state.
    fn register(
        &mut self,
        k: &Intrinsics,
        rgb: &RgbImage,
        depth: &DepthMap,
        mask: &ObjectMask,
        iterations: usize,
    ) -> Result<RigidTransform, EstimatorError>;

    /// Incremental pose update from the previous state and new frame data.
    /// Requires a prior `register` in the same run.
    fn track(
        &mut self,
        rgb: &RgbImage,
        depth: &DepthMap,
        k: &Intrinsics,
        iterations: usize,
    ) -> Result<RigidTransform, EstimatorError>;
}

/// Replays poses recorded to an `ob_in_cam/` directory by a previous run,
/// in sorted filename order.
///
/// Useful for re-deriving slot poses and visualizations offline, and as the
/// reference implementation of the estimator contract.
pub struct ReplayEstimator {
    files: Vec<PathBuf>,
    cursor: usize,
    registered: bool,
}

impl ReplayEstimator {
    pub fn open(poses_dir: impl AsRef<Path>) -> Result<Self, EstimatorError> {
        let mut files = Vec::new();
        for entry in fs::read_dir(poses_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("txt") {
                files.push(path);
            }
        }
        files.sort();
        Ok(Self {
            files,
            cursor: 0,
            registered: false,
        })
    }

    pub fn remaining(&self) -> usize {
        self.files.len().saturating_sub(self.cursor)
    }

    fn next_pose(&mut self) -> Result<RigidTransform, EstimatorError> {
        let path = self
            .files
            .get(self.cursor)
            .ok_or(EstimatorError::Exhausted {
                consumed: self.cursor,
            })?;
        let pose = read_matrix(path)?;
        self.cursor += 1;
        Ok(pose)
    }
}

impl PoseEstimator for ReplayEstimator {
    fn register(
        &mut self,
        _k: &Intrinsics,
        _rgb: &RgbImage,
        _depth: &DepthMap,
        mask: &ObjectMask,
        _iterations: usize,
    ) -> Result<RigidTransform, EstimatorError> {
        if self.registered {
            return Err(EstimatorError::AlreadyRegistered);
        }
        if mask.count_set() == 0 {
            return Err(EstimatorError::Failed {
                reason: "object mask is empty".to_string(),
            });
        }
        let pose = self.next_pose()?;
        self.registered = true;
        Ok(pose)
    }

    fn track(
        &mut self,
        _rgb: &RgbImage,
        _depth: &DepthMap,
        _k: &Intrinsics,
        _iterations: usize,
    ) -> Result<RigidTransform, EstimatorError> {
        if !self.registered {
            return Err(EstimatorError::NotRegistered);
        }
        self.next_pose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slot_track_core::write_matrix;

    fn blank_frame() -> (Intrinsics, RgbImage, DepthMap, ObjectMask) {
        (
            Intrinsics::from_params(600.0, 600.0, 4.0, 3.0),
            RgbImage::new(8, 6),
            DepthMap::new(8, 6, vec![0.5; 48]),
            ObjectMask::new(8, 6, vec![true; 48]),
        )
    }

    #[test]
    fn replays_poses_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, tx) in [("0002.txt", 2.0), ("0001.txt", 1.0), ("0003.txt", 3.0)] {
            let pose = RigidTransform::from_translation(tx, 0.0, 0.0);
            write_matrix(dir.path().join(name), &pose).unwrap();
        }
        let mut est = ReplayEstimator::open(dir.path()).unwrap();
        let (k, rgb, depth, mask) = blank_frame();

        let p0 = est.register(&k, &rgb, &depth, &mask, 5).unwrap();
        assert!((p0.translation().x - 1.0).abs() < 1e-12);
        let p1 = est.track(&rgb, &depth, &k, 2).unwrap();
        assert!((p1.translation().x - 2.0).abs() < 1e-12);
        assert_eq!(est.remaining(), 1);
    }

    #[test]
    fn track_before_register_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut est = ReplayEstimator::open(dir.path()).unwrap();
        let (k, rgb, depth, _) = blank_frame();
        assert!(matches!(
            est.track(&rgb, &depth, &k, 2),
            Err(EstimatorError::NotRegistered)
        ));
    }

    #[test]
    fn empty_mask_fails_registration() {
        let dir = tempfile::tempdir().unwrap();
        write_matrix(dir.path().join("0.txt"), &RigidTransform::identity()).unwrap();
        let mut est = ReplayEstimator::open(dir.path()).unwrap();
        let (k, rgb, depth, _) = blank_frame();
        let empty = ObjectMask::new(8, 6, vec![false; 48]);
        assert!(matches!(
            est.register(&k, &rgb, &depth, &empty, 5),
            Err(EstimatorError::Failed { .. })
        ));
    }

    #[test]
    fn exhaustion_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_matrix(dir.path().join("0.txt"), &RigidTransform::identity()).unwrap();
        let mut est = ReplayEstimator::open(dir.path()).unwrap();
        let (k, rgb, depth, mask) = blank_frame();
        est.register(&k, &rgb, &depth, &mask, 5).unwrap();
        assert!(matches!(
            est.track(&rgb, &depth, &k, 2),
            Err(EstimatorError::Exhausted { consumed: 1 })
        ));
    }
}
