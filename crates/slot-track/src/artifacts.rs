use std::fs;
use std::path::{Path, PathBuf};

use slot_track_core::{write_matrix, PoseFileError};

use crate::tracker::FrameResult;

#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    PoseFile(#[from] PoseFileError),
}

/// Persists per-frame results under a debug root:
/// `ob_in_cam/{frame_id}.txt` and `slot_poses/{frame_id}_slot{k}.txt`.
///
/// One file per frame id and slot index, overwritten deterministically on a
/// re-run; nothing is merged or versioned.
pub struct ArtifactWriter {
    root: PathBuf,
}

impl ArtifactWriter {
    /// Create the writer and its output directories. Already-existing
    /// directories are fine.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        fs::create_dir_all(root.join("ob_in_cam"))?;
        fs::create_dir_all(root.join("slot_poses"))?;
        Ok(Self { root })
    }

    /// Remove any previous run's contents before creating, the explicit
    /// pre-run clear step.
    pub fn clear_and_create(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        if root.exists() {
            fs::remove_dir_all(&root)?;
        }
        Self::create(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn object_pose_path(&self, frame_id: &str) -> PathBuf {
        self.root.join("ob_in_cam").join(format!("{frame_id}.txt"))
    }

    pub fn slot_pose_path(&self, frame_id: &str, slot: usize) -> PathBuf {
        self.root
            .join("slot_poses")
            .join(format!("{frame_id}_slot{slot}.txt"))
    }

    /// Write the object pose and every slot pose for one frame.
    pub fn write_frame(&self, result: &FrameResult) -> Result<(), ArtifactError> {
        write_matrix(self.object_pose_path(&result.frame_id), &result.object_pose)?;
        for (k, slot_pose) in result.slot_poses.iter().enumerate() {
            write_matrix(self.slot_pose_path(&result.frame_id, k), slot_pose)?;
        }
        Ok(())
    }
}
