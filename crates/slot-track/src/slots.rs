use serde::{Deserialize, Serialize};
use slot_track_core::RigidTransform;

/// A fixed object-local anchor on the object's reference surface.
///
/// Z is implicitly 0 in the object's local frame; a slot carries no
/// rotation relative to the object.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct SlotCoord {
    pub x: f64,
    pub y: f64,
}

impl SlotCoord {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for SlotCoord {
    fn from(v: [f64; 2]) -> Self {
        Self { x: v[0], y: v[1] }
    }
}

impl From<SlotCoord> for [f64; 2] {
    fn from(c: SlotCoord) -> Self {
        [c.x, c.y]
    }
}

/// Parse a `[[x, y], ...]` JSON list, the form the runner accepts on the
/// command line.
pub fn parse_slot_coords(raw: &str) -> Result<Vec<SlotCoord>, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Map each slot coordinate through the object pose into the camera frame.
///
/// The local slot pose is identity rotation with translation `(x, y, 0)`;
/// the camera-frame pose is `object_pose * local`. Output order equals
/// input order — downstream artifact filenames are keyed by slot index, so
/// coordinates are never reordered, deduplicated, or filtered.
pub fn derive_slot_poses(
    object_pose: &RigidTransform,
    coords: &[SlotCoord],
) -> Vec<RigidTransform> {
    coords
        .iter()
        .map(|c| object_pose.compose(&RigidTransform::from_translation(c.x, c.y, 0.0)))
        .collect()
}
