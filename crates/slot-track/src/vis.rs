//! Debug overlay rendering and level-gated persistence.
//!
//! Artifact writing and visualization are deliberately decoupled: any
//! failure here is reported to the caller, logged, and never allowed to
//! abort pose persistence.

use std::fs;
use std::path::PathBuf;

use image::{Rgb, RgbImage};
use nalgebra::{Point2, Point3};
use slot_track_core::{Intrinsics, RigidTransform};

use crate::cloud::{depth_to_points, write_ply};
use crate::debug::DebugSinks;
use crate::frame::DepthMap;
use crate::mesh::{MeshError, Obb, TriMesh};
use crate::tracker::FrameResult;

const OBJECT_AXIS_SCALE: f64 = 0.1;
const SLOT_AXIS_SCALE: f64 = 0.05;
const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 255]);

#[derive(thiserror::Error, Debug)]
pub enum VisError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Mesh(#[from] MeshError),
    #[error("display failed: {0}")]
    Display(String),
}

/// Interactive presentation of an annotated frame, e.g. an on-screen
/// window. External collaborator: a headless run simply attaches none.
pub trait DisplaySink {
    fn show(&mut self, frame_id: &str, image: &RgbImage) -> Result<(), VisError>;
}

/// Renders debug output for each frame according to the enabled sinks.
pub struct Visualizer {
    sinks: DebugSinks,
    intrinsics: Intrinsics,
    mesh: TriMesh,
    obb: Obb,
    root: PathBuf,
    display: Option<Box<dyn DisplaySink>>,
}

impl Visualizer {
    pub fn new(
        sinks: DebugSinks,
        intrinsics: Intrinsics,
        mesh: TriMesh,
        root: impl Into<PathBuf>,
    ) -> Result<Self, VisError> {
        let obb = mesh.oriented_bounds()?;
        let root = root.into();
        if sinks.persist_vis {
            fs::create_dir_all(root.join("track_vis"))?;
        }
        Ok(Self {
            sinks,
            intrinsics,
            mesh,
            obb,
            root,
            display: None,
        })
    }

    pub fn with_display(mut self, display: Box<dyn DisplaySink>) -> Self {
        self.display = Some(display);
        self
    }

    pub fn sinks(&self) -> DebugSinks {
        self.sinks
    }

    /// Run every enabled sink for one frame.
    ///
    /// The overlay is drawn on a copy of the color frame; the input is
    /// never modified. A failing display (e.g. a headless run) is held
    /// back until the persistence sinks have run, so an interactive
    /// failure never costs the on-disk outputs for the frame.
    pub fn process(
        &mut self,
        color: &RgbImage,
        depth: &DepthMap,
        result: &FrameResult,
    ) -> Result<(), VisError> {
        if !self.sinks.any() {
            return Ok(());
        }

        let annotated = self.annotate(color, result);
        let mut display_err = None;
        if let Some(display) = self.display.as_mut() {
            if let Err(err) = display.show(&result.frame_id, &annotated) {
                display_err = Some(err);
            }
        }

        if self.sinks.persist_vis {
            let path = self
                .root
                .join("track_vis")
                .join(format!("{}.png", result.frame_id));
            annotated.save(path)?;
        }

        if self.sinks.export_scene {
            // Not frame-indexed: overwritten on every emission.
            self.mesh
                .transformed(&result.object_pose)
                .write_obj(self.root.join("model_tf.obj"))?;
            let points = depth_to_points(depth, color, &self.intrinsics);
            write_ply(self.root.join("scene_complete.ply"), &points)?;
        }

        match display_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Draw the oriented box, the object axis triad and one smaller triad
    /// per slot onto a copy of the frame.
    pub fn annotate(&self, color: &RgbImage, result: &FrameResult) -> RgbImage {
        let mut img = color.clone();
        let from_origin = self.obb.to_origin.inverse();
        let center_pose = result.object_pose.compose(&from_origin);

        self.draw_box(&mut img, &center_pose);
        self.draw_axes(&mut img, &center_pose, OBJECT_AXIS_SCALE, 3);
        for slot_pose in &result.slot_poses {
            let slot_center = slot_pose.compose(&from_origin);
            self.draw_axes(&mut img, &slot_center, SLOT_AXIS_SCALE, 2);
        }
        img
    }

    fn draw_box(&self, img: &mut RgbImage, center_pose: &RigidTransform) {
        let corners = self.obb.corners();
        for (a, b) in Obb::edges() {
            let pa = center_pose.transform_point(&corners[a]);
            let pb = center_pose.transform_point(&corners[b]);
            if let (Some(ua), Some(ub)) =
                (self.intrinsics.project(&pa), self.intrinsics.project(&pb))
            {
                draw_line(img, ua, ub, BOX_COLOR, 1);
            }
        }
    }

    fn draw_axes(
        &self,
        img: &mut RgbImage,
        pose: &RigidTransform,
        scale: f64,
        thickness: u32,
    ) {
        let origin = pose.transform_point(&Point3::origin());
        let Some(u0) = self.intrinsics.project(&origin) else {
            return;
        };
        let axes = [
            (Point3::new(scale, 0.0, 0.0), Rgb([255, 0, 0])),
            (Point3::new(0.0, scale, 0.0), Rgb([0, 255, 0])),
            (Point3::new(0.0, 0.0, scale), Rgb([0, 0, 255])),
        ];
        for (tip, color) in axes {
            let p = pose.transform_point(&tip);
            if let Some(u1) = self.intrinsics.project(&p) {
                draw_line(img, u0, u1, color, thickness);
            }
        }
    }
}

/// Bresenham line with a square brush of the given thickness.
fn draw_line(img: &mut RgbImage, a: Point2<f64>, b: Point2<f64>, color: Rgb<u8>, thickness: u32) {
    let (mut x0, mut y0) = (a.x.round() as i64, a.y.round() as i64);
    let (x1, y1) = (b.x.round() as i64, b.y.round() as i64);
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let r = thickness as i64 / 2;

    loop {
        for oy in -r..=r {
            for ox in -r..=r {
                put_pixel(img, x0 + ox, y0 + oy, color);
            }
        }
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[inline]
fn put_pixel(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3 as P3;

    fn flat_mesh() -> TriMesh {
        let mut mesh = TriMesh::default();
        for x in [-0.1, 0.1] {
            for y in [-0.1, 0.1] {
                for z in [-0.02, 0.02] {
                    mesh.vertices.push(P3::new(x, y, z));
                }
            }
        }
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    fn centered_result() -> FrameResult {
        FrameResult {
            index: 0,
            frame_id: "vis".to_string(),
            object_pose: RigidTransform::from_translation(0.0, 0.0, 0.5),
            slot_poses: vec![RigidTransform::from_translation(0.03, 0.0, 0.5)],
        }
    }

    #[test]
    fn annotate_changes_pixels_but_not_input() {
        let dir = tempfile::tempdir().unwrap();
        let vis = Visualizer::new(
            DebugSinks::from_level(1),
            Intrinsics::from_params(300.0, 300.0, 32.0, 32.0),
            flat_mesh(),
            dir.path(),
        )
        .unwrap();

        let color = RgbImage::new(64, 64);
        let annotated = vis.annotate(&color, &centered_result());
        assert_ne!(annotated.as_raw(), color.as_raw());
        assert!(color.as_raw().iter().all(|v| *v == 0));
    }

    #[test]
    fn level_two_persists_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut vis = Visualizer::new(
            DebugSinks::from_level(2),
            Intrinsics::from_params(300.0, 300.0, 32.0, 32.0),
            flat_mesh(),
            dir.path(),
        )
        .unwrap();

        let color = RgbImage::new(64, 64);
        let depth = DepthMap::new(64, 64, vec![0.5; 64 * 64]);
        vis.process(&color, &depth, &centered_result()).unwrap();
        assert!(dir.path().join("track_vis/vis.png").exists());
        assert!(!dir.path().join("model_tf.obj").exists());
    }

    #[test]
    fn level_three_exports_scene() {
        let dir = tempfile::tempdir().unwrap();
        let mut vis = Visualizer::new(
            DebugSinks::from_level(3),
            Intrinsics::from_params(300.0, 300.0, 32.0, 32.0),
            flat_mesh(),
            dir.path(),
        )
        .unwrap();

        let color = RgbImage::new(64, 64);
        let depth = DepthMap::new(64, 64, vec![0.5; 64 * 64]);
        vis.process(&color, &depth, &centered_result()).unwrap();
        assert!(dir.path().join("track_vis/vis.png").exists());
        assert!(dir.path().join("model_tf.obj").exists());
        assert!(dir.path().join("scene_complete.ply").exists());
    }

    struct BrokenDisplay;

    impl DisplaySink for BrokenDisplay {
        fn show(&mut self, _: &str, _: &RgbImage) -> Result<(), VisError> {
            Err(VisError::Display("no window backend".to_string()))
        }
    }

    #[test]
    fn failing_display_surfaces_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut vis = Visualizer::new(
            DebugSinks::from_level(1),
            Intrinsics::from_params(300.0, 300.0, 32.0, 32.0),
            flat_mesh(),
            dir.path(),
        )
        .unwrap()
        .with_display(Box::new(BrokenDisplay));

        let color = RgbImage::new(64, 64);
        let depth = DepthMap::new(64, 64, vec![0.5; 64 * 64]);
        assert!(vis.process(&color, &depth, &centered_result()).is_err());
    }

    #[test]
    fn failing_display_does_not_cost_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let mut vis = Visualizer::new(
            DebugSinks::from_level(3),
            Intrinsics::from_params(300.0, 300.0, 32.0, 32.0),
            flat_mesh(),
            dir.path(),
        )
        .unwrap()
        .with_display(Box::new(BrokenDisplay));

        let color = RgbImage::new(64, 64);
        let depth = DepthMap::new(64, 64, vec![0.5; 64 * 64]);
        let result = centered_result();
        assert!(vis.process(&color, &depth, &result).is_err());
        // The display failure degrades the run; disk output stays whole.
        assert!(dir.path().join("track_vis/vis.png").exists());
        assert!(dir.path().join("model_tf.obj").exists());
        assert!(dir.path().join("scene_complete.ply").exists());
    }
}
