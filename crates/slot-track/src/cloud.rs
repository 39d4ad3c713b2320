//! Colored point cloud reconstruction from a depth map, and ASCII PLY
//! export for the level-3 scene dump.

use std::fs;
use std::fmt::Write as _;
use std::path::Path;

use image::RgbImage;
use nalgebra::Point3;
use slot_track_core::Intrinsics;

use crate::frame::DepthMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColoredPoint {
    pub position: Point3<f64>,
    pub color: [u8; 3],
}

/// Back-project every valid depth sample into the camera frame, carrying
/// the color of the matching pixel. Pixels with invalid (non-positive or
/// sub-sentinel) depth are excluded.
pub fn depth_to_points(depth: &DepthMap, color: &RgbImage, k: &Intrinsics) -> Vec<ColoredPoint> {
    debug_assert_eq!(depth.width(), color.width());
    debug_assert_eq!(depth.height(), color.height());

    let mut points = Vec::new();
    for y in 0..depth.height() {
        for x in 0..depth.width() {
            if !depth.is_valid(x, y) {
                continue;
            }
            let z = depth.get(x, y) as f64;
            let position = k.back_project(x as f64, y as f64, z);
            let rgb = color.get_pixel(x, y).0;
            points.push(ColoredPoint {
                position,
                color: rgb,
            });
        }
    }
    points
}

/// Write an ASCII PLY with positions and `uchar` RGB.
pub fn write_ply(path: impl AsRef<Path>, points: &[ColoredPoint]) -> std::io::Result<()> {
    let mut out = String::with_capacity(64 + points.len() * 48);
    out.push_str("ply\nformat ascii 1.0\n");
    let _ = writeln!(out, "element vertex {}", points.len());
    out.push_str(
        "property float x\nproperty float y\nproperty float z\n\
         property uchar red\nproperty uchar green\nproperty uchar blue\n\
         end_header\n",
    );
    for p in points {
        let _ = writeln!(
            out,
            "{} {} {} {} {} {}",
            p.position.x, p.position.y, p.position.z, p.color[0], p.color[1], p.color[2]
        );
    }
    fs::write(path, out)
}
