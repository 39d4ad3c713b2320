//! Directory-backed frame source.
//!
//! Scene layout: `rgb/*.png`, `depth/*.png` (16-bit, millimeters),
//! `masks/*.png` (first frame only is required), `cam_K.txt`. Frame ids are
//! the sorted rgb file stems, typically capture timestamps.

use std::fs;
use std::path::PathBuf;

use image::ImageReader;
use slot_track_core::Intrinsics;

use crate::frame::{DepthMap, FrameError, FrameSource, ObjectMask};

pub struct DirFrameSource {
    root: PathBuf,
    ids: Vec<String>,
    intrinsics: Intrinsics,
    /// Depth PNG value per meter; RealSense-style recordings use 1000.
    depth_scale: f32,
}

impl DirFrameSource {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, FrameError> {
        Self::open_with_depth_scale(root, 1000.0)
    }

    pub fn open_with_depth_scale(
        root: impl Into<PathBuf>,
        depth_scale: f32,
    ) -> Result<Self, FrameError> {
        let root = root.into();
        let intrinsics = Intrinsics::load(root.join("cam_K.txt"))?;

        let mut ids = Vec::new();
        for entry in fs::read_dir(root.join("rgb"))? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("png") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        if ids.is_empty() {
            return Err(FrameError::Empty);
        }

        Ok(Self {
            root,
            ids,
            intrinsics,
            depth_scale,
        })
    }

    fn check_index(&self, index: usize) -> Result<&str, FrameError> {
        self.ids
            .get(index)
            .map(String::as_str)
            .ok_or(FrameError::OutOfRange {
                index,
                count: self.ids.len(),
            })
    }

    fn frame_path(&self, subdir: &str, id: &str) -> PathBuf {
        self.root.join(subdir).join(format!("{id}.png"))
    }
}

impl FrameSource for DirFrameSource {
    fn frame_count(&self) -> usize {
        self.ids.len()
    }

    fn id_of(&self, index: usize) -> &str {
        &self.ids[index]
    }

    fn intrinsics(&self) -> &Intrinsics {
        &self.intrinsics
    }

    fn color_at(&self, index: usize) -> Result<image::RgbImage, FrameError> {
        let id = self.check_index(index)?;
        let img = ImageReader::open(self.frame_path("rgb", id))?
            .decode()?
            .to_rgb8();
        Ok(img)
    }

    fn depth_at(&self, index: usize) -> Result<DepthMap, FrameError> {
        let id = self.check_index(index)?;
        let raw = ImageReader::open(self.frame_path("depth", id))?
            .decode()?
            .to_luma16();
        // Depth must match the color frame pixel-for-pixel; a mismatched
        // recording must never reach back-projection.
        let (color_w, color_h) = image::image_dimensions(self.frame_path("rgb", id))?;
        if raw.width() != color_w || raw.height() != color_h {
            return Err(FrameError::SizeMismatch {
                id: id.to_string(),
                kind: "depth",
                got_w: raw.width(),
                got_h: raw.height(),
                want_w: color_w,
                want_h: color_h,
            });
        }
        let data = raw
            .pixels()
            .map(|p| p.0[0] as f32 / self.depth_scale)
            .collect();
        Ok(DepthMap::new(raw.width(), raw.height(), data))
    }

    fn mask_at(&self, index: usize) -> Result<ObjectMask, FrameError> {
        let id = self.check_index(index)?;
        let path = self.frame_path("masks", id);
        if !path.exists() {
            return Err(FrameError::MissingSample {
                id: id.to_string(),
                kind: "mask",
            });
        }
        let gray = ImageReader::open(path)?.decode()?.to_luma8();
        Ok(ObjectMask::from_gray(&gray))
    }
}
