use image::RgbImage;
use slot_track_core::Intrinsics;

/// Depth samples at or below this value (meters) are treated as invalid.
pub const MIN_DEPTH: f32 = 1e-3;

/// Errors surfaced by a frame source.
#[derive(thiserror::Error, Debug)]
pub enum FrameError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Intrinsics(#[from] slot_track_core::IntrinsicsError),
    #[error("frame index {index} out of range (frame count {count})")]
    OutOfRange { index: usize, count: usize },
    #[error("frame {id}: missing {kind} sample")]
    MissingSample { id: String, kind: &'static str },
    #[error("frame {id}: {kind} is {got_w}x{got_h}, expected {want_w}x{want_h}")]
    SizeMismatch {
        id: String,
        kind: &'static str,
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    },
    #[error("scene contains no frames")]
    Empty,
}

/// Metric depth map, same resolution as the color frame. Invalid pixels
/// carry a non-positive sentinel.
#[derive(Clone, Debug)]
pub struct DepthMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthMap {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> f32 {
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn is_valid(&self, x: u32, y: u32) -> bool {
        self.get(x, y) >= MIN_DEPTH
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Binary object footprint, required for registration on the first frame.
#[derive(Clone, Debug)]
pub struct ObjectMask {
    width: u32,
    height: u32,
    data: Vec<bool>,
}

impl ObjectMask {
    pub fn new(width: u32, height: u32, data: Vec<bool>) -> Self {
        assert_eq!(data.len(), (width * height) as usize);
        Self {
            width,
            height,
            data,
        }
    }

    /// Threshold a grayscale image: any non-zero sample is object.
    pub fn from_gray(img: &image::GrayImage) -> Self {
        let data = img.pixels().map(|p| p.0[0] > 0).collect();
        Self::new(img.width(), img.height(), data)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> bool {
        self.data[(y * self.width + x) as usize]
    }

    pub fn count_set(&self) -> usize {
        self.data.iter().filter(|v| **v).count()
    }
}

/// Ordered stream of RGB-D frames.
///
/// Frames are consumed strictly in index order by the orchestrator, which
/// never caches anything beyond the frame currently being processed.
pub trait FrameSource {
    fn frame_count(&self) -> usize;

    /// Stable external identifier for a frame, used to key all of its
    /// outputs. Not necessarily the numeric index (often a capture
    /// timestamp).
    fn id_of(&self, index: usize) -> &str;

    /// Camera matrix, constant for the run.
    fn intrinsics(&self) -> &Intrinsics;

    fn color_at(&self, index: usize) -> Result<RgbImage, FrameError>;

    fn depth_at(&self, index: usize) -> Result<DepthMap, FrameError>;

    /// Object mask; only meaningful for `index == 0`.
    fn mask_at(&self, index: usize) -> Result<ObjectMask, FrameError>;
}
