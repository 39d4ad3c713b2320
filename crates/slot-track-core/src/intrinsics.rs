use std::fs;
use std::path::Path;

use nalgebra::{Matrix3, Point2, Point3};

/// Errors loading a camera matrix from its text representation.
#[derive(thiserror::Error, Debug)]
pub enum IntrinsicsError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("camera matrix line {line}: expected 3 values, got {got}")]
    BadShape { line: usize, got: usize },
    #[error("camera matrix: expected 3 lines, got {got}")]
    BadLineCount { got: usize },
    #[error("camera matrix line {line}: invalid float '{token}'")]
    BadFloat { line: usize, token: String },
}

/// Pinhole camera matrix `[[fx,0,ppx],[0,fy,ppy],[0,0,1]]`.
///
/// Loaded once at pipeline start and immutable for the duration of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intrinsics {
    pub k: Matrix3<f64>,
}

impl Intrinsics {
    pub fn new(k: Matrix3<f64>) -> Self {
        Self { k }
    }

    pub fn from_params(fx: f64, fy: f64, ppx: f64, ppy: f64) -> Self {
        Self {
            k: Matrix3::new(fx, 0.0, ppx, 0.0, fy, ppy, 0.0, 0.0, 1.0),
        }
    }

    #[inline]
    pub fn fx(&self) -> f64 {
        self.k[(0, 0)]
    }

    #[inline]
    pub fn fy(&self) -> f64 {
        self.k[(1, 1)]
    }

    #[inline]
    pub fn ppx(&self) -> f64 {
        self.k[(0, 2)]
    }

    #[inline]
    pub fn ppy(&self) -> f64 {
        self.k[(1, 2)]
    }

    /// Project a camera-frame point to pixel coordinates.
    ///
    /// Returns `None` for points at or behind the camera plane.
    pub fn project(&self, p: &Point3<f64>) -> Option<Point2<f64>> {
        if p.z <= 0.0 {
            return None;
        }
        Some(Point2::new(
            self.fx() * p.x / p.z + self.ppx(),
            self.fy() * p.y / p.z + self.ppy(),
        ))
    }

    /// Back-project a pixel with known metric depth into the camera frame.
    pub fn back_project(&self, u: f64, v: f64, depth: f64) -> Point3<f64> {
        Point3::new(
            (u - self.ppx()) * depth / self.fx(),
            (v - self.ppy()) * depth / self.fy(),
            depth,
        )
    }

    /// Load a camera matrix from a text file: three lines of three
    /// space-separated floats.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, IntrinsicsError> {
        let raw = fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self, IntrinsicsError> {
        let mut rows = Vec::with_capacity(3);
        for (idx, line) in raw.lines().filter(|l| !l.trim().is_empty()).enumerate() {
            let mut row = [0.0_f64; 3];
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != 3 {
                return Err(IntrinsicsError::BadShape {
                    line: idx,
                    got: tokens.len(),
                });
            }
            for (j, token) in tokens.iter().enumerate() {
                row[j] = token.parse().map_err(|_| IntrinsicsError::BadFloat {
                    line: idx,
                    token: (*token).to_string(),
                })?;
            }
            rows.push(row);
        }
        if rows.len() != 3 {
            return Err(IntrinsicsError::BadLineCount { got: rows.len() });
        }
        let mut k = Matrix3::zeros();
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                k[(i, j)] = *v;
            }
        }
        Ok(Self { k })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn parses_three_by_three() {
        let k = Intrinsics::parse("615.0 0.0 320.5\n0.0 615.0 240.5\n0.0 0.0 1.0\n").unwrap();
        assert_relative_eq!(k.fx(), 615.0);
        assert_relative_eq!(k.ppy(), 240.5);
    }

    #[test]
    fn rejects_short_row() {
        let err = Intrinsics::parse("615.0 0.0\n0.0 615.0 240.5\n0.0 0.0 1.0\n").unwrap_err();
        assert!(matches!(err, IntrinsicsError::BadShape { line: 0, got: 2 }));
    }

    #[test]
    fn rejects_wrong_line_count() {
        let err = Intrinsics::parse("615.0 0.0 320.5\n0.0 615.0 240.5\n").unwrap_err();
        assert!(matches!(err, IntrinsicsError::BadLineCount { got: 2 }));
    }

    #[test]
    fn project_back_project_round_trip() {
        let k = Intrinsics::from_params(600.0, 610.0, 320.0, 240.0);
        let p = Point3::new(0.1, -0.05, 0.75);
        let uv = k.project(&p).unwrap();
        let q = k.back_project(uv.x, uv.y, p.z);
        assert_relative_eq!(p.x, q.x, epsilon = 1e-12);
        assert_relative_eq!(p.y, q.y, epsilon = 1e-12);
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        let k = Intrinsics::from_params(600.0, 600.0, 320.0, 240.0);
        assert!(k.project(&Point3::new(0.0, 0.0, -1.0)).is_none());
        assert!(k.project(&Point3::new(0.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn loads_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "500.0 0.0 319.5").unwrap();
        writeln!(f, "0.0 501.0 239.5").unwrap();
        writeln!(f, "0.0 0.0 1.0").unwrap();
        let k = Intrinsics::load(f.path()).unwrap();
        assert_relative_eq!(k.fy(), 501.0);
    }
}
