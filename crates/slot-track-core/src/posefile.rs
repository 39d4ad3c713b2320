//! Text format for 4x4 pose matrices: four lines of four floats in
//! scientific notation, compatible with `numpy.savetxt` output.

use std::fs;
use std::fmt::Write as _;
use std::path::Path;

use crate::RigidTransform;

#[derive(thiserror::Error, Debug)]
pub enum PoseFileError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("pose file {path}: expected 4 lines of 4 values, got {rows} x {cols}")]
    BadShape {
        path: String,
        rows: usize,
        cols: usize,
    },
    #[error("pose file {path}: invalid float '{token}'")]
    BadFloat { path: String, token: String },
}

/// Serialize a transform to its text form without touching disk.
pub fn format_matrix(pose: &RigidTransform) -> String {
    let mut out = String::with_capacity(4 * 4 * 26);
    for row in pose.to_rows() {
        let mut first = true;
        for v in row {
            if !first {
                out.push(' ');
            }
            let _ = write!(out, "{v:.18e}");
            first = false;
        }
        out.push('\n');
    }
    out
}

/// Write a pose as 4 text lines x 4 floats. Overwrites deterministically.
pub fn write_matrix(path: impl AsRef<Path>, pose: &RigidTransform) -> Result<(), PoseFileError> {
    fs::write(path, format_matrix(pose))?;
    Ok(())
}

/// Read a pose previously written by [`write_matrix`].
pub fn read_matrix(path: impl AsRef<Path>) -> Result<RigidTransform, PoseFileError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)?;
    parse_matrix(&raw, &path.display().to_string())
}

fn parse_matrix(raw: &str, path: &str) -> Result<RigidTransform, PoseFileError> {
    let mut rows = [[0.0_f64; 4]; 4];
    let lines: Vec<&str> = raw.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() != 4 {
        return Err(PoseFileError::BadShape {
            path: path.to_string(),
            rows: lines.len(),
            cols: 0,
        });
    }
    for (i, line) in lines.iter().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() != 4 {
            return Err(PoseFileError::BadShape {
                path: path.to_string(),
                rows: lines.len(),
                cols: tokens.len(),
            });
        }
        for (j, token) in tokens.iter().enumerate() {
            rows[i][j] = token.parse().map_err(|_| PoseFileError::BadFloat {
                path: path.to_string(),
                token: (*token).to_string(),
            })?;
        }
    }
    Ok(RigidTransform::from_rows(rows))
}
