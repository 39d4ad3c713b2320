//! Triangle mesh loading and oriented bounds.
//!
//! The mesh is used only for visualization: the oriented bounding box and
//! axis triads drawn over the color frame, and the level-3 transformed-mesh
//! export. Estimation logic never touches it.

use std::fs;
use std::fmt::Write as _;
use std::path::Path;

use nalgebra::{Matrix3, Point3, Vector3};
use slot_track_core::RigidTransform;

#[derive(thiserror::Error, Debug)]
pub enum MeshError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("obj line {line}: {reason}")]
    Parse { line: usize, reason: String },
    #[error("mesh has no vertices")]
    Empty,
}

/// Triangulated mesh: vertices, optional per-vertex normals, triangle faces.
#[derive(Clone, Debug, Default)]
pub struct TriMesh {
    pub vertices: Vec<Point3<f64>>,
    pub normals: Vec<Vector3<f64>>,
    pub faces: Vec<[u32; 3]>,
}

impl TriMesh {
    /// Load a Wavefront OBJ. Handles `v`, `vn` and `f` records with any of
    /// the `v`, `v/vt`, `v//vn`, `v/vt/vn` index forms; polygons are fan
    /// triangulated. Other records are ignored.
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self, MeshError> {
        let raw = fs::read_to_string(path)?;
        Self::parse_obj(&raw)
    }

    pub fn parse_obj(raw: &str) -> Result<Self, MeshError> {
        let mut mesh = TriMesh::default();
        for (line_no, line) in raw.lines().enumerate() {
            let mut tokens = line.split_whitespace();
            match tokens.next() {
                Some("v") => {
                    let p = parse_triple(&mut tokens, line_no)?;
                    mesh.vertices.push(Point3::new(p[0], p[1], p[2]));
                }
                Some("vn") => {
                    let n = parse_triple(&mut tokens, line_no)?;
                    mesh.normals.push(Vector3::new(n[0], n[1], n[2]));
                }
                Some("f") => {
                    let mut indices = Vec::with_capacity(4);
                    for token in tokens {
                        let vertex = token.split('/').next().unwrap_or("");
                        let idx: i64 =
                            vertex.parse().map_err(|_| MeshError::Parse {
                                line: line_no,
                                reason: format!("bad face index '{token}'"),
                            })?;
                        if idx < 1 {
                            return Err(MeshError::Parse {
                                line: line_no,
                                reason: format!("unsupported face index {idx}"),
                            });
                        }
                        indices.push((idx - 1) as u32);
                    }
                    if indices.len() < 3 {
                        return Err(MeshError::Parse {
                            line: line_no,
                            reason: "face with fewer than 3 vertices".to_string(),
                        });
                    }
                    for i in 1..indices.len() - 1 {
                        mesh.faces.push([indices[0], indices[i], indices[i + 1]]);
                    }
                }
                _ => {}
            }
        }
        if mesh.vertices.is_empty() {
            return Err(MeshError::Empty);
        }
        Ok(mesh)
    }

    /// A copy of this mesh with every vertex mapped through `pose`
    /// (normals rotate, they do not translate).
    pub fn transformed(&self, pose: &RigidTransform) -> TriMesh {
        let r = pose.rotation();
        TriMesh {
            vertices: self
                .vertices
                .iter()
                .map(|v| pose.transform_point(v))
                .collect(),
            normals: self.normals.iter().map(|n| r * n).collect(),
            faces: self.faces.clone(),
        }
    }

    pub fn write_obj(&self, path: impl AsRef<Path>) -> Result<(), MeshError> {
        let with_normals = self.normals.len() == self.vertices.len();
        let mut out = String::new();
        for v in &self.vertices {
            let _ = writeln!(out, "v {} {} {}", v.x, v.y, v.z);
        }
        if with_normals {
            for n in &self.normals {
                let _ = writeln!(out, "vn {} {} {}", n.x, n.y, n.z);
            }
        }
        for f in &self.faces {
            if with_normals {
                let _ = writeln!(
                    out,
                    "f {}//{} {}//{} {}//{}",
                    f[0] + 1,
                    f[0] + 1,
                    f[1] + 1,
                    f[1] + 1,
                    f[2] + 1,
                    f[2] + 1
                );
            } else {
                let _ = writeln!(out, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1);
            }
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Oriented bounding box from the vertex covariance principal axes.
    pub fn oriented_bounds(&self) -> Result<Obb, MeshError> {
        if self.vertices.is_empty() {
            return Err(MeshError::Empty);
        }
        let n = self.vertices.len() as f64;
        let mut centroid = Vector3::zeros();
        for v in &self.vertices {
            centroid += v.coords;
        }
        centroid /= n;

        let mut cov = Matrix3::zeros();
        for v in &self.vertices {
            let d = v.coords - centroid;
            cov += d * d.transpose();
        }
        cov /= n;

        let eigen = cov.symmetric_eigen();
        let mut axes = eigen.eigenvectors;
        if axes.determinant() < 0.0 {
            let flipped = -axes.column(2).clone_owned();
            axes.set_column(2, &flipped);
        }

        // Extents along the principal axes.
        let mut min = Vector3::repeat(f64::INFINITY);
        let mut max = Vector3::repeat(f64::NEG_INFINITY);
        for v in &self.vertices {
            let local = axes.transpose() * v.coords;
            min = min.inf(&local);
            max = max.sup(&local);
        }
        let center_local = (min + max) * 0.5;
        let half_extents = (max - min) * 0.5;

        // Mesh frame -> box-centered frame.
        let to_origin = RigidTransform::from_parts(axes.transpose(), -center_local);
        Ok(Obb {
            to_origin,
            half_extents,
        })
    }
}

/// Oriented bounding box: `to_origin` maps the mesh frame into a frame
/// centered on the box with axes along its edges.
#[derive(Clone, Copy, Debug)]
pub struct Obb {
    pub to_origin: RigidTransform,
    pub half_extents: Vector3<f64>,
}

impl Obb {
    /// The eight box corners, in the box-centered frame.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let h = self.half_extents;
        let mut out = [Point3::origin(); 8];
        for (i, corner) in out.iter_mut().enumerate() {
            *corner = Point3::new(
                if i & 1 == 0 { -h.x } else { h.x },
                if i & 2 == 0 { -h.y } else { h.y },
                if i & 4 == 0 { -h.z } else { h.z },
            );
        }
        out
    }

    /// Corner index pairs forming the twelve box edges.
    pub fn edges() -> [(usize, usize); 12] {
        [
            (0, 1),
            (2, 3),
            (4, 5),
            (6, 7),
            (0, 2),
            (1, 3),
            (4, 6),
            (5, 7),
            (0, 4),
            (1, 5),
            (2, 6),
            (3, 7),
        ]
    }
}

fn parse_triple<'a>(
    tokens: &mut impl Iterator<Item = &'a str>,
    line_no: usize,
) -> Result<[f64; 3], MeshError> {
    let mut out = [0.0; 3];
    for v in &mut out {
        let token = tokens.next().ok_or_else(|| MeshError::Parse {
            line: line_no,
            reason: "expected 3 components".to_string(),
        })?;
        *v = token.parse().map_err(|_| MeshError::Parse {
            line: line_no,
            reason: format!("bad float '{token}'"),
        })?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const UNIT_QUAD: &str = "\
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vn 0 0 1
vn 0 0 1
vn 0 0 1
vn 0 0 1
f 1//1 2//2 3//3 4//4
";

    #[test]
    fn parses_quad_with_fan_triangulation() {
        let mesh = TriMesh::parse_obj(UNIT_QUAD).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.normals.len(), 4);
        assert_eq!(mesh.faces, vec![[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn rejects_empty_obj() {
        assert!(matches!(
            TriMesh::parse_obj("# nothing here\n"),
            Err(MeshError::Empty)
        ));
    }

    #[test]
    fn transform_moves_vertices_and_rotates_normals() {
        let mesh = TriMesh::parse_obj(UNIT_QUAD).unwrap();
        let pose = RigidTransform::from_translation(0.0, 0.0, 2.0);
        let moved = mesh.transformed(&pose);
        assert_relative_eq!(moved.vertices[0].z, 2.0);
        // Pure translation leaves normals untouched.
        assert_relative_eq!(moved.normals[0], mesh.normals[0]);
    }

    #[test]
    fn obj_round_trip_preserves_geometry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.obj");
        let mesh = TriMesh::parse_obj(UNIT_QUAD).unwrap();
        mesh.write_obj(&path).unwrap();
        let back = TriMesh::load_obj(&path).unwrap();
        assert_eq!(back.vertices.len(), mesh.vertices.len());
        assert_eq!(back.faces, mesh.faces);
    }

    #[test]
    fn oriented_bounds_of_axis_aligned_box() {
        let mut mesh = TriMesh::default();
        for x in [-1.0, 1.0] {
            for y in [-0.5, 0.5] {
                for z in [-0.25, 0.25] {
                    mesh.vertices.push(Point3::new(x + 3.0, y, z));
                }
            }
        }
        let obb = mesh.oriented_bounds().unwrap();
        let mut ext: Vec<f64> = obb.half_extents.iter().copied().collect();
        ext.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_relative_eq!(ext[0], 0.25, epsilon = 1e-9);
        assert_relative_eq!(ext[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(ext[2], 1.0, epsilon = 1e-9);

        // to_origin maps the box center onto the origin.
        let center = obb
            .to_origin
            .transform_point(&Point3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(center.coords.norm(), 0.0, epsilon = 1e-9);
    }
}
