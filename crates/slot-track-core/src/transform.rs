use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// A 4x4 homogeneous rigid transform: 3x3 rotation, 3x1 translation,
/// bottom row `[0,0,0,1]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidTransform {
    pub m: Matrix4<f64>,
}

impl RigidTransform {
    pub fn new(m: Matrix4<f64>) -> Self {
        Self { m }
    }

    pub fn identity() -> Self {
        Self {
            m: Matrix4::identity(),
        }
    }

    pub fn from_parts(rotation: Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&rotation);
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&translation);
        Self { m }
    }

    pub fn from_translation(x: f64, y: f64, z: f64) -> Self {
        Self::from_parts(Matrix3::identity(), Vector3::new(x, y, z))
    }

    pub fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        let mut m = Matrix4::zeros();
        for (i, row) in rows.iter().enumerate() {
            for (j, v) in row.iter().enumerate() {
                m[(i, j)] = *v;
            }
        }
        Self { m }
    }

    pub fn to_rows(&self) -> [[f64; 4]; 4] {
        let mut rows = [[0.0; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = self.m[(i, j)];
            }
        }
        rows
    }

    #[inline]
    pub fn rotation(&self) -> Matrix3<f64> {
        self.m.fixed_view::<3, 3>(0, 0).into_owned()
    }

    #[inline]
    pub fn translation(&self) -> Vector3<f64> {
        self.m.fixed_view::<3, 1>(0, 3).into_owned()
    }

    /// `self * other` as a composition of homogeneous transforms.
    #[inline]
    pub fn compose(&self, other: &Self) -> Self {
        Self { m: self.m * other.m }
    }

    /// Inverse via the rigid shortcut: transpose of the rotation block,
    /// translation `-R^t t`. Cheaper and better conditioned than general
    /// 4x4 inversion.
    pub fn inverse(&self) -> Self {
        let rt = self.rotation().transpose();
        let t = -rt * self.translation();
        Self::from_parts(rt, t)
    }

    #[inline]
    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation() * p.coords + self.translation())
    }

    /// Whether the rotation block is orthonormal with determinant +1 and
    /// the bottom row is `[0,0,0,1]`, within `tol`. A failing pose is a
    /// defective estimator result, not a pipeline condition to recover from.
    pub fn is_rigid(&self, tol: f64) -> bool {
        let r = self.rotation();
        let ortho = (r.transpose() * r - Matrix3::identity()).abs().max() <= tol;
        let det_ok = (r.determinant() - 1.0).abs() <= tol;
        let bottom_ok = (self.m[(3, 0)]).abs() <= tol
            && (self.m[(3, 1)]).abs() <= tol
            && (self.m[(3, 2)]).abs() <= tol
            && (self.m[(3, 3)] - 1.0).abs() <= tol;
        ortho && det_ok && bottom_ok
    }
}
