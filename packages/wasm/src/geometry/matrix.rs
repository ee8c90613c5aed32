//! 3x3 affine matrices in row-vector convention.
//!
//! A point `[x, y, 1]` is transformed as `p * M`, so the translation lives in
//! the third row and `multiply(&[a, b])` applies `a` first, then `b`.

use super::Vector;

/// A 3x3 affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix(pub [[f64; 3]; 3]);

impl Matrix {
    /// The identity matrix.
    pub const IDENTITY: Matrix = Matrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Translation by `(tx, ty)`.
    pub fn translation(tx: f64, ty: f64) -> Self {
        Matrix([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [tx, ty, 1.0]])
    }

    /// Rotation by `degrees` (y-down, matching [`Vector::rotate`]).
    pub fn rotation(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Matrix([[cos, sin, 0.0], [-sin, cos, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Scale by `(sx, sy)`.
    pub fn scale(sx: f64, sy: f64) -> Self {
        Matrix([[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]])
    }

    /// Product of the given matrices, left to right.
    ///
    /// An empty slice yields the identity.
    pub fn multiply(matrices: &[Matrix]) -> Matrix {
        matrices
            .iter()
            .fold(Matrix::IDENTITY, |acc, m| acc.then(m))
    }

    /// `self * other`.
    pub fn then(&self, other: &Matrix) -> Matrix {
        let a = &self.0;
        let b = &other.0;
        let mut out = [[0.0; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Matrix(out)
    }

    /// Determinant of the linear part.
    pub fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0][0] * m[1][1] - m[0][1] * m[1][0]
    }

    /// Closed-form inverse of a 2D affine matrix.
    ///
    /// Returns `None` when the determinant is zero.
    pub fn inverse(&self) -> Option<Matrix> {
        let det = self.determinant();
        if det == 0.0 {
            return None;
        }
        let m = &self.0;
        let i00 = m[1][1] / det;
        let i01 = -m[0][1] / det;
        let i10 = -m[1][0] / det;
        let i11 = m[0][0] / det;
        let tx = -(m[2][0] * i00 + m[2][1] * i10);
        let ty = -(m[2][0] * i01 + m[2][1] * i11);
        Some(Matrix([[i00, i01, 0.0], [i10, i11, 0.0], [tx, ty, 1.0]]))
    }

    /// True for rotation + uniform scale (+ translation).
    pub fn is_isometric(&self) -> bool {
        let m = &self.0;
        m[0][0] == m[1][1] && m[0][1] == -m[1][0]
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, p: Vector) -> Vector {
        let m = &self.0;
        Vector::new(
            p.x * m[0][0] + p.y * m[1][0] + m[2][0],
            p.x * m[0][1] + p.y * m[1][1] + m[2][1],
        )
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}
