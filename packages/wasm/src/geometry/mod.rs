//! 2D geometry kernel.
//!
//! Pure value types shared by the layout engine and the graph model:
//! vectors, line segments and 3x3 affine matrices. All arithmetic is plain
//! f64; the only fallible operations return `Option`.

mod line;
mod matrix;
mod vector;

pub use line::Line;
pub use matrix::Matrix;
pub use vector::Vector;
