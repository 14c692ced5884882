//! Observation-matrix layout.
//!
//! Every estimator in the workspace consumes an `N x D` matrix where row `n`
//! holds the `P = D / 2` points of frame `n`, interleaved as
//! `(x0, y0, x1, y1, ...)`. Reshaping a row gives a `2 x P` point set whose
//! column `i` is point `i` of that frame.

use crate::{PointSet, Real, ShapeMatrix, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Precondition violations of an observation matrix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShapeError {
    /// The matrix has no rows.
    #[error("observation matrix has no frames")]
    Empty,
    /// The matrix has no columns.
    #[error("observation matrix has no points")]
    NoPoints,
    /// Columns cannot be split into 2D points.
    #[error("observation matrix has an odd number of columns ({0}), expected interleaved x/y pairs")]
    OddColumnCount(usize),
    /// A coordinate is NaN or infinite.
    #[error("non-finite coordinate in frame {frame}, column {column}")]
    NonFinite { frame: usize, column: usize },
    /// Frames of a stacked input disagree on the number of points.
    #[error("frame {frame} has {found} points, expected {expected}")]
    PointCountMismatch {
        frame: usize,
        expected: usize,
        found: usize,
    },
}

/// Validated dimensions of an observation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeLayout {
    pub num_frames: usize,
    pub num_points: usize,
}

impl ShapeLayout {
    /// Validate `y` and extract its layout.
    ///
    /// Checks run before any computation: at least one frame, at least one
    /// point, an even column count and finite coordinates.
    pub fn from_matrix(y: &ShapeMatrix) -> Result<Self, ShapeError> {
        if y.nrows() == 0 {
            return Err(ShapeError::Empty);
        }
        if y.ncols() == 0 {
            return Err(ShapeError::NoPoints);
        }
        if y.ncols() % 2 != 0 {
            return Err(ShapeError::OddColumnCount(y.ncols()));
        }
        for frame in 0..y.nrows() {
            for column in 0..y.ncols() {
                if !y[(frame, column)].is_finite() {
                    return Err(ShapeError::NonFinite { frame, column });
                }
            }
        }
        Ok(Self {
            num_frames: y.nrows(),
            num_points: y.ncols() / 2,
        })
    }

    /// Number of columns `D = 2P`.
    pub fn dim(&self) -> usize {
        2 * self.num_points
    }
}

/// Reshape row `frame` of `y` into a `2 x P` point set.
pub fn frame_points(y: &ShapeMatrix, frame: usize) -> PointSet {
    let num_points = y.ncols() / 2;
    PointSet::from_fn(num_points, |r, c| y[(frame, 2 * c + r)])
}

/// Write a `2 x P` point set back into row `frame` of `y`.
pub fn set_frame_points(y: &mut ShapeMatrix, frame: usize, points: &PointSet) {
    debug_assert_eq!(y.ncols(), 2 * points.ncols());
    for (i, p) in points.column_iter().enumerate() {
        y[(frame, 2 * i)] = p[0];
        y[(frame, 2 * i + 1)] = p[1];
    }
}

/// Component-wise mean of the points.
pub fn centroid(points: &PointSet) -> Vec2 {
    if points.ncols() == 0 {
        return Vec2::zeros();
    }
    points.column_sum() / points.ncols() as Real
}

/// Stack equally sized point sets into an observation matrix.
pub fn stack_frames(frames: &[PointSet]) -> Result<ShapeMatrix, ShapeError> {
    let first = frames.first().ok_or(ShapeError::Empty)?;
    let num_points = first.ncols();
    if num_points == 0 {
        return Err(ShapeError::NoPoints);
    }
    let mut y = ShapeMatrix::zeros(frames.len(), 2 * num_points);
    for (frame, points) in frames.iter().enumerate() {
        if points.ncols() != num_points {
            return Err(ShapeError::PointCountMismatch {
                frame,
                expected: num_points,
                found: points.ncols(),
            });
        }
        set_frame_points(&mut y, frame, points);
    }
    Ok(y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ShapeMatrix {
        ShapeMatrix::from_row_slice(
            2,
            6,
            &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0],
        )
    }

    #[test]
    fn layout_rejects_invalid_matrices() {
        assert_eq!(
            ShapeLayout::from_matrix(&ShapeMatrix::zeros(0, 4)),
            Err(ShapeError::Empty)
        );
        assert_eq!(
            ShapeLayout::from_matrix(&ShapeMatrix::zeros(3, 0)),
            Err(ShapeError::NoPoints)
        );
        assert_eq!(
            ShapeLayout::from_matrix(&ShapeMatrix::zeros(3, 5)),
            Err(ShapeError::OddColumnCount(5))
        );

        let mut y = sample();
        y[(1, 4)] = f64::NAN;
        assert_eq!(
            ShapeLayout::from_matrix(&y),
            Err(ShapeError::NonFinite {
                frame: 1,
                column: 4
            })
        );
    }

    #[test]
    fn layout_counts_frames_and_points() {
        let layout = ShapeLayout::from_matrix(&sample()).unwrap();
        assert_eq!(layout.num_frames, 2);
        assert_eq!(layout.num_points, 3);
        assert_eq!(layout.dim(), 6);
    }

    #[test]
    fn frame_points_deinterleaves_row() {
        let points = frame_points(&sample(), 1);
        assert_eq!(points.ncols(), 3);
        assert_eq!((points[(0, 0)], points[(1, 0)]), (6.0, 7.0));
        assert_eq!((points[(0, 2)], points[(1, 2)]), (10.0, 11.0));

        let mut y = ShapeMatrix::zeros(2, 6);
        set_frame_points(&mut y, 1, &points);
        let expected = sample();
        assert!(y.row(1).iter().eq(expected.row(1).iter()));
        assert!(y.row(0).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn centroid_is_componentwise_mean() {
        let c = centroid(&frame_points(&sample(), 0));
        assert!((c - Vec2::new(2.0, 3.0)).norm() < 1e-15);
    }

    #[test]
    fn stack_frames_rejects_mismatched_point_counts() {
        let a = PointSet::zeros(3);
        let b = PointSet::zeros(2);
        assert_eq!(
            stack_frames(&[a.clone(), b]),
            Err(ShapeError::PointCountMismatch {
                frame: 1,
                expected: 3,
                found: 2
            })
        );
        assert_eq!(stack_frames(&[]), Err(ShapeError::Empty));
        let y = stack_frames(&[a.clone(), a]).unwrap();
        assert_eq!((y.nrows(), y.ncols()), (2, 6));
    }
}
