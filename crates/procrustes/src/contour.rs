//! Closed contours as analysis input.
//!
//! A closed contour is a list of points whose last entry repeats the first.
//! For analysis the closing point is dropped and the rest is flattened to one
//! row of interleaved coordinates; results are re-closed on the way back.

use crate::analyzer::{AnalyzerError, GeneralizedProcrustesAnalyzer};
use procrustes_core::{Pt2, Real, ShapeMatrix, Vec2};
use procrustes_optim::RigidMotionSolveOptions;

/// Drop the closing point of `contour` and flatten to `(x0, y0, x1, y1, ...)`.
pub fn contour_to_row(contour: &[Pt2]) -> Result<Vec<Real>, AnalyzerError> {
    if contour.len() < 2 {
        return Err(AnalyzerError::Contour(format!(
            "closed contour needs at least 2 points, got {}",
            contour.len()
        )));
    }
    Ok(contour[..contour.len() - 1]
        .iter()
        .flat_map(|p| [p.x, p.y])
        .collect())
}

/// Reshape interleaved coordinates into points and re-close the contour.
pub fn row_to_contour(row: &[Real]) -> Result<Vec<Pt2>, AnalyzerError> {
    if row.is_empty() || row.len() % 2 != 0 {
        return Err(AnalyzerError::Contour(format!(
            "expected a non-empty even number of coordinates, got {}",
            row.len()
        )));
    }
    let mut points: Vec<Pt2> = row
        .chunks_exact(2)
        .map(|xy| Pt2::new(xy[0], xy[1]))
        .collect();
    points.push(points[0]);
    Ok(points)
}

/// Stack closed contours as rows of an observation matrix.
pub fn contours_to_matrix(contours: &[Vec<Pt2>]) -> Result<ShapeMatrix, AnalyzerError> {
    let rows = contours
        .iter()
        .map(|c| contour_to_row(c))
        .collect::<Result<Vec<_>, _>>()?;
    let first = rows.first().ok_or(AnalyzerError::MissingInput)?;
    let dim = first.len();
    if let Some(frame) = rows.iter().position(|r| r.len() != dim) {
        return Err(AnalyzerError::Contour(format!(
            "contour {} has {} points, expected {}",
            frame,
            contours[frame].len(),
            contours[0].len()
        )));
    }
    Ok(ShapeMatrix::from_fn(rows.len(), dim, |r, c| rows[r][c]))
}

/// Centre `contour` at its mean and scale by `(scale, -scale)`.
///
/// The y flip converts image coordinates (y down) to plot coordinates.
pub fn normalize_contour(contour: &[Pt2], scale: Real) -> Vec<Pt2> {
    if contour.is_empty() {
        return Vec::new();
    }
    let mean = contour.iter().map(|p| p.coords).sum::<Vec2>() / contour.len() as Real;
    let factor = Vec2::new(scale, -scale);
    contour
        .iter()
        .map(|p| Pt2::from((p.coords - mean).component_mul(&factor)))
        .collect()
}

/// Cubic Bézier node: an on-curve point with its two handles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplineNode {
    pub left: Pt2,
    pub center: Pt2,
    pub right: Pt2,
}

impl SplineNode {
    /// Group the control points of a closed cubic spline into nodes.
    ///
    /// A closed spline with `K` nodes has `3K + 1` points, the last one
    /// repeating the first. Node 0 is centred on point 0 with its left handle
    /// on the last non-closing point; node `i > 0` is centred on `3i + 1`.
    pub fn from_contour(contour: &[Pt2]) -> Result<Vec<SplineNode>, AnalyzerError> {
        let len = contour.len();
        if len < 4 || (len - 4) % 3 != 0 {
            return Err(AnalyzerError::Contour(format!(
                "closed spline needs 3K + 1 points with K >= 1, got {}",
                len
            )));
        }
        let num_nodes = (len - 4) / 3 + 1;
        let data = &contour[..len - 1];

        Ok((0..num_nodes)
            .map(|i| {
                let ci = if i == 0 { 0 } else { (i - 1) * 3 + 4 };
                let li = if ci == 0 { data.len() - 1 } else { ci - 1 };
                SplineNode {
                    left: data[li],
                    center: data[ci],
                    right: data[ci + 1],
                }
            })
            .collect())
    }
}

/// Align closed contours with generalized Procrustes analysis.
///
/// Returns the normalized contours, re-closed, together with the analyzer
/// holding the fitted rotations and translations.
pub fn procrustes_analyze(
    contours: &[Vec<Pt2>],
    options: RigidMotionSolveOptions,
) -> Result<(Vec<Vec<Pt2>>, GeneralizedProcrustesAnalyzer), AnalyzerError> {
    let y = contours_to_matrix(contours)?;

    let mut gpa = GeneralizedProcrustesAnalyzer::with_options(options);
    gpa.set_mat(y);
    let normalized = gpa
        .solve()?
        .normalized_shapes
        .row_iter()
        .map(|row| row_to_contour(&row.iter().copied().collect::<Vec<_>>()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok((normalized, gpa))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Vec<Pt2> {
        vec![
            Pt2::new(0.0, 0.0),
            Pt2::new(2.0, 0.0),
            Pt2::new(2.0, 2.0),
            Pt2::new(0.0, 2.0),
            Pt2::new(0.0, 0.0),
        ]
    }

    #[test]
    fn row_conversion_drops_and_restores_closing_point() {
        let row = contour_to_row(&square()).unwrap();
        assert_eq!(row, vec![0.0, 0.0, 2.0, 0.0, 2.0, 2.0, 0.0, 2.0]);
        assert_eq!(row_to_contour(&row).unwrap(), square());

        assert!(contour_to_row(&[Pt2::origin()]).is_err());
        assert!(row_to_contour(&[1.0, 2.0, 3.0]).is_err());
        assert!(row_to_contour(&[]).is_err());
    }

    #[test]
    fn contours_must_share_length() {
        let mut short = square();
        short.remove(1);
        let err = contours_to_matrix(&[square(), short]).unwrap_err();
        assert!(matches!(err, AnalyzerError::Contour(_)));

        let y = contours_to_matrix(&[square(), square()]).unwrap();
        assert_eq!((y.nrows(), y.ncols()), (2, 8));
    }

    #[test]
    fn normalize_centres_scales_and_flips() {
        let out = normalize_contour(&[Pt2::new(0.0, 0.0), Pt2::new(4.0, 2.0)], 0.5);
        assert_eq!(out, vec![Pt2::new(-1.0, 0.5), Pt2::new(1.0, -0.5)]);
        assert!(normalize_contour(&[], 1.0).is_empty());
    }

    #[test]
    fn spline_nodes_follow_control_point_layout() {
        // K = 3 nodes: 3K + 1 = 10 points, last repeats first.
        let mut contour: Vec<Pt2> = (0..9).map(|i| Pt2::new(i as Real, 0.0)).collect();
        contour.push(contour[0]);

        let nodes = SplineNode::from_contour(&contour).unwrap();
        assert_eq!(nodes.len(), 3);

        let xs = |n: &SplineNode| (n.left.x, n.center.x, n.right.x);
        assert_eq!(xs(&nodes[0]), (8.0, 0.0, 1.0));
        assert_eq!(xs(&nodes[1]), (3.0, 4.0, 5.0));
        assert_eq!(xs(&nodes[2]), (6.0, 7.0, 8.0));

        assert!(SplineNode::from_contour(&contour[..9]).is_err());
        assert!(SplineNode::from_contour(&contour[..3]).is_err());
    }
}
