use nalgebra::{
    DMatrix, Isometry2, Matrix2, Matrix2xX, Point2, RealField, Translation2, UnitComplex, Vector2,
};

pub type Real = f64;

pub type Vec2 = Vector2<Real>;
pub type Pt2 = Point2<Real>;
pub type Mat2 = Matrix2<Real>;
pub type Iso2 = Isometry2<Real>;

/// `N x 2P` observation matrix, one flattened 2D shape per row.
pub type ShapeMatrix = DMatrix<Real>;
/// `2 x P` point set, one point per column.
pub type PointSet = Matrix2xX<Real>;

/// Planar rotation matrix `[[cos a, -sin a], [sin a, cos a]]`.
///
/// Generic so that residuals built on it can be differentiated with dual numbers.
pub fn rotation_matrix<T: RealField>(angle: T) -> Matrix2<T> {
    let (s, c) = angle.sin_cos();
    Matrix2::new(c.clone(), -s.clone(), s, c)
}

/// Derivative of [`rotation_matrix`] with respect to the angle.
pub fn rotation_matrix_derivative<T: RealField>(angle: T) -> Matrix2<T> {
    let (s, c) = angle.sin_cos();
    Matrix2::new(-s.clone(), -c.clone(), c, -s)
}

/// Wrap an angle into `(-pi, pi]`.
pub fn wrap_angle(angle: Real) -> Real {
    let two_pi = 2.0 * std::f64::consts::PI;
    let mut wrapped = angle % two_pi;
    if wrapped <= -std::f64::consts::PI {
        wrapped += two_pi;
    } else if wrapped > std::f64::consts::PI {
        wrapped -= two_pi;
    }
    wrapped
}

/// Build a planar isometry from a rotation angle and a translation.
pub fn iso2_from_angle(angle: Real, translation: Vec2) -> Iso2 {
    Iso2::from_parts(
        Translation2::from(translation),
        UnitComplex::from_angle(angle),
    )
}
