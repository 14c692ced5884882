//! Integration tests for the analyzer facade and the closed-contour path.

use procrustes::core::synthetic::noise::UniformPointNoise;
use procrustes::core::synthetic::shapes;
use procrustes::core::{rotation_matrix, wrap_angle, Pt2, ShapeMatrix, Vec2};
use procrustes::optim::{BackendKind, RigidMotionError, RigidMotionSolveOptions};
use procrustes::{procrustes_analyze, AnalyzerError, GeneralizedProcrustesAnalyzer};

#[test]
fn accessors_are_consistent_after_solve() {
    let reference = shapes::regular_polygon(6, 3.0);
    let mut skewed = reference.clone();
    skewed[(0, 1)] += 0.7;
    let motions = shapes::motion_sweep(4, 0.1, -0.2, [10.0, 4.0], [-2.0, 1.0]);
    let y = shapes::observe(&skewed, &motions, UniformPointNoise::new(21, 0.005)).unwrap();

    let mut gpa = GeneralizedProcrustesAnalyzer::new();
    gpa.set_mat(y.clone());
    gpa.solve().unwrap();

    let u = gpa.normalized_shapes().unwrap();
    let rotations = gpa.rotations().unwrap();
    let translations = gpa.translations().unwrap();
    assert_eq!(rotations.len(), 4);
    assert_eq!((translations.nrows(), translations.ncols()), (4, 2));

    // Mapping the normalized shapes forward again gives back the input.
    for n in 0..4 {
        let q = rotation_matrix(rotations[n]);
        let t = Vec2::new(translations[(n, 0)], translations[(n, 1)]);
        for i in 0..6 {
            let back = q * Vec2::new(u[(n, 2 * i)], u[(n, 2 * i + 1)]) + t;
            assert!((back.x - y[(n, 2 * i)]).abs() < 1e-9);
            assert!((back.y - y[(n, 2 * i + 1)]).abs() < 1e-9);
        }
    }

    // Normalized shapes cluster around the reference shape.
    let reference_fit = gpa.reference_shape().unwrap();
    for n in 0..4 {
        for i in 0..6 {
            let dx = u[(n, 2 * i)] - reference_fit[(0, i)];
            let dy = u[(n, 2 * i + 1)] - reference_fit[(1, i)];
            assert!(dx.hypot(dy) < 0.05, "frame {} point {} off by {}", n, i, dx.hypot(dy));
        }
    }
}

#[test]
fn invalid_matrix_surfaces_estimation_error() {
    let mut gpa = GeneralizedProcrustesAnalyzer::new();
    gpa.set_mat(ShapeMatrix::zeros(2, 3));
    let err = gpa.solve().unwrap_err();
    assert!(matches!(
        err,
        AnalyzerError::Estimation(RigidMotionError::InvalidInput(_))
    ));
    assert!(gpa.fit().is_none());
}

#[test]
fn contours_are_aligned_and_reclosed() {
    let base = [
        Pt2::new(0.0, 0.0),
        Pt2::new(4.0, 0.0),
        Pt2::new(5.0, 2.0),
        Pt2::new(2.0, 3.0),
        Pt2::new(-1.0, 1.5),
    ];
    let angles = [0.0, 0.4, -0.25];
    let offsets = [Vec2::new(0.0, 0.0), Vec2::new(10.0, -3.0), Vec2::new(-4.0, 6.0)];

    let contours: Vec<Vec<Pt2>> = angles
        .iter()
        .zip(offsets.iter())
        .map(|(&a, &t)| {
            let q = rotation_matrix(a);
            let mut c: Vec<Pt2> = base.iter().map(|p| Pt2::from(q * p.coords + t)).collect();
            c.push(c[0]);
            c
        })
        .collect();

    let opts = RigidMotionSolveOptions {
        backend: BackendKind::LevenbergMarquardt,
        ..Default::default()
    };
    let (normalized, gpa) = procrustes_analyze(&contours, opts).unwrap();

    assert_eq!(normalized.len(), 3);
    for contour in &normalized {
        assert_eq!(contour.len(), base.len() + 1);
        assert_eq!(contour[0], contour[base.len()]);
    }
    // Noise-free contours normalize to the same shape.
    for contour in &normalized[1..] {
        for (p, q) in contour.iter().zip(normalized[0].iter()) {
            assert!((p - q).norm() < 1e-6);
        }
    }

    let rotations = gpa.rotations().unwrap();
    let rel = wrap_angle(rotations[1] - rotations[0]);
    assert!((rel - 0.4).abs() < 1e-6);
}

#[test]
fn options_round_trip_through_json() {
    let opts = RigidMotionSolveOptions {
        backend: BackendKind::LevenbergMarquardt,
        max_iters: 200,
        fix_frames: vec![0],
        ..Default::default()
    };
    let json = serde_json::to_string(&opts).unwrap();
    let loaded: RigidMotionSolveOptions = serde_json::from_str(&json).unwrap();
    assert_eq!(loaded, opts);

    let gpa = GeneralizedProcrustesAnalyzer::with_options(loaded);
    assert_eq!(gpa.options().max_iters, 200);
}

#[test]
fn fit_serializes_to_json() {
    let mut gpa = GeneralizedProcrustesAnalyzer::new();
    gpa.set_rows(&[
        vec![0.0, 0.0, 2.0, 0.0, 1.0, 2.0],
        vec![5.0, 5.0, 7.0, 5.0, 6.0, 7.0],
    ])
    .unwrap();
    let fit = gpa.solve().unwrap();
    let value = serde_json::to_value(fit).unwrap();
    assert!(value.get("normalized_shapes").is_some());
    assert!(value["summary"]["final_cost"].as_f64().unwrap() < 1e-10);
}
