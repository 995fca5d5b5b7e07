use xanes_steering::Error;
use xanes_steering::model::Posterior;
use xanes_steering::transform::DataTransform;

fn fitted() -> (DataTransform, Vec<Vec<f64>>, Vec<f64>) {
    let x = vec![
        vec![8920.0, 1.0],
        vec![9000.0, 3.0],
        vec![9080.0, 2.0],
        vec![8960.0, 5.0],
    ];
    let y = vec![0.05, 0.6, 1.1, 0.2];
    let mut transform = DataTransform::new(2);
    transform.fit_and_apply(&x, &y).unwrap();
    (transform, x, y)
}

#[test]
fn test_unfitted_transform_errors() {
    let transform = DataTransform::new(1);
    assert!(!transform.is_fitted());
    assert!(matches!(
        transform.apply_x(&[vec![1.0]]),
        Err(Error::TransformNotFitted)
    ));
    assert!(matches!(
        transform.scale_by_normalizer_bounds(1.0, 0),
        Err(Error::TransformNotFitted)
    ));
}

#[test]
fn test_round_trip_recovers_physical_values() {
    let (transform, x, y) = fitted();
    let (xt, yt) = transform.apply(&x, &y).unwrap();
    let (xr, yr) = transform.invert(&xt, &yt).unwrap();
    for (a, b) in x.iter().zip(&xr) {
        for (u, v) in a.iter().zip(b) {
            assert!((u - v).abs() < 1e-9);
        }
    }
    for (a, b) in y.iter().zip(&yr) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_normalized_inputs_span_unit_box() {
    let (transform, x, _) = fitted();
    let xt = transform.apply_x(&x).unwrap();
    for j in 0..2 {
        let lo = xt.iter().map(|p| p[j]).fold(f64::INFINITY, f64::min);
        let hi = xt.iter().map(|p| p[j]).fold(f64::NEG_INFINITY, f64::max);
        assert!(lo.abs() < 1e-12);
        assert!((hi - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_standardized_outcomes() {
    let (transform, _, y) = fitted();
    let yt = transform.apply_y(&y).unwrap();
    let n = yt.len() as f64;
    let mean = yt.iter().sum::<f64>() / n;
    let var = yt.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    assert!(mean.abs() < 1e-12);
    assert!((var - 1.0).abs() < 1e-12);
}

#[test]
fn test_transform_is_frozen_after_fit() {
    let (transform, _, _) = fitted();
    // Points outside the training range map outside [0, 1] instead of
    // refitting the normalizer.
    let xt = transform.apply_x(&[vec![9160.0, 1.0]]).unwrap();
    assert!((xt[0][0] - 1.5).abs() < 1e-12);
}

#[test]
fn test_scale_unscale_identity() {
    let (transform, _, _) = fitted();
    let scaled = transform.scale_by_normalizer_bounds(7.0, 0).unwrap();
    assert!((scaled - 7.0 / 160.0).abs() < 1e-15);
    let back = transform.unscale_by_normalizer_bounds(scaled, 0).unwrap();
    assert!((back - 7.0).abs() < 1e-12);

    let point = transform.scale_point_by_normalizer_bounds(&[8.0, 2.0]).unwrap();
    assert!((point[0] - 0.05).abs() < 1e-15);
    assert!((point[1] - 0.5).abs() < 1e-15);
    assert!(matches!(
        transform.scale_by_normalizer_bounds(1.0, 2),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn test_one_dimensional_helpers() {
    let mut transform = DataTransform::new(1);
    transform
        .fit_and_apply(&[vec![10.0], vec![20.0]], &[0.0, 1.0])
        .unwrap();
    let xt = transform.apply_x_1d(&[10.0, 15.0, 20.0]).unwrap();
    assert!((xt[1] - 0.5).abs() < 1e-12);
    let xr = transform.invert_x_1d(&xt).unwrap();
    assert!((xr[2] - 20.0).abs() < 1e-12);

    let (two_d, _, _) = fitted();
    assert!(matches!(
        two_d.apply_x_1d(&[1.0]),
        Err(Error::DimensionMismatch { .. })
    ));
}

#[test]
fn test_untransform_posterior() {
    let (transform, _, y) = fitted();
    let outcome = transform.outcome().unwrap();
    let posterior = Posterior {
        mean: vec![0.0, 1.0],
        variance: vec![1.0, 0.25],
    };
    let physical = transform.untransform_posterior(posterior).unwrap();
    let mean_y = y.iter().sum::<f64>() / 4.0;
    assert!((physical.mean[0] - mean_y).abs() < 1e-12);
    assert!((physical.mean[1] - (mean_y + outcome.std())).abs() < 1e-12);
    assert!((physical.variance[1] - 0.25 * outcome.std().powi(2)).abs() < 1e-12);
}

#[test]
fn test_constant_outcome_keeps_unit_scale() {
    let mut transform = DataTransform::new(1);
    let (_, yt) = transform
        .fit_and_apply(&[vec![0.0], vec![1.0], vec![2.0]], &[0.7, 0.7, 0.7])
        .unwrap();
    assert!(yt.iter().all(|v| v.abs() < 1e-12));
    assert!((transform.outcome().unwrap().std() - 1.0).abs() < f64::EPSILON);
}
