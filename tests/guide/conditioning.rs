use xanes_steering::ExperimentGuide;

use crate::{base_config, initial_batch, measure};

fn probe() -> Vec<Vec<f64>> {
    (0..33).map(|i| vec![8920.0 + 5.0 * f64::from(i)]).collect()
}

#[test]
fn test_sequential_updates_match_joint_update() {
    let (x, y) = initial_batch(15);
    let a = vec![vec![8996.0], vec![9004.0]];
    let b = vec![vec![9013.0], vec![8951.0], vec![9031.0]];
    let ab: Vec<Vec<f64>> = a.iter().chain(&b).cloned().collect();

    let mut sequential = ExperimentGuide::new(base_config());
    sequential.build(&x, &y).unwrap();
    sequential.update(&a, &measure(&a)).unwrap();
    sequential.update(&b, &measure(&b)).unwrap();

    let mut joint = ExperimentGuide::new(base_config());
    joint.build(&x, &y).unwrap();
    joint.update(&ab, &measure(&ab)).unwrap();

    let (mu_s, sd_s) = sequential.posterior_mean_std(&probe()).unwrap();
    let (mu_j, sd_j) = joint.posterior_mean_std(&probe()).unwrap();
    for i in 0..mu_s.len() {
        assert!((mu_s[i] - mu_j[i]).abs() < 1e-6, "mean differs at {i}");
        assert!((sd_s[i] - sd_j[i]).abs() < 1e-6, "std differs at {i}");
    }
}

#[test]
fn test_conditioning_keeps_hyperparameters() {
    let (x, y) = initial_batch(15);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    let before = guide.model().unwrap().kernel().clone();
    let next = vec![vec![9002.0]];
    guide.update(&next, &measure(&next)).unwrap();
    let after = guide.model().unwrap();
    assert_eq!(after.kernel().lengthscales(), before.lengthscales());
    assert!((after.kernel().signal_var() - before.signal_var()).abs() < f64::EPSILON);
    assert_eq!(after.n_train(), 16);
}

#[test]
fn test_update_reduces_local_uncertainty() {
    let (x, y) = initial_batch(15);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    let point = vec![vec![9003.0]];
    let (_, before) = guide.posterior_mean_std(&point).unwrap();
    guide.update(&point, &measure(&point)).unwrap();
    let (mu, after) = guide.posterior_mean_std(&point).unwrap();
    assert!(after[0] < before[0]);
    assert!((mu[0] - measure(&point)[0]).abs() < 1e-2);
}

#[test]
fn test_measured_data_in_order() {
    let (x, y) = initial_batch(10);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    let a = vec![vec![9001.5]];
    let b = vec![vec![8933.25]];
    guide.update(&a, &measure(&a)).unwrap();
    guide.update(&b, &measure(&b)).unwrap();
    let (mx, my) = guide.measured_data().unwrap();
    assert_eq!(mx.len(), 12);
    for (got, want) in mx.iter().zip(x.iter().chain(&a).chain(&b)) {
        assert!((got[0] - want[0]).abs() < 1e-9);
    }
    assert!((my[11] - measure(&b)[0]).abs() < 1e-9);
}
