use xanes_steering::stopping::StoppingCriterionConfig;
use xanes_steering::{ExperimentGuide, GuideConfig, GuidePhase};

use crate::{base_config, initial_batch, measure};

fn stopping_config(threshold: f64, begin: usize, interval: usize) -> GuideConfig {
    GuideConfig {
        stopping: Some(StoppingCriterionConfig {
            threshold,
            n_updates_to_begin: begin,
            n_check_interval: interval,
            ..StoppingCriterionConfig::default()
        }),
        ..base_config()
    }
}

fn step(guide: &mut ExperimentGuide) {
    let next = guide.suggest().unwrap();
    guide.update(&next, &measure(&next)).unwrap();
}

/// Drive a guide for `n` updates and return the stopping measure afterwards.
fn uncertainty_after(config: GuideConfig, n: usize) -> f64 {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(config);
    guide.build(&x, &y).unwrap();
    for _ in 0..n {
        step(&mut guide);
    }
    guide
        .stopping_criterion()
        .unwrap()
        .max_weighted_uncertainty(&guide)
        .unwrap()
}

#[test]
fn test_never_stops_without_criterion() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    for _ in 0..5 {
        step(&mut guide);
        assert!(!guide.should_stop().unwrap());
    }
    assert!(guide.stopping_criterion().is_none());
}

#[test]
fn test_checks_only_when_due() {
    // A threshold nothing can miss: the criterion fires on its first check.
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(stopping_config(1e9, 3, 2));
    guide.build(&x, &y).unwrap();
    assert!(!guide.should_stop().unwrap());
    for _ in 0..2 {
        step(&mut guide);
        assert!(!guide.should_stop().unwrap());
    }
    step(&mut guide);
    assert!(guide.should_stop().unwrap());
    assert_eq!(guide.n_update_calls(), 3);
    assert_eq!(guide.phase(), GuidePhase::Stopped);
}

#[test]
fn test_interval_skips_updates() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(stopping_config(0.0, 3, 2));
    guide.build(&x, &y).unwrap();
    let criterion = guide.stopping_criterion().unwrap().clone();
    let due: Vec<usize> = (0..10).filter(|&n| criterion.is_due(n)).collect();
    assert_eq!(due, vec![3, 5, 7, 9]);
    for _ in 0..6 {
        step(&mut guide);
        assert!(!guide.should_stop().unwrap());
    }
}

#[test]
fn test_stops_below_threshold() {
    let measure_at_five = uncertainty_after(stopping_config(1e9, 5, 5), 5);
    assert!(measure_at_five > 0.0);

    let (x, y) = initial_batch(20);
    let mut above = ExperimentGuide::new(stopping_config(measure_at_five * 1.01, 5, 5));
    let mut below = ExperimentGuide::new(stopping_config(measure_at_five * 0.99, 5, 5));
    above.build(&x, &y).unwrap();
    below.build(&x, &y).unwrap();
    for _ in 0..5 {
        step(&mut above);
        step(&mut below);
    }
    assert!(above.should_stop().unwrap());
    assert!(!below.should_stop().unwrap());
    assert_eq!(below.phase(), GuidePhase::Iterating);
}

#[test]
fn test_uncertainty_shrinks_with_measurements() {
    let early = uncertainty_after(stopping_config(1e9, 0, 1), 0);
    let late = uncertainty_after(stopping_config(1e9, 0, 1), 10);
    assert!(late <= early, "uncertainty grew from {early} to {late}");
}

#[test]
fn test_invalid_interval_rejected_at_build() {
    let (x, y) = initial_batch(10);
    let mut guide = ExperimentGuide::new(stopping_config(0.1, 0, 0));
    assert!(guide.build(&x, &y).is_err());
}
