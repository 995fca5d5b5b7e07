use xanes_steering::acquisition::{AcquisitionConfig, GradientAugmentedParams};
use xanes_steering::{Error, ExperimentGuide, GuideConfig, GuidePhase};

use crate::{base_config, initial_batch, measure};

fn augmented() -> AcquisitionConfig {
    AcquisitionConfig::GradientAugmented(GradientAugmentedParams::default())
}

fn weighted_config(acquisition: AcquisitionConfig) -> GuideConfig {
    let mut config = GuideConfig {
        acquisition,
        ..base_config()
    };
    config.weight_func.n_updates_to_build = Some(5);
    config
}

fn step(guide: &mut ExperimentGuide) {
    let next = guide.suggest().unwrap();
    guide.update(&next, &measure(&next)).unwrap();
}

#[test]
fn test_weight_function_built_once_at_trigger() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(weighted_config(augmented()));
    guide.build(&x, &y).unwrap();

    for _ in 0..4 {
        step(&mut guide);
        assert!(guide.weight_function().is_none());
    }
    step(&mut guide);
    let first = guide.weight_function().unwrap().clone();

    for _ in 0..3 {
        step(&mut guide);
        assert_eq!(guide.weight_function(), Some(&first));
    }
}

#[test]
fn test_weight_function_locates_edge() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(weighted_config(augmented()));
    guide.build(&x, &y).unwrap();
    for _ in 0..5 {
        step(&mut guide);
    }
    let weight = guide.weight_function().unwrap();
    // 9000 eV sits at the middle of the 8920..9080 eV training range.
    assert!(
        (0.45..0.6).contains(&weight.edge_location()),
        "edge at {}",
        weight.edge_location()
    );
    assert!(weight.eval(0.0) < 0.1);
    assert!(weight.eval(weight.edge_location() + 0.1) > 0.5);
    assert!((weight.floor_value() - 0.01).abs() < 1e-12);
}

#[test]
fn test_weighting_suppresses_pre_edge_acquisition() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(weighted_config(augmented()));
    guide.build(&x, &y).unwrap();
    for _ in 0..5 {
        step(&mut guide);
    }
    let pre_edge = guide.acquisition_values(&[vec![8925.0]]).unwrap()[0];
    let post_edge: Vec<Vec<f64>> = (0..8).map(|i| vec![9004.0 + 2.0 * f64::from(i)]).collect();
    let best_post_edge = guide
        .acquisition_values(&post_edge)
        .unwrap()
        .into_iter()
        .fold(0.0, f64::max);
    assert!(pre_edge < best_post_edge);
}

#[test]
fn test_non_reweightable_acquisition_keeps_uniform_weights() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(weighted_config(AcquisitionConfig::PosteriorStdDev));
    guide.build(&x, &y).unwrap();
    for _ in 0..7 {
        step(&mut guide);
    }
    assert!(guide.weight_function().is_none());
    assert_eq!(guide.n_update_calls(), 7);
}

#[test]
fn test_weighting_disabled_by_default() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(GuideConfig {
        acquisition: augmented(),
        ..base_config()
    });
    guide.build(&x, &y).unwrap();
    for _ in 0..6 {
        step(&mut guide);
    }
    assert!(guide.weight_function().is_none());
}

#[test]
fn test_rebuild_clears_weight_function() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(weighted_config(augmented()));
    guide.build(&x, &y).unwrap();
    for _ in 0..5 {
        step(&mut guide);
    }
    assert!(guide.weight_function().is_some());
    guide.build(&x, &y).unwrap();
    assert!(guide.weight_function().is_none());
}

#[test]
fn test_invalid_weight_options_rejected_at_build() {
    let (x, y) = initial_batch(20);

    let mut config = weighted_config(augmented());
    config.weight_func.floor_value = 1.5;
    let mut guide = ExperimentGuide::new(config);
    assert!(matches!(
        guide.build(&x, &y),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(guide.phase(), GuidePhase::Unbuilt);

    let mut config = weighted_config(augmented());
    config.weight_func.n_updates_to_build = Some(0);
    let mut guide = ExperimentGuide::new(config);
    assert!(matches!(
        guide.build(&x, &y),
        Err(Error::InvalidParameter(_))
    ));
}

#[test]
fn test_flat_spectrum_leaves_weight_unset() {
    let (x, _) = initial_batch(20);
    let flat = |n: usize| vec![0.5; n];
    let mut config = weighted_config(augmented());
    config.weight_func.n_updates_to_build = Some(2);
    let mut guide = ExperimentGuide::new(config);
    guide.build(&x, &flat(x.len())).unwrap();

    let next = guide.suggest().unwrap();
    guide.update(&next, &flat(next.len())).unwrap();

    let next = guide.suggest().unwrap();
    let err = guide.update(&next, &flat(next.len())).unwrap_err();
    assert!(matches!(err, Error::EdgeNotDetected(_)));
    assert_eq!(guide.n_update_calls(), 2);
    assert_eq!(guide.n_measured(), 22);
    assert!(guide.weight_function().is_none());

    let next = guide.suggest().unwrap();
    guide.update(&next, &flat(next.len())).unwrap();
    assert_eq!(guide.n_update_calls(), 3);
    assert!(guide.weight_function().is_none());
}
