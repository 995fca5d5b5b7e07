use xanes_steering::acquisition::AcquisitionConfig;
use xanes_steering::optim::OptimizerConfig;
use xanes_steering::{ExperimentGuide, GuideConfig};

use crate::{E_HIGH, E_LOW, base_config, initial_batch, measure};

const LOW: f64 = 8960.0;
const HIGH: f64 = 9040.0;

fn narrow_config(optimizer: OptimizerConfig) -> GuideConfig {
    GuideConfig {
        lower_bounds: Some(vec![LOW]),
        upper_bounds: Some(vec![HIGH]),
        optimizer,
        ..base_config()
    }
}

fn assert_within_bounds(config: GuideConfig, low: f64, high: f64) {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(config);
    guide.build(&x, &y).unwrap();
    for _ in 0..5 {
        let next = guide.suggest().unwrap();
        for p in &next {
            assert!(
                (low..=high).contains(&p[0]),
                "suggestion {} outside [{low}, {high}]",
                p[0]
            );
        }
        guide.update(&next, &measure(&next)).unwrap();
    }
}

#[test]
fn test_random_search_respects_bounds() {
    assert_within_bounds(
        narrow_config(OptimizerConfig::RandomSearch { n_candidates: 200 }),
        LOW,
        HIGH,
    );
}

#[test]
fn test_discrete_grid_respects_bounds() {
    assert_within_bounds(
        narrow_config(OptimizerConfig::Discrete {
            choices: Vec::new(),
            grid_points: 81,
        }),
        LOW,
        HIGH,
    );
}

#[test]
fn test_multi_start_respects_bounds() {
    assert_within_bounds(
        narrow_config(OptimizerConfig::MultiStart {
            raw_samples: 64,
            num_restarts: 2,
            max_iters: 30,
        }),
        LOW,
        HIGH,
    );
}

#[test]
fn test_monte_carlo_batch_respects_bounds() {
    let config = GuideConfig {
        num_candidates: 4,
        acquisition: AcquisitionConfig::QUpperConfidenceBound {
            beta: 0.999,
            mc_samples: 64,
        },
        ..narrow_config(OptimizerConfig::RandomSearch { n_candidates: 100 })
    };
    assert_within_bounds(config, LOW, HIGH);
}

#[test]
fn test_discrete_choices_outside_bounds_are_clamped() {
    // Transformed choices beyond the box are pulled back to its faces.
    let config = narrow_config(OptimizerConfig::Discrete {
        choices: vec![vec![-0.5], vec![0.1], vec![1.5]],
        grid_points: 0,
    });
    assert_within_bounds(config, LOW, HIGH);
}

#[test]
fn test_unbounded_search_uses_unit_box() {
    let config = GuideConfig {
        lower_bounds: None,
        upper_bounds: None,
        ..base_config()
    };
    assert_within_bounds(config, E_LOW, E_HIGH);
}

#[test]
fn test_half_open_bounds() {
    // Only an upper bound: sampling reaches one training span below it.
    let config = GuideConfig {
        lower_bounds: Some(vec![f64::NEG_INFINITY]),
        upper_bounds: Some(vec![9000.0]),
        ..base_config()
    };
    assert_within_bounds(config, 9000.0 - (E_HIGH - E_LOW), 9000.0);
}

#[test]
fn test_search_bounds_are_normalized() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(narrow_config(OptimizerConfig::RandomSearch {
        n_candidates: 10,
    }));
    guide.build(&x, &y).unwrap();
    let bounds = guide.search_bounds().unwrap();
    assert!((bounds.lower()[0] - 0.25).abs() < 1e-12);
    assert!((bounds.upper()[0] - 0.75).abs() < 1e-12);
}
