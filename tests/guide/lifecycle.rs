use xanes_steering::acquisition::AcquisitionConfig;
use xanes_steering::stopping::StoppingCriterionConfig;
use xanes_steering::{Error, ExperimentGuide, GuideConfig, GuidePhase};

use crate::{base_config, initial_batch, measure};

#[test]
fn test_unbuilt_guide() {
    let mut guide = ExperimentGuide::new(base_config());
    assert_eq!(guide.phase(), GuidePhase::Unbuilt);
    assert!(matches!(guide.suggest(), Err(Error::NotBuilt)));
    assert!(matches!(guide.model(), Err(Error::NotBuilt)));
    assert!(matches!(guide.measured_data(), Err(Error::NotBuilt)));
    assert!(matches!(
        guide.posterior_mean_std(&[vec![9000.0]]),
        Err(Error::TransformNotFitted | Error::NotBuilt)
    ));
}

#[test]
fn test_suggest_update_counters() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    assert_eq!(guide.phase(), GuidePhase::Built);
    assert_eq!(guide.n_measured(), 20);

    for i in 1..=4 {
        let next = guide.suggest().unwrap();
        assert_eq!(next.len(), 1);
        assert_eq!(next[0].len(), 1);
        guide.update(&next, &measure(&next)).unwrap();
        assert_eq!(guide.n_suggest_calls(), i);
        assert_eq!(guide.n_update_calls(), i);
        assert_eq!(guide.n_measured(), 20 + i);
    }
    assert_eq!(guide.phase(), GuidePhase::Iterating);
}

#[test]
fn test_update_without_suggest() {
    let (x, y) = initial_batch(10);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    let extra = vec![vec![8999.0], vec![9003.0]];
    guide.update(&extra, &measure(&extra)).unwrap();
    assert_eq!(guide.n_suggest_calls(), 0);
    assert_eq!(guide.n_update_calls(), 1);
    assert_eq!(guide.n_measured(), 12);
}

#[test]
fn test_analytic_batch_rejected_at_build() {
    let (x, y) = initial_batch(10);
    let config = GuideConfig {
        num_candidates: 2,
        ..base_config()
    };
    let mut guide = ExperimentGuide::new(config);
    assert!(matches!(
        guide.build(&x, &y),
        Err(Error::AnalyticBatchSize { num_candidates: 2 })
    ));
    assert_eq!(guide.phase(), GuidePhase::Unbuilt);
}

#[test]
fn test_oversized_monte_carlo_batch_rejected_at_build() {
    let (x, y) = initial_batch(10);
    let config = GuideConfig {
        num_candidates: 40,
        acquisition: AcquisitionConfig::QUpperConfidenceBound {
            beta: 0.5,
            mc_samples: 16,
        },
        ..base_config()
    };
    let mut guide = ExperimentGuide::new(config);
    assert!(matches!(
        guide.build(&x, &y),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(guide.phase(), GuidePhase::Unbuilt);
}

#[test]
fn test_negative_noise_rejected_at_build() {
    let (x, y) = initial_batch(10);
    let config = GuideConfig {
        noise_variance: Some(-1e-6),
        ..base_config()
    };
    let mut guide = ExperimentGuide::new(config);
    assert!(matches!(
        guide.build(&x, &y),
        Err(Error::InvalidParameter(_))
    ));
    assert_eq!(guide.phase(), GuidePhase::Unbuilt);
}

#[test]
fn test_conflicting_noise_rejected_at_build() {
    let (x, y) = initial_batch(10);
    let mut config = base_config();
    config.surrogate.train_yvar = Some(vec![1e-4; 10]);
    let mut guide = ExperimentGuide::new(config);
    assert!(matches!(guide.build(&x, &y), Err(Error::ConflictingNoise)));
}

#[test]
fn test_per_point_noise_without_fixed_noise() {
    let (x, y) = initial_batch(10);
    let mut config = base_config();
    config.noise_variance = None;
    config.surrogate.train_yvar = Some(vec![1e-4; 10]);
    let mut guide = ExperimentGuide::new(config);
    guide.build(&x, &y).unwrap();
    let next = guide.suggest().unwrap();
    guide.update(&next, &measure(&next)).unwrap();
    assert_eq!(guide.n_measured(), 11);
}

#[test]
fn test_length_mismatch_rejected() {
    let (x, _) = initial_batch(10);
    let mut guide = ExperimentGuide::new(base_config());
    assert!(matches!(
        guide.build(&x, &[0.0; 9]),
        Err(Error::LengthMismatch { x: 10, y: 9 })
    ));
}

#[test]
fn test_monte_carlo_batch() {
    let (x, y) = initial_batch(15);
    let config = GuideConfig {
        num_candidates: 3,
        acquisition: AcquisitionConfig::QUpperConfidenceBound {
            beta: 0.5,
            mc_samples: 64,
        },
        ..base_config()
    };
    let mut guide = ExperimentGuide::new(config);
    guide.build(&x, &y).unwrap();
    let batch = guide.suggest().unwrap();
    assert_eq!(batch.len(), 3);
    for (i, a) in batch.iter().enumerate() {
        for b in &batch[i + 1..] {
            assert!((a[0] - b[0]).abs() > 1e-9, "duplicate candidate {a:?}");
        }
    }
    guide.update(&batch, &measure(&batch)).unwrap();
    assert_eq!(guide.n_measured(), 18);
}

#[test]
fn test_posterior_interpolates_measurements() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    let (mu, sigma) = guide.posterior_mean_std(&x).unwrap();
    for ((m, s), t) in mu.iter().zip(&sigma).zip(&y) {
        assert!((m - t).abs() < 1e-2, "mean {m} vs measured {t}");
        assert!(*s < 1e-2);
    }
}

#[test]
fn test_acquisition_values_match_points() {
    let (x, y) = initial_batch(12);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    let grid: Vec<Vec<f64>> = (0..5).map(|i| vec![8930.0 + 30.0 * f64::from(i)]).collect();
    let values = guide.acquisition_values(&grid).unwrap();
    assert_eq!(values.len(), 5);
    assert!(values.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn test_stopped_guide_refuses_work() {
    let (x, y) = initial_batch(10);
    let config = GuideConfig {
        stopping: Some(StoppingCriterionConfig {
            threshold: 1e9,
            n_updates_to_begin: 1,
            n_check_interval: 1,
            ..StoppingCriterionConfig::default()
        }),
        ..base_config()
    };
    let mut guide = ExperimentGuide::new(config);
    guide.build(&x, &y).unwrap();
    assert!(!guide.should_stop().unwrap());
    let next = guide.suggest().unwrap();
    guide.update(&next, &measure(&next)).unwrap();
    assert!(guide.should_stop().unwrap());
    assert_eq!(guide.phase(), GuidePhase::Stopped);
    assert!(matches!(guide.suggest(), Err(Error::GuideStopped)));
    assert!(matches!(
        guide.update(&next, &measure(&next)),
        Err(Error::GuideStopped)
    ));
    // Queries still work after stopping.
    assert!(guide.posterior_mean_std(&next).is_ok());
    assert!(guide.should_stop().unwrap());
}

#[test]
fn test_rebuild_after_stop() {
    let (x, y) = initial_batch(10);
    let config = GuideConfig {
        stopping: Some(StoppingCriterionConfig {
            threshold: 1e9,
            n_updates_to_begin: 0,
            n_check_interval: 1,
            ..StoppingCriterionConfig::default()
        }),
        ..base_config()
    };
    let mut guide = ExperimentGuide::new(config);
    guide.build(&x, &y).unwrap();
    assert!(guide.should_stop().unwrap());
    guide.build(&x, &y).unwrap();
    assert_eq!(guide.phase(), GuidePhase::Built);
    assert!(guide.suggest().is_ok());
}
