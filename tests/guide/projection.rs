use xanes_steering::model::SurrogateVariant;
use xanes_steering::{Error, ExperimentGuide, GuideConfig};

use crate::{E_HIGH, E_LOW, base_config, initial_batch, measure};

fn projected_config() -> GuideConfig {
    let mut config = base_config();
    config.surrogate.variant = SurrogateVariant::ProjectedSpace;
    config
}

#[test]
fn test_projection_needs_four_points() {
    let (x, y) = initial_batch(3);
    let mut guide = ExperimentGuide::new(projected_config());
    assert!(matches!(
        guide.build(&x, &y),
        Err(Error::InsufficientProjectionPoints {
            required: 4,
            got: 3
        })
    ));
}

#[test]
fn test_projection_built_from_four_points() {
    let x = vec![vec![8920.0], vec![8990.0], vec![9010.0], vec![9080.0]];
    let y = measure(&x);
    let mut guide = ExperimentGuide::new(projected_config());
    guide.build(&x, &y).unwrap();
    let projection = guide.projection_function().unwrap();
    let (grid, mapping) = projection.table();
    assert_eq!(grid.len(), mapping.len());
    assert!(mapping.windows(2).all(|w| w[1] >= w[0]));
    assert!(mapping[0].abs() < 1e-12);
    assert!((mapping[mapping.len() - 1] - 1.0).abs() < 1e-12);
}

#[test]
fn test_standard_surrogate_has_no_projection() {
    let (x, y) = initial_batch(10);
    let mut guide = ExperimentGuide::new(base_config());
    guide.build(&x, &y).unwrap();
    assert!(guide.projection_function().is_none());
}

#[test]
fn test_projected_guide_iterates() {
    let (x, y) = initial_batch(20);
    let mut guide = ExperimentGuide::new(projected_config());
    guide.build(&x, &y).unwrap();
    let projection = guide.projection_function().unwrap();
    assert!((0.4..0.65).contains(&projection.edge_location()));

    for _ in 0..5 {
        let next = guide.suggest().unwrap();
        assert!((E_LOW..=E_HIGH).contains(&next[0][0]));
        guide.update(&next, &measure(&next)).unwrap();
    }
    assert_eq!(guide.n_measured(), 25);
    let (mu, _) = guide.posterior_mean_std(&[vec![9040.0]]).unwrap();
    assert!(mu[0].is_finite());
}
