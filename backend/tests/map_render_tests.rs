//! From a delivered flux result to what the map draws: viewport stats, color
//! bins, radii and GeoJSON.

mod support;

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use flux_map::models::to_feature_collection;
use flux_map::services::{
    load_station_registry, BoundingBox, ColorBinner, ColorBinnerConfig, CoordinatorConfig,
    FluxResult, Outcome, RepositoryFluxSource, RequestCoordinator, Rgb, ViewportStats,
    ViewportWatcher,
};

async fn commute_result() -> Arc<FluxResult> {
    let repo = Arc::new(support::commute_repository());
    let registry = load_station_registry(repo.as_ref()).await.unwrap();
    let coordinator = RequestCoordinator::new(
        Arc::new(RepositoryFluxSource::new(repo)),
        Arc::new(registry),
        CoordinatorConfig::default(),
    );
    match coordinator.request(support::first_week_commute()).await.unwrap() {
        Outcome::Delivered(result) => result,
        Outcome::Superseded => panic!("nothing else was requested"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_scales_follow_the_viewport() {
    let result = commute_result().await;
    let watcher = ViewportWatcher::new(Duration::from_millis(50));

    watcher.set_data(result.points.clone());
    assert_eq!(
        watcher.stats(),
        ViewportStats {
            min_flux: -1.0,
            max_flux: 1.0,
            max_rides: 3.0,
        }
    );

    let fluxes: Vec<f64> = result.points.iter().map(|p| p.flux).collect();
    let scale = ColorBinner::default().build(&watcher.stats(), &fluxes).unwrap();
    assert_eq!(scale.color(0.0), Rgb::NEUTRAL);
    assert_eq!(scale.color(1.0), Rgb::GREEN);
    assert_ne!(scale.color(-1.0), scale.color(1.0));
    assert_eq!(scale.radius(3.0), 10.0);
    assert_eq!(scale.radius(0.0), 2.0);
    assert_eq!(scale.legend().len(), scale.bins().len());

    // Zoom onto station A only; nothing happens until the debounce settles
    watcher.viewport_moved(BoundingBox::new(-74.005, 40.70, -73.995, 40.72));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(watcher.stats().max_flux, 1.0);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        watcher.stats(),
        ViewportStats {
            min_flux: -1.0,
            max_flux: -1.0,
            max_rides: 3.0,
        }
    );

    // Pan over open water: the last stats stay
    watcher.viewport_moved(BoundingBox::new(-72.0, 39.0, -71.0, 40.0));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(watcher.stats().min_flux, -1.0);
    assert_eq!(watcher.stats().max_rides, 3.0);
}

#[tokio::test(start_paused = true)]
async fn test_continuous_pan_recomputes_once() {
    let result = commute_result().await;
    let watcher = ViewportWatcher::new(Duration::from_millis(50));
    watcher.set_data(result.points.clone());
    let mut updates = watcher.subscribe();
    updates.borrow_and_update();

    // Twenty intermediate viewports, 5ms apart, ending on station B
    for i in 0..20 {
        let shift = f64::from(i) * 0.0001;
        watcher.viewport_moved(BoundingBox::new(-74.20 + shift, 40.0, -73.0, 41.0));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    watcher.viewport_moved(BoundingBox::new(-73.995, 40.725, -73.985, 40.735));
    assert!(!updates.has_changed().unwrap());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(updates.has_changed().unwrap());
    assert_eq!(updates.borrow_and_update().min_flux, 1.0);
}

#[tokio::test]
async fn test_feature_collection_for_result() {
    let result = commute_result().await;
    let collection = to_feature_collection(&result.points);

    let features = collection["features"].as_array().unwrap();
    assert_eq!(features.len(), 2);
    for feature in features {
        assert_eq!(feature["geometry"]["type"], "Point");
        assert_eq!(feature["properties"]["rides"], 3.0);
    }
}

fn config_strategy() -> impl Strategy<Value = ColorBinnerConfig> {
    (1usize..4, 0usize..5, 0.5f64..20.0).prop_map(|(min_bins, extra, flux_per_bin)| {
        ColorBinnerConfig {
            min_bins,
            max_bins: min_bins + extra,
            flux_per_bin,
            ..ColorBinnerConfig::default()
        }
    })
}

proptest! {
    #[test]
    fn zero_flux_is_always_neutral(
        config in config_strategy(),
        min_flux in -500.0f64..0.0,
        max_flux in 0.5f64..500.0,
        max_rides in 0.5f64..1000.0,
    ) {
        let stats = ViewportStats { min_flux, max_flux, max_rides };
        let scale = ColorBinner::new(config.clone()).build(&stats, &[0.0]).unwrap();
        prop_assert_eq!(scale.color(0.0), config.neutral);
    }

    #[test]
    fn twice_the_maximum_clamps_to_top_bin(
        config in config_strategy(),
        min_flux in -500.0f64..0.0,
        max_flux in 0.5f64..500.0,
        max_rides in 0.5f64..1000.0,
    ) {
        let stats = ViewportStats { min_flux, max_flux, max_rides };
        let scale = ColorBinner::new(config).build(&stats, &[2.0 * max_flux]).unwrap();
        let top = scale.bins().last().unwrap();

        prop_assert_eq!(scale.bin_index(2.0 * max_flux), scale.bins().len() - 1);
        prop_assert_eq!(scale.color(2.0 * max_flux), top.color);
        prop_assert_eq!(top.count, 1);
    }

    #[test]
    fn every_value_lands_in_exactly_one_bin(
        min_flux in -500.0f64..0.0,
        max_flux in 0.5f64..500.0,
        values in prop::collection::vec(-2000.0f64..2000.0, 0..50),
    ) {
        let stats = ViewportStats { min_flux, max_flux, max_rides: 1.0 };
        let scale = ColorBinner::default().build(&stats, &values).unwrap();
        let total: usize = scale.bins().iter().map(|b| b.count).sum();
        prop_assert_eq!(total, values.len());
    }
}
