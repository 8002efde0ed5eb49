//! End-to-end scenarios through the track registry.
//!
//! The recompute worker is stopped in these tests; recomputes happen on the
//! render thread through the scripted airframe so results are deterministic.
//!
//! Run with: `cargo test --test pipeline_scenarios`

mod common;

use std::sync::Arc;

use common::{air, dynamic_for, gnd, key, FlatTerrain, ScriptedFactory};
use xtraffic::collaborators::{ChannelRef, NoAirports};
use xtraffic::config::PipelineConfig;
use xtraffic::flight_model::FlightModelCatalog;
use xtraffic::geo::Position;
use xtraffic::phase::FlightPhase;
use xtraffic::registry::TrackRegistry;
use xtraffic::report::{ReplayChannel, ReplaySource};
use xtraffic::track::{DynamicData, DynamicOutcome, StaticData, TrackKey};

// ============================================================================
// Helper Functions
// ============================================================================

fn registry() -> TrackRegistry {
    let mut registry = TrackRegistry::new(
        PipelineConfig::default(),
        Arc::new(NoAirports),
        FlightModelCatalog::default(),
        Arc::new(ScriptedFactory),
    )
    .unwrap();
    registry.shutdown();
    registry
}

fn feed(registry: &TrackRegistry, k: TrackKey, positions: &[Position]) {
    for pos in positions {
        registry.add_dynamic(k, dynamic_for(pos), Some(pos.clone()));
    }
    registry.append_all_new(&FlatTerrain);
}

fn buffered(registry: &TrackRegistry, k: TrackKey) -> Vec<Position> {
    registry
        .get(&k)
        .unwrap()
        .with_track(|t| t.positions().iter().cloned().collect())
}

// ============================================================================
// Scenarios
// ============================================================================

/// A descending vehicle followed by a ground report gets a touch-down
/// between the two, on the ground, preceded by an airborne position.
///
/// At a gentle sink rate the touch-down would fall after the ground report;
/// that report then becomes the touch-down itself, covered by
/// `test_touch_down_relabels_next_when_too_late` in `track/synthesis.rs`.
#[test]
fn test_landing_synthesizes_touch_down() {
    let registry = registry();
    let k = key(0x3c6444);
    // 2000 ft/min descent at about 144 kn, then a ground report
    feed(
        &registry,
        k,
        &[air(0.0, 0.0, 2000.0, 0.0), air(0.0, 0.02, 1000.0, 30.0), gnd(0.0, 0.06, 90.0)],
    );

    let viewer = air(0.0, 0.0, 0.0, 10.0);
    assert_eq!(registry.maintenance(10.0, &viewer, &FlatTerrain).created, 1);

    registry.advance_instances(20.0, &FlatTerrain);

    let state = registry.get(&k).unwrap().instance_state().unwrap();
    let td = &state.target;
    assert_eq!(td.flags.phase, FlightPhase::TouchDown);
    assert!(td.is_on_ground());
    assert!(td.ts > 30.0 && td.ts < 90.0, "touch-down at {}", td.ts);
    // the position before the touch-down is airborne
    assert_eq!(state.present.ts, 30.0);
    assert!(!state.present.is_on_ground());

    let rest = buffered(&registry, k);
    assert_eq!(rest.len(), 1);
    assert!(rest[0].is_on_ground());
    assert_eq!(rest[0].ts, 90.0);
}

/// 3000 m in 5 s is about 1170 kn, far beyond any flight model's speed.
/// The second report lies outside the similarity window so it is not merged.
#[test]
fn test_teleporting_position_rejected() {
    let registry = registry();
    let k = key(0x4ca7b1);
    feed(&registry, k, &[air(0.0, 0.0, 5000.0, 100.0), air(0.0, 0.027, 5000.0, 105.0)]);

    let positions = buffered(&registry, k);
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].ts, 100.0);
}

/// A report within the similarity window merges instead of adding.
#[test]
fn test_similar_report_merged() {
    let registry = registry();
    let k = key(0x4ca7b1);
    feed(&registry, k, &[air(0.0, 0.0, 5000.0, 100.0), air(0.0, 0.1, 5000.0, 160.0)]);
    feed(&registry, k, &[air(0.0, 0.1001, 5000.0, 161.0)]);

    let positions = buffered(&registry, k);
    assert_eq!(positions.len(), 2);
    assert_eq!(positions[1].merge_count(), 2);
}

#[test]
fn test_registration_only_fills_empty() {
    let registry = registry();
    let k = key(0x3c6444);
    let reg = |r: &str| StaticData {
        registration: r.to_string(),
        ..Default::default()
    };

    registry.update_statics(k, &reg(""));
    registry.update_statics(k, &reg("D-ABCD"));
    registry.update_statics(k, &reg("N12345"));

    assert_eq!(registry.get(&k).unwrap().statics().registration, "D-ABCD");
}

#[test]
fn test_lower_priority_channel_rejected() {
    let registry = registry();
    let k = key(0x3c6444);
    let high: ChannelRef = Arc::new(ReplayChannel::new(1, "high", 10));
    let low: ChannelRef = Arc::new(ReplayChannel::new(2, "low", 5));
    let from = |channel: &ChannelRef, ts: f64| DynamicData {
        ts,
        channel: Some(Arc::clone(channel)),
        ..Default::default()
    };

    let first = registry.add_dynamic(k, from(&high, 100.0), Some(air(0.0, 0.0, 5000.0, 100.0)));
    assert!(first.is_accepted());
    let second = registry.add_dynamic(k, from(&low, 101.0), Some(air(0.0, 0.001, 5000.0, 101.0)));
    assert_eq!(second, DynamicOutcome::LowerPriority);

    let handle = registry.get(&k).unwrap();
    assert_eq!(handle.current_channel().map(|c| c.id()), Some(1));
}

#[test]
fn test_replay_feeds_registry() {
    let recording = r#"
{"kind":"attributes","key":"3C6444","call_sign":"BER123","registration":"D-ABQE"}
{"kind":"position","key":"3C6444","ts":100.0,"lat":0.0,"lon":0.0,"alt_ft":5000}
{"kind":"position","key":"3C6444","ts":160.0,"lat":0.0,"lon":0.1,"alt_ft":5000}
{"kind":"position","key":"3C6444","ts":220.0,"lat":0.0,"lon":0.2,"alt_ft":5000}
"#;
    let mut source = ReplaySource::from_reader(recording.as_bytes()).unwrap();
    let registry = registry();

    source.set_horizon(160.0);
    assert_eq!(registry.pump_attributes(&mut source), 1);
    assert_eq!(registry.pump_positions(&mut source), 2);
    registry.append_all_new(&FlatTerrain);

    let k = key(0x3c6444);
    let handle = registry.get(&k).unwrap();
    assert_eq!(handle.len(), 2);
    assert_eq!(handle.statics().ac_id("?"), "BER123");

    source.set_horizon(f64::INFINITY);
    assert_eq!(registry.pump_positions(&mut source), 1);
    assert!(source.is_exhausted());
}

/// Once its data stops, a track is removed after the outdated interval.
#[test]
fn test_stale_track_reaped() {
    let registry = registry();
    let k = key(0x3c6444);
    feed(&registry, k, &[air(0.0, 0.0, 5000.0, 100.0), air(0.0, 0.1, 5000.0, 160.0)]);
    let viewer = air(0.0, 0.0, 0.0, 0.0);

    assert_eq!(registry.maintenance(130.0, &viewer, &FlatTerrain).created, 1);
    // creation took both positions, nothing follows
    registry.advance_instances(165.0, &FlatTerrain);
    assert!(buffered(&registry, k).is_empty());

    assert_eq!(registry.maintenance(200.0, &viewer, &FlatTerrain).removed, 0);
    assert_eq!(registry.maintenance(211.0, &viewer, &FlatTerrain).removed, 1);
    assert!(registry.is_empty());
}
