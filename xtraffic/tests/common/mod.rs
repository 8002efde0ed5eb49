//! Test doubles for the collaborator traits.

#![allow(dead_code)]

use xtraffic::collaborators::{Airframe, AirframeFactory, AirframeSeed, AirframeState, TerrainProbe};
use xtraffic::error::AirframeError;
use xtraffic::geo::{GroundStatus, Position, MS_PER_FTM};
use xtraffic::phase::FlightPhase;
use xtraffic::registry::{Feed, Fetch};
use xtraffic::track::{DynamicData, TrackKey};

/// Terrain at sea level everywhere.
pub struct FlatTerrain;

impl TerrainProbe for FlatTerrain {
    fn terrain_alt_m(&self, _: &Position) -> Option<f64> {
        Some(0.0)
    }
}

/// Airframe that jumps from position to position.
///
/// On every advance it recomputes its track right away and takes the next
/// position once the current target is reached or a recompute put a new
/// position in front of it.
pub struct ScriptedAirframe {
    state: AirframeState,
}

impl ScriptedAirframe {
    pub fn new(seed: &AirframeSeed) -> Self {
        Self {
            state: AirframeState {
                target: seed.to.clone(),
                present: seed.from.clone(),
                track: seed.from.angle_to(&seed.to),
                vsi_m_s: seed.from.vsi_ft_to(&seed.to) * MS_PER_FTM,
                speed_m_s: seed.from.speed_to(&seed.to),
                on_ground: seed.from.is_on_ground(),
                phase: FlightPhase::Unknown,
                terrain_alt_m: Some(0.0),
                view_distance_m: 0.0,
                valid: true,
            },
        }
    }
}

impl Airframe for ScriptedAirframe {
    fn advance(&mut self, sim_time: f64, feed: &Feed<'_>) {
        if feed.recalc_now(sim_time).is_err() {
            return;
        }
        if let Fetch::Ready(fetched) = feed.try_fetch_next(&self.state.target) {
            if let Some(next) = fetched.positions.into_iter().next() {
                self.state.present = std::mem::replace(&mut self.state.target, next);
                self.state.on_ground = self.state.present.is_on_ground();
                self.state.phase = self.state.target.flags.phase;
            }
        }
    }

    fn state(&self) -> AirframeState {
        self.state.clone()
    }

    fn invalidate(&mut self) {
        self.state.valid = false;
    }
}

pub struct ScriptedFactory;

impl AirframeFactory for ScriptedFactory {
    fn create(&self, seed: AirframeSeed) -> Result<Box<dyn Airframe>, AirframeError> {
        Ok(Box::new(ScriptedAirframe::new(&seed)))
    }
}

pub fn key(num: u64) -> TrackKey {
    TrackKey::icao(num).unwrap()
}

pub fn air(lat: f64, lon: f64, alt_ft: f64, ts: f64) -> Position {
    Position::with_alt_ft(lat, lon, alt_ft, ts)
}

pub fn gnd(lat: f64, lon: f64, ts: f64) -> Position {
    Position::new(lat, lon, None, ts).ground(GroundStatus::On)
}

/// Dynamic data matching `pos`, from no particular channel.
pub fn dynamic_for(pos: &Position) -> DynamicData {
    DynamicData {
        ts: pos.ts,
        on_ground: pos.is_on_ground(),
        ..Default::default()
    }
}
