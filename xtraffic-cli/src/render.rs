//! Reference renderer: moves each instance in straight lines between its
//! positions.

use xtraffic::collaborators::{Airframe, AirframeFactory, AirframeSeed, AirframeState, TerrainProbe};
use xtraffic::error::AirframeError;
use xtraffic::geo::Position;
use xtraffic::registry::{Feed, Fetch};

/// Terrain at a fixed elevation everywhere.
#[derive(Debug, Clone, Copy)]
pub struct FlatTerrain {
    pub elevation_m: f64,
}

impl TerrainProbe for FlatTerrain {
    fn terrain_alt_m(&self, _: &Position) -> Option<f64> {
        Some(self.elevation_m)
    }
}

/// Creates [`LinearAirframe`]s seen from a fixed viewer.
#[derive(Debug, Clone)]
pub struct LinearFactory {
    viewer: Position,
}

impl LinearFactory {
    pub fn new(viewer: Position) -> Self {
        Self { viewer }
    }
}

impl AirframeFactory for LinearFactory {
    fn create(&self, seed: AirframeSeed) -> Result<Box<dyn Airframe>, AirframeError> {
        let ordered = seed.from.ts < seed.to.ts;
        if !ordered {
            return Err(AirframeError::InvalidSeed(format!(
                "positions at {:.1} and {:.1} not in order",
                seed.from.ts, seed.to.ts
            )));
        }
        Ok(Box::new(LinearAirframe::new(seed, self.viewer.clone())))
    }
}

/// Interpolates linearly between the position it comes from and the one it
/// flies to.
pub struct LinearAirframe {
    from: Position,
    to: Position,
    viewer: Position,
    state: AirframeState,
}

impl LinearAirframe {
    fn new(seed: AirframeSeed, viewer: Position) -> Self {
        let mut airframe = Self {
            state: AirframeState {
                target: seed.to.clone(),
                present: seed.from.clone(),
                track: 0.0,
                vsi_m_s: 0.0,
                speed_m_s: 0.0,
                on_ground: seed.from.is_on_ground(),
                phase: seed.to.flags.phase,
                terrain_alt_m: None,
                view_distance_m: viewer.dist_to(&seed.from),
                valid: true,
            },
            from: seed.from,
            to: seed.to,
            viewer,
        };
        airframe.update_leg();
        airframe
    }

    fn update_leg(&mut self) {
        let v = self.from.between(&self.to);
        self.state.target = self.to.clone();
        self.state.track = if v.has_angle() { v.angle } else { self.state.track };
        self.state.vsi_m_s = if v.vsi.is_finite() { v.vsi } else { 0.0 };
        self.state.speed_m_s = if v.speed.is_finite() { v.speed } else { 0.0 };
        self.state.phase = self.to.flags.phase;
    }

    fn interpolate(&self, sim_time: f64) -> Position {
        let span = self.to.ts - self.from.ts;
        let f = if span > 0.0 {
            ((sim_time - self.from.ts) / span).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let mut pos = if f < 0.5 { self.from.clone() } else { self.to.clone() };
        pos.lat = self.from.lat + f * (self.to.lat - self.from.lat);
        pos.lon = self.from.lon + f * (self.to.lon - self.from.lon);
        pos.alt_m = match (self.from.alt_m, self.to.alt_m) {
            (Some(a), Some(b)) => Some(a + f * (b - a)),
            (a, b) => a.or(b),
        };
        pos.ts = sim_time;
        pos
    }
}

impl Airframe for LinearAirframe {
    fn advance(&mut self, sim_time: f64, feed: &Feed<'_>) {
        while sim_time >= self.to.ts {
            match feed.try_fetch_next(&self.to) {
                Fetch::Ready(fetched) => {
                    let Some(next) = fetched.positions.into_iter().next() else {
                        break;
                    };
                    self.from = std::mem::replace(&mut self.to, next);
                    self.update_leg();
                    // keep the buffer recomputed ahead of the instance
                    feed.request_recalc(sim_time);
                }
                Fetch::NoData => {
                    feed.request_recalc(sim_time);
                    break;
                }
                Fetch::NoLock => break,
            }
        }

        let mut present = self.interpolate(sim_time);
        self.state.terrain_alt_m = feed.terrain_alt_m(&present);
        if present.is_on_ground() {
            present.alt_m = self.state.terrain_alt_m.or(present.alt_m);
        }
        self.state.on_ground = present.is_on_ground();
        self.state.view_distance_m = self.viewer.dist_to(&present);
        self.state.present = present;
    }

    fn state(&self) -> AirframeState {
        self.state.clone()
    }

    fn invalidate(&mut self) {
        self.state.valid = false;
    }
}
