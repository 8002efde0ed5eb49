//! Raw position queue, ground status, merge and insert.

use tracing::debug;

use super::{Implausible, Track};
use crate::collaborators::TerrainProbe;
use crate::config::PipelineConfig;
use crate::geo::{GroundStatus, Position};

/// What happened to a raw position during integration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InsertOutcome {
    /// Merged into the position at this index.
    Merged(usize),
    /// Inserted at this index.
    Inserted(usize),
    /// A similar position exists but merging would break the ordering or
    /// touch a refined position.
    Skipped,
    /// The leg to the preceding position is implausible.
    Rejected(Implausible),
}

/// Decide the ground status of `pos` from the terrain altitude below it.
///
/// Positions below the ground threshold are put on the ground; positions on
/// the ground get their altitude snapped slightly below terrain so the
/// wheels touch. Returns `false` if the terrain is unknown.
pub fn derive_ground_status(
    pos: &mut Position,
    terrain_alt_m: Option<f64>,
    config: &PipelineConfig,
) -> bool {
    let Some(terrain) = terrain_alt_m else {
        return false;
    };

    if !pos.is_on_ground() && pos.alt_m.is_some_and(|alt| alt < terrain + config.ground_agl_m()) {
        pos.flags.ground = GroundStatus::On;
    }

    if pos.is_on_ground() {
        pos.alt_m = Some(terrain - config.close_to_ground_m);
    } else {
        pos.flags.ground = GroundStatus::Off;
    }
    true
}

impl Track {
    /// Queue a raw position for the next integration pass.
    ///
    /// Positions not clearly after the instance's current target are stale
    /// and dropped. Returns whether the position was queued.
    pub fn add_raw_position(&mut self, pos: Position, config: &PipelineConfig) -> bool {
        if let Some(target) = self.instance_target() {
            if pos.not_after(target, config.similar_ts_secs) {
                debug!(key = %self.key, pos = %pos, "Stale position skipped");
                return false;
            }
        }
        self.incoming.push_back(pos);
        true
    }

    /// Integrate all queued raw positions.
    ///
    /// Runs on the render thread as terrain is probed for each position.
    /// Returns `true` if the buffer holds positions afterwards, i.e. a
    /// recompute should follow.
    pub fn append_new_positions(&mut self, config: &PipelineConfig, terrain: &dyn TerrainProbe) -> bool {
        if self.incoming.is_empty() {
            return false;
        }

        while let Some(mut pos) = self.incoming.pop_front() {
            let terrain_alt = terrain.terrain_alt_m(&pos);
            derive_ground_status(&mut pos, terrain_alt, config);
            self.insert_position(pos, config);
        }

        match self.positions.back() {
            Some(back) => {
                self.youngest_ts = back.ts;
                true
            }
            None => false,
        }
    }

    /// Merge `pos` into a similar position, or insert it in time order.
    ///
    /// An insert is only done if the leg from the preceding position (the
    /// instance target when inserting at the front) is plausible. Headings
    /// of the affected position and its neighbours are recomputed.
    pub fn insert_position(&mut self, pos: Position, config: &PipelineConfig) -> InsertOutcome {
        let tolerance = config.similar_ts_secs;

        let (idx, outcome) =
            match self.positions.iter().position(|p| p.has_similar_ts(&pos, tolerance)) {
                Some(i) => {
                    let after_prev = i == 0 || self.positions[i - 1].ts < pos.ts;
                    let before_next = self.positions.get(i + 1).map_or(true, |n| n.ts > pos.ts);
                    if !after_prev || !before_next || self.positions[i].is_post_processed() {
                        debug!(key = %self.key, pos = %pos, "Position overlaps neighbours, skipped");
                        return InsertOutcome::Skipped;
                    }
                    self.positions[i].merge(&pos);
                    debug!(key = %self.key, pos = %pos, into_ts = self.positions[i].ts, "Position merged");
                    (i, InsertOutcome::Merged(i))
                }
                None => {
                    let idx = self
                        .positions
                        .iter()
                        .position(|p| p.ts > pos.ts)
                        .unwrap_or(self.positions.len());

                    if let Err(why) = self.check_insert(idx, &pos, config) {
                        debug!(key = %self.key, pos = %pos, reason = %why, "Implausible position ignored");
                        return InsertOutcome::Rejected(why);
                    }
                    self.positions.insert(idx, pos);
                    (idx, InsertOutcome::Inserted(idx))
                }
            };

        if idx > 0 {
            self.calc_heading(idx - 1, config);
        }
        self.calc_heading(idx, config);
        if idx + 1 < self.positions.len() {
            self.calc_heading(idx + 1, config);
        }

        // rough attitude, the renderer refines it
        let p = &mut self.positions[idx];
        p.pitch = Some(if p.is_on_ground() { 0.0 } else { 2.0 });
        p.roll = Some(0.0);

        outcome
    }

    /// Validate the leg into a position about to be inserted at `idx`.
    fn check_insert(&self, idx: usize, pos: &Position, config: &PipelineConfig) -> Result<(), Implausible> {
        let (before, heading) = if idx >= 2 {
            let before = &self.positions[idx - 1];
            (before, Some(self.positions[idx - 2].angle_to(before)))
        } else if idx == 1 {
            let before = &self.positions[0];
            (before, self.instance_target().map(|t| t.angle_to(before)))
        } else {
            match self.instance_state() {
                Some(state) => (&state.target, Some(state.track)),
                None => return Ok(()),
            }
        };
        self.is_pos_ok(config, before, pos, heading).map(|_| ())
    }
}
