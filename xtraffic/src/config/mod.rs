//! Pipeline configuration.
//!
//! All tunable thresholds of the pipeline live in [`PipelineConfig`]. The
//! defaults are the values the pipeline has always shipped with; a user may
//! override any of them in `~/.xtraffic/config.ini` (see [`file`]).

mod file;

pub use file::{config_directory, config_file_path, ConfigFileError};

use crate::geo::{M_PER_FT, M_PER_NM};

/// Default timestamp tolerance for merging positions (seconds).
pub const DEFAULT_SIMILAR_TS_SECS: f64 = 3.0;

/// Default distance below which two positions count as "the same place" (meters).
pub const DEFAULT_SIMILAR_POS_DIST_M: f64 = 3.0;

/// Default height above terrain considered on the ground (feet).
pub const DEFAULT_GROUND_AGL_FT: f64 = 50.0;

/// Default epsilon placed below terrain for on-ground positions (meters).
pub const DEFAULT_CLOSE_TO_GROUND_M: f64 = 0.5;

/// Default maximum turn at a position in flight (degrees).
pub const DEFAULT_MAX_TURN_DEG: f64 = 90.0;

/// Default maximum turn at a position on the ground (degrees).
pub const DEFAULT_MAX_TURN_GROUND_DEG: f64 = 120.0;

/// Default lookahead for take-off detection (seconds).
pub const DEFAULT_TAKEOFF_LOOKAHEAD_SECS: f64 = 35.0;

/// Upper bound for the take-off lookahead (seconds).
pub const MAX_TAKEOFF_LOOKAHEAD_SECS: f64 = 60.0;

/// Default ceiling for hover removal above terrain (feet).
pub const DEFAULT_MAX_HOVER_AGL_FT: f64 = 2000.0;

/// Default minimum time a synthesized position must lie ahead (seconds).
pub const DEFAULT_TIME_REQUIRED_POS_SECS: f64 = 0.5;

/// Default time after which an artificial stop is placed (seconds).
pub const DEFAULT_ARTIFICIAL_STOP_SECS: f64 = 10.0;

/// Default minimum descent angle kept above a runway (degrees).
pub const DEFAULT_KEEP_ABOVE_ANGLE_DEG: f64 = 2.5;

/// Default altitude ceiling for the glide-slope clamp (feet).
pub const DEFAULT_KEEP_ABOVE_MAX_ALT_FT: f64 = 18000.0;

/// Default height ceiling above terrain for the glide-slope clamp (feet).
pub const DEFAULT_KEEP_ABOVE_MAX_AGL_FT: f64 = 5000.0;

/// Default distance of the runway alignment point before touch-down (meters).
pub const DEFAULT_RUNWAY_ALIGN_DIST_M: f64 = 500.0;

/// Default final approach speed as a fraction of the flaps-down speed.
pub const DEFAULT_FINAL_SPEED_FACTOR: f64 = 0.8;

/// Default interval in which channels deliver fresh data (seconds).
pub const DEFAULT_REFRESH_INTERVAL_SECS: f64 = 20.0;

/// Default inactivity after which a track is outdated (seconds).
pub const DEFAULT_OUTDATED_INTERVAL_SECS: f64 = 50.0;

/// Default maximum number of renderable instances.
pub const DEFAULT_MAX_INSTANCES: usize = 50;

/// Default maximum distance of an instance from the viewer (nautical miles).
pub const DEFAULT_MAX_DISTANCE_NM: f64 = 25.0;

/// Default maximum distance for snapping to taxiways (meters, 0 = off).
pub const DEFAULT_SNAP_TAXI_DIST_M: f64 = 15.0;

/// Default throttle for the "too many instances" warning (seconds).
pub const DEFAULT_TOO_MANY_WARNING_SECS: f64 = 180.0;

/// Tunable thresholds of the position pipeline.
///
/// Times are in seconds of simulated time, distances in meters unless the
/// field name says otherwise.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    // [tracking]
    pub similar_ts_secs: f64,
    pub similar_pos_dist_m: f64,
    pub ground_agl_ft: f64,
    pub close_to_ground_m: f64,
    pub max_turn_deg: f64,
    pub max_turn_ground_deg: f64,
    pub takeoff_lookahead_secs: f64,
    pub max_hover_agl_ft: f64,
    pub time_required_pos_secs: f64,
    pub artificial_stop_secs: f64,

    // [approach]
    pub keep_above_angle_deg: f64,
    pub keep_above_max_alt_ft: f64,
    pub keep_above_max_agl_ft: f64,
    pub runway_align_dist_m: f64,
    pub final_speed_factor: f64,

    // [registry]
    pub refresh_interval_secs: f64,
    pub outdated_interval_secs: f64,
    pub max_instances: usize,
    pub max_distance_nm: f64,
    pub snap_taxi_dist_m: f64,
    pub too_many_warning_secs: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            similar_ts_secs: DEFAULT_SIMILAR_TS_SECS,
            similar_pos_dist_m: DEFAULT_SIMILAR_POS_DIST_M,
            ground_agl_ft: DEFAULT_GROUND_AGL_FT,
            close_to_ground_m: DEFAULT_CLOSE_TO_GROUND_M,
            max_turn_deg: DEFAULT_MAX_TURN_DEG,
            max_turn_ground_deg: DEFAULT_MAX_TURN_GROUND_DEG,
            takeoff_lookahead_secs: DEFAULT_TAKEOFF_LOOKAHEAD_SECS,
            max_hover_agl_ft: DEFAULT_MAX_HOVER_AGL_FT,
            time_required_pos_secs: DEFAULT_TIME_REQUIRED_POS_SECS,
            artificial_stop_secs: DEFAULT_ARTIFICIAL_STOP_SECS,
            keep_above_angle_deg: DEFAULT_KEEP_ABOVE_ANGLE_DEG,
            keep_above_max_alt_ft: DEFAULT_KEEP_ABOVE_MAX_ALT_FT,
            keep_above_max_agl_ft: DEFAULT_KEEP_ABOVE_MAX_AGL_FT,
            runway_align_dist_m: DEFAULT_RUNWAY_ALIGN_DIST_M,
            final_speed_factor: DEFAULT_FINAL_SPEED_FACTOR,
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            outdated_interval_secs: DEFAULT_OUTDATED_INTERVAL_SECS,
            max_instances: DEFAULT_MAX_INSTANCES,
            max_distance_nm: DEFAULT_MAX_DISTANCE_NM,
            snap_taxi_dist_m: DEFAULT_SNAP_TAXI_DIST_M,
            too_many_warning_secs: DEFAULT_TOO_MANY_WARNING_SECS,
        }
    }
}

impl PipelineConfig {
    /// Height above terrain considered on the ground, in meters.
    pub fn ground_agl_m(&self) -> f64 {
        self.ground_agl_ft * M_PER_FT
    }

    /// Ceiling for hover removal above terrain, in meters.
    pub fn max_hover_agl_m(&self) -> f64 {
        self.max_hover_agl_ft * M_PER_FT
    }

    /// Ratio of height over distance on the minimum descent line.
    pub fn keep_above_ratio(&self) -> f64 {
        self.keep_above_angle_deg.to_radians().tan()
    }

    pub fn keep_above_max_alt_m(&self) -> f64 {
        self.keep_above_max_alt_ft * M_PER_FT
    }

    pub fn keep_above_max_agl_m(&self) -> f64 {
        self.keep_above_max_agl_ft * M_PER_FT
    }

    /// Maximum distance of an instance from the viewer, in meters.
    pub fn max_distance_m(&self) -> f64 {
        self.max_distance_nm * M_PER_NM
    }

    /// Maximum turn allowed at a position.
    pub fn max_turn(&self, on_ground: bool) -> f64 {
        if on_ground {
            self.max_turn_ground_deg
        } else {
            self.max_turn_deg
        }
    }

    /// Set the merge tolerance.
    pub fn with_similar_ts(mut self, secs: f64) -> Self {
        self.similar_ts_secs = secs;
        self
    }

    /// Set the outdated interval.
    pub fn with_outdated_interval(mut self, secs: f64) -> Self {
        self.outdated_interval_secs = secs;
        self
    }

    /// Set the maximum number of renderable instances.
    pub fn with_max_instances(mut self, max: usize) -> Self {
        self.max_instances = max;
        self
    }

    /// Set the taxiway snap distance (0 disables snapping).
    pub fn with_snap_taxi_dist(mut self, meters: f64) -> Self {
        self.snap_taxi_dist_m = meters;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.similar_ts_secs, 3.0);
        assert_eq!(config.max_turn(true), 120.0);
        assert_eq!(config.max_turn(false), 90.0);
        assert!(config.takeoff_lookahead_secs <= MAX_TAKEOFF_LOOKAHEAD_SECS);
        assert!((config.ground_agl_m() - 15.24).abs() < 1e-9);
    }

    #[test]
    fn test_keep_above_ratio() {
        let config = PipelineConfig::default();
        // about 44m per km for 2.5°
        assert!((config.keep_above_ratio() * 1000.0 - 43.66).abs() < 0.01);
    }

    #[test]
    fn test_builders() {
        let config = PipelineConfig::default()
            .with_similar_ts(1.0)
            .with_max_instances(3)
            .with_snap_taxi_dist(0.0);
        assert_eq!(config.similar_ts_secs, 1.0);
        assert_eq!(config.max_instances, 3);
        assert_eq!(config.snap_taxi_dist_m, 0.0);
    }
}
