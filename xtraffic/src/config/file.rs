//! Configuration file handling for ~/.xtraffic/config.ini.
//!
//! Every key is optional; missing keys keep their default. Unknown keys are
//! ignored so older files keep loading.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::Ini;
use thiserror::Error;

use super::PipelineConfig;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write config file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl PipelineConfig {
    /// Load configuration from the default path (~/.xtraffic/config.ini).
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load configuration from a specific path.
    ///
    /// If the file doesn't exist, returns defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI content.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigFileError> {
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("tracking")) {
            let p = SectionParser::new("tracking", section);
            p.read(&mut config.similar_ts_secs, "similar_ts", non_negative)?;
            p.read(&mut config.similar_pos_dist_m, "similar_pos_dist", non_negative)?;
            p.read(&mut config.ground_agl_ft, "ground_agl", non_negative)?;
            p.read(&mut config.close_to_ground_m, "close_to_ground", non_negative)?;
            p.read(&mut config.max_turn_deg, "max_turn", turn_angle)?;
            p.read(&mut config.max_turn_ground_deg, "max_turn_ground", turn_angle)?;
            p.read(&mut config.takeoff_lookahead_secs, "takeoff_lookahead", lookahead)?;
            p.read(&mut config.max_hover_agl_ft, "max_hover_agl", non_negative)?;
            p.read(&mut config.time_required_pos_secs, "time_required_pos", non_negative)?;
            p.read(&mut config.artificial_stop_secs, "artificial_stop", non_negative)?;
        }

        if let Some(section) = ini.section(Some("approach")) {
            let p = SectionParser::new("approach", section);
            p.read(&mut config.keep_above_angle_deg, "keep_above_angle", glide_angle)?;
            p.read(&mut config.keep_above_max_alt_ft, "keep_above_max_alt", non_negative)?;
            p.read(&mut config.keep_above_max_agl_ft, "keep_above_max_agl", non_negative)?;
            p.read(&mut config.runway_align_dist_m, "runway_align_dist", non_negative)?;
            p.read(&mut config.final_speed_factor, "final_speed_factor", fraction)?;
        }

        if let Some(section) = ini.section(Some("registry")) {
            let p = SectionParser::new("registry", section);
            p.read(&mut config.refresh_interval_secs, "refresh_interval", positive)?;
            p.read(&mut config.outdated_interval_secs, "outdated_interval", positive)?;
            p.read(&mut config.max_instances, "max_instances", |_| Ok(()))?;
            p.read(&mut config.max_distance_nm, "max_distance", positive)?;
            p.read(&mut config.snap_taxi_dist_m, "snap_taxi_dist", non_negative)?;
            p.read(&mut config.too_many_warning_secs, "too_many_warning", non_negative)?;
        }

        Ok(config)
    }

    /// Serialize to INI content with all keys present.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("tracking"))
            .set("similar_ts", self.similar_ts_secs.to_string())
            .set("similar_pos_dist", self.similar_pos_dist_m.to_string())
            .set("ground_agl", self.ground_agl_ft.to_string())
            .set("close_to_ground", self.close_to_ground_m.to_string())
            .set("max_turn", self.max_turn_deg.to_string())
            .set("max_turn_ground", self.max_turn_ground_deg.to_string())
            .set("takeoff_lookahead", self.takeoff_lookahead_secs.to_string())
            .set("max_hover_agl", self.max_hover_agl_ft.to_string())
            .set("time_required_pos", self.time_required_pos_secs.to_string())
            .set("artificial_stop", self.artificial_stop_secs.to_string());
        ini.with_section(Some("approach"))
            .set("keep_above_angle", self.keep_above_angle_deg.to_string())
            .set("keep_above_max_alt", self.keep_above_max_alt_ft.to_string())
            .set("keep_above_max_agl", self.keep_above_max_agl_ft.to_string())
            .set("runway_align_dist", self.runway_align_dist_m.to_string())
            .set("final_speed_factor", self.final_speed_factor.to_string());
        ini.with_section(Some("registry"))
            .set("refresh_interval", self.refresh_interval_secs.to_string())
            .set("outdated_interval", self.outdated_interval_secs.to_string())
            .set("max_instances", self.max_instances.to_string())
            .set("max_distance", self.max_distance_nm.to_string())
            .set("snap_taxi_dist", self.snap_taxi_dist_m.to_string())
            .set("too_many_warning", self.too_many_warning_secs.to_string());
        ini
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        self.to_ini()
            .write_to_file(path)
            .map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }
}

/// Reads typed values from one INI section.
struct SectionParser<'a> {
    name: &'static str,
    section: &'a ini::Properties,
}

impl<'a> SectionParser<'a> {
    fn new(name: &'static str, section: &'a ini::Properties) -> Self {
        Self { name, section }
    }

    /// Overwrite `target` if `key` is present, after parsing and checking it.
    fn read<T, F>(&self, target: &mut T, key: &str, check: F) -> Result<(), ConfigFileError>
    where
        T: FromStr,
        F: Fn(&T) -> Result<(), &'static str>,
    {
        let Some(raw) = self.section.get(key) else {
            return Ok(());
        };
        let raw = raw.trim();
        let invalid = |reason: &str| ConfigFileError::InvalidValue {
            section: self.name.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            reason: reason.to_string(),
        };
        let value: T = raw.parse().map_err(|_| invalid("not a number"))?;
        check(&value).map_err(invalid)?;
        *target = value;
        Ok(())
    }
}

fn non_negative(v: &f64) -> Result<(), &'static str> {
    if v.is_finite() && *v >= 0.0 {
        Ok(())
    } else {
        Err("must be zero or positive")
    }
}

fn positive(v: &f64) -> Result<(), &'static str> {
    if v.is_finite() && *v > 0.0 {
        Ok(())
    } else {
        Err("must be positive")
    }
}

fn turn_angle(v: &f64) -> Result<(), &'static str> {
    if (0.0..=180.0).contains(v) {
        Ok(())
    } else {
        Err("must be between 0 and 180 degrees")
    }
}

fn glide_angle(v: &f64) -> Result<(), &'static str> {
    if *v > 0.0 && *v < 45.0 {
        Ok(())
    } else {
        Err("must be between 0 and 45 degrees")
    }
}

fn fraction(v: &f64) -> Result<(), &'static str> {
    if *v > 0.0 && *v <= 1.0 {
        Ok(())
    } else {
        Err("must be in (0, 1]")
    }
}

fn lookahead(v: &f64) -> Result<(), &'static str> {
    if *v > 0.0 && *v <= super::MAX_TAKEOFF_LOOKAHEAD_SECS {
        Ok(())
    } else {
        Err("must be between 0 and 60 seconds")
    }
}

/// Get the path to the config directory (~/.xtraffic).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".xtraffic")
}

/// Get the path to the config file (~/.xtraffic/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
