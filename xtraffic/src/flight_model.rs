//! Per-type kinematic parameters.
//!
//! A [`FlightModel`] carries the nominal speeds and rates the pipeline uses
//! to judge plausibility and to synthesize positions. The
//! [`FlightModelCatalog`] maps ICAO type designators to models; unknown
//! types fall back to the generic jet.
//!
//! # File format
//!
//! ```ini
//! [MediumJets]
//! VSI_INIT_CLIMB = 2000
//! FLAPS_DOWN_SPEED = 180
//! types = A319 A320 A321 B737 B738
//!
//! ; inherits all values from MediumJets
//! [Regional:MediumJets]
//! FLAPS_DOWN_SPEED = 160
//! types = CRJ9 E190
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use ini::Ini;
use tracing::{debug, warn};

use crate::config::ConfigFileError;

/// Type designator used for ground vehicles.
pub const CAR_TYPE: &str = "ZZZC";

/// Name of the built-in model.
pub const DEFAULT_MODEL_NAME: &str = "MediumJets";

const PARENT_SEPARATOR: char = ':';
const TYPES_KEY: &str = "types";

/// Kinematic parameters of an aircraft type.
///
/// Speeds are in knots, vertical speeds in ft/min, heights in feet and
/// times in seconds, as in the usual aviation units.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightModel {
    pub name: String,
    /// Time to rotate before lift-off.
    pub rotate_time: f64,
    /// Below this absolute VSI flight counts as level.
    pub vsi_stable: f64,
    /// Assumed VSI on final if no vector is available.
    pub vsi_final: f64,
    /// Assumed VSI after take-off if no vector is available.
    pub vsi_init_climb: f64,
    /// Assumed speed after take-off if no vector is available.
    pub speed_init_climb: f64,
    /// Below this: taxi, above: take-off or roll-out.
    pub max_taxi_speed: f64,
    /// Below this: initial climb, above: climb.
    pub flaps_up_speed: f64,
    /// Above this: descend, below: approach.
    pub flaps_down_speed: f64,
    /// Height above ground to start the flare.
    pub agl_flare: f64,
    /// Deceleration during roll-out in m/s².
    pub roll_out_decel: f64,
    /// Main gear deflection at touch-down in meters.
    pub gear_deflection: f64,
    /// Time for a full circle on the ground.
    pub taxi_turn_time: f64,
    /// Time for a full circle in flight.
    pub flight_turn_time: f64,
    /// Above this height flight counts as cruise.
    pub cruise_height: f64,
}

impl Default for FlightModel {
    fn default() -> Self {
        Self {
            name: DEFAULT_MODEL_NAME.to_string(),
            rotate_time: 3.0,
            vsi_stable: 100.0,
            vsi_final: -600.0,
            vsi_init_climb: 1500.0,
            speed_init_climb: 150.0,
            max_taxi_speed: 50.0,
            flaps_up_speed: 180.0,
            flaps_down_speed: 200.0,
            agl_flare: 25.0,
            roll_out_decel: -2.0,
            gear_deflection: 0.5,
            taxi_turn_time: 45.0,
            flight_turn_time: 120.0,
            cruise_height: 15000.0,
        }
    }
}

impl FlightModel {
    /// Apply one `KEY = value` line. Returns `false` for unknown keys.
    fn assign(&mut self, key: &str, value: f64) -> bool {
        let slot = match key {
            "ROTATE_TIME" => &mut self.rotate_time,
            "VSI_STABLE" => &mut self.vsi_stable,
            "VSI_FINAL" => &mut self.vsi_final,
            "VSI_INIT_CLIMB" => &mut self.vsi_init_climb,
            "SPEED_INIT_CLIMB" => &mut self.speed_init_climb,
            "MAX_TAXI_SPEED" => &mut self.max_taxi_speed,
            "FLAPS_UP_SPEED" => &mut self.flaps_up_speed,
            "FLAPS_DOWN_SPEED" => &mut self.flaps_down_speed,
            "AGL_FLARE" => &mut self.agl_flare,
            "ROLL_OUT_DECEL" => &mut self.roll_out_decel,
            "GEAR_DEFLECTION" => &mut self.gear_deflection,
            "TAXI_TURN_TIME" => &mut self.taxi_turn_time,
            "FLIGHT_TURN_TIME" => &mut self.flight_turn_time,
            "CRUISE_HEIGHT" => &mut self.cruise_height,
            _ => return false,
        };
        *slot = value;
        true
    }
}

/// Flight models indexed by name and by type designator.
#[derive(Debug, Clone)]
pub struct FlightModelCatalog {
    default: Arc<FlightModel>,
    by_name: HashMap<String, Arc<FlightModel>>,
    by_type: HashMap<String, Arc<FlightModel>>,
}

impl Default for FlightModelCatalog {
    fn default() -> Self {
        let default = Arc::new(FlightModel::default());
        let mut by_name = HashMap::new();
        by_name.insert(default.name.clone(), Arc::clone(&default));
        Self {
            default,
            by_name,
            by_type: HashMap::new(),
        }
    }
}

impl FlightModelCatalog {
    /// Load models from a file. A missing file yields the built-in model only.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    /// Build the catalog from INI content.
    ///
    /// A section named `Child:Parent` starts from the values of `Parent`,
    /// which must appear earlier in the file.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigFileError> {
        let mut catalog = Self::default();

        for (section_name, props) in ini.iter() {
            let Some(section_name) = section_name else {
                continue;
            };

            let (name, parent) = match section_name.split_once(PARENT_SEPARATOR) {
                Some((name, parent)) => (name.trim(), Some(parent.trim())),
                None => (section_name.trim(), None),
            };

            let mut model = match parent {
                Some(parent) => match catalog.by_name.get(parent) {
                    Some(p) => FlightModel::clone(p),
                    None => {
                        warn!(model = name, parent, "Unknown parent flight model, using defaults");
                        FlightModel::default()
                    }
                },
                None => FlightModel::default(),
            };
            model.name = name.to_string();

            let mut types = Vec::new();
            for (key, raw) in props.iter() {
                if key == TYPES_KEY {
                    types.extend(raw.split_whitespace().map(str::to_uppercase));
                    continue;
                }
                let value: f64 = raw.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: section_name.to_string(),
                    key: key.to_string(),
                    value: raw.to_string(),
                    reason: "not a number".to_string(),
                })?;
                if !model.assign(key, value) {
                    warn!(model = name, key, "Unknown flight model parameter ignored");
                }
            }

            let model = Arc::new(model);
            for t in types {
                catalog.by_type.insert(t, Arc::clone(&model));
            }
            if model.name == DEFAULT_MODEL_NAME {
                catalog.default = Arc::clone(&model);
            }
            debug!(model = %model.name, "Flight model loaded");
            catalog.by_name.insert(model.name.clone(), model);
        }

        Ok(catalog)
    }

    /// Model for a type designator, falling back to the default model.
    pub fn find(&self, type_designator: &str) -> Arc<FlightModel> {
        self.by_type
            .get(&type_designator.to_uppercase())
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }

    /// Model by section name.
    pub fn get(&self, name: &str) -> Option<Arc<FlightModel>> {
        self.by_name.get(name).cloned()
    }

    /// The fallback model.
    pub fn default_model(&self) -> Arc<FlightModel> {
        Arc::clone(&self.default)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[MediumJets]
VSI_INIT_CLIMB = 2000
types = A320 b738

[Regional:MediumJets]
FLAPS_DOWN_SPEED = 160
types = CRJ9
";

    #[test]
    fn test_default_model_values() {
        let m = FlightModel::default();
        assert_eq!(m.vsi_init_climb, 1500.0);
        assert_eq!(m.flaps_down_speed, 200.0);
        assert_eq!(m.max_taxi_speed, 50.0);
    }

    #[test]
    fn test_unknown_type_falls_back() {
        let catalog = FlightModelCatalog::default();
        assert_eq!(catalog.find("XXXX").name, DEFAULT_MODEL_NAME);
    }

    #[test]
    fn test_types_and_inheritance() {
        let ini = Ini::load_from_str(SAMPLE).unwrap();
        let catalog = FlightModelCatalog::from_ini(&ini).unwrap();

        let a320 = catalog.find("A320");
        assert_eq!(a320.vsi_init_climb, 2000.0);
        // case-insensitive type lookup
        assert_eq!(catalog.find("B738").name, "MediumJets");

        let crj = catalog.find("crj9");
        assert_eq!(crj.name, "Regional");
        assert_eq!(crj.vsi_init_climb, 2000.0);
        assert_eq!(crj.flaps_down_speed, 160.0);

        // redefined default replaces the built-in one
        assert_eq!(catalog.default_model().vsi_init_climb, 2000.0);
    }

    #[test]
    fn test_invalid_number() {
        let ini = Ini::load_from_str("[Jets]\nVSI_FINAL = fast\n").unwrap();
        assert!(matches!(
            FlightModelCatalog::from_ini(&ini),
            Err(ConfigFileError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file_yields_default() {
        let dir = tempfile::TempDir::new().unwrap();
        let catalog = FlightModelCatalog::load_from(&dir.path().join("models.ini")).unwrap();
        assert_eq!(catalog.len(), 1);
    }
}
