//! Static attributes of a vehicle.

/// Identity data that changes rarely during a flight.
///
/// Empty strings and zero values mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticData {
    /// Registration, e.g. `D-ABQE`.
    pub registration: String,
    /// Registry country.
    pub country: String,
    /// ICAO aircraft type designator, e.g. `DH8D`.
    pub type_designator: String,
    pub manufacturer: String,
    /// Long model text, e.g. `Bombardier DHC-8 402`.
    pub model: String,
    pub category: String,
    /// Year built.
    pub year: u16,
    pub military: bool,
    pub turbine: bool,
    pub call_sign: String,
    pub origin: String,
    pub destination: String,
    pub flight_number: String,
    /// Operator name.
    pub operator: String,
    /// Operator ICAO code, e.g. `BER`.
    pub operator_code: String,
    /// Set by the first merge; fragments leave it unset.
    pub initialized: bool,
}

/// What a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Type, operator code or registration changed.
    pub model_changed: bool,
    /// First merge ever, or the call sign changed.
    pub needs_master_data: bool,
}

fn overwrite_if_set(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

fn fill_if_empty(target: &mut String, value: &str) -> bool {
    if target.is_empty() && !value.is_empty() {
        *target = value.to_string();
        return true;
    }
    false
}

impl StaticData {
    /// Merge a fragment, copying only fields that are set in `other`.
    ///
    /// Fields that select the rendered model resist flapping between
    /// sources that disagree:
    /// - the type designator is only replaced while empty or equal to
    ///   `car_type`
    /// - operator code and registration only change from empty to set
    ///
    /// Route fields follow the source with the longer flight number.
    pub fn merge(&mut self, other: &StaticData, car_type: &str) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            needs_master_data: !self.initialized
                || (!other.call_sign.is_empty() && other.call_sign != self.call_sign),
            ..Default::default()
        };

        if !other.type_designator.is_empty()
            && (self.type_designator.is_empty() || self.type_designator == car_type)
            && self.type_designator != other.type_designator
        {
            self.type_designator = other.type_designator.clone();
            outcome.model_changed = true;
        }

        overwrite_if_set(&mut self.country, &other.country);
        overwrite_if_set(&mut self.manufacturer, &other.manufacturer);
        if other.model.len() > self.model.len() {
            self.model = other.model.clone();
        }
        overwrite_if_set(&mut self.category, &other.category);
        if other.year != 0 {
            self.year = other.year;
        }
        // flags only ever switch on
        if other.military {
            self.military = true;
        }
        if other.turbine {
            self.turbine = true;
        }

        overwrite_if_set(&mut self.call_sign, &other.call_sign);

        if other.flight_number.len() > self.flight_number.len()
            || (other.flight_number.is_empty() && self.flight_number.is_empty())
        {
            overwrite_if_set(&mut self.origin, &other.origin);
            overwrite_if_set(&mut self.destination, &other.destination);
            overwrite_if_set(&mut self.flight_number, &other.flight_number);
        }

        overwrite_if_set(&mut self.operator, &other.operator);
        outcome.model_changed |= fill_if_empty(&mut self.operator_code, &other.operator_code);
        outcome.model_changed |= fill_if_empty(&mut self.registration, &other.registration);

        self.initialized = true;
        outcome
    }

    /// `ORIG-DEST` with `?` for a missing side, empty if both are unknown.
    pub fn route(&self) -> String {
        if self.origin.is_empty() && self.destination.is_empty() {
            return String::new();
        }
        let side = |s: &str| if s.is_empty() { "?".to_string() } else { s.to_string() };
        format!("{}-{}", side(&self.origin), side(&self.destination))
    }

    /// Flight number, call sign, registration, or `default`.
    pub fn ac_id<'a>(&'a self, default: &'a str) -> &'a str {
        [&self.flight_number, &self.call_sign, &self.registration]
            .into_iter()
            .find(|s| !s.is_empty())
            .map(String::as_str)
            .unwrap_or(default)
    }

    /// `FLIGHT: ORIG-DEST`, or whichever part is known.
    pub fn flight_route(&self) -> String {
        let route = self.route();
        match (self.flight_number.is_empty(), route.is_empty()) {
            (true, true) => String::new(),
            (true, false) => route,
            (false, true) => self.flight_number.clone(),
            (false, false) => format!("{}: {}", self.flight_number, route),
        }
    }

    /// Best guess for an airline livery: the operator code, otherwise the
    /// first three characters of the call sign.
    pub fn airline_code(&self) -> String {
        if self.operator_code.is_empty() {
            self.call_sign.chars().take(3).collect()
        } else {
            self.operator_code.clone()
        }
    }

    /// Whether flight number, registration or call sign equal `text`.
    pub fn matches(&self, text: &str) -> bool {
        !text.is_empty()
            && (self.flight_number == text || self.registration == text || self.call_sign == text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight_model::CAR_TYPE;

    fn reg(r: &str) -> StaticData {
        StaticData {
            registration: r.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_registration_only_fills_empty() {
        let mut s = StaticData::default();
        s.merge(&reg(""), CAR_TYPE);
        assert_eq!(s.registration, "");
        let out = s.merge(&reg("D-ABCD"), CAR_TYPE);
        assert!(out.model_changed);
        assert_eq!(s.registration, "D-ABCD");
        let out = s.merge(&reg("N12345"), CAR_TYPE);
        assert!(!out.model_changed);
        assert_eq!(s.registration, "D-ABCD");
    }

    #[test]
    fn test_type_replaces_car_placeholder_only() {
        let mut s = StaticData {
            type_designator: CAR_TYPE.to_string(),
            ..Default::default()
        };
        let a320 = StaticData {
            type_designator: "A320".to_string(),
            ..Default::default()
        };
        assert!(s.merge(&a320, CAR_TYPE).model_changed);
        assert_eq!(s.type_designator, "A320");

        let b738 = StaticData {
            type_designator: "B738".to_string(),
            ..Default::default()
        };
        s.merge(&b738, CAR_TYPE);
        assert_eq!(s.type_designator, "A320");
    }

    #[test]
    fn test_route_follows_longer_flight_number() {
        let mut s = StaticData {
            flight_number: "LH1".to_string(),
            origin: "EDDF".to_string(),
            destination: "EDDM".to_string(),
            ..Default::default()
        };
        let shorter = StaticData {
            flight_number: "L".to_string(),
            origin: "KJFK".to_string(),
            ..Default::default()
        };
        s.merge(&shorter, CAR_TYPE);
        assert_eq!(s.origin, "EDDF");

        let longer = StaticData {
            flight_number: "DLH123".to_string(),
            origin: "EDDH".to_string(),
            ..Default::default()
        };
        s.merge(&longer, CAR_TYPE);
        assert_eq!(s.origin, "EDDH");
        assert_eq!(s.destination, "EDDM");
        assert_eq!(s.flight_route(), "DLH123: EDDH-EDDM");
    }

    #[test]
    fn test_model_text_longer_wins() {
        let mut s = StaticData::default();
        s.model = "Airbus A320".to_string();
        let short = StaticData {
            model: "A320".to_string(),
            ..Default::default()
        };
        s.merge(&short, CAR_TYPE);
        assert_eq!(s.model, "Airbus A320");
    }

    #[test]
    fn test_master_data_request() {
        let mut s = StaticData::default();
        assert!(s.merge(&StaticData::default(), CAR_TYPE).needs_master_data);
        assert!(!s.merge(&StaticData::default(), CAR_TYPE).needs_master_data);
        let call = StaticData {
            call_sign: "DLH4AB".to_string(),
            ..Default::default()
        };
        assert!(s.merge(&call, CAR_TYPE).needs_master_data);
        assert!(s.initialized);
    }

    #[test]
    fn test_helpers() {
        let s = StaticData {
            call_sign: "DLH4AB".to_string(),
            destination: "EDDM".to_string(),
            ..Default::default()
        };
        assert_eq!(s.route(), "?-EDDM");
        assert_eq!(s.flight_route(), "?-EDDM");
        assert_eq!(s.ac_id("3C6444"), "DLH4AB");
        assert_eq!(StaticData::default().ac_id("3C6444"), "3C6444");
        assert_eq!(s.airline_code(), "DLH");
        assert!(s.matches("DLH4AB"));
        assert!(!s.matches(""));
    }
}
