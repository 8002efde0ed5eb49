//! Flight phases.
//!
//! A coarse state derived from buffer geometry. Phases are ordered along a
//! typical flight so range checks such as "approach or later, but not yet
//! landing" read naturally.

use std::fmt;

/// Flight phase of a position or a renderable instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum FlightPhase {
    /// No phase determined.
    #[default]
    Unknown,
    /// Moving on the ground.
    Taxi,
    /// Take-off roll.
    TakeOffRoll,
    /// Rotating before lift-off.
    Rotate,
    /// Wheels leave the ground.
    LiftOff,
    /// Initial climb with flaps extended.
    InitialClimb,
    /// Climb.
    Climb,
    /// Level flight.
    Cruise,
    /// Descent.
    Descend,
    /// Approach.
    Approach,
    /// Final approach, aligned with the runway.
    Final,
    /// Flare just above the runway.
    Flare,
    /// Wheels touch the ground.
    TouchDown,
    /// Decelerating on the runway.
    RollOut,
    /// Stopped; also used for artificial stops off the runway.
    StoppedOnRunway,
}

impl FlightPhase {
    /// First phase of the landing group.
    pub const LANDING: FlightPhase = FlightPhase::Flare;

    /// Whether this is any phase other than `Unknown`.
    pub fn is_known(&self) -> bool {
        *self != FlightPhase::Unknown
    }

    /// Take-off roll through initial climb.
    pub fn is_take_off(&self) -> bool {
        (FlightPhase::TakeOffRoll..=FlightPhase::InitialClimb).contains(self)
    }

    /// Flare through stopped.
    pub fn is_landing(&self) -> bool {
        *self >= Self::LANDING
    }

    /// Approach or final, i.e. airborne and heading for a runway.
    pub fn is_approaching(&self) -> bool {
        (FlightPhase::Approach..Self::LANDING).contains(self)
    }

    /// Approach up to (but excluding) the final stop.
    ///
    /// A track in this range is kept alive even without fresh data so a
    /// landing can complete.
    pub fn is_completing_landing(&self) -> bool {
        (FlightPhase::Approach..FlightPhase::StoppedOnRunway).contains(self)
    }

    /// Get a human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            FlightPhase::Unknown => "unknown",
            FlightPhase::Taxi => "taxiing",
            FlightPhase::TakeOffRoll => "take-off roll",
            FlightPhase::Rotate => "rotating",
            FlightPhase::LiftOff => "lift-off",
            FlightPhase::InitialClimb => "initial climb",
            FlightPhase::Climb => "climbing",
            FlightPhase::Cruise => "cruise flight",
            FlightPhase::Descend => "descending",
            FlightPhase::Approach => "on approach",
            FlightPhase::Final => "on final",
            FlightPhase::Flare => "flaring",
            FlightPhase::TouchDown => "touching down",
            FlightPhase::RollOut => "rolling out",
            FlightPhase::StoppedOnRunway => "stopped",
        }
    }

    /// Short tag for debug output.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlightPhase::Unknown => "",
            FlightPhase::Taxi => "Taxi",
            FlightPhase::TakeOffRoll => "Take Off Roll",
            FlightPhase::Rotate => "Rotate",
            FlightPhase::LiftOff => "Lift Off",
            FlightPhase::InitialClimb => "Initial Climb",
            FlightPhase::Climb => "Climb",
            FlightPhase::Cruise => "Cruise",
            FlightPhase::Descend => "Descend",
            FlightPhase::Approach => "Approach",
            FlightPhase::Final => "Final",
            FlightPhase::Flare => "Flare",
            FlightPhase::TouchDown => "Touch Down",
            FlightPhase::RollOut => "Roll Out",
            FlightPhase::StoppedOnRunway => "Stopped",
        }
    }
}

impl fmt::Display for FlightPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_groups() {
        assert!(FlightPhase::Rotate.is_take_off());
        assert!(!FlightPhase::Climb.is_take_off());
        assert!(FlightPhase::TouchDown.is_landing());
        assert!(!FlightPhase::Final.is_landing());
        assert!(FlightPhase::Final.is_approaching());
        assert!(!FlightPhase::Flare.is_approaching());
    }

    #[test]
    fn test_completing_landing_excludes_stop() {
        assert!(FlightPhase::Approach.is_completing_landing());
        assert!(FlightPhase::RollOut.is_completing_landing());
        assert!(!FlightPhase::StoppedOnRunway.is_completing_landing());
        assert!(!FlightPhase::Descend.is_completing_landing());
    }

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(FlightPhase::default(), FlightPhase::Unknown);
        assert!(!FlightPhase::default().is_known());
        assert_eq!(FlightPhase::TouchDown.to_string(), "Touch Down");
    }
}
