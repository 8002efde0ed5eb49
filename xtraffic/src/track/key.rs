//! Vehicle keys.

use std::fmt;

use thiserror::Error;

/// Kind of identifier a key carries, in ascending order of priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum KeyType {
    #[default]
    Unknown,
    /// Open Glider Network id (32 bit).
    Ogn,
    /// RealTraffic id (32 bit).
    RealTraffic,
    /// FLARM id (24 bit).
    Flarm,
    /// ICAO transponder address (24 bit).
    Icao,
}

impl KeyType {
    /// Number of hex digits in the formatted key.
    fn width(&self) -> usize {
        match self {
            KeyType::Unknown => 0,
            KeyType::Ogn | KeyType::RealTraffic => 8,
            KeyType::Flarm | KeyType::Icao => 6,
        }
    }

    fn max_num(&self) -> u64 {
        match self {
            KeyType::Unknown => 0,
            KeyType::Ogn | KeyType::RealTraffic => 0xFFFF_FFFF,
            KeyType::Flarm | KeyType::Icao => 0xFF_FFFF,
        }
    }
}

/// Error parsing a key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("'{0}' is not a hexadecimal id")]
    NotHex(String),

    #[error("id {value:X} too large for {key_type:?}")]
    OutOfRange { key_type: KeyType, value: u64 },

    #[error("key type must not be Unknown")]
    UnknownType,
}

/// Unique key of a vehicle.
///
/// Keys order by type first, then by number, so registry iteration visits
/// all OGN vehicles before any ICAO vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TrackKey {
    pub key_type: KeyType,
    pub num: u64,
}

impl TrackKey {
    pub fn new(key_type: KeyType, num: u64) -> Result<Self, KeyError> {
        if key_type == KeyType::Unknown {
            return Err(KeyError::UnknownType);
        }
        if num > key_type.max_num() {
            return Err(KeyError::OutOfRange {
                key_type,
                value: num,
            });
        }
        Ok(Self { key_type, num })
    }

    /// Parse a hexadecimal id.
    pub fn parse(key_type: KeyType, hex: &str) -> Result<Self, KeyError> {
        let trimmed = hex.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let num =
            u64::from_str_radix(digits, 16).map_err(|_| KeyError::NotHex(hex.to_string()))?;
        Self::new(key_type, num)
    }

    /// Shorthand for an ICAO transponder address.
    pub fn icao(num: u64) -> Result<Self, KeyError> {
        Self::new(KeyType::Icao, num)
    }

    /// Whether the key was never set.
    pub fn is_empty(&self) -> bool {
        self.key_type == KeyType::Unknown
    }

    /// Whether `text` equals the formatted key, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        !self.is_empty() && self.to_string().eq_ignore_ascii_case(text.trim())
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$X}", self.num, width = self.key_type.width())
    }
}
