//! Recorded reports in JSON lines, replayed as position and attribute
//! sources.
//!
//! One record per line, tagged by `kind`:
//!
//! ```text
//! {"kind":"position","key":"3C6444","channel":1,"ts":100.0,"lat":51.4,"lon":6.9,"alt_ft":3500,"speed_kt":160}
//! {"kind":"attributes","key":"3C6444","call_sign":"BER123","type_designator":"A320"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped. Records are released
//! in timestamp order up to the horizon set by the replaying application.

use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::collaborators::{
    AttributeReport, AttributeSource, Channel, ChannelRef, PositionReport, PositionSource,
};
use crate::geo::{GroundStatus, Position, M_PER_FT};
use crate::track::{DynamicData, KeyError, KeyType, StaticData, TrackKey};

/// Errors reading a recording.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("failed to read recording: {0}")]
    Io(#[from] io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {source}")]
    Key {
        line: usize,
        #[source]
        source: KeyError,
    },
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RecordKeyType {
    Ogn,
    RealTraffic,
    Flarm,
    #[default]
    Icao,
}

impl From<RecordKeyType> for KeyType {
    fn from(t: RecordKeyType) -> Self {
        match t {
            RecordKeyType::Ogn => KeyType::Ogn,
            RecordKeyType::RealTraffic => KeyType::RealTraffic,
            RecordKeyType::Flarm => KeyType::Flarm,
            RecordKeyType::Icao => KeyType::Icao,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PositionRecord {
    key: String,
    #[serde(default)]
    key_type: RecordKeyType,
    #[serde(default)]
    channel: u32,
    ts: f64,
    lat: f64,
    lon: f64,
    alt_ft: Option<f64>,
    heading: Option<f64>,
    speed_kt: Option<f64>,
    vsi_ft: Option<f64>,
    #[serde(default)]
    on_ground: bool,
    squawk: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AttributeRecord {
    key: String,
    key_type: RecordKeyType,
    ts: f64,
    registration: String,
    country: String,
    type_designator: String,
    manufacturer: String,
    model: String,
    category: String,
    year: u16,
    military: bool,
    turbine: bool,
    call_sign: String,
    origin: String,
    destination: String,
    flight_number: String,
    operator: String,
    operator_code: String,
}

impl AttributeRecord {
    fn statics(self) -> StaticData {
        StaticData {
            registration: self.registration,
            country: self.country,
            type_designator: self.type_designator,
            manufacturer: self.manufacturer,
            model: self.model,
            category: self.category,
            year: self.year,
            military: self.military,
            turbine: self.turbine,
            call_sign: self.call_sign,
            origin: self.origin,
            destination: self.destination,
            flight_number: self.flight_number,
            operator: self.operator,
            operator_code: self.operator_code,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Record {
    Position(PositionRecord),
    Attributes(AttributeRecord),
}

/// A channel as seen in a recording.
#[derive(Debug, Clone)]
pub struct ReplayChannel {
    id: u32,
    name: String,
    priority: i32,
}

impl ReplayChannel {
    pub fn new(id: u32, name: impl Into<String>, priority: i32) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
        }
    }
}

impl Channel for ReplayChannel {
    fn id(&self) -> u32 {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// Releases recorded reports up to a moving horizon.
pub struct ReplaySource {
    positions: VecDeque<(TrackKey, PositionRecord)>,
    attributes: VecDeque<(TrackKey, AttributeRecord)>,
    channels: HashMap<u32, ChannelRef>,
    horizon: f64,
}

impl ReplaySource {
    /// Open a recording file.
    pub fn open(path: &Path) -> Result<Self, ReplayError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Read a whole recording.
    pub fn from_reader(reader: impl BufRead) -> Result<Self, ReplayError> {
        let mut positions = Vec::new();
        let mut attributes = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let record: Record =
                serde_json::from_str(trimmed).map_err(|source| ReplayError::Parse { line: idx + 1, source })?;
            let parse_key = |hex: &str, key_type: RecordKeyType| {
                TrackKey::parse(key_type.into(), hex).map_err(|source| ReplayError::Key { line: idx + 1, source })
            };
            match record {
                Record::Position(r) => positions.push((parse_key(&r.key, r.key_type)?, r)),
                Record::Attributes(r) => attributes.push((parse_key(&r.key, r.key_type)?, r)),
            }
        }

        // stable, so equal timestamps keep file order
        positions.sort_by(|a, b| a.1.ts.total_cmp(&b.1.ts));
        attributes.sort_by(|a, b| a.1.ts.total_cmp(&b.1.ts));
        debug!(
            positions = positions.len(),
            attributes = attributes.len(),
            "Recording loaded"
        );

        Ok(Self {
            positions: positions.into(),
            attributes: attributes.into(),
            channels: HashMap::new(),
            horizon: f64::NEG_INFINITY,
        })
    }

    /// Register a channel. Channel ids not registered get a channel named
    /// after the id with priority 0.
    pub fn with_channel(mut self, channel: ChannelRef) -> Self {
        self.channels.insert(channel.id(), channel);
        self
    }

    /// Release all records up to and including `ts`.
    pub fn set_horizon(&mut self, ts: f64) {
        self.horizon = ts;
    }

    /// Timestamp of the first record not yet released.
    pub fn next_ts(&self) -> Option<f64> {
        let p = self.positions.front().map(|(_, r)| r.ts);
        let a = self.attributes.front().map(|(_, r)| r.ts);
        match (p, a) {
            (Some(p), Some(a)) => Some(p.min(a)),
            (p, a) => p.or(a),
        }
    }

    /// Whether all records were released.
    pub fn is_exhausted(&self) -> bool {
        self.positions.is_empty() && self.attributes.is_empty()
    }

    fn channel(&mut self, id: u32) -> ChannelRef {
        let channel = self
            .channels
            .entry(id)
            .or_insert_with(|| Arc::new(ReplayChannel::new(id, format!("channel-{}", id), 0)));
        Arc::clone(channel)
    }
}

impl PositionSource for ReplaySource {
    fn fetch_positions(&mut self) -> Vec<PositionReport> {
        let mut reports = Vec::new();
        while self.positions.front().is_some_and(|(_, r)| r.ts <= self.horizon) {
            let Some((key, r)) = self.positions.pop_front() else {
                break;
            };
            let mut pos = Position::new(r.lat, r.lon, r.alt_ft.map(|ft| ft * M_PER_FT), r.ts);
            pos.heading = r.heading;
            if r.on_ground {
                pos = pos.ground(GroundStatus::On);
            }
            let dynamic = DynamicData {
                squawk: r.squawk,
                on_ground: r.on_ground,
                heading: r.heading,
                speed_kt: r.speed_kt,
                vsi_ft: r.vsi_ft,
                ts: r.ts,
                channel: Some(self.channel(r.channel)),
            };
            reports.push(PositionReport {
                key,
                dynamic,
                position: Some(pos),
            });
        }
        reports
    }
}

impl AttributeSource for ReplaySource {
    fn fetch_attributes(&mut self) -> Vec<AttributeReport> {
        let mut reports = Vec::new();
        while self.attributes.front().is_some_and(|(_, r)| r.ts <= self.horizon) {
            let Some((key, r)) = self.attributes.pop_front() else {
                break;
            };
            reports.push(AttributeReport {
                key,
                statics: r.statics(),
            });
        }
        reports
    }
}

impl std::fmt::Debug for ReplaySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplaySource")
            .field("positions", &self.positions.len())
            .field("attributes", &self.attributes.len())
            .field("horizon", &self.horizon)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORDING: &str = r#"
# two channels, one vehicle
{"kind":"position","key":"3c6444","channel":2,"ts":110.0,"lat":51.0,"lon":7.1,"alt_ft":5000}
{"kind":"position","key":"3C6444","channel":1,"ts":100.0,"lat":51.0,"lon":7.0,"alt_ft":5000,"squawk":1000}
{"kind":"attributes","key":"3C6444","call_sign":"BER123"}
{"kind":"position","key":"0000ABCD","key_type":"ogn","ts":105.0,"lat":47.0,"lon":11.0,"on_ground":true}
"#;

    fn source() -> ReplaySource {
        ReplaySource::from_reader(RECORDING.as_bytes()).unwrap()
    }

    #[test]
    fn test_records_released_in_time_order() {
        let mut src = source();
        assert_eq!(src.next_ts(), Some(0.0));
        assert!(src.fetch_positions().is_empty());

        src.set_horizon(105.0);
        let reports = src.fetch_positions();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].key.to_string(), "3C6444");
        assert_eq!(reports[0].dynamic.squawk_str(), "1000");
        assert_eq!(reports[1].key.key_type, KeyType::Ogn);
        assert!(reports[1].position.as_ref().unwrap().is_on_ground());
        assert_eq!(src.next_ts(), Some(0.0));

        assert_eq!(src.fetch_attributes().len(), 1);
        assert_eq!(src.next_ts(), Some(110.0));
    }

    #[test]
    fn test_altitude_converted_to_meters() {
        let mut src = source();
        src.set_horizon(100.0);
        let reports = src.fetch_positions();
        let alt = reports[0].position.as_ref().unwrap().alt_m.unwrap();
        assert!((alt - 1524.0).abs() < 1e-6);
    }

    #[test]
    fn test_registered_channel_used() {
        let mut src = source().with_channel(Arc::new(ReplayChannel::new(2, "fast", 10)));
        src.set_horizon(200.0);
        let reports = src.fetch_positions();
        let channels: Vec<_> = reports
            .iter()
            .filter_map(|r| r.dynamic.channel.as_ref())
            .map(|c| (c.name().to_string(), c.priority()))
            .collect();
        assert!(channels.contains(&("fast".to_string(), 10)));
        assert!(channels.contains(&("channel-1".to_string(), 0)));
        assert!(src.fetch_attributes().len() == 1 && src.is_exhausted());
    }

    #[test]
    fn test_parse_error_names_line() {
        let err = ReplaySource::from_reader("\n{\"kind\":\"position\"}\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ReplayError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_bad_key_rejected() {
        let line = r#"{"kind":"attributes","key":"xyz"}"#;
        let err = ReplaySource::from_reader(line.as_bytes()).unwrap_err();
        assert!(matches!(err, ReplayError::Key { line: 1, .. }));
    }
}
