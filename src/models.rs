use std::fmt;
use time::OffsetDateTime;

/// The two measurement kinds a gadget reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKind {
    Temperature,
    Humidity,
}

impl MeasurementKind {
    /// The kind a reading of this kind pairs with
    pub fn other(self) -> Self {
        match self {
            MeasurementKind::Temperature => MeasurementKind::Humidity,
            MeasurementKind::Humidity => MeasurementKind::Temperature,
        }
    }
}

impl fmt::Display for MeasurementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementKind::Temperature => f.write_str("temperature"),
            MeasurementKind::Humidity => f.write_str("humidity"),
        }
    }
}

/// A single value received from a gadget, timestamped in milliseconds since epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub value: f32,
    pub timestamp_ms: i64,
}

impl Reading {
    pub fn new(value: f32, timestamp_ms: i64) -> Self {
        Reading {
            value,
            timestamp_ms,
        }
    }
}

/// A paired temperature and humidity value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhtDataPoint {
    pub temperature_celsius: f32,
    pub relative_humidity: f32,
    pub timestamp_ms: i64,
}

/// Values decoded from one gadget advertisement. Either may be missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GadgetSample {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct HistorySummary {
    pub temperature: f32,
    pub humidity: f32,
    pub time: OffsetDateTime,
    pub name: String,
    pub samples: i32,
}
