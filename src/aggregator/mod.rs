//! Pairing of independently arriving temperature and humidity readings
pub mod pending;

use std::sync::{Mutex, MutexGuard};

use crate::error::AggregationError;
use crate::models::{MeasurementKind, Reading, RhtDataPoint};
use pending::PendingStore;

pub const DEFAULT_QUEUE_DEPTH: usize = 16;

/// Pairs temperature and humidity readings per device address
///
/// A reading is paired with the oldest pending reading of the other kind for
/// the same device. The emitted data point carries the timestamp of the
/// reading that was already waiting. When nothing of the other kind is
/// pending, the reading is queued and no data point is returned.
///
/// All state sits behind one mutex, so the aggregator can be shared between
/// threads through an `Arc`.
#[derive(Debug)]
pub struct RhtAggregator {
    pending: Mutex<PendingStore>,
}

impl Default for RhtAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}

impl RhtAggregator {
    /// Create an aggregator keeping at most `queue_depth` unpaired readings
    /// per device and kind (at least one)
    pub fn new(queue_depth: usize) -> Self {
        RhtAggregator {
            pending: Mutex::new(PendingStore::new(queue_depth)),
        }
    }

    pub fn aggregate_humidity_value(
        &self,
        device_address: &str,
        reading: Option<Reading>,
    ) -> Result<Option<RhtDataPoint>, AggregationError> {
        self.aggregate(device_address, MeasurementKind::Humidity, reading)
    }

    pub fn aggregate_temperature_value(
        &self,
        device_address: &str,
        reading: Option<Reading>,
    ) -> Result<Option<RhtDataPoint>, AggregationError> {
        self.aggregate(device_address, MeasurementKind::Temperature, reading)
    }

    /// Entry point for sensor sources that report the kind alongside the value
    pub fn on_reading(
        &self,
        device_address: &str,
        kind: MeasurementKind,
        value: f32,
        timestamp_ms: i64,
    ) -> Result<Option<RhtDataPoint>, AggregationError> {
        self.aggregate(device_address, kind, Some(Reading::new(value, timestamp_ms)))
    }

    /// Number of readings of `kind` waiting for a partner on a device
    pub fn pending_count(&self, device_address: &str, kind: MeasurementKind) -> usize {
        self.lock().len(device_address, kind)
    }

    pub fn queue_depth(&self) -> usize {
        self.lock().depth()
    }

    fn aggregate(
        &self,
        device_address: &str,
        kind: MeasurementKind,
        reading: Option<Reading>,
    ) -> Result<Option<RhtDataPoint>, AggregationError> {
        let reading = reading.ok_or(AggregationError::InvalidArgument("reading is missing"))?;
        if device_address.is_empty() {
            return Err(AggregationError::InvalidArgument(
                "device address is empty",
            ));
        }

        let mut pending = self.lock();
        match pending.pop_oldest(device_address, kind.other()) {
            Some(partner) => Ok(Some(combine(kind, reading, partner))),
            None => {
                pending.push(device_address, kind, reading);
                Ok(None)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingStore> {
        // A panic while holding the lock cannot leave the store half-updated
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn combine(arrived_kind: MeasurementKind, arrived: Reading, waiting: Reading) -> RhtDataPoint {
    let (temperature, humidity) = match arrived_kind {
        MeasurementKind::Temperature => (arrived.value, waiting.value),
        MeasurementKind::Humidity => (waiting.value, arrived.value),
    };

    RhtDataPoint {
        temperature_celsius: temperature,
        relative_humidity: humidity,
        timestamp_ms: waiting.timestamp_ms,
    }
}
