//! Per-device storage of readings still waiting for a partner
use std::collections::{HashMap, VecDeque};

use crate::models::{MeasurementKind, Reading};

#[derive(Debug, Default)]
struct DeviceQueues {
    temperature: VecDeque<Reading>,
    humidity: VecDeque<Reading>,
}

impl DeviceQueues {
    fn queue(&self, kind: MeasurementKind) -> &VecDeque<Reading> {
        match kind {
            MeasurementKind::Temperature => &self.temperature,
            MeasurementKind::Humidity => &self.humidity,
        }
    }

    fn queue_mut(&mut self, kind: MeasurementKind) -> &mut VecDeque<Reading> {
        match kind {
            MeasurementKind::Temperature => &mut self.temperature,
            MeasurementKind::Humidity => &mut self.humidity,
        }
    }

    fn is_empty(&self) -> bool {
        self.temperature.is_empty() && self.humidity.is_empty()
    }
}

/// Bounded FIFO queues keyed by device address and measurement kind
///
/// Each queue holds at most `depth` readings. Pushing onto a full queue drops
/// the oldest entry, so only the most recent unpaired readings survive.
#[derive(Debug)]
pub struct PendingStore {
    depth: usize,
    devices: HashMap<String, DeviceQueues>,
}

impl PendingStore {
    pub fn new(depth: usize) -> Self {
        PendingStore {
            depth: depth.max(1),
            devices: HashMap::new(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Append a reading, dropping the oldest one if the queue is full
    pub fn push(&mut self, device_address: &str, kind: MeasurementKind, reading: Reading) {
        let queue = self
            .devices
            .entry(device_address.to_string())
            .or_default()
            .queue_mut(kind);

        if queue.len() >= self.depth {
            queue.pop_front();
        }
        queue.push_back(reading);
    }

    /// Remove and return the oldest pending reading of `kind` for a device
    pub fn pop_oldest(&mut self, device_address: &str, kind: MeasurementKind) -> Option<Reading> {
        let queues = self.devices.get_mut(device_address)?;
        let reading = queues.queue_mut(kind).pop_front();

        // Devices with nothing pending are dropped so the map only tracks live work
        if queues.is_empty() {
            self.devices.remove(device_address);
        }
        reading
    }

    pub fn len(&self, device_address: &str, kind: MeasurementKind) -> usize {
        self.devices
            .get(device_address)
            .map(|queues| queues.queue(kind).len())
            .unwrap_or(0)
    }
}
