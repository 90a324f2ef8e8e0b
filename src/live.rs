//! Latest paired value per gadget, observable through watch channels
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::watch;

use crate::models::RhtDataPoint;

type Channels = HashMap<String, watch::Sender<Option<RhtDataPoint>>>;

/// Per-device live values
///
/// A subscriber sees the last published point as soon as it subscribes, and
/// `None` if nothing has been published for that device yet.
#[derive(Debug, Default)]
pub struct LiveValues {
    channels: Mutex<Channels>,
}

impl LiveValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, device_address: &str, point: RhtDataPoint) {
        let mut channels = self.lock();
        match channels.get(device_address) {
            Some(sender) => {
                sender.send_replace(Some(point));
            }
            None => {
                let (sender, _) = watch::channel(Some(point));
                channels.insert(device_address.to_string(), sender);
            }
        }
    }

    pub fn subscribe(&self, device_address: &str) -> watch::Receiver<Option<RhtDataPoint>> {
        self.lock()
            .entry(device_address.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    pub fn latest(&self, device_address: &str) -> Option<RhtDataPoint> {
        self.lock()
            .get(device_address)
            .and_then(|sender| *sender.borrow())
    }

    fn lock(&self) -> MutexGuard<'_, Channels> {
        self.channels
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
