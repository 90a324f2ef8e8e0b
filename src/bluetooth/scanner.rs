//! Bluetooth Low Energy scanning and gadget advertisement decoding
use futures_util::StreamExt;
use log::{debug, error, warn};
use std::collections::HashMap;
use tokio::time::{sleep, Duration};

use crate::config::GadgetConfig;
use crate::models::{GadgetSample, MeasurementKind, Reading};
use crate::utils::round_to;

// Gadget advertisement constants (RuuviTag data format 5)
const MANUFACTURER_ID: u16 = 0x0499; // Ruuvi Innovations Ltd. manufacturer ID
const DATA_FORMAT: u8 = 5;
const PAYLOAD_LEN: usize = 24;
const TEMPERATURE_INVALID: i16 = i16::MIN; // 0x8000
const HUMIDITY_INVALID: u16 = u16::MAX; // 0xFFFF

/// Decode gadget manufacturer data into temperature and humidity
///
/// The payload is 24 bytes:
/// - Byte 0: Data format (5)
/// - Bytes 1-2: Temperature (signed 16-bit, 0.005°C resolution, 0x8000 = unavailable)
/// - Bytes 3-4: Humidity (unsigned 16-bit, 0.0025% resolution, 0xFFFF = unavailable)
/// - Bytes 5-23: Pressure, motion, power and identity fields, ignored here
///
/// Temperature and humidity are reported independently: a sample may carry
/// one without the other.
///
/// # Returns
/// Some(GadgetSample) for a well-formed payload, None otherwise
pub fn decode_gadget_data(data: &[u8]) -> Option<GadgetSample> {
    if data.len() != PAYLOAD_LEN || data[0] != DATA_FORMAT {
        if !data.is_empty() {
            warn!(
                "Invalid gadget data: len={}, format={}",
                data.len(),
                data[0]
            );
        }
        return None;
    }

    let raw_temperature = i16::from_be_bytes([data[1], data[2]]);
    let raw_humidity = u16::from_be_bytes([data[3], data[4]]);

    let temperature =
        (raw_temperature != TEMPERATURE_INVALID).then(|| round_to(raw_temperature as f32 * 0.005, 2));
    let humidity = (raw_humidity != HUMIDITY_INVALID)
        .then(|| round_to((raw_humidity as f32 * 0.0025).min(100.0), 2));

    Some(GadgetSample {
        temperature,
        humidity,
    })
}

/// Split a decoded sample into the independent readings the aggregator consumes
pub fn sample_readings(sample: &GadgetSample, timestamp_ms: i64) -> Vec<(MeasurementKind, Reading)> {
    [
        (MeasurementKind::Temperature, sample.temperature),
        (MeasurementKind::Humidity, sample.humidity),
    ]
    .into_iter()
    .filter_map(|(kind, value)| value.map(|v| (kind, Reading::new(v, timestamp_ms))))
    .collect()
}

/// Scan for configured gadgets and collect their advertised values
///
/// Runs BLE discovery for `scan_duration_secs`, then reads the manufacturer
/// data of every configured gadget that was seen.
///
/// # Returns
/// Result containing HashMap of gadget MAC -> GadgetSample, or error if scan fails
pub async fn scan_for_gadgets(
    config: &GadgetConfig,
) -> Result<HashMap<String, GadgetSample>, Box<dyn std::error::Error>> {
    let mut samples = HashMap::new();

    let session = match bluer::Session::new().await {
        Ok(session) => session,
        Err(e) => {
            error!("Failed to create Bluetooth session: {}", e);
            return Err(e.into());
        }
    };

    let adapter = match session.default_adapter().await {
        Ok(adapter) => adapter,
        Err(e) => {
            error!("Failed to get default Bluetooth adapter: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = adapter.set_powered(true).await {
        error!("Failed to power on adapter: {}", e);
        return Err(e.into());
    }

    let filter = bluer::DiscoveryFilter {
        transport: bluer::DiscoveryTransport::Le,
        duplicate_data: false,
        ..Default::default()
    };

    // Scanning still works without the filter, just noisier
    if let Err(e) = adapter.set_discovery_filter(filter).await {
        warn!("Failed to set discovery filter: {}", e);
    }

    let discovery_handle = match adapter.discover_devices().await {
        Ok(mut discovery_stream) => tokio::spawn(async move {
            while let Some(event) = discovery_stream.next().await {
                debug!("Discovery event: {:?}", event);
            }
        }),
        Err(e) => {
            error!("Failed to start device discovery: {}", e);
            return Err(e.into());
        }
    };

    sleep(Duration::from_secs(config.scan_duration_secs)).await;
    discovery_handle.abort();

    let addresses = match adapter.device_addresses().await {
        Ok(addresses) => addresses,
        Err(e) => {
            error!("Failed to get device addresses: {}", e);
            return Err(e.into());
        }
    };

    for addr in addresses {
        let device = match adapter.device(addr) {
            Ok(device) => device,
            Err(_) => continue,
        };

        let mac = device.address().to_string().to_uppercase();
        if !config.gadgets.contains_key(&mac) {
            continue;
        }

        match device.manufacturer_data().await {
            Ok(Some(manufacturer_data)) => {
                if let Some(sample) = manufacturer_data
                    .get(&MANUFACTURER_ID)
                    .and_then(|payload| decode_gadget_data(payload))
                {
                    debug!(
                        "Received data from {}: temp={:?}°C, humidity={:?}%",
                        mac, sample.temperature, sample.humidity
                    );
                    samples.insert(mac, sample);
                }
            }
            Ok(None) => debug!("No manufacturer data for {}", mac),
            Err(e) => debug!("Failed to get manufacturer data for {}: {}", mac, e),
        }
    }

    Ok(samples)
}
