//! History consumer: live updates plus periodic per-gadget summaries
use log::{error, info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::bounds::is_plausible;
use crate::config::GadgetConfig;
use crate::database::{store_history_summary, RetryPolicy};
use crate::live::LiveValues;
use crate::models::{HistorySummary, RhtDataPoint};
use crate::utils::{format_datetime, millis_to_datetime, round_to};

/// Data points collected since the last flush, grouped by gadget MAC
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    points: HashMap<String, Vec<RhtDataPoint>>,
}

impl HistoryBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, sensor_mac: &str, point: RhtDataPoint) {
        self.points
            .entry(sensor_mac.to_string())
            .or_default()
            .push(point);
    }

    pub fn is_empty(&self) -> bool {
        self.points.values().all(Vec::is_empty)
    }

    /// Average the buffered points per gadget and empty the buffer
    ///
    /// The summary time is that of the newest point in the interval.
    pub fn summarize(&mut self, config: &GadgetConfig) -> HashMap<String, HistorySummary> {
        let mut summaries = HashMap::new();

        for (sensor_mac, points) in self.points.drain() {
            if points.is_empty() {
                continue;
            }

            let count = points.len() as f32;
            let temp_sum: f32 = points.iter().map(|p| p.temperature_celsius).sum();
            let humid_sum: f32 = points.iter().map(|p| p.relative_humidity).sum();
            let time = points
                .iter()
                .map(|p| p.timestamp_ms)
                .max()
                .and_then(millis_to_datetime)
                .unwrap_or_else(OffsetDateTime::now_utc);

            let summary = HistorySummary {
                temperature: round_to(temp_sum / count, 2),
                humidity: round_to(humid_sum / count, 2),
                time,
                name: config.gadget_name(&sensor_mac),
                samples: points.len() as i32,
            };
            summaries.insert(sensor_mac, summary);
        }

        summaries
    }
}

/// Route one paired point: drop implausible values, publish, buffer
///
/// # Returns
/// true if the point was accepted
pub fn accept_data_point(
    sensor_mac: &str,
    point: RhtDataPoint,
    live: &LiveValues,
    buffer: &mut HistoryBuffer,
) -> bool {
    if !is_plausible(&point) {
        warn!(
            "Discarding implausible data point from {}: temp={:.2}°C, humidity={:.2}%",
            sensor_mac, point.temperature_celsius, point.relative_humidity
        );
        return false;
    }

    live.publish(sensor_mac, point);
    buffer.record(sensor_mac, point);
    true
}

/// Retries for the last write on shutdown, kept short so exit is not held up
pub const SHUTDOWN_RETRY_POLICY: RetryPolicy = RetryPolicy {
    max_attempts: 3,
    wait_between_attempts: Duration::from_secs(1),
};

/// Consume paired data points until the sender side closes
///
/// Summaries are written every `history_interval_secs` from a spawned task, so
/// a slow database never stops the channel from draining. The last partial
/// interval is written once more on shutdown with [`SHUTDOWN_RETRY_POLICY`].
///
/// # Returns
/// Number of gadget summaries handed to the final write
pub async fn run_history(
    config: GadgetConfig,
    live: Arc<LiveValues>,
    mut points: mpsc::Receiver<(String, RhtDataPoint)>,
) -> usize {
    let mut buffer = HistoryBuffer::new();
    let mut flush = interval(Duration::from_secs(config.history_interval_secs));
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately
    flush.tick().await;

    loop {
        tokio::select! {
            received = points.recv() => match received {
                Some((sensor_mac, point)) => {
                    accept_data_point(&sensor_mac, point, &live, &mut buffer);
                }
                None => {
                    info!("Data point channel closed, writing final history");
                    let summaries = take_summaries(&config, &mut buffer);
                    let written = summaries.len();
                    store_summaries(&config.database_url, summaries, SHUTDOWN_RETRY_POLICY).await;
                    return written;
                }
            },
            _ = flush.tick() => {
                let summaries = take_summaries(&config, &mut buffer);
                if !summaries.is_empty() {
                    tokio::spawn(store_summaries(
                        config.database_url.clone(),
                        summaries,
                        RetryPolicy::default(),
                    ));
                }
            }
        }
    }
}

fn take_summaries(
    config: &GadgetConfig,
    buffer: &mut HistoryBuffer,
) -> HashMap<String, HistorySummary> {
    info!(
        "History interval complete at: {}",
        format_datetime(&OffsetDateTime::now_utc())
    );

    if buffer.is_empty() {
        warn!("No data collected during this interval!");
        return HashMap::new();
    }

    let summaries = buffer.summarize(config);
    for summary in summaries.values() {
        info!("Summary for {}:", summary.name);
        info!("  Average temperature: {:.2}°C", summary.temperature);
        info!("  Average humidity: {:.2}%", summary.humidity);
        info!("  Based on {} samples", summary.samples);
    }
    summaries
}

async fn store_summaries(
    database_url: impl AsRef<str>,
    summaries: HashMap<String, HistorySummary>,
    policy: RetryPolicy,
) {
    for (sensor_mac, summary) in &summaries {
        match store_history_summary(sensor_mac, summary, database_url.as_ref(), policy).await {
            Ok(()) => info!("Successfully stored history for gadget {}", sensor_mac),
            Err(e) => error!("Failed to store history for gadget {}: {}", sensor_mac, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_gadget_list;

    fn config() -> GadgetConfig {
        GadgetConfig {
            gadgets: parse_gadget_list("AA:BB=Cellar"),
            database_url: String::new(),
            poll_interval_secs: 30,
            scan_duration_secs: 20,
            history_interval_secs: 1800,
            pending_queue_depth: 16,
        }
    }

    fn point(temperature_celsius: f32, relative_humidity: f32, timestamp_ms: i64) -> RhtDataPoint {
        RhtDataPoint {
            temperature_celsius,
            relative_humidity,
            timestamp_ms,
        }
    }

    #[test]
    fn summarizes_per_gadget() {
        let mut buffer = HistoryBuffer::new();
        buffer.record("AA:BB", point(20.0, 40.0, 1_000));
        buffer.record("AA:BB", point(21.0, 41.0, 3_000));
        buffer.record("AA:BB", point(22.5, 45.5, 2_000));
        buffer.record("EE:FF", point(10.0, 80.0, 5_000));

        let summaries = buffer.summarize(&config());
        assert_eq!(summaries.len(), 2);

        let cellar = &summaries["AA:BB"];
        assert_eq!(cellar.name, "Cellar");
        assert_eq!(cellar.samples, 3);
        assert_eq!(cellar.temperature, 21.17);
        assert_eq!(cellar.humidity, 42.17);
        assert_eq!(cellar.time.unix_timestamp(), 3);

        assert_eq!(summaries["EE:FF"].name, "Unknown");
        assert!(buffer.is_empty());
    }

    #[test]
    fn empty_buffer_has_no_summaries() {
        let mut buffer = HistoryBuffer::new();
        assert!(buffer.is_empty());
        assert!(buffer.summarize(&config()).is_empty());
    }

    #[test]
    fn implausible_points_are_dropped() {
        let live = LiveValues::new();
        let mut buffer = HistoryBuffer::new();

        assert!(!accept_data_point("AA:BB", point(20.0, 140.0, 1), &live, &mut buffer));
        assert!(buffer.is_empty());
        assert_eq!(live.latest("AA:BB"), None);

        assert!(accept_data_point("AA:BB", point(20.0, 40.0, 2), &live, &mut buffer));
        assert!(!buffer.is_empty());
        assert_eq!(live.latest("AA:BB"), Some(point(20.0, 40.0, 2)));
    }

    #[tokio::test]
    async fn closed_channel_without_points_ends_history() {
        let live = Arc::new(LiveValues::new());
        let (tx, rx) = mpsc::channel(4);
        drop(tx);

        let written = tokio::time::timeout(
            Duration::from_secs(5),
            run_history(config(), Arc::clone(&live), rx),
        )
        .await
        .expect("history should stop once the channel closes");
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn closed_channel_flushes_buffered_points() {
        let live = Arc::new(LiveValues::new());
        let (tx, rx) = mpsc::channel(4);
        tx.send(("AA:BB".to_string(), point(20.0, 40.0, 1))).await.unwrap();
        tx.send(("EE:FF".to_string(), point(20.0, 400.0, 2))).await.unwrap();
        drop(tx);

        // The empty database URL fails without retrying, so shutdown is quick
        let written = tokio::time::timeout(
            Duration::from_secs(5),
            run_history(config(), Arc::clone(&live), rx),
        )
        .await
        .expect("history should stop once the channel closes");
        assert_eq!(written, 1);
        assert_eq!(live.latest("AA:BB"), Some(point(20.0, 40.0, 1)));
        assert_eq!(live.latest("EE:FF"), None);
    }
}
