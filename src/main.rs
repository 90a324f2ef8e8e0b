use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Duration, Instant};

use rust_rht_gadget_logger::bluetooth::{sample_readings, scan_for_gadgets};
use rust_rht_gadget_logger::config::GadgetConfig;
use rust_rht_gadget_logger::history::run_history;
use rust_rht_gadget_logger::live::LiveValues;
use rust_rht_gadget_logger::utils::now_millis;
use rust_rht_gadget_logger::{RhtAggregator, RhtDataPoint};

const DATA_POINT_CHANNEL_CAPACITY: usize = 256;
const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Scan, feed readings to the aggregator and forward every paired point
async fn scan_loop(
    config: GadgetConfig,
    aggregator: Arc<RhtAggregator>,
    points: mpsc::Sender<(String, RhtDataPoint)>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!(
        "Starting gadget scanning, aggregator queue depth {}",
        aggregator.queue_depth()
    );

    loop {
        let scan_started = Instant::now();

        match scan_for_gadgets(&config).await {
            Ok(samples) => {
                let timestamp_ms = now_millis();
                for (sensor_mac, sample) in samples {
                    for (kind, reading) in sample_readings(&sample, timestamp_ms) {
                        let paired = match aggregator.on_reading(
                            &sensor_mac,
                            kind,
                            reading.value,
                            reading.timestamp_ms,
                        ) {
                            Ok(paired) => paired,
                            Err(e) => {
                                error!("Rejected {} reading from {}: {}", kind, sensor_mac, e);
                                continue;
                            }
                        };

                        match paired {
                            Some(point) => points.send((sensor_mac.clone(), point)).await?,
                            None => debug!(
                                "{} reading from {} waiting for a partner",
                                kind, sensor_mac
                            ),
                        }
                    }
                }
            }
            Err(e) => error!("Scan failed: {}", e),
        }

        let elapsed = scan_started.elapsed();
        let poll_interval = Duration::from_secs(config.poll_interval_secs);
        if elapsed < poll_interval {
            sleep(poll_interval - elapsed).await;
        }
    }
}

/// Log every change of a gadget's live value
fn log_live_values(live: Arc<LiveValues>, config: GadgetConfig) {
    for (sensor_mac, name) in config.gadgets {
        let mut receiver = live.subscribe(&sensor_mac);
        tokio::spawn(async move {
            while receiver.changed().await.is_ok() {
                let latest = *receiver.borrow_and_update();
                if let Some(point) = latest {
                    info!(
                        "{}: temp={:.2}°C, humidity={:.2}%",
                        name, point.temperature_celsius, point.relative_humidity
                    );
                }
            }
        });
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match GadgetConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    let aggregator = Arc::new(RhtAggregator::new(config.pending_queue_depth));
    let live = Arc::new(LiveValues::new());
    let (points_tx, points_rx) = mpsc::channel(DATA_POINT_CHANNEL_CAPACITY);

    log_live_values(Arc::clone(&live), config.clone());
    let history = tokio::spawn(run_history(config.clone(), Arc::clone(&live), points_rx));

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            // Keep the sender alive so the service runs on without a signal handler
            std::future::pending::<()>().await;
        }
        let _ = tx.send(());
    });

    tokio::select! {
        result = scan_loop(config, aggregator, points_tx) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = &mut rx => {
            info!("Program terminated by user. Writing history before exit.");
        }
    }

    // The scan loop owned the only sender, so history now drains and stops
    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), history).await {
        Ok(Ok(written)) => info!("Final history covered {} gadgets", written),
        Ok(Err(e)) => error!("History task failed: {}", e),
        Err(_) => error!(
            "Final history write did not finish within {} seconds, exiting anyway",
            SHUTDOWN_TIMEOUT_SECS
        ),
    }

    Ok(())
}
