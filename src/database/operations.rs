//! Database operations for storing RHT history
use crate::database::connection::{execute_with_retry, RetryPolicy};
use crate::models::HistorySummary;

const INSERT_HISTORY: &str = "INSERT INTO rht_history(sensor_mac, temperature, humidity, time, name, samples)
     VALUES ($1, $2, $3, $4, $5, $6)";

/// Store one interval summary for a gadget in the rht_history table
///
/// # Arguments
/// * `sensor_mac` - MAC address of the gadget
/// * `summary` - Averaged values for the interval
/// * `database_url` - PostgreSQL connection string
/// * `policy` - Retry behaviour for transient failures
pub async fn store_history_summary(
    sensor_mac: &str,
    summary: &HistorySummary,
    database_url: &str,
    policy: RetryPolicy,
) -> Result<(), String> {
    // Owned copies for the retried closure
    let sensor_mac = sensor_mac.to_string();
    let summary = summary.clone();

    execute_with_retry(database_url, policy, move |client| {
        let sensor_mac = sensor_mac.clone();
        let summary = summary.clone();
        async move {
            client
                .execute(
                    INSERT_HISTORY,
                    &[
                        &sensor_mac,
                        &summary.temperature,
                        &summary.humidity,
                        &summary.time,
                        &summary.name,
                        &summary.samples,
                    ],
                )
                .await
        }
    })
    .await
}
