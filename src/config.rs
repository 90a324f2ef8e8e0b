use log::{debug, info, warn};
use std::collections::HashMap;
use std::env;
use std::str::FromStr;

use crate::aggregator::DEFAULT_QUEUE_DEPTH;

const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
const DEFAULT_SCAN_DURATION_SECS: u64 = 20;
const DEFAULT_HISTORY_INTERVAL_SECS: u64 = 1800; // 30 minutes

#[derive(Debug, Clone)]
pub struct GadgetConfig {
    /// Upper-case MAC address -> user-assigned gadget name
    pub gadgets: HashMap<String, String>,
    pub database_url: String,
    pub poll_interval_secs: u64,
    pub scan_duration_secs: u64,
    pub history_interval_secs: u64,
    pub pending_queue_depth: usize,
}

impl GadgetConfig {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| "DATABASE_URL environment variable not set")?;

        let gadgets = match env::var("RHT_GADGETS") {
            Ok(list) => {
                debug!("Found RHT_GADGETS: '{}'", list);
                parse_gadget_list(&list)
            }
            Err(_) => {
                debug!("RHT_GADGETS environment variable not found, trying individual variables");
                gadgets_from_pairs(env::vars())
            }
        };

        info!("Total gadgets loaded: {}", gadgets.len());
        for (mac, name) in &gadgets {
            info!("Gadget: {} -> {}", mac, name);
        }

        if gadgets.is_empty() {
            return Err("No gadgets configured. Please set RHT_GADGETS or RHT_GADGET_<N>_MAC/RHT_GADGET_<N>_NAME environment variables".into());
        }

        let config = GadgetConfig {
            gadgets,
            database_url,
            poll_interval_secs: interval_secs("POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS)?,
            scan_duration_secs: interval_secs("SCAN_DURATION_SECS", DEFAULT_SCAN_DURATION_SECS)?,
            history_interval_secs: interval_secs(
                "HISTORY_INTERVAL_SECS",
                DEFAULT_HISTORY_INTERVAL_SECS,
            )?,
            pending_queue_depth: env_or("PENDING_QUEUE_DEPTH", DEFAULT_QUEUE_DEPTH)?,
        };

        if config.scan_duration_secs > config.poll_interval_secs {
            warn!(
                "SCAN_DURATION_SECS ({}) exceeds POLL_INTERVAL_SECS ({}), scans will run back to back",
                config.scan_duration_secs, config.poll_interval_secs
            );
        }

        Ok(config)
    }

    /// Display name for a gadget, "Unknown" if it is not configured
    pub fn gadget_name(&self, mac: &str) -> String {
        self.gadgets
            .get(mac)
            .cloned()
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Parse `MAC=Name,MAC=Name` into a map keyed by upper-case MAC
pub fn parse_gadget_list(list: &str) -> HashMap<String, String> {
    let mut gadgets = HashMap::new();

    for pair in list.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some((mac, name)) => {
                let mac = mac.trim();
                let name = name.trim();
                if !mac.is_empty() && !name.is_empty() {
                    gadgets.insert(mac.to_uppercase(), name.to_string());
                }
            }
            None => warn!("Ignoring malformed gadget entry: '{}'", pair),
        }
    }

    gadgets
}

/// Collect `RHT_GADGET_<N>_MAC` / `RHT_GADGET_<N>_NAME` pairs
fn gadgets_from_pairs<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: HashMap<String, String> = vars.into_iter().collect();
    let mut gadgets = HashMap::new();

    for (key, mac) in &vars {
        if let Some(index) = key
            .strip_prefix("RHT_GADGET_")
            .and_then(|s| s.strip_suffix("_MAC"))
        {
            if let Some(name) = vars.get(&format!("RHT_GADGET_{}_NAME", index)) {
                gadgets.insert(mac.trim().to_uppercase(), name.trim().to_string());
            }
        }
    }

    gadgets
}

fn env_or<T: FromStr>(key: &str, default: T) -> Result<T, Box<dyn std::error::Error>> {
    parse_or(key, env::var(key).ok().as_deref(), default)
}

fn parse_or<T: FromStr>(
    key: &str,
    raw: Option<&str>,
    default: T,
) -> Result<T, Box<dyn std::error::Error>> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| format!("{} has an invalid value: '{}'", key, raw).into()),
        None => Ok(default),
    }
}

/// Read a duration in seconds that drives a timer, so zero is rejected
fn interval_secs(key: &str, default: u64) -> Result<u64, Box<dyn std::error::Error>> {
    require_nonzero(key, env_or(key, default)?)
}

fn require_nonzero(key: &str, value: u64) -> Result<u64, Box<dyn std::error::Error>> {
    if value == 0 {
        return Err(format!("{} must be greater than zero", key).into());
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gadget_list() {
        let gadgets = parse_gadget_list(" aa:bb:cc:dd:ee:ff = Kitchen , 11:22:33:44:55:66=Sauna,");
        assert_eq!(gadgets.len(), 2);
        assert_eq!(gadgets["AA:BB:CC:DD:EE:FF"], "Kitchen");
        assert_eq!(gadgets["11:22:33:44:55:66"], "Sauna");
    }

    #[test]
    fn skips_malformed_entries() {
        let gadgets = parse_gadget_list("no-separator,=Nameless,AA:BB=");
        assert!(gadgets.is_empty());
    }

    #[test]
    fn collects_indexed_pairs() {
        let vars = vec![
            ("RHT_GADGET_1_MAC".to_string(), "aa:bb".to_string()),
            ("RHT_GADGET_1_NAME".to_string(), "Cellar".to_string()),
            ("RHT_GADGET_2_MAC".to_string(), "cc:dd".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
        ];

        let gadgets = gadgets_from_pairs(vars);
        assert_eq!(gadgets.len(), 1);
        assert_eq!(gadgets["AA:BB"], "Cellar");
    }

    #[test]
    fn parses_numeric_values() {
        assert_eq!(parse_or("POLL_INTERVAL_SECS", Some(" 45 "), 30u64).unwrap(), 45);
        assert_eq!(parse_or("POLL_INTERVAL_SECS", None, 30u64).unwrap(), 30);

        let err = parse_or("PENDING_QUEUE_DEPTH", Some("lots"), 16usize).unwrap_err();
        assert!(err.to_string().contains("PENDING_QUEUE_DEPTH"));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        for key in [
            "HISTORY_INTERVAL_SECS",
            "POLL_INTERVAL_SECS",
            "SCAN_DURATION_SECS",
        ] {
            let err = require_nonzero(key, 0).unwrap_err();
            assert_eq!(err.to_string(), format!("{} must be greater than zero", key));
        }
        assert_eq!(require_nonzero("HISTORY_INTERVAL_SECS", 1).unwrap(), 1);
    }

    #[test]
    fn unknown_gadget_name() {
        let config = GadgetConfig {
            gadgets: parse_gadget_list("AA:BB=Cellar"),
            database_url: String::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            scan_duration_secs: DEFAULT_SCAN_DURATION_SECS,
            history_interval_secs: DEFAULT_HISTORY_INTERVAL_SECS,
            pending_queue_depth: DEFAULT_QUEUE_DEPTH,
        };

        assert_eq!(config.gadget_name("AA:BB"), "Cellar");
        assert_eq!(config.gadget_name("EE:FF"), "Unknown");
    }
}
