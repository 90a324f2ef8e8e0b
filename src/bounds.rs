//! Sanity limits for paired data points
use crate::models::RhtDataPoint;

pub const MIN_TEMPERATURE_CELSIUS: f32 = -40.0;
pub const MAX_TEMPERATURE_CELSIUS: f32 = 125.0;
pub const MIN_RELATIVE_HUMIDITY: f32 = 0.0;
pub const MAX_RELATIVE_HUMIDITY: f32 = 100.0;

/// Returns false for points a working gadget cannot have produced
pub fn is_plausible(point: &RhtDataPoint) -> bool {
    (MIN_TEMPERATURE_CELSIUS..=MAX_TEMPERATURE_CELSIUS).contains(&point.temperature_celsius)
        && (MIN_RELATIVE_HUMIDITY..=MAX_RELATIVE_HUMIDITY).contains(&point.relative_humidity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(temperature_celsius: f32, relative_humidity: f32) -> RhtDataPoint {
        RhtDataPoint {
            temperature_celsius,
            relative_humidity,
            timestamp_ms: 0,
        }
    }

    #[test]
    fn accepts_limits() {
        assert!(is_plausible(&point(-40.0, 0.0)));
        assert!(is_plausible(&point(125.0, 100.0)));
        assert!(is_plausible(&point(22.4, 41.0)));
    }

    #[test]
    fn rejects_out_of_range() {
        assert!(!is_plausible(&point(-40.1, 50.0)));
        assert!(!is_plausible(&point(20.0, 100.5)));
        assert!(!is_plausible(&point(20.0, -1.0)));
    }

    #[test]
    fn rejects_nan() {
        assert!(!is_plausible(&point(f32::NAN, 50.0)));
        assert!(!is_plausible(&point(20.0, f32::NAN)));
    }
}
