use serde::{Serialize, Serializer};

use crate::error::{AppError, Result};

/// Error shown when a location string cannot be used.
pub const INVALID_LOCATION_MESSAGE: &str =
    "Formato de ubicación inválido. Use el formato: latitud,longitud";

/// A site location, kept both as the stored `"lat,lng"` string and as numbers.
///
/// Both representations are filled in when the value is built and never change
/// afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinates {
    raw: String,
    latitude: f64,
    longitude: f64,
}

impl Coordinates {
    /// Parses user input, rejecting anything out of range.
    pub fn parse(value: &str) -> Result<Self> {
        let (latitude, longitude) = split_pair(value)
            .filter(|(lat, lng)| in_range(*lat, *lng))
            .ok_or_else(|| AppError::Validation(INVALID_LOCATION_MESSAGE.to_string()))?;

        Ok(Self {
            raw: value.trim().to_string(),
            latitude,
            longitude,
        })
    }

    /// Builds a location from its numeric parts.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !in_range(latitude, longitude) {
            return Err(AppError::Validation(INVALID_LOCATION_MESSAGE.to_string()));
        }
        Ok(Self {
            raw: coordinates_to_string(latitude, longitude),
            latitude,
            longitude,
        })
    }

    /// Reads a location already held by the store.
    ///
    /// Stored rows are not rejected: any part that does not parse reads as 0.
    pub fn from_stored(value: &str) -> Self {
        let mut parts = value.split(',');
        let mut next_number = || {
            parts
                .next()
                .and_then(|part| part.trim().parse::<f64>().ok())
                .filter(|n| n.is_finite())
                .unwrap_or(0.0)
        };
        let latitude = next_number();
        let longitude = next_number();

        Self {
            raw: value.trim().to_string(),
            latitude,
            longitude,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl Serialize for Coordinates {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Renders a coordinate pair in the stored `"lat,lng"` form.
pub fn coordinates_to_string(latitude: f64, longitude: f64) -> String {
    format!("{},{}", latitude, longitude)
}

/// Whether `value` is a well-formed, in-range `"lat,lng"` string.
pub fn is_valid_location(value: &str) -> bool {
    split_pair(value).is_some_and(|(lat, lng)| in_range(lat, lng))
}

/// Formats a stored location for display with six decimals.
pub fn format_location(value: &str) -> String {
    let coordinates = Coordinates::from_stored(value);
    format!(
        "{:.6}, {:.6}",
        coordinates.latitude, coordinates.longitude
    )
}

fn split_pair(value: &str) -> Option<(f64, f64)> {
    let (lat, lng) = value.split_once(',')?;
    if lng.contains(',') {
        return None;
    }
    let lat = lat.trim().parse::<f64>().ok()?;
    let lng = lng.trim().parse::<f64>().ok()?;
    Some((lat, lng))
}

fn in_range(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_location_round_trips() {
        assert!(is_valid_location("18.626,-68.707"));
        assert_eq!(coordinates_to_string(18.626, -68.707), "18.626,-68.707");

        let parsed = Coordinates::parse(&coordinates_to_string(18.626, -68.707)).unwrap();
        assert!((parsed.latitude() - 18.626).abs() < 1e-12);
        assert!((parsed.longitude() + 68.707).abs() < 1e-12);
        assert_eq!(parsed.as_str(), "18.626,-68.707");
    }

    #[test]
    fn rejects_malformed_or_out_of_range() {
        for bad in [
            "",
            "18.626",
            "18.626,-68.707,3",
            "abc,-68.707",
            "91,0",
            "0,-180.5",
            "NaN,0",
        ] {
            assert!(!is_valid_location(bad), "{bad:?} should be rejected");
            assert!(Coordinates::parse(bad).is_err());
        }
        assert!(is_valid_location("-90,180"));
        assert!(is_valid_location(" 18.5 , -68.2 "));
    }

    #[test]
    fn new_builds_the_canonical_string() {
        let c = Coordinates::new(-0.5, 120.25).unwrap();
        assert_eq!(c.as_str(), "-0.5,120.25");
        assert!(Coordinates::new(100.0, 0.0).is_err());
    }

    #[test]
    fn stored_values_degrade_to_zero() {
        let c = Coordinates::from_stored("basura");
        assert_eq!((c.latitude(), c.longitude()), (0.0, 0.0));
        assert_eq!(c.as_str(), "basura");

        let c = Coordinates::from_stored("18.5,");
        assert_eq!((c.latitude(), c.longitude()), (18.5, 0.0));
    }

    #[test]
    fn display_format_has_six_decimals() {
        assert_eq!(format_location("18.626,-68.707"), "18.626000, -68.707000");
    }
}
