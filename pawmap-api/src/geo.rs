//! Geographic value types shared by the client and the sync core

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::{ApiError, Result};

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// A validated WGS84 coordinate.
///
/// Immutable: a moved viewport produces a new `Position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    latitude: f64,
    longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        if !valid {
            return Err(ApiError::InvalidPosition {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &Position) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lng = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_KM * c
    }
}

/// Default map center (Seoul City Hall), used until a locate succeeds
impl Default for Position {
    fn default() -> Self {
        Self {
            latitude: 37.5665,
            longitude: 126.978,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// Parses `"<lat>,<lng>"`.
impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("expected <lat>,<lng>, got '{s}'"))?;
        let lat: f64 = lat.trim().parse().map_err(|e| format!("latitude: {e}"))?;
        let lng: f64 = lng.trim().parse().map_err(|e| format!("longitude: {e}"))?;
        Position::new(lat, lng).map_err(|e| e.to_string())
    }
}

/// Search radius in whole kilometres, bounded to `[1, 10]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SearchRadius(u8);

impl SearchRadius {
    pub const MIN_KM: u8 = 1;
    pub const MAX_KM: u8 = 10;

    pub fn new(km: i64) -> Result<Self> {
        if !(Self::MIN_KM as i64..=Self::MAX_KM as i64).contains(&km) {
            return Err(ApiError::InvalidRadius(km));
        }
        Ok(Self(km as u8))
    }

    pub fn km(&self) -> u8 {
        self.0
    }

    pub fn meters(&self) -> u32 {
        u32::from(self.0) * 1_000
    }

    /// Whether a distance (km) falls inside this radius
    pub fn contains_km(&self, distance_km: f64) -> bool {
        distance_km <= f64::from(self.0)
    }
}

impl Default for SearchRadius {
    fn default() -> Self {
        Self(3)
    }
}

impl fmt::Display for SearchRadius {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}km", self.0)
    }
}

impl FromStr for SearchRadius {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let km: i64 = s
            .trim()
            .trim_end_matches("km")
            .parse()
            .map_err(|e| format!("radius: {e}"))?;
        SearchRadius::new(km).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_rejects_out_of_range() {
        assert!(Position::new(91.0, 0.0).is_err());
        assert!(Position::new(0.0, -180.5).is_err());
        assert!(Position::new(f64::NAN, 0.0).is_err());
        assert!(Position::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn test_distance_km_known_pair() {
        // Seoul City Hall -> Gangnam Station, roughly 8.9 km
        let city_hall = Position::new(37.5665, 126.9780).unwrap();
        let gangnam = Position::new(37.4979, 127.0276).unwrap();
        let d = city_hall.distance_km(&gangnam);
        assert!((8.5..9.3).contains(&d), "distance was {d}");
        assert_eq!(city_hall.distance_km(&city_hall), 0.0);
    }

    #[test]
    fn test_position_from_str() {
        let p: Position = "37.5, 127.0".parse().unwrap();
        assert_eq!(p.latitude(), 37.5);
        assert_eq!(p.longitude(), 127.0);
        assert!("37.5".parse::<Position>().is_err());
        assert!("100,0".parse::<Position>().is_err());
    }

    #[test]
    fn test_radius_bounds() {
        assert!(SearchRadius::new(0).is_err());
        assert!(SearchRadius::new(11).is_err());
        assert_eq!(SearchRadius::new(10).unwrap().meters(), 10_000);
        assert_eq!(SearchRadius::default().km(), 3);
    }

    #[test]
    fn test_radius_from_str_accepts_suffix() {
        assert_eq!("5km".parse::<SearchRadius>().unwrap().km(), 5);
        assert_eq!("7".parse::<SearchRadius>().unwrap().km(), 7);
        assert!("12".parse::<SearchRadius>().is_err());
    }

    #[test]
    fn test_radius_contains() {
        let r = SearchRadius::new(3).unwrap();
        assert!(r.contains_km(3.0));
        assert!(!r.contains_km(3.01));
    }
}
