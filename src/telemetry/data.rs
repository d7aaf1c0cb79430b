// src/telemetry/data.rs
//! GPS telemetry value types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A geographic position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,  // degrees, north positive
    pub longitude: f64, // degrees, east positive
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// A position is usable only when both coordinates are finite and in
    /// range. Devices report out-of-range sentinels while searching for a
    /// fix; those must never reach the stored state.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude.abs() <= 90.0
            && self.longitude.abs() <= 180.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}°, {:.6}°", self.latitude, self.longitude)
    }
}

/// Quality of the current fix, as reported in GGA-class sentences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixQuality {
    NoFix,
    Gps,
    DifferentialGps,
    PulsePerSecond,
    RealTimeKinematic,
    FloatRealTimeKinematic,
    Estimated,
    Manual,
    Simulation,
}

impl FixQuality {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FixQuality::NoFix),
            1 => Some(FixQuality::Gps),
            2 => Some(FixQuality::DifferentialGps),
            3 => Some(FixQuality::PulsePerSecond),
            4 => Some(FixQuality::RealTimeKinematic),
            5 => Some(FixQuality::FloatRealTimeKinematic),
            6 => Some(FixQuality::Estimated),
            7 => Some(FixQuality::Manual),
            8 => Some(FixQuality::Simulation),
            _ => None,
        }
    }
}

impl fmt::Display for FixQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixQuality::NoFix => "No fix",
            FixQuality::Gps => "GPS",
            FixQuality::DifferentialGps => "DGPS",
            FixQuality::PulsePerSecond => "PPS",
            FixQuality::RealTimeKinematic => "RTK",
            FixQuality::FloatRealTimeKinematic => "Float RTK",
            FixQuality::Estimated => "Estimated",
            FixQuality::Manual => "Manual",
            FixQuality::Simulation => "Simulation",
        };
        write!(f, "{}", name)
    }
}

/// Whether the device holds a two- or three-dimensional solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixMethod {
    NoFix,
    Fix2D,
    Fix3D,
}

impl FixMethod {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FixMethod::NoFix),
            2 => Some(FixMethod::Fix2D),
            3 => Some(FixMethod::Fix3D),
            _ => None,
        }
    }
}

impl fmt::Display for FixMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FixMethod::NoFix => "No fix",
            FixMethod::Fix2D => "2D fix",
            FixMethod::Fix3D => "3D fix",
        };
        write!(f, "{}", name)
    }
}

/// Whether the device selects its fix method automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixMode {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteInfo {
    pub prn: u16,                // pseudorandom satellite identifier
    pub elevation: Option<f32>,  // degrees above horizon
    pub azimuth: Option<f32>,    // degrees from true north
    pub snr: Option<f32>,        // signal-to-noise ratio in dB
    pub used: bool,              // whether the satellite is used in the fix
    pub constellation: String,   // GPS, GLONASS, GALILEO, BEIDOU, etc.
}

impl SatelliteInfo {
    pub fn new(prn: u16) -> Self {
        Self {
            prn,
            elevation: None,
            azimuth: None,
            snr: None,
            used: false,
            constellation: Self::determine_constellation(prn).to_string(),
        }
    }

    fn determine_constellation(prn: u16) -> &'static str {
        match prn {
            1..=32 => "GPS",
            33..=64 => "SBAS",
            65..=96 => "GLONASS",
            120..=163 => "BEIDOU",
            193..=197 => "QZSS",
            211..=246 => "GALILEO",
            _ => "UNKNOWN",
        }
    }

    pub fn signal_strength_description(&self) -> &'static str {
        match self.snr {
            Some(snr) if snr >= 40.0 => "Excellent",
            Some(snr) if snr >= 35.0 => "Good",
            Some(snr) if snr >= 25.0 => "Fair",
            Some(snr) if snr >= 15.0 => "Poor",
            Some(_) => "Very Poor",
            None => "Unknown",
        }
    }
}

/// A point-in-time copy of every telemetry field, safe to hand to any
/// thread. Scalar fields are `None` until the device has reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub position: Option<Position>,
    pub speed: Option<f64>,                    // km/h
    pub bearing: Option<f64>,                  // degrees, direction of travel
    pub heading: Option<f64>,                  // degrees, direction faced
    pub altitude: Option<f64>,                 // meters above mean sea level
    pub altitude_above_ellipsoid: Option<f64>, // meters above WGS84 ellipsoid
    pub geoidal_separation: Option<f64>,       // meters
    pub magnetic_variation: Option<f64>,       // degrees
    pub fix_obtained: bool,
    pub fix_quality: Option<FixQuality>,
    pub fix_method: Option<FixMethod>,
    pub fix_mode: Option<FixMode>,
    pub horizontal_dop: Option<f64>,
    pub vertical_dop: Option<f64>,
    pub mean_dop: Option<f64>,
    pub satellites: Vec<SatelliteInfo>,
    pub utc_date_time: Option<DateTime<Utc>>,
}

impl TelemetrySnapshot {
    /// Count of satellites currently used in the fix.
    pub fn satellites_used(&self) -> usize {
        self.satellites.iter().filter(|sat| sat.used).count()
    }
}
