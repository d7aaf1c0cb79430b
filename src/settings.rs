// src/settings.rs
//! Interpreter configuration and validation

use crate::error::{GpsError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Commands may never wait on the command lock for less than this.
pub const MINIMUM_COMMAND_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bounded wait for the command lock.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Default bound on a single blocking device read.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Fixed delay between reconnection attempts.
pub const RECONNECTION_DELAY: Duration = Duration::from_secs(1);

/// Upper bound accepted for the dilution-of-precision maxima.
pub const MAXIMUM_DOP: f64 = 50.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterpreterSettings {
    /// Bound on a single blocking device read. Must be greater than zero;
    /// this is also what bounds how quickly the worker observes a stop
    /// request while blocked on the device.
    #[serde(with = "duration_millis")]
    pub read_timeout: Duration,
    /// Bounded wait for the command lock. Minimum one second.
    #[serde(with = "duration_millis")]
    pub command_timeout: Duration,
    /// Consecutive reconnection failures tolerated before the session ends.
    /// `-1` means unlimited.
    pub maximum_reconnection_attempts: i32,
    /// Position samples with a stored HDOP above this are discarded.
    pub maximum_hdop: f64,
    /// Position samples with a stored VDOP above this are discarded.
    pub maximum_vdop: f64,
    /// Whether the worker may try to reacquire a device after losing one.
    pub allow_automatic_reconnection: bool,
    /// Whether the pluggable position filter is consulted.
    pub is_filter_enabled: bool,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            maximum_reconnection_attempts: -1,
            maximum_hdop: MAXIMUM_DOP,
            maximum_vdop: MAXIMUM_DOP,
            allow_automatic_reconnection: true,
            is_filter_enabled: true,
        }
    }
}

impl InterpreterSettings {
    /// Check every tunable against its documented range.
    pub fn validate(&self) -> Result<()> {
        if self.read_timeout.is_zero() {
            return Err(GpsError::InvalidConfig(
                "read_timeout must be greater than zero".to_string(),
            ));
        }
        if self.command_timeout < MINIMUM_COMMAND_TIMEOUT {
            return Err(GpsError::InvalidConfig(format!(
                "command_timeout must be at least {:?}",
                MINIMUM_COMMAND_TIMEOUT
            )));
        }
        if self.maximum_reconnection_attempts < -1 {
            return Err(GpsError::InvalidConfig(
                "maximum_reconnection_attempts must be -1 (unlimited) or >= 0".to_string(),
            ));
        }
        for (name, value) in [
            ("maximum_hdop", self.maximum_hdop),
            ("maximum_vdop", self.maximum_vdop),
        ] {
            if !value.is_finite() || value <= 0.0 || value > MAXIMUM_DOP {
                return Err(GpsError::InvalidConfig(format!(
                    "{} must be within (0, {}]",
                    name, MAXIMUM_DOP
                )));
            }
        }
        Ok(())
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        (d.as_millis() as u64).serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}
