// src/device/mod.rs
//! Device and discovery collaborator contracts

pub mod serial;

use crate::error::Result;
use crate::telemetry::{FixQuality, Position};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use serial::{SerialDevice, SerialDiscovery};

/// An opaque handle to a physical GPS transport (serial, network,
/// Bluetooth). Exclusively owned by the interpreter while it is running or
/// paused; closed on stop, on dispose, and on unrecoverable connection loss
/// before a new one is acquired.
#[async_trait]
pub trait Device: Send {
    /// Human-readable name, for logs and notifications.
    fn name(&self) -> &str;

    fn is_open(&self) -> bool;

    async fn open(&mut self) -> Result<()>;

    async fn close(&mut self) -> Result<()>;

    /// Close the underlying stream without full disposal, so the handle can
    /// be reopened after a reconnection.
    async fn reset(&mut self);

    /// Read raw bytes from the transport. Blocks until data is available;
    /// the interpreter bounds every call with its read timeout.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Estimated positional error in meters for a given fix quality, used
    /// to weight the position filter. NaN means no estimate, which bypasses
    /// the filter entirely.
    fn precision_estimate(&self, quality: FixQuality) -> f64 {
        match quality {
            FixQuality::NoFix => f64::NAN,
            FixQuality::Gps => 6.0,
            FixQuality::DifferentialGps => 3.0,
            FixQuality::PulsePerSecond => 6.0,
            FixQuality::RealTimeKinematic => 0.02,
            FixQuality::FloatRealTimeKinematic => 0.3,
            FixQuality::Estimated => 50.0,
            FixQuality::Manual => 50.0,
            FixQuality::Simulation => 10.0,
        }
    }
}

/// Device discovery plus the cross-cutting broadcast surface.
///
/// Injected into the interpreter at construction. The broadcast setters
/// mirror accepted telemetry changes for consumers outside the interpreter;
/// the default implementations discard them.
#[async_trait]
pub trait DeviceDiscovery: Send + Sync {
    /// Hand over any available device, or `None` when nothing is connected.
    async fn any_available_device(&self) -> Option<Box<dyn Device>>;

    fn broadcast_position(&self, _position: Position) {}
    fn broadcast_speed(&self, _speed: f64) {}
    fn broadcast_bearing(&self, _bearing: f64) {}
    fn broadcast_heading(&self, _heading: f64) {}
    fn broadcast_altitude(&self, _altitude: f64) {}

    /// Whether successful fixes should synchronize the host clock.
    fn sync_clock_on_fix(&self) -> bool {
        false
    }

    /// Called with each accepted UTC timestamp while a fix is held, if
    /// [`DeviceDiscovery::sync_clock_on_fix`] is true. Writing the host
    /// clock is the collaborator's business, not the interpreter's.
    fn synchronize_clock(&self, _utc: DateTime<Utc>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullDevice;

    #[async_trait]
    impl Device for NullDevice {
        fn name(&self) -> &str {
            "null"
        }
        fn is_open(&self) -> bool {
            false
        }
        async fn open(&mut self) -> Result<()> {
            Ok(())
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
        async fn reset(&mut self) {}
        async fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
            Ok(0)
        }
    }

    #[test]
    fn test_default_precision_table() {
        let device = NullDevice;
        assert!(device.precision_estimate(FixQuality::NoFix).is_nan());
        assert_eq!(device.precision_estimate(FixQuality::Gps), 6.0);
        assert!(
            device.precision_estimate(FixQuality::RealTimeKinematic)
                < device.precision_estimate(FixQuality::DifferentialGps)
        );
    }
}
