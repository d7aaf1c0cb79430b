// src/filter.rs
//! Pluggable position smoothing
//!
//! The interpreter itself carries no smoothing algorithm; it only defines the
//! seam. The telemetry model hands every raw fix to the installed filter
//! along with the precision signals the filter needs to weight it, and falls
//! back to the raw fix whenever those signals are degenerate.

use crate::telemetry::Position;

/// A smoothing strategy invoked on every raw position update.
///
/// `initialize` is called once with the first raw fix of a session before
/// `filter` is ever called; a filter may use it to seed its internal state.
pub trait PositionFilter: Send {
    fn initialize(&mut self, first: Position);

    /// Produce the smoothed position for a raw fix.
    ///
    /// `precision_estimate` is the device's estimated error in meters for
    /// the current fix quality; `hdop`/`vdop` are the current dilutions of
    /// precision; `bearing` (degrees) and `speed` (km/h) describe the
    /// current motion. Only called when `precision_estimate * hdop * vdop`
    /// is finite and non-zero.
    fn filter(
        &mut self,
        raw: Position,
        precision_estimate: f64,
        hdop: f64,
        vdop: f64,
        bearing: f64,
        speed: f64,
    ) -> Position;
}

/// Whether a raw fix must bypass the filter: a degenerate precision signal
/// (zero, NaN or infinite quality) must never corrupt or stall the filter.
pub(crate) fn bypass_filter(quality: f64) -> bool {
    quality == 0.0 || !quality.is_finite()
}
