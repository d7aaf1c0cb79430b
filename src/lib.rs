// src/lib.rs
//! GPS Interpreter Library
//!
//! A reusable GPS-data-interpreter state machine: it owns a background
//! worker that pulls telemetry packets from a live device, turns raw value
//! updates into change-detected public state, filters noisy position fixes,
//! and recovers transparently from connection loss. Wire-protocol parsing is
//! delegated to a [`PacketReader`] implementation; the physical transport
//! hides behind the [`device::Device`] trait.

pub mod device;
pub mod error;
pub mod events;
pub mod filter;
pub mod interpreter;
pub mod reconnect;
pub mod settings;
pub mod telemetry;

// Re-export main types for convenience
pub use error::{GpsError, Result};
pub use events::{InterpreterEvent, NotificationHub, SubscriberId};
pub use filter::PositionFilter;
pub use interpreter::{Interpreter, InterpreterState, PacketReader};
pub use settings::InterpreterSettings;
pub use telemetry::{
    FixMethod, FixMode, FixQuality, Position, SatelliteInfo, TelemetryModel, TelemetrySnapshot,
};
