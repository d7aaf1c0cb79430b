// src/telemetry/mod.rs
//! Telemetry value types and the change-detected model

pub mod data;
pub mod model;

pub use data::{
    FixMethod, FixMode, FixQuality, Position, SatelliteInfo, TelemetrySnapshot,
};
pub use model::TelemetryModel;
