// Common library shared by the bridge daemon and its tests

pub mod bootstrap;
pub mod config;
pub mod errors;
pub mod features;
pub mod poll;
pub mod telemetry;
pub mod transport;
