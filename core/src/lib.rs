//! Platform-agnostic core logic for mesh sensor firmware
//!
//! This crate contains business logic that can be shared across all
//! supported boards. It has NO hardware dependencies: pins, delays, clocks,
//! the mesh transport and the telemetry sink all come in through traits.
//!
//! ## Data flow
//!
//! ```text
//! SensorLink -> SampleSource -> frame::encode -> TransmitPipeline -> (transport)
//! (transport) -> ReceivePipeline -> frame::decode -> UplinkRecord -> TelemetrySink
//! ```
//!
//! Topology events from the transport update [`TopologyState`], which both
//! pipelines read through the shared [`NodeContext`].

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// Must come first so the logging macros are visible to every module.
mod fmt;

pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod receive;
pub mod sample;
pub mod sensor;
pub mod topology;
pub mod transmit;
pub mod uplink;

#[cfg(test)]
mod testing;

pub use config::{NodeConfig, FRAME_LEN, RX_LEN};
pub use context::NodeContext;
pub use error::{FrameError, SensorError, TelemetryError};
pub use frame::TelemetryFields;
pub use receive::{ReceivePipeline, ReceiveStats};
pub use sample::{Reading, ReadingStatus, SampleSource};
pub use sensor::{Measurement, RawSensor, SensorLink};
pub use topology::{Indication, MeshPhase, Reaction, Role, TopologyState};
pub use transmit::{TransmitPipeline, TransmitStats};
pub use uplink::UplinkRecord;
