//! Hardware abstraction traits for mesh sensor firmware
//!
//! This crate defines the collaborator boundary of the telemetry core.
//! Board support packages implement these traits on top of their radio or
//! Ethernet stack, HTTP client and timers.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

pub mod address;
pub mod event;
pub mod platform;
pub mod sink;
pub mod transport;

pub use address::MeshAddress;
pub use event::MeshEvent;
pub use platform::{MonotonicClock, SystemDiagnostics};
pub use sink::TelemetrySink;
pub use transport::{DataProto, FrameMeta, MeshTransport, Received, Tos};
