//! Multi-hop mesh transport boundary
//!
//! Topology formation, routing and root election live behind this trait.
//! Methods take `&self` so the transmit and receive pipelines can share one
//! transport handle; implementations use interior mutability as needed.

use core::future::Future;

use crate::address::MeshAddress;

/// Payload protocol marker carried alongside each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataProto {
    Bin,
    Http,
    Json,
    Mqtt,
}

impl DataProto {
    pub const fn code(self) -> u8 {
        match self {
            Self::Bin => 0,
            Self::Http => 1,
            Self::Json => 2,
            Self::Mqtt => 3,
        }
    }
}

/// Type of service requested from the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Tos {
    /// Hop-by-hop reliable
    P2p,
    /// End-to-end reliable
    E2e,
    /// Best effort
    Default,
}

impl Tos {
    pub const fn code(self) -> u8 {
        match self {
            Self::P2p => 0,
            Self::E2e => 1,
            Self::Default => 2,
        }
    }
}

/// Protocol / type-of-service markers of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FrameMeta {
    pub proto: DataProto,
    pub tos: Tos,
}

impl FrameMeta {
    /// Binary telemetry frame, hop-by-hop delivery
    pub const TELEMETRY: Self = Self {
        proto: DataProto::Bin,
        tos: Tos::P2p,
    };
}

impl Default for FrameMeta {
    fn default() -> Self {
        Self::TELEMETRY
    }
}

/// Result of a successful receive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Received {
    /// Payload length written into the caller's buffer (may be zero)
    pub len: usize,
    /// Sender address
    pub from: MeshAddress,
    /// Transport flag bits (e.g. "to DS", "from DS")
    pub flag: u32,
    pub meta: FrameMeta,
}

/// Mesh transport collaborator
pub trait MeshTransport {
    /// Transport failure
    type Error: embedded_io::Error;

    /// Send one frame with no explicit destination
    ///
    /// Upward or broadcast delivery is decided by the transport.
    fn send(&self, frame: &[u8], meta: FrameMeta)
        -> impl Future<Output = Result<(), Self::Error>>;

    /// Wait for the next inbound frame
    ///
    /// Blocks without bound; callers that need cancellation race this future
    /// against a timer.
    fn receive(&self, buf: &mut [u8]) -> impl Future<Output = Result<Received, Self::Error>>;

    /// Number of entries currently in the routing table
    fn routing_table_size(&self) -> usize;

    fn is_root(&self) -> bool;

    /// Hop distance from the root (root is layer 1)
    fn layer(&self) -> i32;

    fn parent_address(&self) -> MeshAddress;
}
