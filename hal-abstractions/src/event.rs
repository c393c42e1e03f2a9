//! Topology and role events emitted by the mesh transport
//!
//! Events are delivered from a single, serialized context. Only the first
//! six variants change node state; the rest are informational.

use crate::address::MeshAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeshEvent {
    /// Mesh networking started on this node
    Started { id: MeshAddress, layer: i32 },
    /// Mesh networking stopped
    Stopped { layer: i32 },
    /// Associated with a parent (or the router, when root)
    ParentConnected {
        layer: i32,
        parent: MeshAddress,
        is_root: bool,
    },
    /// Lost the parent link
    ParentDisconnected { reason: u16, layer: i32 },
    /// Hop distance changed without losing the link
    LayerChange { layer: i32, is_root: bool },
    /// This node took over as root after a switch request
    RootSwitchAck {
        layer: i32,
        parent: MeshAddress,
        is_root: bool,
    },
    ChildConnected { aid: u8, address: MeshAddress },
    ChildDisconnected { aid: u8, address: MeshAddress },
    RoutingTableAdd { changed: u16, size: u16 },
    RoutingTableRemove { changed: u16, size: u16 },
    NoParentFound { scan_times: u16 },
    RootAddress { address: MeshAddress },
    VoteStarted {
        attempts: u16,
        reason: u16,
        candidate: MeshAddress,
    },
    VoteStopped,
    RootSwitchRequest { reason: u16, candidate: MeshAddress },
    /// Whether the root can reach the external network
    ToDsState { reachable: bool },
    RootFixed { fixed: bool },
    RootAskedYield {
        address: MeshAddress,
        rssi: i8,
        capacity: u16,
    },
    ChannelSwitch { channel: u8 },
    ScanDone { found: u8 },
    NetworkState { rootless: bool },
    StopReconnection,
    FindNetwork { channel: u8, router: MeshAddress },
    RouterSwitch { channel: u8, router: MeshAddress },
}

impl MeshEvent {
    /// Whether handling this event may change node topology state
    pub const fn is_topology_change(&self) -> bool {
        matches!(
            self,
            Self::Started { .. }
                | Self::Stopped { .. }
                | Self::ParentConnected { .. }
                | Self::ParentDisconnected { .. }
                | Self::LayerChange { .. }
                | Self::RootSwitchAck { .. }
        )
    }
}
