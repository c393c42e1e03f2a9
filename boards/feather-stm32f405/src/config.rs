#![deny(unsafe_code)]
//! Mesh and uplink configuration for this board

use embassy_net::{IpEndpoint, Ipv4Address};
use mesh_node_core::NodeConfig;

/// How this node joins the mesh and where the root sends telemetry
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Mesh network identifier, stamped into logs
    pub mesh_id: [u8; 6],
    /// This node is the designated root
    pub fixed_root: bool,
    /// Where non-root nodes send their frames
    pub root_endpoint: IpEndpoint,
    /// UDP port every node listens on
    pub mesh_port: u16,
    /// HTTP collector reachable from the root
    pub sink_endpoint: IpEndpoint,
    pub sink_path: &'static str,
    /// Overrides the UID-derived node id
    pub node_id: Option<u8>,
    /// Overrides the UID-derived MAC
    pub mac_addr: Option<[u8; 6]>,
    /// Random seed for network stack
    pub seed: u64,
    pub node: NodeConfig,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            mesh_id: [0x77, 0x77, 0x77, 0x77, 0x77, 0x77],
            fixed_root: false,
            root_endpoint: IpEndpoint::new(Ipv4Address::new(192, 168, 43, 1).into(), 4000),
            mesh_port: 4000,
            sink_endpoint: IpEndpoint::new(Ipv4Address::new(192, 168, 43, 49).into(), 3000),
            sink_path: "/",
            node_id: None,
            mac_addr: None,
            seed: 0x1234_5678_u64,
            node: NodeConfig::default(),
        }
    }
}
