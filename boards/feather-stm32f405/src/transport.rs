#![deny(unsafe_code)]
//! UDP star "mesh" over Ethernet
//!
//! Every node binds the same UDP port. Non-root nodes send their frames to
//! the configured root endpoint; the root hands its own frames back to its
//! receive side through a local loopback channel. Topology queries are
//! answered from the shared [`NodeContext`].

use core::cell::RefCell;

use defmt::{trace, warn};
use embassy_futures::select::{select, Either};
use embassy_net::udp::{PacketMetadata, UdpSocket};
use embassy_net::{IpAddress, IpEndpoint, Stack};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex as BlockingMutex;
use embassy_sync::channel::Channel;
use heapless::Vec;
use mesh_node_core::{NodeContext, FRAME_LEN};
use mesh_node_hal::{FrameMeta, MeshAddress, MeshTransport, Received};

use crate::error::NetworkError;

/// Distinct senders the root keeps in its routing table
const MAX_CHILDREN: usize = 32;
/// Frames the root can hold for itself before sends fail
const LOOPBACK_DEPTH: usize = 2;

/// Socket storage, allocated once in a `StaticCell`
pub struct UdpBuffers {
    rx_meta: [PacketMetadata; 8],
    rx: [u8; 4096],
    tx_meta: [PacketMetadata; 4],
    tx: [u8; 4096],
}

impl UdpBuffers {
    pub const fn new() -> Self {
        Self {
            rx_meta: [PacketMetadata::EMPTY; 8],
            rx: [0; 4096],
            tx_meta: [PacketMetadata::EMPTY; 4],
            tx: [0; 4096],
        }
    }
}

struct LoopbackFrame {
    data: Vec<u8, FRAME_LEN>,
    meta: FrameMeta,
}

/// Mesh transport over a single bound UDP socket
pub struct UdpMeshTransport<'a> {
    socket: UdpSocket<'a>,
    stack: Stack<'a>,
    ctx: &'static NodeContext,
    self_port: u16,
    root_endpoint: IpEndpoint,
    loopback: Channel<CriticalSectionRawMutex, LoopbackFrame, LOOPBACK_DEPTH>,
    children: BlockingMutex<CriticalSectionRawMutex, RefCell<Vec<MeshAddress, MAX_CHILDREN>>>,
}

impl<'a> UdpMeshTransport<'a> {
    /// Bind `port` and route non-root traffic to `root_endpoint`
    pub fn new(
        stack: Stack<'a>,
        buffers: &'a mut UdpBuffers,
        ctx: &'static NodeContext,
        port: u16,
        root_endpoint: IpEndpoint,
    ) -> Result<Self, NetworkError> {
        let UdpBuffers {
            rx_meta,
            rx,
            tx_meta,
            tx,
        } = buffers;
        let mut socket = UdpSocket::new(stack, rx_meta, rx, tx_meta, tx);
        socket.bind(port).map_err(|e| {
            warn!("UDP bind to port {} failed: {:?}", port, e);
            NetworkError::SocketError
        })?;

        Ok(Self {
            socket,
            stack,
            ctx,
            self_port: port,
            root_endpoint,
            loopback: Channel::new(),
            children: BlockingMutex::new(RefCell::new(Vec::new())),
        })
    }

    fn note_sender(&self, address: MeshAddress) {
        self.children.lock(|children| {
            let mut children = children.borrow_mut();
            if !children.contains(&address) && children.push(address).is_err() {
                warn!("Routing table full, not tracking {}", address);
            }
        });
    }

    fn deliver_locally(&self, frame: &[u8], meta: FrameMeta) -> Result<(), NetworkError> {
        let data = Vec::from_slice(frame).map_err(|_| NetworkError::SendFailed)?;
        self.loopback
            .try_send(LoopbackFrame { data, meta })
            .map_err(|_| NetworkError::SendFailed)
    }
}

/// Mesh address of a UDP peer: IPv4 octets plus port
pub fn endpoint_address(endpoint: &IpEndpoint) -> MeshAddress {
    #[allow(unreachable_patterns)]
    match endpoint.addr {
        IpAddress::Ipv4(ip) => MeshAddress::from_ipv4(ip.octets(), endpoint.port),
        _ => MeshAddress::UNSPECIFIED,
    }
}

impl MeshTransport for UdpMeshTransport<'_> {
    type Error = NetworkError;

    async fn send(&self, frame: &[u8], meta: FrameMeta) -> Result<(), NetworkError> {
        let topology = self.ctx.topology();
        if !topology.is_connected() {
            return Err(NetworkError::SocketError);
        }
        if topology.is_root() {
            return self.deliver_locally(frame, meta);
        }

        trace!("Sending {} bytes to root {}", frame.len(), self.root_endpoint);
        self.socket
            .send_to(frame, self.root_endpoint)
            .await
            .map_err(|e| {
                warn!("UDP send failed: {:?}", e);
                NetworkError::SendFailed
            })
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<Received, NetworkError> {
        let next = select(self.socket.recv_from(buf), self.loopback.receive()).await;
        match next {
            Either::First(result) => {
                let (len, metadata) = result.map_err(|e| {
                    warn!("UDP receive failed: {:?}", e);
                    NetworkError::ReceiveFailed
                })?;
                let from = endpoint_address(&metadata.endpoint);
                self.note_sender(from);
                Ok(Received {
                    len,
                    from,
                    flag: 0,
                    meta: FrameMeta::TELEMETRY,
                })
            }
            Either::Second(frame) => {
                let len = frame.data.len().min(buf.len());
                buf[..len].copy_from_slice(&frame.data[..len]);
                let from = self
                    .stack
                    .config_v4()
                    .map(|config| {
                        MeshAddress::from_ipv4(config.address.address().octets(), self.self_port)
                    })
                    .unwrap_or(MeshAddress::UNSPECIFIED);
                Ok(Received {
                    len,
                    from,
                    flag: 0,
                    meta: frame.meta,
                })
            }
        }
    }

    fn routing_table_size(&self) -> usize {
        1 + self.children.lock(|children| children.borrow().len())
    }

    fn is_root(&self) -> bool {
        self.ctx.topology().is_root()
    }

    fn layer(&self) -> i32 {
        self.ctx.topology().layer()
    }

    fn parent_address(&self) -> MeshAddress {
        self.ctx.topology().parent()
    }
}
