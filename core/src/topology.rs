//! Node topology state, driven by transport events
//!
//! Written only from the transport's event context, read concurrently by
//! both pipelines. Each field is individually atomic; readers may observe a
//! mix of old and new fields across one update, which is acceptable.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use critical_section::Mutex;
use mesh_node_hal::{MeshAddress, MeshEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Role {
    Root,
    NonRoot,
}

/// Coarse connectivity state derived from the individual fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeshPhase {
    Disconnected,
    ConnectedNonRoot(i32),
    ConnectedRoot,
}

/// What the status indicator should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Indication {
    Layer(i32),
    Disconnected,
}

/// Side effects the event context must carry out after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reaction {
    /// Spawn the transmit/receive pipelines (reported once per process)
    pub start_pipelines: bool,
    /// Bring up the upstream IP link; set when connecting as root
    pub start_uplink: bool,
    pub indicate: Option<Indication>,
}

/// Layer value before the transport reports one
pub const UNKNOWN_LAYER: i32 = -1;

pub struct TopologyState {
    root: AtomicBool,
    connected: AtomicBool,
    layer: AtomicI32,
    last_layer: AtomicI32,
    parent: Mutex<Cell<MeshAddress>>,
    pipelines_started: AtomicBool,
}

impl Default for TopologyState {
    fn default() -> Self {
        Self::new()
    }
}

fn layer_tag(is_root: bool, layer: i32) -> &'static str {
    if is_root {
        "<ROOT>"
    } else if layer == 2 {
        "<layer2>"
    } else {
        ""
    }
}

impl TopologyState {
    pub const fn new() -> Self {
        Self {
            root: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            layer: AtomicI32::new(UNKNOWN_LAYER),
            last_layer: AtomicI32::new(0),
            parent: Mutex::new(Cell::new(MeshAddress::UNSPECIFIED)),
            pipelines_started: AtomicBool::new(false),
        }
    }

    pub fn role(&self) -> Role {
        if self.is_root() {
            Role::Root
        } else {
            Role::NonRoot
        }
    }

    pub fn is_root(&self) -> bool {
        self.root.load(Ordering::Acquire)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn layer(&self) -> i32 {
        self.layer.load(Ordering::Acquire)
    }

    pub fn parent(&self) -> MeshAddress {
        critical_section::with(|cs| self.parent.borrow(cs).get())
    }

    pub fn phase(&self) -> MeshPhase {
        if !self.is_connected() {
            MeshPhase::Disconnected
        } else if self.is_root() {
            MeshPhase::ConnectedRoot
        } else {
            MeshPhase::ConnectedNonRoot(self.layer())
        }
    }

    fn set_parent(&self, parent: MeshAddress) {
        critical_section::with(|cs| self.parent.borrow(cs).set(parent));
    }

    /// Apply one transport event
    ///
    /// Must only be called from the transport's serialized event context.
    pub fn apply(&self, event: &MeshEvent) -> Reaction {
        let mut reaction = Reaction::default();
        match *event {
            MeshEvent::Started { id, layer } => {
                info!("<MESH_EVENT_STARTED> ID:{}", id);
                self.connected.store(false, Ordering::Release);
                self.layer.store(layer, Ordering::Release);
            }
            MeshEvent::Stopped { layer } => {
                info!("<MESH_EVENT_STOPPED>");
                self.connected.store(false, Ordering::Release);
                self.root.store(false, Ordering::Release);
                self.layer.store(layer, Ordering::Release);
            }
            MeshEvent::ParentConnected {
                layer,
                parent,
                is_root,
            } => {
                self.layer.store(layer, Ordering::Release);
                self.set_parent(parent);
                self.root.store(is_root, Ordering::Release);
                let last = self.last_layer.swap(layer, Ordering::AcqRel);
                info!(
                    "<MESH_EVENT_PARENT_CONNECTED> layer:{}-->{}, parent:{}{}",
                    last,
                    layer,
                    parent,
                    layer_tag(is_root, layer)
                );
                self.connected.store(true, Ordering::Release);
                reaction.indicate = Some(Indication::Layer(layer));
                reaction.start_uplink = is_root;
                reaction.start_pipelines = !self.pipelines_started.swap(true, Ordering::AcqRel);
            }
            MeshEvent::ParentDisconnected { reason, layer } => {
                info!("<MESH_EVENT_PARENT_DISCONNECTED> reason:{}", reason);
                self.connected.store(false, Ordering::Release);
                self.root.store(false, Ordering::Release);
                self.layer.store(layer, Ordering::Release);
                reaction.indicate = Some(Indication::Disconnected);
            }
            MeshEvent::LayerChange { layer, is_root } => {
                self.layer.store(layer, Ordering::Release);
                self.root.store(is_root, Ordering::Release);
                let last = self.last_layer.swap(layer, Ordering::AcqRel);
                info!(
                    "<MESH_EVENT_LAYER_CHANGE> layer:{}-->{}{}",
                    last,
                    layer,
                    layer_tag(is_root, layer)
                );
                reaction.indicate = Some(Indication::Layer(layer));
            }
            MeshEvent::RootSwitchAck {
                layer,
                parent,
                is_root,
            } => {
                self.layer.store(layer, Ordering::Release);
                self.set_parent(parent);
                self.root.store(is_root, Ordering::Release);
                info!(
                    "<MESH_EVENT_ROOT_SWITCH_ACK> layer:{}, parent:{}",
                    layer, parent
                );
            }
            MeshEvent::ChildConnected { aid, address } => {
                info!("<MESH_EVENT_CHILD_CONNECTED> aid:{}, {}", aid, address);
            }
            MeshEvent::ChildDisconnected { aid, address } => {
                info!("<MESH_EVENT_CHILD_DISCONNECTED> aid:{}, {}", aid, address);
            }
            MeshEvent::RoutingTableAdd { changed, size } => {
                warn!("<MESH_EVENT_ROUTING_TABLE_ADD> add {}, new:{}", changed, size);
            }
            MeshEvent::RoutingTableRemove { changed, size } => {
                warn!(
                    "<MESH_EVENT_ROUTING_TABLE_REMOVE> remove {}, new:{}",
                    changed, size
                );
            }
            MeshEvent::NoParentFound { scan_times } => {
                info!("<MESH_EVENT_NO_PARENT_FOUND> scan times:{}", scan_times);
            }
            MeshEvent::RootAddress { address } => {
                info!("<MESH_EVENT_ROOT_ADDRESS> root address:{}", address);
            }
            MeshEvent::VoteStarted {
                attempts,
                reason,
                candidate,
            } => {
                info!(
                    "<MESH_EVENT_VOTE_STARTED> attempts:{}, reason:{}, rc_addr:{}",
                    attempts, reason, candidate
                );
            }
            MeshEvent::VoteStopped => info!("<MESH_EVENT_VOTE_STOPPED>"),
            MeshEvent::RootSwitchRequest { reason, candidate } => {
                info!(
                    "<MESH_EVENT_ROOT_SWITCH_REQ> reason:{}, rc_addr:{}",
                    reason, candidate
                );
            }
            MeshEvent::ToDsState { reachable } => {
                info!("<MESH_EVENT_TODS_STATE> reachable:{}", reachable);
            }
            MeshEvent::RootFixed { fixed } => {
                info!("<MESH_EVENT_ROOT_FIXED> fixed:{}", fixed);
            }
            MeshEvent::RootAskedYield {
                address,
                rssi,
                capacity,
            } => {
                info!(
                    "<MESH_EVENT_ROOT_ASKED_YIELD> {}, rssi:{}, capacity:{}",
                    address, rssi, capacity
                );
            }
            MeshEvent::ChannelSwitch { channel } => {
                info!("<MESH_EVENT_CHANNEL_SWITCH> new channel:{}", channel);
            }
            MeshEvent::ScanDone { found } => {
                info!("<MESH_EVENT_SCAN_DONE> number:{}", found);
            }
            MeshEvent::NetworkState { rootless } => {
                info!("<MESH_EVENT_NETWORK_STATE> is_rootless:{}", rootless);
            }
            MeshEvent::StopReconnection => info!("<MESH_EVENT_STOP_RECONNECTION>"),
            MeshEvent::FindNetwork { channel, router } => {
                info!(
                    "<MESH_EVENT_FIND_NETWORK> new channel:{}, router BSSID:{}",
                    channel, router
                );
            }
            MeshEvent::RouterSwitch { channel, router } => {
                info!(
                    "<MESH_EVENT_ROUTER_SWITCH> channel:{}, router:{}",
                    channel, router
                );
            }
        }
        reaction
    }
}
