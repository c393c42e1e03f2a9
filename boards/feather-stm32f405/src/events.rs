#![deny(unsafe_code)]
//! Topology events for the UDP star
//!
//! DHCP lease up means "connected to parent": the designated root sits at
//! layer 1 under the gateway, every other node at layer 2 under the root.
//! Losing the lease is a parent disconnect. Events are applied from this
//! single task, which keeps event delivery serialized.

use defmt::info;
use embassy_net::Stack;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use mesh_node_core::{Indication, NodeContext};
use mesh_node_hal::{MeshAddress, MeshEvent};

use crate::config::MeshConfig;
use crate::transport::endpoint_address;

const ROOT_LAYER: i32 = 1;
const NODE_LAYER: i32 = 2;
/// Reason reported when the DHCP lease is lost
const REASON_LEASE_LOST: u16 = 0;

/// Cross-task notifications raised by event reactions
pub struct MeshSignals {
    /// Fired once, when the pipelines may start
    pub pipelines: Signal<CriticalSectionRawMutex, ()>,
    /// Latest status for the heartbeat LED
    pub indication: Signal<CriticalSectionRawMutex, Indication>,
}

impl MeshSignals {
    pub const fn new() -> Self {
        Self {
            pipelines: Signal::new(),
            indication: Signal::new(),
        }
    }
}

fn dispatch(ctx: &NodeContext, signals: &MeshSignals, config: &MeshConfig, event: MeshEvent) {
    let reaction = ctx.topology().apply(&event);
    if reaction.start_pipelines {
        signals.pipelines.signal(());
    }
    if reaction.start_uplink {
        info!(
            "Root uplink ready, collector at {}{}",
            config.sink_endpoint, config.sink_path
        );
    }
    if let Some(indication) = reaction.indicate {
        signals.indication.signal(indication);
    }
}

/// Translate link state changes into mesh events, forever
pub async fn run(
    stack: Stack<'_>,
    ctx: &NodeContext,
    signals: &MeshSignals,
    config: &MeshConfig,
) -> ! {
    let mesh_id = MeshAddress::new(config.mesh_id);
    dispatch(
        ctx,
        signals,
        config,
        MeshEvent::Started {
            id: mesh_id,
            layer: ctx.topology().layer(),
        },
    );
    if config.fixed_root {
        dispatch(ctx, signals, config, MeshEvent::RootFixed { fixed: true });
    }

    loop {
        stack.wait_config_up().await;
        let Some(v4) = stack.config_v4() else {
            continue;
        };
        info!("IPv4 address: {}", v4.address);

        let (layer, parent) = if config.fixed_root {
            let gateway = v4
                .gateway
                .map(|ip| MeshAddress::from_ipv4(ip.octets(), 0))
                .unwrap_or(MeshAddress::UNSPECIFIED);
            (ROOT_LAYER, gateway)
        } else {
            (NODE_LAYER, endpoint_address(&config.root_endpoint))
        };
        dispatch(
            ctx,
            signals,
            config,
            MeshEvent::ParentConnected {
                layer,
                parent,
                is_root: config.fixed_root,
            },
        );
        if config.fixed_root {
            dispatch(ctx, signals, config, MeshEvent::ToDsState { reachable: true });
        } else {
            dispatch(
                ctx,
                signals,
                config,
                MeshEvent::RootAddress { address: parent },
            );
        }

        stack.wait_config_down().await;
        dispatch(
            ctx,
            signals,
            config,
            MeshEvent::ParentDisconnected {
                reason: REASON_LEASE_LOST,
                layer: ctx.topology().layer(),
            },
        );
    }
}
