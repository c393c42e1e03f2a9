//! Inbound frame loop: decode, log, and forward to the sink at the root

use embassy_futures::select::{select, Either};
use embedded_hal_async::delay::DelayNs;
use embedded_io::Error as _;
use mesh_node_hal::{MeshTransport, Received, SystemDiagnostics, TelemetrySink};

use crate::config::{NodeConfig, RX_LEN};
use crate::context::NodeContext;
use crate::error::TelemetryError;
use crate::fmt::Debug2Format;
use crate::frame::{self, TelemetryFields};
use crate::uplink::UplinkRecord;

/// Counters kept by the receive loop
///
/// Receive errors and empty payloads are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiveStats {
    /// Frames received and decoded
    pub frames: u32,
    /// Records accepted by the sink
    pub forwarded: u32,
    /// Records the sink rejected
    pub sink_failures: u32,
}

/// Receives telemetry frames; the root additionally posts them upstream
///
/// Each receive is raced against `receive_poll_ms` so that clearing the
/// running flag takes effect within one poll period even on a silent mesh.
/// A receive already in flight in the transport cannot be cancelled any
/// faster than that.
pub struct ReceivePipeline<'a, T, K, D, G> {
    ctx: &'a NodeContext,
    transport: &'a T,
    sink: &'a K,
    delay: D,
    diagnostics: &'a G,
    config: NodeConfig,
    buf: [u8; RX_LEN],
    stats: ReceiveStats,
}

impl<'a, T, K, D, G> ReceivePipeline<'a, T, K, D, G>
where
    T: MeshTransport,
    K: TelemetrySink,
    D: DelayNs,
    G: SystemDiagnostics,
{
    pub fn new(
        ctx: &'a NodeContext,
        transport: &'a T,
        sink: &'a K,
        delay: D,
        diagnostics: &'a G,
        config: NodeConfig,
    ) -> Self {
        Self {
            ctx,
            transport,
            sink,
            delay,
            diagnostics,
            config,
            buf: [0; RX_LEN],
            stats: ReceiveStats::default(),
        }
    }

    pub fn stats(&self) -> ReceiveStats {
        self.stats
    }

    /// Loop until the context's running flag is cleared
    pub async fn run(&mut self) -> ReceiveStats {
        info!("Receive pipeline started");
        while self.ctx.is_running() {
            self.step().await;
        }
        info!("Receive pipeline stopped after {} frames", self.stats.frames);
        self.stats
    }

    /// Wait for at most one frame and handle it
    pub async fn step(&mut self) {
        let received = match select(
            self.transport.receive(&mut self.buf),
            self.delay.delay_ms(self.config.receive_poll_ms),
        )
        .await
        {
            Either::First(result) => result,
            Either::Second(()) => {
                trace!("No frame within {} ms", self.config.receive_poll_ms);
                return;
            }
        };

        let received = match received {
            Ok(received) => received,
            Err(e) => {
                error!(
                    "{}: {:?}",
                    TelemetryError::TransportReceiveFailure,
                    Debug2Format(&e.kind())
                );
                return;
            }
        };
        if received.len == 0 {
            error!(
                "{} from {}",
                TelemetryError::TransportEmptyPayload,
                received.from
            );
            return;
        }

        let len = received.len.min(RX_LEN);
        let fields = match frame::decode(&self.buf[..len]) {
            Ok(fields) => fields,
            Err(e) => {
                warn!("{} from {}: {}", TelemetryError::from(e), received.from, e);
                return;
            }
        };
        self.stats.frames = self.stats.frames.wrapping_add(1);
        self.handle_frame(&fields, &received).await;
    }

    async fn handle_frame(&mut self, fields: &TelemetryFields, received: &Received) {
        let topology = self.ctx.topology();
        let parent = topology.parent();
        let heap = self.diagnostics.free_memory();

        warn!(
            "[#RX:id {} Temperature {} Humidity {}][L:{}] parent:{}, receive from {}, size:{}, heap:{}, flag:{}[err:0x0, proto:{}, tos:{}]",
            fields.node_id,
            fields.temperature,
            fields.humidity,
            fields.layer,
            parent,
            received.from,
            received.len,
            heap,
            received.flag,
            received.meta.proto.code(),
            received.meta.tos.code()
        );

        // Relay nodes only log; their own telemetry travels as frames
        if !topology.is_root() {
            return;
        }

        let record = UplinkRecord {
            fields: *fields,
            parent,
            address: received.from,
            size: received.len,
            heap,
            flag: received.flag,
            err: 0,
            proto: received.meta.proto.code(),
            tos: received.meta.tos.code(),
        };
        let json = match record.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("{} for frame from {}", e, received.from);
                return;
            }
        };

        match self.sink.post_json(&json).await {
            Ok(()) => {
                self.stats.forwarded = self.stats.forwarded.wrapping_add(1);
                debug!("Forwarded frame from node {}", fields.node_id);
            }
            Err(e) => {
                self.stats.sink_failures = self.stats.sink_failures.wrapping_add(1);
                error!(
                    "{}: {:?}",
                    TelemetryError::SinkPostFailure,
                    Debug2Format(&e.kind())
                );
            }
        }
    }
}
