//! Periodic sample-encode-send loop

use embedded_hal_async::delay::DelayNs;
use embedded_io::Error as _;
use mesh_node_hal::{FrameMeta, MeshTransport, MonotonicClock, SystemDiagnostics};

use crate::config::{NodeConfig, FRAME_LEN};
use crate::context::NodeContext;
use crate::error::TelemetryError;
use crate::fmt::Debug2Format;
use crate::frame::{self, TelemetryFields};
use crate::sample::SampleSource;
use crate::sensor::RawSensor;

/// Counters kept by the transmit loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransmitStats {
    pub iterations: u32,
    pub sent: u32,
    pub dropped: u32,
}

/// Samples the sensor and sends one telemetry frame per iteration
///
/// Failed sends are logged and dropped. On small meshes (routing table
/// below `pacing_threshold`) each iteration ends with `pacing_delay_ms` of
/// sleep so the loop does not monopolize the scheduler.
pub struct TransmitPipeline<'a, T, S, C, D, G> {
    ctx: &'a NodeContext,
    transport: &'a T,
    source: SampleSource<S, C>,
    delay: D,
    diagnostics: &'a G,
    config: NodeConfig,
    frame: [u8; FRAME_LEN],
    temperature: i16,
    humidity: i16,
    stats: TransmitStats,
}

impl<'a, T, S, C, D, G> TransmitPipeline<'a, T, S, C, D, G>
where
    T: MeshTransport,
    S: RawSensor,
    C: MonotonicClock,
    D: DelayNs,
    G: SystemDiagnostics,
{
    pub fn new(
        ctx: &'a NodeContext,
        transport: &'a T,
        source: SampleSource<S, C>,
        delay: D,
        diagnostics: &'a G,
        config: NodeConfig,
    ) -> Self {
        Self {
            ctx,
            transport,
            source,
            delay,
            diagnostics,
            config,
            frame: [0; FRAME_LEN],
            temperature: 0,
            humidity: 0,
            stats: TransmitStats::default(),
        }
    }

    pub fn stats(&self) -> TransmitStats {
        self.stats
    }

    /// Loop until the context's running flag is cleared
    ///
    /// The flag is checked between iterations, never mid-iteration.
    pub async fn run(&mut self) -> TransmitStats {
        info!("Transmit pipeline started (node {})", self.config.node_id);
        while self.ctx.is_running() {
            self.step().await;
        }
        info!(
            "Transmit pipeline stopped after {} iterations",
            self.stats.iterations
        );
        self.stats
    }

    /// One iteration: sample, encode, send, pace
    pub async fn step(&mut self) {
        let topology = self.ctx.topology();
        let route_table_size = self.transport.routing_table_size();

        if self.config.log_due(self.stats.iterations) {
            info!(
                "size:{}, send_value:{}, send_count:{}",
                route_table_size, self.temperature, self.stats.iterations
            );
        }
        self.stats.iterations = self.stats.iterations.wrapping_add(1);

        // Only a successful reading replaces the values being reported;
        // sentinels from a failed sample are never put on the wire.
        let reading = self.source.current();
        if reading.is_ok() {
            debug!(
                "Temperature is {}, Humidity is {}",
                reading.temperature, reading.humidity
            );
            self.temperature = reading.temperature;
            self.humidity = reading.humidity;
        } else {
            warn!("Sensor error status {:?}", reading.status);
        }

        let layer = topology.layer();
        let fields = TelemetryFields::wrapping(
            self.config.node_id,
            i32::from(self.temperature),
            i32::from(self.humidity),
            layer,
        );
        if let Err(e) = frame::encode(&mut self.frame, &fields) {
            error!("{}: {}", TelemetryError::from(e), self.stats.iterations);
            return;
        }

        let meta = FrameMeta::TELEMETRY;
        match self.transport.send(&self.frame, meta).await {
            Err(e) => {
                self.stats.dropped = self.stats.dropped.wrapping_add(1);
                error!(
                    "{} [TX:{}][L:{}] parent:{}, heap:{} [err:{:?}, proto:{}, tos:{}]",
                    TelemetryError::TransportSendFailure,
                    self.stats.iterations,
                    layer,
                    topology.parent(),
                    self.diagnostics.free_memory(),
                    Debug2Format(&e.kind()),
                    meta.proto.code(),
                    meta.tos.code()
                );
            }
            Ok(()) => {
                self.stats.sent = self.stats.sent.wrapping_add(1);
                if self.config.log_due(self.stats.iterations) {
                    warn!(
                        "[TX:{} (count {})][L:{}][rtableSize:{}] parent:{}, heap:{} [proto:{}, tos:{}]",
                        self.temperature,
                        self.stats.iterations,
                        layer,
                        self.transport.routing_table_size(),
                        topology.parent(),
                        self.diagnostics.free_memory(),
                        meta.proto.code(),
                        meta.tos.code()
                    );
                }
            }
        }

        if route_table_size < self.config.pacing_threshold {
            self.delay.delay_ms(self.config.pacing_delay_ms).await;
        }
    }
}
