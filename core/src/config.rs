//! Node configuration

/// Transmit frame size: the transport's maximum transmission unit
pub const FRAME_LEN: usize = 1460;

/// Receive buffer size (largest payload the transport can deliver)
pub const RX_LEN: usize = 1500;

/// Telemetry node configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NodeConfig {
    /// Identifier embedded in every frame this node originates
    pub node_id: u8,
    /// Minimum time between two physical sensor reads (DHT11 needs ~2 s)
    pub min_sample_interval_us: u64,
    /// Emit the decimated transmit summary every N iterations (0 disables it)
    pub log_every: u32,
    /// Routing tables smaller than this get `pacing_delay_ms` between sends
    pub pacing_threshold: usize,
    /// Sleep applied per transmit iteration on small meshes
    pub pacing_delay_ms: u32,
    /// Upper bound on one receive wait, so a stop request is noticed
    pub receive_poll_ms: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: 1,
            min_sample_interval_us: 2_000_000,
            log_every: 10,
            pacing_threshold: 10,
            pacing_delay_ms: 1000,
            receive_poll_ms: 1000,
        }
    }
}

impl NodeConfig {
    /// True when iteration `count` falls on the decimated logging cadence
    ///
    /// Iteration zero never logs.
    pub fn log_due(&self, count: u32) -> bool {
        count != 0 && self.log_every != 0 && count % self.log_every == 0
    }
}
