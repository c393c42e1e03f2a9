//! Remote telemetry sink (HTTP collector on the gateway side)

use core::future::Future;

/// Upstream collector reachable from the root node
///
/// Fire-and-forget: callers log failures and never retry.
pub trait TelemetrySink {
    /// Sink failure
    type Error: embedded_io::Error;

    /// Post one JSON document to the collector
    fn post_json(&self, body: &str) -> impl Future<Output = Result<(), Self::Error>>;
}
