//! Platform services: monotonic time and memory diagnostics

/// Free-running microsecond clock
///
/// Must never go backwards. Used to rate-limit sensor sampling.
pub trait MonotonicClock {
    /// Microseconds since an arbitrary, fixed origin (usually boot)
    fn now_micros(&self) -> u64;
}

impl<T: MonotonicClock + ?Sized> MonotonicClock for &T {
    fn now_micros(&self) -> u64 {
        (**self).now_micros()
    }
}

/// Diagnostic context attached to error and traffic logs
pub trait SystemDiagnostics {
    /// Bytes of free memory (heap, or stack headroom on heapless targets)
    fn free_memory(&self) -> u32;
}
