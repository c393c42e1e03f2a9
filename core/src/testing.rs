//! Host-side test doubles: simulated sensor line, scripted collaborators

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use core::fmt;
use std::collections::VecDeque;
use std::rc::Rc;

use mesh_node_hal::{
    FrameMeta, MeshAddress, MeshTransport, MonotonicClock, Received, SystemDiagnostics,
    TelemetrySink,
};

use crate::config::FRAME_LEN;
use crate::context::NodeContext;
use crate::error::SensorError;
use crate::frame::{self, TelemetryFields};
use crate::sensor::{Measurement, RawSensor, SensorLink, START_RELEASE_US};

/// High pulse the simulated sensor uses for a 1 bit
pub const BIT_ONE_US: u32 = 68;
/// High pulse the simulated sensor uses for a 0 bit
pub const BIT_ZERO_US: u32 = 26;

/// Shared microsecond timeline, advanced only by [`SimDelay`]
#[derive(Clone, Default)]
pub struct SimTime(Rc<Cell<u64>>);

impl SimTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.0.get()
    }

    fn advance(&self, us: u64) {
        self.0.set(self.0.get() + us);
    }
}

/// Blocking delay that moves simulated time instead of sleeping
pub struct SimDelay(SimTime);

impl embedded_hal::delay::DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.advance(u64::from(ns).div_ceil(1000));
    }

    fn delay_us(&mut self, us: u32) {
        self.0.advance(u64::from(us));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.advance(u64::from(ms) * 1000);
    }
}

/// Open-drain line with a sensor replaying a level trace
///
/// The trace starts when the host finishes its start signal (release plus
/// settle time). Outside the trace the pull-up holds the line high.
pub struct SimLine {
    time: SimTime,
    trace: Vec<(bool, u32)>,
    driven_low: bool,
    listening_at: Option<u64>,
}

impl SimLine {
    fn level_at(&self, now: u64) -> bool {
        if self.driven_low {
            return false;
        }
        let Some(start) = self.listening_at else {
            return true;
        };
        if now < start {
            return true;
        }
        let mut offset = now - start;
        for &(high, duration) in &self.trace {
            let duration = u64::from(duration);
            if offset < duration {
                return high;
            }
            offset -= duration;
        }
        true
    }
}

impl embedded_hal::digital::ErrorType for SimLine {
    type Error = Infallible;
}

impl embedded_hal::digital::InputPin for SimLine {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level_at(self.time.now()))
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level_at(self.time.now()))
    }
}

impl embedded_hal::digital::OutputPin for SimLine {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.driven_low = true;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.driven_low = false;
        self.listening_at = Some(self.time.now() + u64::from(START_RELEASE_US));
        Ok(())
    }
}

/// Sensor driver wired to a simulated line replaying `trace`
pub fn sim_sensor(time: &SimTime, trace: &[(bool, u32)]) -> SensorLink<SimLine, SimDelay> {
    let line = SimLine {
        time: time.clone(),
        trace: trace.to_vec(),
        driven_low: false,
        listening_at: None,
    };
    SensorLink::new(line, SimDelay(time.clone()))
}

/// Level trace a healthy sensor produces when sending `bytes`
pub fn dht_trace(bytes: [u8; 5]) -> Vec<(bool, u32)> {
    let mut trace = vec![(false, 78), (true, 78)];
    for index in 0..40 {
        let bit = bytes[index / 8] & (1 << (7 - index % 8)) != 0;
        trace.push((false, 48));
        trace.push((true, if bit { BIT_ONE_US } else { BIT_ZERO_US }));
    }
    trace.push((false, 48));
    trace
}

/// Clock the test sets by hand
pub struct ManualClock(Cell<u64>);

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self(Cell::new(now))
    }

    pub fn set(&self, now: u64) {
        self.0.set(now);
    }
}

impl MonotonicClock for ManualClock {
    fn now_micros(&self) -> u64 {
        self.0.get()
    }
}

/// Sensor returning scripted results; the last one repeats
pub struct ScriptedSensor {
    script: Vec<Result<Measurement, SensorError>>,
    calls: usize,
}

impl ScriptedSensor {
    pub fn new(script: &[Result<Measurement, SensorError>]) -> Self {
        Self {
            script: script.to_vec(),
            calls: 0,
        }
    }

    pub fn repeating(result: Result<Measurement, SensorError>) -> Self {
        Self::new(&[result])
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl RawSensor for ScriptedSensor {
    fn measure(&mut self) -> Result<Measurement, SensorError> {
        let index = self.calls.min(self.script.len() - 1);
        self.calls += 1;
        self.script[index]
    }
}

/// Collaborator failure used by the mocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock failure")
    }
}

impl core::error::Error for MockError {}

impl embedded_io::Error for MockError {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

/// One scripted outcome of `MeshTransport::receive`
pub enum RxStep {
    Frame {
        payload: Vec<u8>,
        from: MeshAddress,
        flag: u32,
    },
    /// Successful receive with a zero-length payload
    Empty,
    /// Payload too short to carry the telemetry fields
    Short,
    Error,
    /// Never completes
    Hang,
}

/// Frame-sized payload carrying `fields`
pub fn telemetry_frame(fields: TelemetryFields) -> Vec<u8> {
    let mut payload = vec![0u8; FRAME_LEN];
    frame::encode(&mut payload, &fields).unwrap();
    payload
}

/// Transport that records sends and replays a receive script
///
/// Clears the context's running flag once the send quota or the receive
/// script is used up, so pipeline loops end on their own.
pub struct MockTransport<'a> {
    ctx: &'a NodeContext,
    routing_table: usize,
    stop_after_sends: Option<usize>,
    send_failures: RefCell<VecDeque<bool>>,
    sent: RefCell<Vec<(Vec<u8>, FrameMeta)>>,
    script: RefCell<VecDeque<RxStep>>,
    receive_calls: Cell<usize>,
}

impl<'a> MockTransport<'a> {
    pub fn new(ctx: &'a NodeContext) -> Self {
        Self {
            ctx,
            routing_table: 1,
            stop_after_sends: None,
            send_failures: RefCell::new(VecDeque::new()),
            sent: RefCell::new(Vec::new()),
            script: RefCell::new(VecDeque::new()),
            receive_calls: Cell::new(0),
        }
    }

    pub fn routing_table(mut self, size: usize) -> Self {
        self.routing_table = size;
        self
    }

    pub fn stop_after_sends(mut self, sends: usize) -> Self {
        self.stop_after_sends = Some(sends);
        self
    }

    /// `true` entries make the matching send fail
    pub fn fail_sends(self, failures: &[bool]) -> Self {
        self.send_failures.borrow_mut().extend(failures.iter().copied());
        self
    }

    pub fn receive_script(self, steps: Vec<RxStep>) -> Self {
        self.script.borrow_mut().extend(steps);
        self
    }

    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.sent.borrow().iter().map(|(f, _)| f.clone()).collect()
    }

    pub fn sent_meta(&self) -> Vec<FrameMeta> {
        self.sent.borrow().iter().map(|(_, m)| *m).collect()
    }

    pub fn receive_calls(&self) -> usize {
        self.receive_calls.get()
    }
}

impl MeshTransport for MockTransport<'_> {
    type Error = MockError;

    async fn send(&self, frame: &[u8], meta: FrameMeta) -> Result<(), MockError> {
        self.sent.borrow_mut().push((frame.to_vec(), meta));
        if let Some(limit) = self.stop_after_sends {
            if self.sent.borrow().len() >= limit {
                self.ctx.stop();
            }
        }
        match self.send_failures.borrow_mut().pop_front() {
            Some(true) => Err(MockError),
            _ => Ok(()),
        }
    }

    async fn receive(&self, buf: &mut [u8]) -> Result<Received, MockError> {
        self.receive_calls.set(self.receive_calls.get() + 1);
        let step = self.script.borrow_mut().pop_front();
        if self.script.borrow().is_empty() {
            self.ctx.stop();
        }
        let received = |len: usize, from: MeshAddress, flag: u32| Received {
            len,
            from,
            flag,
            meta: FrameMeta::TELEMETRY,
        };
        match step {
            Some(RxStep::Frame {
                payload,
                from,
                flag,
            }) => {
                let len = payload.len().min(buf.len());
                buf[..len].copy_from_slice(&payload[..len]);
                Ok(received(len, from, flag))
            }
            Some(RxStep::Empty) => Ok(received(0, MeshAddress::UNSPECIFIED, 0)),
            Some(RxStep::Short) => {
                buf[..10].fill(0xEE);
                Ok(received(10, MeshAddress::UNSPECIFIED, 0))
            }
            Some(RxStep::Error) => Err(MockError),
            Some(RxStep::Hang) | None => core::future::pending().await,
        }
    }

    fn routing_table_size(&self) -> usize {
        self.routing_table
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

/// Sink that records every body it is given
pub struct RecordingSink {
    posts: RefCell<Vec<String>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            posts: RefCell::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn posts(&self) -> Vec<String> {
        self.posts.borrow().clone()
    }
}

impl TelemetrySink for RecordingSink {
    type Error = MockError;

    async fn post_json(&self, body: &str) -> Result<(), MockError> {
        self.posts.borrow_mut().push(body.into());
        if self.fail {
            Err(MockError)
        } else {
            Ok(())
        }
    }
}

/// Async delay that completes immediately and records requested sleeps
pub struct RecordingDelay {
    log: Rc<RefCell<Vec<u32>>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Handle to the milliseconds requested so far
    pub fn log(&self) -> Rc<RefCell<Vec<u32>>> {
        self.log.clone()
    }
}

impl embedded_hal_async::delay::DelayNs for RecordingDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.log.borrow_mut().push(ns / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(ms);
    }
}

pub struct FixedDiagnostics(pub u32);

impl SystemDiagnostics for FixedDiagnostics {
    fn free_memory(&self) -> u32 {
        self.0
    }
}
