#![deny(unsafe_code)]
//! DHT11 on a Feather GPIO, plus the clock and diagnostics the core needs

use embassy_stm32::gpio::{Flex, Speed};
use embassy_time::{Delay, Instant};
use mesh_node_core::{Measurement, RawSensor, SensorError, SensorLink};
use mesh_node_hal::{MonotonicClock, SystemDiagnostics};

/// DHT11 data line in open-drain mode (external pull-up on the breakout)
pub struct Dht11 {
    link: SensorLink<Flex<'static>, Delay>,
}

impl Dht11 {
    pub fn new(mut pin: Flex<'static>) -> Self {
        pin.set_high();
        pin.set_as_input_output(Speed::Low);
        Self {
            link: SensorLink::new(pin, Delay),
        }
    }
}

impl RawSensor for Dht11 {
    fn measure(&mut self) -> Result<Measurement, SensorError> {
        self.link.send_start_signal()?;
        // Bit windows are tens of microseconds; keep interrupts out
        critical_section::with(|_| self.link.read_response())
    }
}

/// Microseconds since boot from the embassy time driver
pub struct UptimeClock;

impl MonotonicClock for UptimeClock {
    fn now_micros(&self) -> u64 {
        Instant::now().as_micros()
    }
}

/// Stack headroom, the closest thing to free heap on this target
pub struct StackHeadroom;

const RAM_START: u32 = 0x2000_0000;

impl SystemDiagnostics for StackHeadroom {
    fn free_memory(&self) -> u32 {
        cortex_m::register::msp::read().saturating_sub(RAM_START)
    }
}
