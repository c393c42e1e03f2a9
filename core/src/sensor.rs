//! Single-wire temperature/humidity sensor decoder (DHT11 timing)
//!
//! The host pulls the line low for 20 ms to request a reading. The sensor
//! answers with an 80 us low / 80 us high handshake followed by 40 data
//! bits, each a ~50 us low preamble and a high pulse whose length encodes
//! the value (~26 us for 0, ~70 us for 1). Bits arrive MSB first as five
//! bytes: humidity, humidity fraction, temperature, temperature fraction,
//! check byte.
//!
//! Decoding busy-polls the line once per microsecond. It is synchronous on
//! purpose and must not be interrupted for tens of microseconds; boards run
//! [`SensorLink::read_response`] in a critical section.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

use crate::error::SensorError;

/// Start signal low time
pub const START_LOW_US: u32 = 20_000;
/// Wait after releasing the line before listening
pub const START_RELEASE_US: u32 = 40;
/// Bound on each half of the response handshake
pub const RESPONSE_PHASE_US: u32 = 80;
/// Bound on the low preamble before every bit
pub const BIT_PREAMBLE_US: u32 = 50;
/// Bound on the high pulse that carries a bit
pub const BIT_PULSE_US: u32 = 70;
/// High pulses longer than this decode as 1
pub const ONE_THRESHOLD_US: u32 = 28;
/// Data bits per reading, check byte included
pub const DATA_BITS: usize = 40;

/// One validated sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Measurement {
    /// Degrees Celsius, integral part
    pub temperature: u8,
    /// Relative humidity percent, integral part
    pub humidity: u8,
}

impl Measurement {
    /// Validate the check byte and pick the integral fields
    pub fn from_bytes(bytes: &[u8; 5]) -> Result<Self, SensorError> {
        if !checksum_matches(bytes) {
            return Err(SensorError::ChecksumMismatch);
        }
        Ok(Self {
            temperature: bytes[2],
            humidity: bytes[0],
        })
    }
}

/// Check byte must equal the sum of the four data bytes modulo 256
pub fn checksum_matches(bytes: &[u8; 5]) -> bool {
    let sum = bytes[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    sum == bytes[4]
}

/// Decode one bit from its measured high-pulse length
pub fn decode_bit(high_us: u32) -> bool {
    high_us > ONE_THRESHOLD_US
}

fn set_bit(bytes: &mut [u8; 5], index: usize) {
    bytes[index / 8] |= 1 << (7 - index % 8);
}

/// Anything that can produce one physical reading on demand
pub trait RawSensor {
    fn measure(&mut self) -> Result<Measurement, SensorError>;
}

/// Bit-banged driver for one sensor line
///
/// `P` must behave as an open-drain pin with an external pull-up: driving it
/// high releases the line, after which it reads back whatever the sensor
/// drives. Pin errors are reported as [`SensorError::Timeout`], since the
/// expected level was never observed.
pub struct SensorLink<P, D> {
    pin: P,
    delay: D,
}

impl<P, D> SensorLink<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    pub fn new(pin: P, delay: D) -> Self {
        Self { pin, delay }
    }

    /// Give back the pin and delay
    pub fn release(self) -> (P, D) {
        (self.pin, self.delay)
    }

    /// Request a reading: 20 ms low, release, 40 us settle, then listen
    pub fn send_start_signal(&mut self) -> Result<(), SensorError> {
        self.pin.set_low().map_err(|_| SensorError::Timeout)?;
        self.delay.delay_us(START_LOW_US);
        self.pin.set_high().map_err(|_| SensorError::Timeout)?;
        self.delay.delay_us(START_RELEASE_US);
        Ok(())
    }

    fn level(&mut self) -> Result<PinState, SensorError> {
        match self.pin.is_high() {
            Ok(true) => Ok(PinState::High),
            Ok(false) => Ok(PinState::Low),
            Err(_) => Err(SensorError::Timeout),
        }
    }

    /// Poll once per microsecond while the line holds `level`
    ///
    /// Returns how many microseconds the level was held, or
    /// [`SensorError::Timeout`] once the count exceeds `timeout_us` with the
    /// level still held.
    pub fn await_level(&mut self, timeout_us: u32, level: PinState) -> Result<u32, SensorError> {
        let want_high = matches!(level, PinState::High);
        let mut elapsed = 0;
        while matches!(self.level()?, PinState::High) == want_high {
            if elapsed > timeout_us {
                return Err(SensorError::Timeout);
            }
            elapsed += 1;
            self.delay.delay_us(1);
        }
        Ok(elapsed)
    }

    /// Sensor acknowledges with ~80 us low then ~80 us high
    pub fn check_response(&mut self) -> Result<(), SensorError> {
        self.await_level(RESPONSE_PHASE_US, PinState::Low)?;
        self.await_level(RESPONSE_PHASE_US, PinState::High)?;
        Ok(())
    }

    /// Clock in the 40 data bits, MSB first
    ///
    /// A preamble that never ends aborts the read. A pulse that overruns its
    /// window decodes as 0.
    pub fn read_bits(&mut self) -> Result<[u8; 5], SensorError> {
        let mut bytes = [0u8; 5];
        for index in 0..DATA_BITS {
            self.await_level(BIT_PREAMBLE_US, PinState::Low)?;
            if let Ok(high_us) = self.await_level(BIT_PULSE_US, PinState::High) {
                if decode_bit(high_us) {
                    set_bit(&mut bytes, index);
                }
            }
        }
        Ok(bytes)
    }

    /// Everything after the start signal: handshake, bits, checksum
    ///
    /// This is the timing-critical part.
    pub fn read_response(&mut self) -> Result<Measurement, SensorError> {
        self.check_response()?;
        let bytes = self.read_bits()?;
        Measurement::from_bytes(&bytes)
    }
}

impl<P, D> RawSensor for SensorLink<P, D>
where
    P: InputPin + OutputPin,
    D: DelayNs,
{
    fn measure(&mut self) -> Result<Measurement, SensorError> {
        self.send_start_signal()?;
        self.read_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{dht_trace, sim_sensor, SimTime, BIT_ONE_US, BIT_ZERO_US};

    const SCENARIO_BYTES: [u8; 5] = [0x23, 0x00, 0x1B, 0x00, 0x3E];

    #[test]
    fn test_checksum_law() {
        assert!(checksum_matches(&[0x23, 0x00, 0x1B, 0x00, 0x3E]));
        assert!(!checksum_matches(&[0x23, 0x00, 0x1B, 0x00, 0x00]));
        // Sum wraps modulo 256
        assert!(checksum_matches(&[0xFF, 0x02, 0x00, 0x00, 0x01]));
        assert!(!checksum_matches(&[0xFF, 0x02, 0x00, 0x00, 0xFF]));

        for a in (0..=255u8).step_by(17) {
            for c in (0..=255u8).step_by(13) {
                let expected = a.wrapping_add(c).wrapping_add(7).wrapping_add(200);
                assert!(checksum_matches(&[a, c, 7, 200, expected]));
                assert!(!checksum_matches(&[a, c, 7, 200, expected.wrapping_add(1)]));
            }
        }
    }

    #[test]
    fn test_decode_bit_threshold() {
        for high_us in 0..=70 {
            assert_eq!(decode_bit(high_us), high_us > ONE_THRESHOLD_US, "{} us", high_us);
        }
    }

    #[test]
    fn test_await_level_returns_exact_elapsed() {
        for held in [0u32, 1, 17, 49, 50, 51] {
            let time = SimTime::new();
            let mut link = sim_sensor(&time, &[(false, held), (true, 1000)]);
            link.send_start_signal().unwrap();
            assert_eq!(link.await_level(50, PinState::Low), Ok(held));
        }
    }

    #[test]
    fn test_await_level_times_out_when_level_is_held() {
        let time = SimTime::new();
        let mut link = sim_sensor(&time, &[(true, 72), (false, 100)]);
        link.send_start_signal().unwrap();
        assert_eq!(
            link.await_level(70, PinState::High),
            Err(SensorError::Timeout)
        );
    }

    #[test]
    fn test_handshake_window_tolerates_one_extra_microsecond() {
        for held in [RESPONSE_PHASE_US, RESPONSE_PHASE_US + 1] {
            let time = SimTime::new();
            let mut link = sim_sensor(&time, &[(false, held), (true, 1000)]);
            link.send_start_signal().unwrap();
            assert_eq!(link.await_level(RESPONSE_PHASE_US, PinState::Low), Ok(held));
        }

        let time = SimTime::new();
        let mut link = sim_sensor(&time, &[(false, RESPONSE_PHASE_US + 2), (true, 1000)]);
        link.send_start_signal().unwrap();
        assert_eq!(
            link.await_level(RESPONSE_PHASE_US, PinState::Low),
            Err(SensorError::Timeout)
        );
    }

    #[test]
    fn test_full_length_handshake_reads() {
        let mut trace = dht_trace(SCENARIO_BYTES);
        trace[0] = (false, 81);
        trace[1] = (true, 81);
        let time = SimTime::new();
        let mut link = sim_sensor(&time, &trace);
        assert_eq!(
            link.measure(),
            Ok(Measurement {
                temperature: 27,
                humidity: 35,
            })
        );
    }

    #[test]
    fn test_scenario_success() {
        let time = SimTime::new();
        let mut link = sim_sensor(&time, &dht_trace(SCENARIO_BYTES));
        let reading = link.measure().unwrap();
        assert_eq!(reading.temperature, 27);
        assert_eq!(reading.humidity, 35);
    }

    #[test]
    fn test_scenario_checksum_failure() {
        let time = SimTime::new();
        let mut bytes = SCENARIO_BYTES;
        bytes[4] = 0x00;
        let mut link = sim_sensor(&time, &dht_trace(bytes));
        assert_eq!(link.measure(), Err(SensorError::ChecksumMismatch));
    }

    #[test]
    fn test_scenario_handshake_timeout_line_stuck_low() {
        let time = SimTime::new();
        let mut link = sim_sensor(&time, &[(false, 10_000)]);
        link.send_start_signal().unwrap();
        let listening_at = time.now();
        assert_eq!(link.read_response(), Err(SensorError::Timeout));
        // Gave up right after the first handshake window, no bit was read
        assert!(time.now() - listening_at <= u64::from(RESPONSE_PHASE_US) + 1);
    }

    #[test]
    fn test_scenario_handshake_timeout_no_sensor() {
        // Nothing pulls the line down: it idles high through the ack window
        let time = SimTime::new();
        let mut link = sim_sensor(&time, &[]);
        link.send_start_signal().unwrap();
        let listening_at = time.now();
        assert_eq!(link.read_response(), Err(SensorError::Timeout));
        assert!(time.now() - listening_at <= u64::from(RESPONSE_PHASE_US) + 1);
    }

    #[test]
    fn test_start_signal_timing() {
        let time = SimTime::new();
        let mut link = sim_sensor(&time, &[]);
        link.send_start_signal().unwrap();
        assert_eq!(time.now(), u64::from(START_LOW_US + START_RELEASE_US));
    }

    #[test]
    fn test_bits_decode_independently() {
        let patterns: [[u8; 5]; 4] = [
            [0x00, 0x00, 0x00, 0x00, 0x00],
            [0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
            [0xAA, 0x55, 0xAA, 0x55, 0xA5],
            [0x01, 0x80, 0x7E, 0x81, 0x3C],
        ];
        for bytes in patterns {
            let time = SimTime::new();
            let mut link = sim_sensor(&time, &dht_trace(bytes));
            link.send_start_signal().unwrap();
            link.check_response().unwrap();
            assert_eq!(link.read_bits(), Ok(bytes));
        }
    }

    #[test]
    fn test_bit_boundary_durations() {
        // 28 us is still a zero, 29 us is a one
        let mut trace = vec![(false, 78), (true, 78)];
        for index in 0..DATA_BITS {
            trace.push((false, 48));
            trace.push((true, if index % 2 == 0 { 29 } else { 28 }));
        }
        trace.push((false, 48));

        let time = SimTime::new();
        let mut link = sim_sensor(&time, &trace);
        link.send_start_signal().unwrap();
        link.check_response().unwrap();
        assert_eq!(link.read_bits(), Ok([0xAA; 5]));
    }

    #[test]
    fn test_overlong_pulse_decodes_as_zero() {
        let mut trace = vec![(false, 78), (true, 78)];
        for index in 0..DATA_BITS {
            trace.push((false, 48));
            trace.push((true, if index == DATA_BITS - 1 { 90 } else { BIT_ONE_US }));
        }
        trace.push((false, 48));

        let time = SimTime::new();
        let mut link = sim_sensor(&time, &trace);
        link.send_start_signal().unwrap();
        link.check_response().unwrap();
        assert_eq!(link.read_bits(), Ok([0xFF, 0xFF, 0xFF, 0xFF, 0xFE]));
    }

    #[test]
    fn test_preamble_timeout_aborts_read() {
        let mut trace = vec![(false, 78), (true, 78)];
        for _ in 0..8 {
            trace.push((false, 48));
            trace.push((true, BIT_ZERO_US));
        }
        trace.push((false, 500));

        let time = SimTime::new();
        let mut link = sim_sensor(&time, &trace);
        assert_eq!(link.measure(), Err(SensorError::Timeout));
    }
}
