//! Rate-limited access to the sensor
//!
//! The DHT11 needs about two seconds between conversions. [`SampleSource`]
//! caches the last [`Reading`] and hands it out again until the minimum
//! interval has passed; the next call after that performs exactly one
//! physical read, whose outcome (success or failure) replaces the cache.

use mesh_node_hal::MonotonicClock;

use crate::error::SensorError;
use crate::sensor::{Measurement, RawSensor};

/// Temperature/humidity value carried by a failed reading
pub const SENTINEL: i16 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadingStatus {
    Ok,
    Timeout,
    ChecksumError,
}

/// Outcome of the last physical sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Reading {
    pub status: ReadingStatus,
    /// 0-255 on success, [`SENTINEL`] otherwise
    pub temperature: i16,
    /// 0-255 on success, [`SENTINEL`] otherwise
    pub humidity: i16,
    /// Clock value (us) when the sample was started
    pub sampled_at: u64,
}

impl Reading {
    pub fn from_result(result: Result<Measurement, SensorError>, sampled_at: u64) -> Self {
        match result {
            Ok(m) => Self {
                status: ReadingStatus::Ok,
                temperature: i16::from(m.temperature),
                humidity: i16::from(m.humidity),
                sampled_at,
            },
            Err(e) => Self {
                status: match e {
                    SensorError::Timeout => ReadingStatus::Timeout,
                    SensorError::ChecksumMismatch => ReadingStatus::ChecksumError,
                },
                temperature: SENTINEL,
                humidity: SENTINEL,
                sampled_at,
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ReadingStatus::Ok
    }

    /// The validated values, if this reading succeeded
    pub fn measurement(&self) -> Option<Measurement> {
        if !self.is_ok() {
            return None;
        }
        Some(Measurement {
            temperature: self.temperature as u8,
            humidity: self.humidity as u8,
        })
    }
}

/// Caching front of a [`RawSensor`]
pub struct SampleSource<S, C> {
    sensor: S,
    clock: C,
    min_interval_us: u64,
    cached: Option<Reading>,
}

impl<S, C> SampleSource<S, C>
where
    S: RawSensor,
    C: MonotonicClock,
{
    pub fn new(sensor: S, clock: C, min_interval_us: u64) -> Self {
        Self {
            sensor,
            clock,
            min_interval_us,
            cached: None,
        }
    }

    /// Current reading: cached if fresh, otherwise one new physical sample
    pub fn current(&mut self) -> Reading {
        let now = self.clock.now_micros();
        if let Some(reading) = self.cached {
            if now.saturating_sub(reading.sampled_at) < self.min_interval_us {
                return reading;
            }
        }

        let reading = Reading::from_result(self.sensor.measure(), now);
        match reading.status {
            ReadingStatus::Ok => debug!(
                "Sensor sample: {} C, {} %RH",
                reading.temperature, reading.humidity
            ),
            status => warn!("Sensor sample failed: {:?}", status),
        }
        self.cached = Some(reading);
        reading
    }

    /// Last reading without touching the sensor
    pub fn cached(&self) -> Option<Reading> {
        self.cached
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }
}
