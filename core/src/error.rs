//! Error types for the telemetry core

use core::fmt;

/// Failure decoding one physical sensor reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// The line did not change level within the protocol window
    Timeout,
    /// Check byte does not match the sum of the data bytes
    ChecksumMismatch,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "Sensor timeout"),
            Self::ChecksumMismatch => write!(f, "Sensor checksum mismatch"),
        }
    }
}

impl core::error::Error for SensorError {}

/// Telemetry frame codec errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Buffer too short to hold the fixed field offsets
    TooShort { len: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { len } => write!(f, "Frame too short ({} bytes)", len),
        }
    }
}

impl core::error::Error for FrameError {}

/// Everything that can go wrong in the relay pipelines
///
/// None of these is fatal; pipelines log them and keep looping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TelemetryError {
    SensorTimeout,
    SensorChecksumMismatch,
    TransportSendFailure,
    TransportReceiveFailure,
    TransportEmptyPayload,
    SinkPostFailure,
    /// Received payload cannot hold the telemetry fields
    FrameTooShort,
    /// Uplink JSON did not fit its fixed buffer
    UplinkOverflow,
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorTimeout => write!(f, "Sensor timeout"),
            Self::SensorChecksumMismatch => write!(f, "Sensor checksum mismatch"),
            Self::TransportSendFailure => write!(f, "Transport send failed"),
            Self::TransportReceiveFailure => write!(f, "Transport receive failed"),
            Self::TransportEmptyPayload => write!(f, "Transport delivered empty payload"),
            Self::SinkPostFailure => write!(f, "Sink post failed"),
            Self::FrameTooShort => write!(f, "Frame too short"),
            Self::UplinkOverflow => write!(f, "Uplink record overflow"),
        }
    }
}

impl core::error::Error for TelemetryError {}

impl From<SensorError> for TelemetryError {
    fn from(e: SensorError) -> Self {
        match e {
            SensorError::Timeout => TelemetryError::SensorTimeout,
            SensorError::ChecksumMismatch => TelemetryError::SensorChecksumMismatch,
        }
    }
}

impl From<FrameError> for TelemetryError {
    fn from(e: FrameError) -> Self {
        match e {
            FrameError::TooShort { .. } => TelemetryError::FrameTooShort,
        }
    }
}
