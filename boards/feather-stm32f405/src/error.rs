#![deny(unsafe_code)]
//! Network adapter error types

use defmt::Format;

/// Failures of the UDP mesh transport and the HTTP sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum NetworkError {
    /// Socket bind/connect error
    SocketError,
    /// Datagram could not be sent
    SendFailed,
    /// Datagram could not be received
    ReceiveFailed,
    /// Request timeout
    Timeout,
    /// Request did not fit the header buffer
    RequestTooLarge,
    /// Response was not HTTP
    InvalidResponse,
    /// Collector answered with a non-2xx status
    HttpStatus(u16),
    /// Connection closed before the response arrived
    ConnectionClosed,
}

impl core::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SocketError => write!(f, "Socket error"),
            Self::SendFailed => write!(f, "Send failed"),
            Self::ReceiveFailed => write!(f, "Receive failed"),
            Self::Timeout => write!(f, "Request timeout"),
            Self::RequestTooLarge => write!(f, "Request too large"),
            Self::InvalidResponse => write!(f, "Invalid response"),
            Self::HttpStatus(code) => write!(f, "HTTP status {}", code),
            Self::ConnectionClosed => write!(f, "Connection closed"),
        }
    }
}

impl core::error::Error for NetworkError {}

impl embedded_io_async::Error for NetworkError {
    fn kind(&self) -> embedded_io_async::ErrorKind {
        match self {
            Self::SocketError | Self::ConnectionClosed => embedded_io_async::ErrorKind::BrokenPipe,
            Self::Timeout => embedded_io_async::ErrorKind::TimedOut,
            Self::InvalidResponse => embedded_io_async::ErrorKind::InvalidData,
            Self::RequestTooLarge => embedded_io_async::ErrorKind::OutOfMemory,
            _ => embedded_io_async::ErrorKind::Other,
        }
    }
}
