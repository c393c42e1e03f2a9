//! Telemetry frame codec
//!
//! Frames are transport-MTU sized buffers with four one-byte fields at fixed
//! offsets; every other byte is reserved and left as the caller set it.

use crate::error::FrameError;

pub const NODE_ID_OFFSET: usize = 22;
pub const TEMPERATURE_OFFSET: usize = 23;
pub const HUMIDITY_OFFSET: usize = 24;
pub const LAYER_OFFSET: usize = 25;

/// Shortest buffer that can carry all fields
pub const MIN_FRAME_LEN: usize = LAYER_OFFSET + 1;

/// The telemetry fields of one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TelemetryFields {
    pub node_id: u8,
    pub temperature: u8,
    pub humidity: u8,
    pub layer: u8,
}

impl TelemetryFields {
    /// Build fields from wider integers; out-of-range values wrap to a byte
    pub fn wrapping(node_id: u8, temperature: i32, humidity: i32, layer: i32) -> Self {
        Self {
            node_id,
            temperature: temperature as u8,
            humidity: humidity as u8,
            layer: layer as u8,
        }
    }
}

/// Write the fields into an already allocated frame
pub fn encode(buf: &mut [u8], fields: &TelemetryFields) -> Result<(), FrameError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort { len: buf.len() });
    }
    buf[NODE_ID_OFFSET] = fields.node_id;
    buf[TEMPERATURE_OFFSET] = fields.temperature;
    buf[HUMIDITY_OFFSET] = fields.humidity;
    buf[LAYER_OFFSET] = fields.layer;
    Ok(())
}

/// Read the fields back from a received frame
pub fn decode(buf: &[u8]) -> Result<TelemetryFields, FrameError> {
    if buf.len() < MIN_FRAME_LEN {
        return Err(FrameError::TooShort { len: buf.len() });
    }
    Ok(TelemetryFields {
        node_id: buf[NODE_ID_OFFSET],
        temperature: buf[TEMPERATURE_OFFSET],
        humidity: buf[HUMIDITY_OFFSET],
        layer: buf[LAYER_OFFSET],
    })
}
