//! JSON record the root node posts to the collector

use core::fmt::Write;

use heapless::String;
use mesh_node_hal::MeshAddress;

use crate::error::TelemetryError;
use crate::frame::TelemetryFields;

/// Capacity of the serialized record
pub const UPLINK_CAPACITY: usize = 320;

/// One received frame plus the receive diagnostics that go with it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UplinkRecord {
    pub fields: TelemetryFields,
    /// This node's parent at the time of receipt
    pub parent: MeshAddress,
    /// Sender of the frame
    pub address: MeshAddress,
    pub size: usize,
    pub heap: u32,
    pub flag: u32,
    /// Receive status code; zero for frames that made it this far
    pub err: u32,
    pub proto: u8,
    pub tos: u8,
}

impl UplinkRecord {
    /// Serialize as
    /// `{id, temperature, humidity, layer, parent, address, size, heap, flag, err, proto, tos}`
    pub fn to_json(&self) -> Result<String<UPLINK_CAPACITY>, TelemetryError> {
        let mut out = String::new();
        write!(
            out,
            "{{\"id\":{},\"temperature\":{},\"humidity\":{},\"layer\":{},\
             \"parent\":\"{}\",\"address\":\"{}\",\"size\":{},\"heap\":{},\
             \"flag\":{},\"err\":\"0x{:x}\",\"proto\":{},\"tos\":{}}}",
            self.fields.node_id,
            self.fields.temperature,
            self.fields.humidity,
            self.fields.layer,
            self.parent,
            self.address,
            self.size,
            self.heap,
            self.flag,
            self.err,
            self.proto,
            self.tos,
        )
        .map_err(|_| TelemetryError::UplinkOverflow)?;
        Ok(out)
    }
}
