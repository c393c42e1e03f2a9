#![deny(unsafe_code)]
//! Node identity derived from the STM32F405 96-bit unique device ID
//!
//! The UID is factory-programmed, stable across reboots and unique to each
//! chip, so it gives every node a distinct id and MAC without provisioning.

/// Get the device UID bytes
pub fn uid() -> &'static [u8; 12] {
    embassy_stm32::uid::uid()
}

/// One-byte node id: XOR fold of the UID
///
/// Zero is skipped so that an unset id byte is never mistaken for a node.
pub fn node_id() -> u8 {
    match uid().iter().fold(0u8, |acc, b| acc ^ b) {
        0 => 1,
        id => id,
    }
}

/// Locally administered unicast MAC carrying the low UID bytes
pub fn mac_address() -> [u8; 6] {
    let uid = uid();
    [0x02, 0x00, uid[8], uid[9], uid[10], uid[11]]
}
