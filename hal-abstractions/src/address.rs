//! Six-byte mesh node address

use core::fmt;

/// Transport-level node address (station MAC on a Wi-Fi mesh).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MeshAddress(pub [u8; 6]);

impl MeshAddress {
    /// All-zero address, used before a parent is known
    pub const UNSPECIFIED: Self = Self([0; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Build an address from an IPv4 endpoint (4 address bytes + big-endian port)
    ///
    /// Lets IP-based transports report peers in the same shape as a mesh MAC.
    pub const fn from_ipv4(ip: [u8; 4], port: u16) -> Self {
        let p = port.to_be_bytes();
        Self([ip[0], ip[1], ip[2], ip[3], p[0], p[1]])
    }

    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }

    pub fn is_unspecified(&self) -> bool {
        self.0 == [0; 6]
    }
}

impl From<[u8; 6]> for MeshAddress {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl fmt::Display for MeshAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a[0], a[1], a[2], a[3], a[4], a[5]
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MeshAddress {
    fn format(&self, f: defmt::Formatter) {
        let a = &self.0;
        defmt::write!(
            f,
            "{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}:{=u8:02x}",
            a[0],
            a[1],
            a[2],
            a[3],
            a[4],
            a[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_colon_separated_hex() {
        let addr = MeshAddress::new([0x24, 0x0a, 0xc4, 0x00, 0x1b, 0xff]);
        assert_eq!(format!("{}", addr), "24:0a:c4:00:1b:ff");
    }

    #[test]
    fn test_from_ipv4_packs_port_big_endian() {
        let addr = MeshAddress::from_ipv4([192, 168, 43, 49], 3000);
        assert_eq!(addr.octets(), [192, 168, 43, 49, 0x0b, 0xb8]);
        assert!(!addr.is_unspecified());
        assert!(MeshAddress::UNSPECIFIED.is_unspecified());
    }
}
