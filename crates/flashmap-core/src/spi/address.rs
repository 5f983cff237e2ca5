//! Address width types

/// Address width for SPI commands
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressWidth {
    /// No address phase
    #[default]
    None,
    /// 3-byte (24-bit) address - supports up to 16 MiB
    ThreeByte,
    /// 4-byte (32-bit) address - supports up to 4 GiB
    FourByte,
}

impl AddressWidth {
    /// Smallest width that reaches every byte of a part of `density` bytes
    pub const fn for_density(density: u64) -> Self {
        if density > Self::ThreeByte.max_size() as u64 {
            Self::FourByte
        } else {
            Self::ThreeByte
        }
    }

    /// Returns the number of address bytes
    pub const fn bytes(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 3,
            Self::FourByte => 4,
        }
    }

    /// Returns the maximum addressable size in bytes
    pub const fn max_size(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::ThreeByte => 16 * 1024 * 1024,
            Self::FourByte => u32::MAX,
        }
    }

    /// Decode an address from the bytes that follow the opcode
    pub fn decode(&self, buf: &[u8]) -> u32 {
        match self {
            Self::None => 0,
            Self::ThreeByte => u32::from_be_bytes([0, buf[0], buf[1], buf[2]]),
            Self::FourByte => u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]),
        }
    }

    /// Encode an address into bytes
    pub fn encode(&self, address: u32, buf: &mut [u8]) {
        let be = address.to_be_bytes();
        match self {
            Self::None => {}
            Self::ThreeByte => buf[..3].copy_from_slice(&be[1..]),
            Self::FourByte => buf[..4].copy_from_slice(&be),
        }
    }
}
