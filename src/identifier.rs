// Device identity: a numeric block device number.

use std::fmt;

const MINOR_BITS: u32 = 20;
const MINOR_MASK: u32 = (1 << MINOR_BITS) - 1;

/// Identifies one physical disk. Two identifiers are equal iff their device numbers match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceIdentifier {
    device_number: u32,
}

impl DeviceIdentifier {
    pub const fn new(device_number: u32) -> Self {
        Self { device_number }
    }

    /// Kernel-style `major:minor` encoding (minor in the low 20 bits).
    pub const fn from_dev(major: u32, minor: u32) -> Self {
        Self::new((major << MINOR_BITS) | (minor & MINOR_MASK))
    }

    pub const fn device_number(&self) -> u32 {
        self.device_number
    }

    pub const fn major(&self) -> u32 {
        self.device_number >> MINOR_BITS
    }

    pub const fn minor(&self) -> u32 {
        self.device_number & MINOR_MASK
    }
}

impl fmt::Display for DeviceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "disk{}", self.device_number)
    }
}
