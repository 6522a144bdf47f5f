/// The four read functions attempted against every device
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadOperation {
    /// function code 0x01
    ReadCoils,
    /// function code 0x02
    ReadDiscreteInputs,
    /// function code 0x04
    ReadInputRegisters,
    /// function code 0x03
    ReadHoldingRegisters,
}

impl ReadOperation {
    /// All operations in the order they are attempted and reported
    pub const ALL: [ReadOperation; 4] = [
        ReadOperation::ReadCoils,
        ReadOperation::ReadDiscreteInputs,
        ReadOperation::ReadInputRegisters,
        ReadOperation::ReadHoldingRegisters,
    ];

    /// Position of the operation within [`ReadOperation::ALL`]
    pub fn index(self) -> usize {
        match self {
            ReadOperation::ReadCoils => 0,
            ReadOperation::ReadDiscreteInputs => 1,
            ReadOperation::ReadInputRegisters => 2,
            ReadOperation::ReadHoldingRegisters => 3,
        }
    }

    /// Name of the operation
    pub fn name(self) -> &'static str {
        match self {
            ReadOperation::ReadCoils => "ReadCoils",
            ReadOperation::ReadDiscreteInputs => "ReadDiscreteInputs",
            ReadOperation::ReadInputRegisters => "ReadInputRegisters",
            ReadOperation::ReadHoldingRegisters => "ReadHoldingRegisters",
        }
    }

    /// Conventional reference prefix of the data class (0x, 1x, 3x, 4x)
    pub fn reference(self) -> &'static str {
        match self {
            ReadOperation::ReadCoils => "0x",
            ReadOperation::ReadDiscreteInputs => "1x",
            ReadOperation::ReadInputRegisters => "3x",
            ReadOperation::ReadHoldingRegisters => "4x",
        }
    }
}

impl std::fmt::Display for ReadOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Start address and quantity read from every data class
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterWindow {
    /// Starting address
    pub address: u16,
    /// Count of coils or registers, at least 1
    pub quantity: u16,
}

impl RegisterWindow {
    /// Create a window from its fields
    pub fn new(address: u16, quantity: u16) -> Self {
        Self { address, quantity }
    }
}

impl std::fmt::Display for RegisterWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "start: {:#06X} qty: {}", self.address, self.quantity)
    }
}

/// Inclusive range of device (unit) ids, `lo <= hi` once validated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceIdRange {
    /// First device id probed
    pub lo: u8,
    /// Last device id probed
    pub hi: u8,
}

impl DeviceIdRange {
    /// Number of device ids in the range
    pub fn len(&self) -> usize {
        if self.hi < self.lo {
            0
        } else {
            (self.hi - self.lo) as usize + 1
        }
    }

    /// True if the range contains no ids
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate the ids in ascending order
    pub fn iter(&self) -> std::ops::RangeInclusive<u8> {
        self.lo..=self.hi
    }
}
