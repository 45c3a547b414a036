/// Modbus unit identifier, just a type-safe wrapper around `u8`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UnitId {
    /// underlying raw value
    pub value: u8,
}

impl UnitId {
    /// create a unit id from a raw value
    pub const fn new(value: u8) -> Self {
        Self { value }
    }

    /// addresses 248 to 255 are reserved by the Modbus RTU spec
    pub(crate) fn is_rtu_reserved(&self) -> bool {
        self.value >= 248
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04X}", self.value)
    }
}

/// Start register and count captured from an observed request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressRange {
    /// starting address of the range
    pub start: u16,
    /// count of registers in the range
    pub count: u16,
}

impl AddressRange {
    pub(crate) fn new(start: u16, count: u16) -> Self {
        Self { start, count }
    }
}

impl std::fmt::Display for AddressRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "start: {:#06X} qty: {}", self.start, self.count)
    }
}
