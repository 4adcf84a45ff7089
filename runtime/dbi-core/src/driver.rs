//!
//! Driver Descriptor
//!
//! Each driver advertises a name and a set of capability bits the host
//! runtime uses to decide which operations it may route to the driver.
//!
//! Capability bits:
//! - LOB_SUPPORT: binary/large values bind and fetch natively
//! - TRANSACTION_MANAGEMENT: begin/commit/rollback are supported
//! - BIND_BY_VALUE: `%v` markers bind as engine parameters
//! - HAS_EXECRAW: execRaw is available
//! - CHARSET_SUPPORT: text is exchanged in a declared encoding
//! - HAS_NUMBER_SUPPORT: arbitrary-precision numbers are accepted
//!

pub const CAP_LOB_SUPPORT: u32 = 1 << 0;
pub const CAP_TRANSACTION_MANAGEMENT: u32 = 1 << 1;
pub const CAP_BIND_BY_VALUE: u32 = 1 << 2;
pub const CAP_HAS_EXECRAW: u32 = 1 << 3;
pub const CAP_CHARSET_SUPPORT: u32 = 1 << 4;
pub const CAP_HAS_NUMBER_SUPPORT: u32 = 1 << 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverInfo {
    pub name: &'static str,
    pub capabilities: u32,
}

impl DriverInfo {
    pub const fn new(name: &'static str, capabilities: u32) -> Self {
        Self { name, capabilities }
    }

    pub fn has(&self, capability: u32) -> bool {
        self.capabilities & capability == capability
    }
}
