use std::fmt;

/// Opaque identifier for a concrete decoder.
///
/// Keys are laid out like 7-Zip archive handler class IDs,
/// `{23170F69-40C1-278A-1000-000110xx0000}` where `xx` is the handler id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodecKey(u128);

const HANDLER_BASE: u128 = 0x23170F69_40C1_278A_1000_000110000000;

impl CodecKey {
    pub const fn from_handler_id(id: u8) -> Self {
        Self(HANDLER_BASE | ((id as u128) << 16))
    }

    pub const fn from_raw(raw: u128) -> Self {
        Self(raw)
    }

    pub const fn as_raw(self) -> u128 {
        self.0
    }
}

impl fmt::Display for CodecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        write!(
            f,
            "{{{:08X}-{:04X}-{:04X}-{:04X}-{:012X}}}",
            (v >> 96) as u32,
            (v >> 80) as u16,
            (v >> 64) as u16,
            (v >> 48) as u16,
            v & 0xFFFF_FFFF_FFFF
        )
    }
}
