pub mod crc;
pub mod ram_flash;

pub(crate) mod generator;
pub(crate) mod parser;

use base64::Engine;

pub use ram_flash::{
    RamFlash,
    ERASE_SIZE,
    WRITE_SIZE,
};

/// A single value stored under a numeric id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvsEntry {
    /// The id the value is stored under.
    pub id: u16,
    /// The payload.
    pub value: DataValue,
}

impl NvsEntry {
    pub fn new(id: u16, value: DataValue) -> Self {
        Self { id, value }
    }
}

/// A concrete data value stored in an NVS entry.
///
/// The image only carries bytes, integers are stored little endian and
/// strings without terminator, the same way `nor_nvs::Set` stores them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataValue {
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Signed 64-bit integer.
    I64(i64),
    /// UTF-8 string.
    String(String),
    /// Opaque byte blob.
    Binary(Vec<u8>),
}

impl DataValue {
    /// Return the CSV encoding column string for this value.
    ///
    /// `Binary` maps to `"base64"`, values parsed from an image have no
    /// original CSV encoding.
    pub fn encoding_str(&self) -> &'static str {
        match self {
            Self::U8(_) => "u8",
            Self::I8(_) => "i8",
            Self::U16(_) => "u16",
            Self::I16(_) => "i16",
            Self::U32(_) => "u32",
            Self::I32(_) => "i32",
            Self::U64(_) => "u64",
            Self::I64(_) => "i64",
            Self::String(_) => "string",
            Self::Binary(_) => "base64",
        }
    }

    /// The bytes that end up on the flash.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::U8(v) => v.to_le_bytes().to_vec(),
            Self::I8(v) => v.to_le_bytes().to_vec(),
            Self::U16(v) => v.to_le_bytes().to_vec(),
            Self::I16(v) => v.to_le_bytes().to_vec(),
            Self::U32(v) => v.to_le_bytes().to_vec(),
            Self::I32(v) => v.to_le_bytes().to_vec(),
            Self::U64(v) => v.to_le_bytes().to_vec(),
            Self::I64(v) => v.to_le_bytes().to_vec(),
            Self::String(s) => s.as_bytes().to_vec(),
            Self::Binary(b) => b.clone(),
        }
    }
}

impl std::fmt::Display for DataValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8(v) => write!(f, "{v}"),
            Self::I8(v) => write!(f, "{v}"),
            Self::U16(v) => write!(f, "{v}"),
            Self::I16(v) => write!(f, "{v}"),
            Self::U32(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::String(s) => f.write_str(s),
            Self::Binary(b) => f.write_str(&base64::engine::general_purpose::STANDARD.encode(b)),
        }
    }
}
