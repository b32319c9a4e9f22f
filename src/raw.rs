use crate::platform::FnCrc8;
use core::fmt::{Debug, Formatter};

/// On-flash size of an allocation table entry before alignment to the write block size.
pub(crate) const ATE_SIZE: usize = 8;

/// Size of every scratch buffer used for bulk compare/copy. Also the largest write block size
/// the filesystem supports, as a padded block has to fit into it.
pub(crate) const BLOCK_SIZE: usize = 32;

/// Id of the entry that closes a sector. Close entries always have a length of zero.
pub(crate) const CLOSE_ATE_ID: u16 = 0xFFFF;

/// The CRC covers every byte in front of it.
const ATE_CRC_OFFSET: usize = 7;

const ERASED: u8 = 0xFF;

/// Allocation table entry: describes where the data of one write lives in its sector.
///
/// Layout (little endian): `id: u16 | offset: u16 | len: u16 | part: u8 | crc8: u8`
#[derive(Copy, Clone, PartialEq, Eq)]
pub(crate) struct Ate {
    pub(crate) id: u16,
    pub(crate) offset: u16,
    pub(crate) len: u16,
    /// Reserved, always written as 0xFF.
    pub(crate) part: u8,
    pub(crate) crc8: u8,
}

impl Ate {
    pub(crate) fn new(crc8: FnCrc8, id: u16, offset: u16, len: u16) -> Self {
        let mut ate = Self {
            id,
            offset,
            len,
            part: ERASED,
            crc8: 0,
        };
        ate.update_crc8(crc8);
        ate
    }

    /// `last_ate_offset` is the in-sector offset of the newest regular entry of the sector.
    pub(crate) fn close(crc8: FnCrc8, last_ate_offset: u16) -> Self {
        Self::new(crc8, CLOSE_ATE_ID, last_ate_offset, 0)
    }

    pub(crate) fn from_bytes(raw: [u8; ATE_SIZE]) -> Self {
        Self {
            id: u16::from_le_bytes([raw[0], raw[1]]),
            offset: u16::from_le_bytes([raw[2], raw[3]]),
            len: u16::from_le_bytes([raw[4], raw[5]]),
            part: raw[6],
            crc8: raw[7],
        }
    }

    pub(crate) fn to_bytes(self) -> [u8; ATE_SIZE] {
        let [id_lo, id_hi] = self.id.to_le_bytes();
        let [offset_lo, offset_hi] = self.offset.to_le_bytes();
        let [len_lo, len_hi] = self.len.to_le_bytes();
        [
            id_lo, id_hi, offset_lo, offset_hi, len_lo, len_hi, self.part, self.crc8,
        ]
    }

    pub(crate) fn calculate_crc8(&self, crc8: FnCrc8) -> u8 {
        let raw = self.to_bytes();
        crc8(0xFF, &raw[..ATE_CRC_OFFSET])
    }

    pub(crate) fn update_crc8(&mut self, crc8: FnCrc8) {
        self.crc8 = self.calculate_crc8(crc8);
    }

    /// A mismatch on an entry that is not erased is the signature of a torn write.
    pub(crate) fn is_valid(&self, crc8: FnCrc8) -> bool {
        self.crc8 == self.calculate_crc8(crc8)
    }

    pub(crate) fn is_all(&self, value: u8) -> bool {
        self.to_bytes().iter().all(|&byte| byte == value)
    }

    /// Free slot that was never written since the last erase.
    pub(crate) fn is_erased(&self) -> bool {
        self.is_all(ERASED)
    }

    pub(crate) fn is_tombstone(&self) -> bool {
        self.len == 0
    }
}

impl Debug for Ate {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let id = self.id;
        let offset = self.offset;
        let len = self.len;
        let crc8 = self.crc8;
        f.write_fmt(format_args!(
            "Ate {{ id: 0x{id:0>4x}, offset: 0x{offset:0>4x}, len: {len:>5}, crc8: 0x{crc8:0>2x} }}"
        ))
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Ate {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Ate {{ id: {=u16:#x}, offset: {=u16:#x}, len: {=u16}, crc8: {=u8:#x} }}",
            self.id,
            self.offset,
            self.len,
            self.crc8
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crc8(seed: u8, data: &[u8]) -> u8 {
        let mut crc = seed;
        for &byte in data {
            crc ^= byte;
            for _ in 0..8 {
                crc = if crc & 0x80 != 0 {
                    (crc << 1) ^ 0x07
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    #[test]
    fn layout_is_little_endian() {
        let ate = Ate::new(crc8, 0x0102, 0x0304, 0x0506);
        let raw = ate.to_bytes();
        assert_eq!(raw[..7], [0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0xFF]);
        assert_eq!(Ate::from_bytes(raw), ate);
    }

    #[test]
    fn crc_covers_every_field_but_itself() {
        let ate = Ate::new(crc8, 1, 0, 10);
        assert!(ate.is_valid(crc8));
        assert_eq!(ate.crc8, crc8(0xFF, &ate.to_bytes()[..7]));

        let mut torn = ate;
        torn.len = 11;
        assert!(!torn.is_valid(crc8));

        let mut torn = ate;
        torn.part = 0x7F;
        assert!(!torn.is_valid(crc8));
    }

    #[test]
    fn erased_slot_is_never_valid() {
        let erased = Ate::from_bytes([0xFF; ATE_SIZE]);
        assert!(erased.is_erased());
        assert!(erased.is_all(0xFF));
        assert!(!erased.is_valid(crc8));
    }

    #[test]
    fn close_ate() {
        let close = Ate::close(crc8, 0x0FF0);
        assert_eq!(close.id, CLOSE_ATE_ID);
        assert!(close.is_tombstone());
        assert_eq!(close.offset, 0x0FF0);
        assert!(close.is_valid(crc8));
        assert!(!close.is_erased());
    }
}
