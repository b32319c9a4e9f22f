use embedded_storage::nor_flash::{ErrorType, NorFlash};

/// Everything the filesystem needs from the target: a NOR flash driver, a CRC-8 routine and
/// (optionally) control over the write protection of the flash.
///
/// See README.md for an example implementation.
pub trait Platform: Crc + NorFlash + WriteProtect {}

impl<T: Crc + NorFlash + WriteProtect> Platform for T {}

pub type FnCrc8 = fn(seed: u8, data: &[u8]) -> u8;

/// CRC-8/CCITT: polynomial 0x07, MSB first, no final xor. The filesystem always seeds it with
/// 0xFF.
pub trait Crc {
    fn crc8_ccitt(seed: u8, data: &[u8]) -> u8;
}

impl<T: Crc> Crc for &mut T {
    fn crc8_ccitt(seed: u8, data: &[u8]) -> u8 {
        T::crc8_ccitt(seed, data)
    }
}

/// Flash devices that need their write protection lifted before a write or an erase. The
/// default implementation does nothing, which is what most drivers want.
pub trait WriteProtect: ErrorType {
    fn set_write_protection(&mut self, _enabled: bool) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl<T: WriteProtect> WriteProtect for &mut T {
    fn set_write_protection(&mut self, enabled: bool) -> Result<(), Self::Error> {
        T::set_write_protection(self, enabled)
    }
}

pub trait AlignedOps: Platform {
    fn align_read(size: usize) -> usize {
        align_ceil(size, Self::READ_SIZE)
    }

    fn align_read_floor(size: usize) -> usize {
        align_floor(size, Self::READ_SIZE)
    }

    fn align_write_ceil(size: usize) -> usize {
        align_ceil(size, Self::WRITE_SIZE)
    }

    fn align_write_floor(size: usize) -> usize {
        align_floor(size, Self::WRITE_SIZE)
    }
}

#[inline(always)]
pub(crate) const fn align_ceil(size: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        size
    } else if alignment.is_power_of_two() {
        size.saturating_add(alignment - 1) & !(alignment - 1)
    } else {
        size.saturating_add(alignment - 1) / alignment * alignment
    }
}

#[inline(always)]
pub(crate) const fn align_floor(size: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        size
    } else if alignment.is_power_of_two() {
        size & !(alignment - 1)
    } else {
        size / alignment * alignment
    }
}

impl<T: Platform> AlignedOps for T {}

#[cfg(any(
    feature = "esp32",
    feature = "esp32s2",
    feature = "esp32s3",
    feature = "esp32c2",
    feature = "esp32c3",
    feature = "esp32c6",
    feature = "esp32h2",
))]
mod chip {
    use esp_storage::FlashStorage;

    use crate::platform::{Crc, WriteProtect};

    impl Crc for FlashStorage<'_> {
        fn crc8_ccitt(seed: u8, data: &[u8]) -> u8 {
            // the ROM routine inverts the seed and the result
            !esp_hal::rom::crc::crc8_be(!seed, data)
        }
    }

    impl WriteProtect for FlashStorage<'_> {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_to_power_of_two() {
        assert_eq!(align_ceil(0, 4), 0);
        assert_eq!(align_ceil(1, 4), 4);
        assert_eq!(align_ceil(8, 4), 8);
        assert_eq!(align_ceil(9, 8), 16);
        assert_eq!(align_floor(9, 8), 8);
        assert_eq!(align_floor(3, 4), 0);
    }

    #[test]
    fn align_is_a_noop_for_byte_writable_flash() {
        assert_eq!(align_ceil(7, 1), 7);
        assert_eq!(align_floor(7, 1), 7);
        assert_eq!(align_ceil(7, 0), 7);
    }

    #[test]
    fn align_to_odd_block_size() {
        assert_eq!(align_ceil(7, 6), 12);
        assert_eq!(align_floor(7, 6), 6);
    }
}
