use embedded_storage::nor_flash::{
    check_erase,
    check_read,
    check_write,
    ErrorType,
    NorFlash,
    NorFlashErrorKind,
    ReadNorFlash,
};
use nor_nvs::platform::{
    Crc,
    WriteProtect,
};

use super::crc::crc8_ccitt;

/// Write granularity of the emulated flash. Has to match the target, the
/// size of an allocation table entry depends on it.
pub const WRITE_SIZE: usize = 4;
/// Erase granularity of the emulated flash, sector sizes have to be a
/// multiple of it.
pub const ERASE_SIZE: usize = 4096;

/// A NOR flash in memory. Writes can only clear bits, like on the real
/// device, so the filesystem produces the exact bytes the target would.
#[derive(Debug, Clone)]
pub struct RamFlash {
    buf: Vec<u8>,
}

impl RamFlash {
    /// An erased flash of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            buf: vec![0xFF; size],
        }
    }

    /// Returns the raw content.
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

impl From<Vec<u8>> for RamFlash {
    fn from(buf: Vec<u8>) -> Self {
        Self { buf }
    }
}

impl ErrorType for RamFlash {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for RamFlash {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        check_read(self, offset, bytes.len())?;
        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl NorFlash for RamFlash {
    const WRITE_SIZE: usize = WRITE_SIZE;
    const ERASE_SIZE: usize = ERASE_SIZE;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        check_erase(self, from, to)?;
        self.buf[from as usize..to as usize].fill(0xFF);
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        check_write(self, offset, bytes.len())?;
        let offset = offset as usize;
        for (cell, byte) in self.buf[offset..offset + bytes.len()].iter_mut().zip(bytes) {
            *cell &= byte;
        }
        Ok(())
    }
}

impl Crc for RamFlash {
    fn crc8_ccitt(seed: u8, data: &[u8]) -> u8 {
        crc8_ccitt(seed, data)
    }
}

impl WriteProtect for RamFlash {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_only_clear_bits() {
        let mut flash = RamFlash::new(ERASE_SIZE);
        flash.write(0, &[0x0F, 0xF0, 0xFF, 0x00]).unwrap();
        flash.write(0, &[0xF0, 0xF0, 0x0F, 0xFF]).unwrap();

        let mut buf = [0u8; 4];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0xF0, 0x0F, 0x00]);

        flash.erase(0, ERASE_SIZE as u32).unwrap();
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    fn rejects_unaligned_access() {
        let mut flash = RamFlash::new(ERASE_SIZE);
        assert_eq!(flash.write(2, &[0; 4]), Err(NorFlashErrorKind::NotAligned));
        assert_eq!(flash.erase(0, 100), Err(NorFlashErrorKind::NotAligned));
        assert_eq!(
            flash.read(ERASE_SIZE as u32, &mut [0; 1]),
            Err(NorFlashErrorKind::OutOfBounds)
        );
    }
}
