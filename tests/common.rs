#![allow(dead_code)]

// filename according to https://doc.rust-lang.org/book/ch11-03-test-organization.html
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

pub const FLASH_SECTOR_SIZE: usize = 4096;
// Taken from https://github.com/esp-rs/esp-hal/blob/main/esp-storage/src/stub.rs
pub const WORD_SIZE: usize = 4;
/// An allocation table entry aligned to `WORD_SIZE`.
pub const ATE_SIZE: usize = 8;
pub const CLOSE_SLOT: usize = FLASH_SECTOR_SIZE - ATE_SIZE;
pub const FIRST_ATE_SLOT: usize = FLASH_SECTOR_SIZE - 2 * ATE_SIZE;
pub const MAX_VALUE_LEN: usize = FLASH_SECTOR_SIZE - 3 * ATE_SIZE;

/// The flash most tests run on: 4 byte words and 4 KiB sectors.
pub type Flash = SizedFlash<WORD_SIZE, WORD_SIZE, FLASH_SECTOR_SIZE>;

/// A NOR flash with write size `W`, read size `R` and erase size `E`.
#[derive(Default)]
pub struct SizedFlash<const W: usize, const R: usize, const E: usize> {
    pub buf: Vec<u8>,
    pub fail_after_operation: usize,
    /// Writes left until the one that gets cut off, see [`Flash::tear_write`].
    pub writes_until_tear: Option<usize>,
    pub torn_write_len: usize,
    /// Only the first failing operation fails, the flash works again afterwards.
    pub transient_faults: bool,
    pub protected: bool,
    /// Turning the write protection back on fails.
    pub fail_reprotect: bool,
    pub operations: Vec<Operation>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Operation {
    Read { offset: u32, len: usize },
    Write { offset: u32, len: usize },
    Erase { offset: u32, len: usize },
}

impl<const W: usize, const R: usize, const E: usize> SizedFlash<W, R, E> {
    pub fn new(sectors: usize) -> Self {
        Self {
            buf: vec![0xffu8; E * sectors],
            fail_after_operation: usize::MAX,
            protected: true,
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn sectors(&self) -> u16 {
        (self.buf.len() / E) as u16
    }

    /// Lets the flash fail once `operations` more calls went through.
    pub fn fail_after(&mut self, operations: usize) {
        self.fail_after_operation = self.operations.len() + operations;
    }

    /// Simulates a power loss during the `nth` write from now (0 based): only the first `len`
    /// bytes of it reach the flash, every later operation fails.
    pub fn tear_write(&mut self, nth: usize, len: usize) {
        self.writes_until_tear = Some(nth);
        self.torn_write_len = len;
    }

    fn fault(&mut self) -> bool {
        let fault = self.operations.len() >= self.fail_after_operation;
        if fault && self.transient_faults {
            self.fail_after_operation = usize::MAX;
        }
        fault
    }

    pub fn disable_faults(&mut self) {
        self.fail_after_operation = usize::MAX;
        self.writes_until_tear = None;
        self.torn_write_len = 0;
    }

    pub fn erases(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Erase { .. }))
            .count()
    }

    pub fn writes(&self) -> usize {
        self.operations
            .iter()
            .filter(|op| matches!(op, Operation::Write { .. }))
            .count()
    }

    /// Raw bytes at a partition address.
    pub fn bytes(&self, sector: usize, offset: usize, len: usize) -> &[u8] {
        let start = sector * E + offset;
        &self.buf[start..start + len]
    }

    /// Flips bits of a stored byte without going through the driver, like a decaying cell
    /// would.
    pub fn corrupt(&mut self, sector: usize, offset: usize) {
        self.buf[sector * E + offset] ^= 0x5A;
    }

    pub fn is_sector_erased(&self, sector: usize) -> bool {
        self.bytes(sector, 0, E)
            .iter()
            .all(|&b| b == 0xff)
    }

    pub fn dump_operations(&self) {
        println!("Operations:");
        for op in &self.operations {
            println!("  {:?}", op);
        }
    }
}

#[derive(Debug)]
pub struct FlashError;

impl NorFlashError for FlashError {
    fn kind(&self) -> NorFlashErrorKind {
        NorFlashErrorKind::Other
    }
}

impl<const W: usize, const R: usize, const E: usize> ErrorType for SizedFlash<W, R, E> {
    type Error = FlashError;
}

impl<const W: usize, const R: usize, const E: usize> ReadNorFlash for SizedFlash<W, R, E> {
    const READ_SIZE: usize = R;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::READ_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::READ_SIZE));

        println!(
            "    flash: read:  0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );
        if self.fault() {
            println!("    flash: FAULT");
            return Err(FlashError);
        }
        self.operations.push(Operation::Read {
            offset,
            len: bytes.len(),
        });

        let offset = offset as usize;
        bytes.copy_from_slice(&self.buf[offset..offset + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.buf.len()
    }
}

impl<const W: usize, const R: usize, const E: usize> NorFlash for SizedFlash<W, R, E> {
    const WRITE_SIZE: usize = W;

    const ERASE_SIZE: usize = E;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        assert!(from.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(to.is_multiple_of(Self::ERASE_SIZE as _));
        assert!(!self.protected, "erase while write protected");

        println!(
            "    flash: erase: {from:04X} - {to:04X} #{:>2}",
            self.operations.len()
        );

        if self.fault() {
            println!("    flash: FAULT");
            return Err(FlashError);
        }

        self.operations.push(Operation::Erase {
            offset: from,
            len: (to - from) as usize,
        });

        for addr in from..to {
            self.buf[addr as usize] = 0xff;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        assert!(offset.is_multiple_of(Self::WRITE_SIZE as _));
        assert!(bytes.len().is_multiple_of(Self::WRITE_SIZE as _));
        assert!(!bytes.is_empty());
        assert!(!self.protected, "write while write protected");

        println!(
            "    flash: write: 0x{offset:04X}[0x{:04X}] #{:>2}",
            bytes.len(),
            self.operations.len()
        );

        let torn = self.writes_until_tear == Some(0);
        if torn {
            self.writes_until_tear = None;
            self.fail_after_operation = self.operations.len();
        } else {
            self.writes_until_tear = self.writes_until_tear.map(|n| n - 1);
        }

        let fault = self.fault();
        let len = if torn {
            bytes.len().min(self.torn_write_len)
        } else if fault {
            0
        } else {
            bytes.len()
        };

        let offset = offset as usize;
        for (i, &val) in bytes[..len].iter().enumerate() {
            // nor flash can only flip bits from 1 to 0
            self.buf[offset + i] &= val;
        }

        if fault {
            println!("    flash: FAULT after {len} bytes");
            return Err(FlashError);
        }

        self.operations.push(Operation::Write {
            offset: offset as u32,
            len: bytes.len(),
        });
        Ok(())
    }
}

impl<const W: usize, const R: usize, const E: usize> nor_nvs::platform::Crc
    for SizedFlash<W, R, E>
{
    fn crc8_ccitt(seed: u8, data: &[u8]) -> u8 {
        crc8_ccitt(seed, data)
    }
}

impl<const W: usize, const R: usize, const E: usize> nor_nvs::platform::WriteProtect
    for SizedFlash<W, R, E>
{
    fn set_write_protection(&mut self, enabled: bool) -> Result<(), Self::Error> {
        if enabled && self.fail_reprotect {
            return Err(FlashError);
        }
        self.protected = enabled;
        Ok(())
    }
}

/// Bitwise CRC-8/CCITT (polynomial 0x07, no reflection, no final xor).
pub fn crc8_ccitt(seed: u8, data: &[u8]) -> u8 {
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

/// Encodes an allocation table entry the way the filesystem stores it.
pub fn ate(id: u16, offset: u16, len: u16) -> [u8; ATE_SIZE] {
    let mut raw = [0xffu8; ATE_SIZE];
    raw[0..2].copy_from_slice(&id.to_le_bytes());
    raw[2..4].copy_from_slice(&offset.to_le_bytes());
    raw[4..6].copy_from_slice(&len.to_le_bytes());
    raw[7] = crc8_ccitt(0xff, &raw[..7]);
    raw
}
