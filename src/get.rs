//! The `Get<T>` trait and its implementation in this module allows providing a single generic,
//! overloaded function `get<T>()` for all supported types of the driver.

use crate::Nvs;
use crate::error::Error;
use crate::platform::Platform;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

pub trait Get<T> {
    fn get(&self, id: u16) -> Result<T, Error>;
}

impl<T, G: Get<T>> Get<T> for &G {
    fn get(&self, id: u16) -> Result<T, Error> {
        (*self).get(id)
    }
}

impl<T: Platform> Nvs<T> {
    /// Reads a value that has to be exactly `N` bytes long.
    fn get_exact<const N: usize>(&self, id: u16) -> Result<[u8; N], Error> {
        let mut buf = [0u8; N];
        let len = self.read(id, &mut buf)?;
        if len != N {
            return Err(Error::SizeMismatch {
                expected: N,
                found: len,
            });
        }
        Ok(buf)
    }

    fn get_blob(&self, id: u16) -> Result<Vec<u8>, Error> {
        // length and content under one lock, a concurrent write can't change the size in between
        self.with_fs(|fs| {
            let len = fs.value_len(id)?;
            let mut buf = vec![0u8; len];
            fs.read_hist(id, &mut buf, 0)?;
            Ok(buf)
        })
    }
}

impl<T: Platform> Get<bool> for Nvs<T> {
    fn get(&self, id: u16) -> Result<bool, Error> {
        let [value] = self.get_exact::<1>(id)?;
        Ok(value != 0)
    }
}

impl<T: Platform> Get<u8> for Nvs<T> {
    fn get(&self, id: u16) -> Result<u8, Error> {
        Ok(u8::from_le_bytes(self.get_exact(id)?))
    }
}

impl<T: Platform> Get<u16> for Nvs<T> {
    fn get(&self, id: u16) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.get_exact(id)?))
    }
}

impl<T: Platform> Get<u32> for Nvs<T> {
    fn get(&self, id: u16) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.get_exact(id)?))
    }
}

impl<T: Platform> Get<u64> for Nvs<T> {
    fn get(&self, id: u16) -> Result<u64, Error> {
        Ok(u64::from_le_bytes(self.get_exact(id)?))
    }
}

impl<T: Platform> Get<i8> for Nvs<T> {
    fn get(&self, id: u16) -> Result<i8, Error> {
        Ok(i8::from_le_bytes(self.get_exact(id)?))
    }
}

impl<T: Platform> Get<i16> for Nvs<T> {
    fn get(&self, id: u16) -> Result<i16, Error> {
        Ok(i16::from_le_bytes(self.get_exact(id)?))
    }
}

impl<T: Platform> Get<i32> for Nvs<T> {
    fn get(&self, id: u16) -> Result<i32, Error> {
        Ok(i32::from_le_bytes(self.get_exact(id)?))
    }
}

impl<T: Platform> Get<i64> for Nvs<T> {
    fn get(&self, id: u16) -> Result<i64, Error> {
        Ok(i64::from_le_bytes(self.get_exact(id)?))
    }
}

impl<T: Platform> Get<String> for Nvs<T> {
    fn get(&self, id: u16) -> Result<String, Error> {
        let buf = self.get_blob(id)?;
        String::from_utf8(buf).map_err(|_| Error::CorruptedData)
    }
}

impl<T: Platform> Get<Vec<u8>> for Nvs<T> {
    fn get(&self, id: u16) -> Result<Vec<u8>, Error> {
        self.get_blob(id)
    }
}
