use crate::Nvs;
use crate::error::Error;
use crate::platform::Platform;

pub trait Set<T> {
    fn set(&self, id: u16, value: T) -> Result<usize, Error>;
}

impl<T, S: Set<T>> Set<T> for &S {
    fn set(&self, id: u16, value: T) -> Result<usize, Error> {
        (*self).set(id, value)
    }
}

impl<T: Platform> Set<bool> for Nvs<T> {
    fn set(&self, id: u16, value: bool) -> Result<usize, Error> {
        self.write(id, &[value as u8])
    }
}

impl<T: Platform> Set<u8> for Nvs<T> {
    fn set(&self, id: u16, value: u8) -> Result<usize, Error> {
        self.write(id, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<u16> for Nvs<T> {
    fn set(&self, id: u16, value: u16) -> Result<usize, Error> {
        self.write(id, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<u32> for Nvs<T> {
    fn set(&self, id: u16, value: u32) -> Result<usize, Error> {
        self.write(id, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<u64> for Nvs<T> {
    fn set(&self, id: u16, value: u64) -> Result<usize, Error> {
        self.write(id, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i8> for Nvs<T> {
    fn set(&self, id: u16, value: i8) -> Result<usize, Error> {
        self.write(id, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i16> for Nvs<T> {
    fn set(&self, id: u16, value: i16) -> Result<usize, Error> {
        self.write(id, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i32> for Nvs<T> {
    fn set(&self, id: u16, value: i32) -> Result<usize, Error> {
        self.write(id, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<i64> for Nvs<T> {
    fn set(&self, id: u16, value: i64) -> Result<usize, Error> {
        self.write(id, &value.to_le_bytes())
    }
}

impl<T: Platform> Set<&str> for Nvs<T> {
    fn set(&self, id: u16, value: &str) -> Result<usize, Error> {
        self.write(id, value.as_bytes())
    }
}

impl<T: Platform> Set<&[u8]> for Nvs<T> {
    fn set(&self, id: u16, value: &[u8]) -> Result<usize, Error> {
        self.write(id, value)
    }
}
