use embedded_storage::nor_flash::NorFlashErrorKind;
use thiserror::Error;

/// Errors that can occur during NVS operations. The list is marked as non-exhaustive to allow
/// for future additions without breaking the API. A caller would likely only need to handle
/// NotFound and OutOfSpace as the other errors are either static or point at the flash itself.
#[derive(Error, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error {
    /// The filesystem was never mounted successfully, or a flash error left the in-memory
    /// cursors out of sync with the flash. Call `Nvs::mount` to rescan.
    #[error("filesystem not initialized")]
    NotInitialized,

    /// Bad length, bad id usage or a configuration the flash can't support.
    #[error("invalid argument")]
    InvalidArgument,

    /// A full garbage collection rotation over all sectors didn't free enough room.
    /// Nothing was written.
    #[error("out of space")]
    OutOfSpace,

    /// Either no entry has ever been written for the id, the requested history version
    /// doesn't exist anymore or the newest entry is a delete.
    #[error("entry not found")]
    NotFound,

    /// The error reported by the flash driver, the running operation was aborted.
    #[error("flash I/O error: {0}")]
    Io(IoErrorKind),

    /// Returned by typed reads if the stored value doesn't have the width of the requested type.
    #[error("size mismatch: expected {expected} bytes, found {found}")]
    SizeMismatch { expected: usize, found: usize },

    /// Returned by typed reads if a stored string is not valid UTF-8, and by mount if the
    /// partition content can't be an NVS log (e.g. every sector is closed).
    #[error("corrupted data")]
    CorruptedData,
}

/// Backend independent classification of a flash driver error.
#[derive(strum::Display, Debug, PartialEq, Eq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IoErrorKind {
    /// The driver rejected an offset or length that wasn't aligned to its block size.
    NotAligned,
    /// The access was outside of the device.
    OutOfBounds,
    /// Any other driver error.
    Other,
}

impl From<NorFlashErrorKind> for IoErrorKind {
    fn from(kind: NorFlashErrorKind) -> Self {
        match kind {
            NorFlashErrorKind::NotAligned => IoErrorKind::NotAligned,
            NorFlashErrorKind::OutOfBounds => IoErrorKind::OutOfBounds,
            _ => IoErrorKind::Other,
        }
    }
}
