//! Host side generator and parser for `nor-nvs` flash images.
//!
//! Images are produced by the filesystem itself running on an in-memory
//! flash, so a generated image is byte for byte what the device would have
//! written.

pub mod error;
pub mod image;

mod csv;

use std::fs;
use std::io::Write;
use std::path::Path;

pub use error::Error;
pub use image::{
    DataValue,
    NvsEntry,
    RamFlash,
    ERASE_SIZE,
    WRITE_SIZE,
};

/// An ordered list of id/value entries.
///
/// This is the in-memory representation shared by the CSV and image
/// parsers/generators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NvsImage {
    /// The entries in write order.
    pub entries: Vec<NvsEntry>,
}

impl NvsImage {
    /// Parse CSV content from a string. The header is `id,encoding,value`.
    pub fn from_csv(content: &str) -> Result<Self, Error> {
        csv::parser::parse_csv(content)
    }

    /// Parse a CSV file at the given `path`.
    pub fn from_csv_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        csv::parser::parse_csv(&content)
    }

    /// Serialize to CSV and return the content as a `String`.
    pub fn to_csv(&self) -> Result<String, Error> {
        csv::writer::write_csv_content(self)
    }

    /// Serialize to a CSV file at the given `path`, in entry order.
    pub fn to_csv_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        csv::writer::write_csv(self, path)
    }

    /// Generate an image of `sector_count` sectors of `sector_size` bytes.
    ///
    /// `sector_size` must be a multiple of [`ERASE_SIZE`]. Fails with
    /// `nor_nvs::error::Error::OutOfSpace` if the entries don't fit.
    pub fn generate_image(&self, sector_size: usize, sector_count: u16) -> Result<Vec<u8>, Error> {
        image::generator::generate_image_data(self, sector_size, sector_count)
    }

    /// Generate an image and write it to `path`.
    pub fn generate_image_file<P: AsRef<Path>>(
        &self,
        path: P,
        sector_size: usize,
        sector_count: u16,
    ) -> Result<(), Error> {
        let data = self.generate_image(sector_size, sector_count)?;
        fs::File::create(path)?.write_all(&data)?;
        Ok(())
    }

    /// Parse an image from an in-memory byte slice.
    pub fn parse_image(data: &[u8], sector_size: usize) -> Result<Self, Error> {
        image::parser::parse_image_data(data, sector_size)
    }

    /// Parse an image file at the given `path`.
    pub fn parse_image_file<P: AsRef<Path>>(path: P, sector_size: usize) -> Result<Self, Error> {
        image::parser::parse_image(path, sector_size)
    }
}
