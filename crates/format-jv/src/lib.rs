//! TRS-80 floppy disk images in the JV1 and JV3 formats.
//!
//! Both formats decode to a [`FloppyImage`]: a list of
//! [`SectorDescriptor`]s plus the write-protect tab. JV1 is a headerless
//! dump of single-density sectors; JV3 carries a header table recording
//! each sector's ID, density, data mark and size. Encoding to JV1 is lossy
//! for anything JV1 cannot express.
//!
//! [`detect`] recognises a format from the image bytes alone.

mod error;
pub mod jv1;
pub mod jv3;
mod sector;

use log::info;

pub use error::FormatError;
pub use sector::{
    DAM_DELETED, DAM_NORMAL, DAM_USER_F9, DAM_USER_FA, FloppyImage, SectorDescriptor, Track,
    code_from_size, size_from_code,
};

/// A supported on-disk layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jv1,
    Jv3,
}

/// Work out which format `data` is in.
///
/// JV3 is tried first: a JV3 image can happen to be a multiple of the JV1
/// track size, and the header-table check is much stricter. A JV1-sized
/// image whose would-be header table declares more sector data than the
/// file holds is still JV3 (truncated) when the table's sector addresses
/// are distinct; when they repeat (a zero-filled JV1 disk, for one) it is
/// taken as JV1.
///
/// # Errors
///
/// Fails with [`FormatError::Unrecognised`] if neither structure fits.
pub fn detect(data: &[u8]) -> Result<ImageFormat, FormatError> {
    let jv1_sized = !data.is_empty() && data.len() % jv1::TRACK_SIZE == 0;
    let short = jv3::first_block_len(data) > data.len();
    if jv3::looks_valid(data) && !(jv1_sized && short && !jv3::addresses_are_distinct(data)) {
        Ok(ImageFormat::Jv3)
    } else if jv1_sized {
        Ok(ImageFormat::Jv1)
    } else {
        Err(FormatError::Unrecognised(data.len()))
    }
}

impl FloppyImage {
    /// Decode an image, detecting its format.
    ///
    /// # Errors
    ///
    /// Fails if the format is not recognised or the image is malformed.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, ImageFormat), FormatError> {
        let format = detect(data)?;
        let image = match format {
            ImageFormat::Jv1 => jv1::decode(data)?,
            ImageFormat::Jv3 => jv3::decode(data)?,
        };
        info!(
            "loaded {format:?} disk image: {} bytes, {} sectors",
            data.len(),
            image.sectors().len()
        );
        Ok((image, format))
    }

    /// Encode in the given format.
    ///
    /// # Errors
    ///
    /// JV3 encoding fails on a sector size JV3 cannot record.
    pub fn to_bytes(&self, format: ImageFormat) -> Result<Vec<u8>, FormatError> {
        let bytes = match format {
            ImageFormat::Jv1 => jv1::encode(self),
            ImageFormat::Jv3 => jv3::encode(self)?,
        };
        info!("saved {format:?} disk image: {} bytes", bytes.len());
        Ok(bytes)
    }
}
