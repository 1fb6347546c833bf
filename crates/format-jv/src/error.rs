use thiserror::Error;

/// Failure to decode or encode a disk image.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid JV1 image: {0} bytes is not a whole number of 2560-byte tracks")]
    InvalidJv1Length(usize),

    #[error("invalid JV3 image: {0} bytes is too short for a sector header table")]
    Jv3TooShort(usize),

    #[error("unrecognised disk image format ({0} bytes)")]
    Unrecognised(usize),

    #[error("sector size {0} cannot be stored in a JV3 image")]
    UnsupportedSectorSize(usize),

    #[error("track FF sector FF marks a free JV3 header slot and cannot hold a sector")]
    FreeSlotAddress,
}
