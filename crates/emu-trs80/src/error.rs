use format_jv::FormatError;
use thiserror::Error;

use crate::SnapshotError;

#[derive(Debug, Error)]
pub enum Trs80Error {
    #[error("disk image: {0}")]
    Format(#[from] FormatError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
    #[error("ROM is {len} bytes, at most {max} fit below the keyboard block")]
    RomTooLarge { len: usize, max: usize },
    #[error("no drive {0}; drives are numbered 0-3")]
    NoSuchDrive(usize),
    #[error("drive {0} is empty")]
    EmptyDrive(usize),
}
