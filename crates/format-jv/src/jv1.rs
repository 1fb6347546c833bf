//! JV1: a bare dump of single-density, single-sided tracks.
//!
//! Ten 256-byte sectors per track, numbered from 0, in order, with no
//! header. The format cannot record data marks, so track 17 (the TRSDOS
//! directory) is assumed to carry deleted marks and every other track
//! normal ones.

use crate::FormatError;
use crate::sector::{DAM_DELETED, FloppyImage, SectorDescriptor};

pub const SECTORS_PER_TRACK: usize = 10;
pub const SECTOR_SIZE: usize = 256;
pub const TRACK_SIZE: usize = SECTORS_PER_TRACK * SECTOR_SIZE;

const DIRECTORY_TRACK: u8 = 17;

/// Decode a JV1 image.
///
/// # Errors
///
/// Fails if the length is not a whole number of tracks.
pub fn decode(data: &[u8]) -> Result<FloppyImage, FormatError> {
    if data.len() % TRACK_SIZE != 0 {
        return Err(FormatError::InvalidJv1Length(data.len()));
    }

    let sectors = data
        .chunks_exact(SECTOR_SIZE)
        .enumerate()
        .map(|(i, bytes)| {
            let track = (i / SECTORS_PER_TRACK) as u8;
            let mut sector = SectorDescriptor::new(track, (i % SECTORS_PER_TRACK) as u8, bytes.to_vec());
            if track == DIRECTORY_TRACK {
                sector.dam = DAM_DELETED;
            }
            sector
        })
        .collect();
    Ok(FloppyImage::new(sectors, false))
}

/// Encode side 0 as JV1.
///
/// Only 256-byte sectors numbered 0-9 are kept. Absent sectors, and every
/// sector of an absent track up to the highest one present, are written
/// as zeros.
#[must_use]
pub fn encode(image: &FloppyImage) -> Vec<u8> {
    let usable = |s: &&SectorDescriptor| {
        !s.side_one && s.in_use && s.size() == SECTOR_SIZE && (s.sector as usize) < SECTORS_PER_TRACK
    };
    let Some(max_track) = image.sectors().iter().filter(usable).map(|s| s.track).max() else {
        return Vec::new();
    };

    let mut out = vec![0; (max_track as usize + 1) * TRACK_SIZE];
    // First match wins, as on a real drive scanning for a sector ID.
    let mut written = vec![false; (max_track as usize + 1) * SECTORS_PER_TRACK];
    for s in image.sectors().iter().filter(usable) {
        let slot = s.track as usize * SECTORS_PER_TRACK + s.sector as usize;
        if written[slot] {
            continue;
        }
        written[slot] = true;
        out[slot * SECTOR_SIZE..(slot + 1) * SECTOR_SIZE].copy_from_slice(&s.data);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sector::DAM_NORMAL;

    #[test]
    fn rejects_partial_track() {
        assert_eq!(decode(&[0; 2561]), Err(FormatError::InvalidJv1Length(2561)));
        assert_eq!(decode(&[0; 100]), Err(FormatError::InvalidJv1Length(100)));
    }

    #[test]
    fn empty_image_has_no_sectors() {
        let img = decode(&[]).expect("empty is a whole number of tracks");
        assert!(img.sectors().is_empty());
        assert!(encode(&img).is_empty());
    }

    #[test]
    fn sequential_layout_and_directory_marks() {
        let mut data = vec![0; TRACK_SIZE * 18];
        data[TRACK_SIZE + 3 * SECTOR_SIZE] = 0x5A;
        let img = decode(&data).expect("valid");
        assert_eq!(img.sectors().len(), 180);

        let s = &img.sectors()[13];
        assert_eq!((s.track, s.sector, s.data[0]), (1, 3, 0x5A));
        assert_eq!(s.dam, DAM_NORMAL);
        assert_eq!(img.sectors()[170].dam, DAM_DELETED);
        assert!(img.sectors().iter().all(|s| s.in_use && !s.double_density));

        assert_eq!(encode(&img), data);
    }

    #[test]
    fn encode_pads_missing_sectors_and_tracks() {
        let mut side_one = SectorDescriptor::new(0, 0, vec![0xEE; SECTOR_SIZE]);
        side_one.side_one = true;
        let img = FloppyImage::new(
            vec![
                SectorDescriptor::new(2, 4, vec![0x11; SECTOR_SIZE]),
                SectorDescriptor::new(0, 0, vec![0x22; 128]),
                side_one,
            ],
            false,
        );
        let out = encode(&img);
        assert_eq!(out.len(), 3 * TRACK_SIZE);
        let at = 2 * TRACK_SIZE + 4 * SECTOR_SIZE;
        assert!(out[at..at + SECTOR_SIZE].iter().all(|&b| b == 0x11));
        assert_eq!(out.iter().filter(|&&b| b != 0).count(), SECTOR_SIZE);
    }
}
