//! JV3: sector header tables followed by packed sector data.
//!
//! Each block is a table of 2901 three-byte headers (track, sector, flags)
//! followed by the data of those sectors in header order. A write-protect
//! byte follows the first table only. Unused header slots hold `FF FF`
//! in the track and sector fields.
//!
//! Flags byte:
//!
//! | Bits | Meaning |
//! |------|---------|
//! | 7    | double density |
//! | 6-5  | data address mark |
//! | 4    | side 1 |
//! | 3    | CRC error |
//! | 2    | non-IBM format |
//! | 1-0  | size code, stored XOR 1 when in use and XOR 2 when free |

use std::collections::HashSet;

use log::warn;

use crate::FormatError;
use crate::sector::{
    DAM_DELETED, DAM_NORMAL, DAM_USER_F9, DAM_USER_FA, FloppyImage, SectorDescriptor, code_from_size,
    size_from_code,
};

pub const SECTORS_PER_HEADER: usize = 2901;
pub const HEADER_SIZE: usize = SECTORS_PER_HEADER * 3;

const DOUBLE_DENSITY: u8 = 0x80;
const DAM_MASK: u8 = 0x60;
const SIDE_ONE: u8 = 0x10;
const CRC_ERROR: u8 = 0x08;
const NON_IBM: u8 = 0x04;
const SIZE_MASK: u8 = 0x03;
const SECTOR_FREE: u8 = 0xFF;
const FREE_FLAGS: u8 = 0xFC;

/// Write-protect byte value for a writable disk.
const WRITABLE: u8 = 0xFF;

fn is_free_slot(entry: &[u8]) -> bool {
    entry[0] == SECTOR_FREE && entry[1] == SECTOR_FREE
}

const fn dam_from_flags(flags: u8, double_density: bool) -> u8 {
    match flags & DAM_MASK {
        0x00 => DAM_NORMAL,
        // 0xFA is not reproduced in single density; readers disagree on it.
        0x20 => DAM_DELETED,
        0x40 => {
            if double_density {
                DAM_NORMAL
            } else {
                DAM_USER_F9
            }
        }
        _ => DAM_DELETED,
    }
}

const fn dam_to_flags(dam: u8, double_density: bool) -> u8 {
    match dam {
        DAM_DELETED => {
            if double_density {
                0x20
            } else {
                0x60
            }
        }
        DAM_USER_F9 => 0x40,
        DAM_USER_FA => 0x20,
        _ => 0x00,
    }
}

fn parse_header(entry: &[u8]) -> SectorDescriptor {
    let flags = entry[2];
    let double_density = flags & DOUBLE_DENSITY != 0;
    let in_use = flags & FREE_FLAGS != FREE_FLAGS;
    let code = (flags & SIZE_MASK) ^ if in_use { 1 } else { 2 };
    SectorDescriptor {
        track: entry[0],
        sector: entry[1],
        side_one: flags & SIDE_ONE != 0,
        double_density,
        dam: dam_from_flags(flags, double_density),
        data: vec![0; size_from_code(code)],
        in_use,
        crc_error: flags & CRC_ERROR != 0,
        non_ibm: flags & NON_IBM != 0,
    }
}

/// Decode a JV3 image.
///
/// A truncated image keeps whatever sector bytes are present, zero-fills
/// the rest of the sector it ends in and stops there.
///
/// # Errors
///
/// Fails if the image is too short to hold the first header table and its
/// write-protect byte.
pub fn decode(data: &[u8]) -> Result<FloppyImage, FormatError> {
    if data.len() <= HEADER_SIZE + 1 {
        return Err(FormatError::Jv3TooShort(data.len()));
    }

    let mut sectors = Vec::new();
    let mut write_protected = None;
    let mut cursor = 0;
    let mut truncated = false;

    while cursor + HEADER_SIZE + 1 < data.len() {
        let mut block: Vec<SectorDescriptor> = data[cursor..cursor + HEADER_SIZE]
            .chunks_exact(3)
            .filter(|entry| !is_free_slot(entry))
            .map(parse_header)
            .collect();
        cursor += HEADER_SIZE;

        if write_protected.is_none() {
            write_protected = Some(data[cursor] != WRITABLE);
            cursor += 1;
        }

        for sector in &mut block {
            let size = sector.size();
            if sector.in_use {
                let rest = data.get(cursor..).unwrap_or_default();
                if rest.len() < size {
                    if !truncated {
                        warn!(
                            "JV3 image truncated in track {} sector {}: {} of {size} bytes",
                            sector.track,
                            sector.sector,
                            rest.len()
                        );
                        truncated = true;
                    }
                    sector.data[..rest.len()].copy_from_slice(rest);
                    cursor = data.len();
                    continue;
                }
                sector.data.copy_from_slice(&data[cursor..cursor + size]);
            }
            cursor += size;
        }
        sectors.append(&mut block);
    }

    Ok(FloppyImage::new(sectors, write_protected.unwrap_or(false)))
}

fn header_entry(sector: &SectorDescriptor) -> Result<[u8; 3], FormatError> {
    if is_free_slot(&[sector.track, sector.sector]) {
        return Err(FormatError::FreeSlotAddress);
    }
    let code = code_from_size(sector.size()).ok_or(FormatError::UnsupportedSectorSize(sector.size()))?;
    let flags = if sector.in_use {
        let mut flags = dam_to_flags(sector.dam, sector.double_density) | (code ^ 1);
        if sector.double_density {
            flags |= DOUBLE_DENSITY;
        }
        if sector.side_one {
            flags |= SIDE_ONE;
        }
        if sector.crc_error {
            flags |= CRC_ERROR;
        }
        if sector.non_ibm {
            flags |= NON_IBM;
        }
        flags
    } else {
        FREE_FLAGS | (code ^ 2)
    };
    Ok([sector.track, sector.sector, flags])
}

/// Encode as JV3, sectors ordered by track, side and sector number.
///
/// # Errors
///
/// Fails if a sector's size is not one of 128, 256, 512 or 1024 bytes, or
/// if a sector sits at track $FF sector $FF, which marks a free slot.
pub fn encode(image: &FloppyImage) -> Result<Vec<u8>, FormatError> {
    let mut sectors: Vec<&SectorDescriptor> = image.sectors().iter().collect();
    sectors.sort_by_key(|s| s.order_key());

    let data_len: usize = sectors.iter().map(|s| s.size()).sum();
    let tables = sectors.len().div_ceil(SECTORS_PER_HEADER).max(1);
    let mut out = Vec::with_capacity(tables * HEADER_SIZE + 1 + data_len);

    let mut chunks = sectors.chunks(SECTORS_PER_HEADER).peekable();
    if chunks.peek().is_none() {
        // No sectors still needs one table for the write-protect byte.
        out.resize(HEADER_SIZE, SECTOR_FREE);
        out.push(if image.write_protected() { 0 } else { WRITABLE });
    }

    for (block, chunk) in chunks.enumerate() {
        for sector in chunk {
            out.extend_from_slice(&header_entry(sector)?);
        }
        for _ in chunk.len()..SECTORS_PER_HEADER {
            out.extend_from_slice(&[SECTOR_FREE, SECTOR_FREE, FREE_FLAGS | SIZE_MASK]);
        }
        if block == 0 {
            out.push(if image.write_protected() { 0 } else { WRITABLE });
        }
        for sector in chunk {
            out.extend_from_slice(&sector.data);
        }
    }
    Ok(out)
}

/// Structural check used by format detection: a plausible first header
/// table and write-protect byte.
#[must_use]
pub fn looks_valid(data: &[u8]) -> bool {
    if data.len() <= HEADER_SIZE + 1 {
        return false;
    }
    if !matches!(data[HEADER_SIZE], 0x00 | WRITABLE) {
        return false;
    }
    let mut used = 0;
    for entry in data[..HEADER_SIZE].chunks_exact(3) {
        if is_free_slot(entry) {
            if entry[2] & FREE_FLAGS != FREE_FLAGS {
                return false;
            }
        } else {
            if entry[0] > 95 {
                return false;
            }
            used += 1;
        }
    }
    used > 0
}

/// Bytes the first header table and its sectors occupy. Only meaningful
/// once [`looks_valid`] has accepted the image.
#[must_use]
pub fn first_block_len(data: &[u8]) -> usize {
    let sectors: usize = data[..HEADER_SIZE.min(data.len())]
        .chunks_exact(3)
        .filter(|entry| !is_free_slot(entry))
        .map(|entry| parse_header(entry).size())
        .sum();
    HEADER_SIZE + 1 + sectors
}

/// Whether no two entries of the first header table name the same track,
/// side and sector. A data track misread as a header table nearly always
/// repeats an address.
#[must_use]
pub fn addresses_are_distinct(data: &[u8]) -> bool {
    let mut seen = HashSet::new();
    data[..HEADER_SIZE.min(data.len())]
        .chunks_exact(3)
        .filter(|entry| !is_free_slot(entry))
        .all(|entry| seen.insert((entry[0], entry[2] & SIDE_ONE, entry[1])))
}
