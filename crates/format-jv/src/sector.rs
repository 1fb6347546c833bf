//! The in-memory disk model shared by both codecs.

/// Data address mark of an ordinary sector.
pub const DAM_NORMAL: u8 = 0xFB;
/// Data address mark of a deleted sector. TRSDOS marks its directory track
/// this way.
pub const DAM_DELETED: u8 = 0xF8;
/// User-defined single-density marks.
pub const DAM_USER_F9: u8 = 0xF9;
pub const DAM_USER_FA: u8 = 0xFA;

/// One sector as stored in an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectorDescriptor {
    pub track: u8,
    pub sector: u8,
    pub side_one: bool,
    pub double_density: bool,
    /// Data address mark byte (`DAM_NORMAL`, `DAM_DELETED`, ...).
    pub dam: u8,
    /// Sector contents. The length is the sector size.
    pub data: Vec<u8>,
    /// False for a header slot that reserves space without holding a sector.
    pub in_use: bool,
    pub crc_error: bool,
    pub non_ibm: bool,
}

impl SectorDescriptor {
    /// An in-use, single-density, side-0 sector with a normal data mark.
    #[must_use]
    pub fn new(track: u8, sector: u8, data: Vec<u8>) -> Self {
        Self {
            track,
            sector,
            side_one: false,
            double_density: false,
            dam: DAM_NORMAL,
            data,
            in_use: true,
            crc_error: false,
            non_ibm: false,
        }
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Sort key used by both encoders: track, then side, then sector.
    pub(crate) fn order_key(&self) -> (u8, bool, u8) {
        (self.track, self.side_one, self.sector)
    }
}

/// Sector size from the IBM size code (0-3 for 128-1024 bytes).
#[must_use]
pub const fn size_from_code(code: u8) -> usize {
    128 << (code & 3)
}

/// IBM size code for a sector size, if it has one.
#[must_use]
pub const fn code_from_size(size: usize) -> Option<u8> {
    match size {
        128 => Some(0),
        256 => Some(1),
        512 => Some(2),
        1024 => Some(3),
        _ => None,
    }
}

/// The sectors of one physical track on one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track<'a> {
    pub number: u8,
    pub side_one: bool,
    pub sectors: Vec<&'a SectorDescriptor>,
}

/// A whole disk: its sectors in image order plus the write-protect tab.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FloppyImage {
    sectors: Vec<SectorDescriptor>,
    write_protected: bool,
}

impl FloppyImage {
    #[must_use]
    pub fn new(sectors: Vec<SectorDescriptor>, write_protected: bool) -> Self {
        Self {
            sectors,
            write_protected,
        }
    }

    #[must_use]
    pub fn sectors(&self) -> &[SectorDescriptor] {
        &self.sectors
    }

    #[must_use]
    pub fn into_sectors(self) -> Vec<SectorDescriptor> {
        self.sectors
    }

    #[must_use]
    pub fn write_protected(&self) -> bool {
        self.write_protected
    }

    pub fn set_write_protected(&mut self, write_protected: bool) {
        self.write_protected = write_protected;
    }

    /// Highest track number present, if any sector is.
    #[must_use]
    pub fn max_track(&self) -> Option<u8> {
        self.sectors.iter().map(|s| s.track).max()
    }

    /// Sectors grouped into tracks, ordered by track then side. Within a
    /// track, sectors keep their image order.
    #[must_use]
    pub fn tracks(&self) -> Vec<Track<'_>> {
        let mut tracks: Vec<Track<'_>> = Vec::new();
        let mut sorted: Vec<&SectorDescriptor> = self.sectors.iter().collect();
        sorted.sort_by_key(|s| (s.track, s.side_one));
        for sector in sorted {
            match tracks.last_mut() {
                Some(t) if t.number == sector.track && t.side_one == sector.side_one => {
                    t.sectors.push(sector);
                }
                _ => tracks.push(Track {
                    number: sector.track,
                    side_one: sector.side_one,
                    sectors: vec![sector],
                }),
            }
        }
        tracks
    }

    fn find(&self, track: u8, side_one: bool, sector: u8) -> Option<usize> {
        self.sectors
            .iter()
            .position(|s| s.in_use && s.track == track && s.side_one == side_one && s.sector == sector)
    }

    /// Contents of an in-use sector.
    #[must_use]
    pub fn read_sector(&self, track: u8, side_one: bool, sector: u8) -> Option<&[u8]> {
        self.find(track, side_one, sector)
            .map(|i| self.sectors[i].data.as_slice())
    }

    /// Overwrite an in-use sector. Copies at most the sector's size and
    /// returns false if the sector does not exist.
    pub fn write_sector(&mut self, track: u8, side_one: bool, sector: u8, data: &[u8]) -> bool {
        let Some(i) = self.find(track, side_one, sector) else {
            return false;
        };
        let target = &mut self.sectors[i].data;
        let n = data.len().min(target.len());
        target[..n].copy_from_slice(&data[..n]);
        true
    }
}
