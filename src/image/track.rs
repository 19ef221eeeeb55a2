/// Track data structures

use crate::image::sector::{Sector, SectorId, SectorStatus};
use log::{debug, warn};

/// How a decoded sector was merged into its track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// First occurrence, stored
    Stored,
    /// Replaced an earlier invalid copy
    Replaced,
    /// A copy was already held; this one was dropped
    Duplicate,
    /// Sector number outside the track geometry
    OutOfRange,
}

/// A disk track holding every sector slot of the geometry, indexed by physical sector number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// Physical cylinder number
    pub cylinder: u8,
    /// Physical head number
    pub head: u8,
    sectors: Vec<Sector>,
}

impl Track {
    /// Create a track whose sectors are all missing
    pub fn new(cylinder: u8, head: u8, sectors_per_track: u8, sector_size: usize) -> Self {
        let sectors = (0..sectors_per_track)
            .map(|s| Sector::missing(SectorId::new(cylinder, head, s), sector_size))
            .collect();
        Self {
            cylinder,
            head,
            sectors,
        }
    }

    /// Create a track from valid sector payloads in physical order
    pub fn from_payloads(cylinder: u8, head: u8, payloads: Vec<Vec<u8>>) -> Self {
        let sectors = payloads
            .into_iter()
            .enumerate()
            .map(|(s, data)| Sector::new(SectorId::new(cylinder, head, s as u8), data))
            .collect();
        Self {
            cylinder,
            head,
            sectors,
        }
    }

    /// Merge a decoded sector into its slot.
    ///
    /// The first valid copy wins. A valid copy replaces an earlier bad one and a
    /// bad copy fills a slot that was still missing.
    pub fn place(&mut self, sector: u8, status: SectorStatus, data: Vec<u8>) -> Placement {
        let (cylinder, head) = (self.cylinder, self.head);
        let slot = match self.sectors.get_mut(sector as usize) {
            Some(slot) => slot,
            None => {
                debug!(
                    "Track C{}:H{}: sector number {} out of range",
                    cylinder, head, sector
                );
                return Placement::OutOfRange;
            }
        };

        match (slot.status, status) {
            (SectorStatus::Missing, _) => {
                *slot = Sector::with_status(slot.id, status, data);
                Placement::Stored
            }
            (SectorStatus::BadChecksum, SectorStatus::Valid) => {
                debug!("{}: valid copy replaces bad one", slot.id);
                *slot = Sector::with_status(slot.id, status, data);
                Placement::Replaced
            }
            (SectorStatus::Valid, _) => {
                warn!("{}: duplicate sector ignored", slot.id);
                Placement::Duplicate
            }
            _ => {
                debug!("{}: repeated bad copy ignored", slot.id);
                Placement::Duplicate
            }
        }
    }

    /// Get a reference to all sectors in physical order
    pub fn sectors(&self) -> &[Sector] {
        &self.sectors
    }

    /// Get a sector by its physical number
    pub fn get_sector(&self, sector: u8) -> Option<&Sector> {
        self.sectors.get(sector as usize)
    }

    /// Get a mutable reference to a sector by its physical number
    pub fn get_sector_mut(&mut self, sector: u8) -> Option<&mut Sector> {
        self.sectors.get_mut(sector as usize)
    }

    /// Get the number of sector slots in this track
    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    /// Number of sectors that passed validation
    pub fn valid_count(&self) -> usize {
        self.sectors.iter().filter(|s| s.is_valid()).count()
    }

    /// Number of sectors that are missing or failed validation
    pub fn invalid_count(&self) -> usize {
        self.sector_count() - self.valid_count()
    }

    /// Whether every sector passed validation
    pub fn is_fully_valid(&self) -> bool {
        self.sectors.iter().all(|s| s.is_valid())
    }
}
