/// Disk geometry descriptors and presets

use std::str::FromStr;

/// Logical to physical sector order used by DOS 3.3 on 16-sector disks
pub const DOS33_SKEW: [u8; 16] = [0, 13, 11, 9, 7, 5, 3, 1, 14, 12, 10, 8, 6, 4, 2, 15];

/// Logical to physical sector order used by ProDOS on 16-sector disks
pub const PRODOS_SKEW: [u8; 16] = [0, 2, 4, 6, 8, 10, 12, 14, 1, 3, 5, 7, 9, 11, 13, 15];

/// Track recording scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Apple II / Agat 6-and-2 group code recording
    Gcr62,
    /// Agat 840K modified frequency modulation with A4 sync marks
    AgatMfm,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Gcr62 => write!(f, "GCR 6&2"),
            Encoding::AgatMfm => write!(f, "Agat MFM"),
        }
    }
}

/// Mapping between a position inside a track and the physical sector number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectorSkew {
    /// Position equals physical sector
    Identity,
    /// DOS 3.3 interleave (16-sector tracks only)
    Dos33,
    /// ProDOS interleave (16-sector tracks only)
    ProDos,
}

impl SectorSkew {
    /// Physical sector stored at `position`
    pub fn physical(&self, position: u8, sectors_per_track: u8) -> u8 {
        match self.table(sectors_per_track) {
            Some(table) => table[position as usize & 0x0F],
            None => position,
        }
    }

    /// Position holding physical sector `physical`
    pub fn position(&self, physical: u8, sectors_per_track: u8) -> u8 {
        match self.table(sectors_per_track) {
            Some(table) => table
                .iter()
                .position(|&p| p == physical)
                .map(|p| p as u8)
                .unwrap_or(physical),
            None => physical,
        }
    }

    fn table(&self, sectors_per_track: u8) -> Option<&'static [u8; 16]> {
        if sectors_per_track != 16 {
            return None;
        }
        match self {
            SectorSkew::Identity => None,
            SectorSkew::Dos33 => Some(&DOS33_SKEW),
            SectorSkew::ProDos => Some(&PRODOS_SKEW),
        }
    }
}

/// Physical layout of a disk: everything needed to turn bytes into sectors and back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    /// Short human-readable name
    pub name: &'static str,
    /// Cylinders per side
    pub cylinders: u8,
    /// Number of heads (sides)
    pub heads: u8,
    /// Sectors per track
    pub sectors_per_track: u8,
    /// Sector size in bytes
    pub sector_size: u16,
    /// Track recording scheme
    pub encoding: Encoding,
    /// Sector order used by plain sector dumps
    pub skew: SectorSkew,
}

impl Geometry {
    /// Create a custom geometry with identity sector order
    pub fn new(
        cylinders: u8,
        heads: u8,
        sectors_per_track: u8,
        sector_size: u16,
        encoding: Encoding,
    ) -> Self {
        Self {
            name: "Custom",
            cylinders,
            heads,
            sectors_per_track,
            sector_size,
            encoding,
            skew: SectorSkew::Identity,
        }
    }

    /// Agat / Apple II 140K (35 tracks, 16 sectors, 256 bytes, DOS order dumps)
    pub fn agat_140k() -> Self {
        Self {
            name: "Agat/Apple 140K",
            cylinders: 35,
            heads: 1,
            sectors_per_track: 16,
            sector_size: 256,
            encoding: Encoding::Gcr62,
            skew: SectorSkew::Dos33,
        }
    }

    /// Apple II 140K with ProDOS ordered sector dumps
    pub fn apple_140k_prodos() -> Self {
        Self {
            name: "Apple 140K (ProDOS order)",
            skew: SectorSkew::ProDos,
            ..Self::agat_140k()
        }
    }

    /// Agat 840K (80 cylinders, 2 sides, 21 sectors, 256 bytes)
    pub fn agat_840k() -> Self {
        Self {
            name: "Agat 840K",
            cylinders: 80,
            heads: 2,
            sectors_per_track: 21,
            sector_size: 256,
            encoding: Encoding::AgatMfm,
            skew: SectorSkew::Identity,
        }
    }

    /// All presets, most common first
    pub fn presets() -> [Geometry; 3] {
        [
            Self::agat_140k(),
            Self::apple_140k_prodos(),
            Self::agat_840k(),
        ]
    }

    /// Set the sector order used by plain dumps
    pub fn with_skew(mut self, skew: SectorSkew) -> Self {
        self.skew = skew;
        self
    }

    /// Number of tracks across all sides
    pub fn track_count(&self) -> usize {
        self.cylinders as usize * self.heads as usize
    }

    /// Number of sectors on the disk
    pub fn total_sectors(&self) -> usize {
        self.track_count() * self.sectors_per_track as usize
    }

    /// Bytes per track of sector data
    pub fn track_capacity(&self) -> usize {
        self.sectors_per_track as usize * self.sector_size as usize
    }

    /// Total capacity in bytes
    pub fn total_capacity(&self) -> usize {
        self.track_count() * self.track_capacity()
    }

    /// Total capacity in kilobytes
    pub fn total_capacity_kb(&self) -> usize {
        self.total_capacity() / 1024
    }

    /// Track index for a cylinder and head
    pub fn track_index(&self, cylinder: u8, head: u8) -> usize {
        cylinder as usize * self.heads as usize + head as usize
    }

    /// Cylinder and head for a track index
    pub fn cylinder_head(&self, index: usize) -> (u8, u8) {
        let heads = self.heads.max(1) as usize;
        ((index / heads) as u8, (index % heads) as u8)
    }
}

impl std::fmt::Display for Geometry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}x{}x{}x{}, {})",
            self.name,
            self.cylinders,
            self.heads,
            self.sectors_per_track,
            self.sector_size,
            self.encoding
        )
    }
}

impl FromStr for Geometry {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "140" | "140k" | "agat140" | "agat140k" | "dos" => Ok(Self::agat_140k()),
            "prodos" | "po" | "apple140po" => Ok(Self::apple_140k_prodos()),
            "840" | "840k" | "agat840" | "agat840k" => Ok(Self::agat_840k()),
            other => Err(format!("unknown disk type '{}'", other)),
        }
    }
}
