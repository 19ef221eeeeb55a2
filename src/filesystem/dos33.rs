/// Apple DOS 3.3 filesystem implementation
///
/// The volume table of contents (VTOC) sits at track 17 sector 0 and points to
/// a chain of catalog sectors, each holding seven 35-byte file entries. Every
/// file is described by a chain of track/sector list (TSL) sectors holding up
/// to 122 data sector pointers each.

use crate::error::{DiskError, Result, Warning};
use crate::filesystem::{
    check_binding, check_entry, check_sector_size, high_bit_name, ChainWalk, DirectoryEntry,
    ExtractedFile, FileSystem, FileSystemInfo, FilesystemKind, Locator, LogicalSectors,
    FS_SECTOR_SIZE,
};
use crate::format::{Geometry, SectorSkew};
use crate::image::DiskImage;
use log::{debug, warn};
use std::marker::PhantomData;

/// Track holding the VTOC
pub const VTOC_TRACK: u8 = 17;
/// Sector holding the VTOC
pub const VTOC_SECTOR: u8 = 0;

const CATALOG_ENTRIES_OFFSET: usize = 0x0B;
const CATALOG_ENTRY_SIZE: usize = 35;
const CATALOG_ENTRIES_PER_SECTOR: usize = 7;
const TSL_PAIRS_OFFSET: usize = 0x0C;
const TSL_PAIRS: usize = 122;
const BITMAP_OFFSET: usize = 0x38;
const DELETED_TRACK: u8 = 0xFF;
const LOCKED_FLAG: u8 = 0x80;
/// Catalog chains longer than this add nothing to the probe score
const PROBE_FULL_CHAIN: usize = 15;

/// Volume table of contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vtoc {
    /// First catalog sector track
    pub catalog_track: u8,
    /// First catalog sector
    pub catalog_sector: u8,
    /// DOS release that formatted the disk
    pub version: u8,
    /// Volume number
    pub volume: u8,
    /// Track/sector pairs per TSL sector
    pub max_pairs: u8,
    /// Tracks per disk
    pub tracks: u8,
    /// Sectors per track
    pub sectors: u8,
    /// Bytes per sector
    pub bytes_per_sector: u16,
    /// Free sectors according to the allocation bitmap
    pub free_sectors: usize,
}

impl Vtoc {
    /// Parse a VTOC sector
    pub fn parse(data: &[u8]) -> Self {
        let tracks = data[0x34];
        let free_sectors = (0..tracks as usize)
            .map(|t| BITMAP_OFFSET + t * 4)
            .take_while(|&off| off + 2 <= data.len())
            .map(|off| (data[off].count_ones() + data[off + 1].count_ones()) as usize)
            .sum();
        Self {
            catalog_track: data[0x01],
            catalog_sector: data[0x02],
            version: data[0x03],
            volume: data[0x06],
            max_pairs: data[0x27],
            tracks,
            sectors: data[0x35],
            bytes_per_sector: u16::from_le_bytes([data[0x36], data[0x37]]),
            free_sectors,
        }
    }
}

/// Short label for a DOS 3.3 file type code
pub fn type_label(file_type: u8) -> &'static str {
    match file_type & !LOCKED_FLAG {
        0x00 => "T",
        0x01 => "I",
        0x02 => "A",
        0x04 => "B",
        0x08 => "S",
        0x10 => "R",
        0x20 => "AA",
        0x40 => "BB",
        _ => "?",
    }
}

fn skew_for(geometry: &Geometry) -> SectorSkew {
    if geometry.sectors_per_track == 16 {
        SectorSkew::Dos33
    } else {
        SectorSkew::Identity
    }
}

/// Next catalog or TSL sector; track 0 ends the chain
fn next_link(data: &[u8]) -> Option<(u8, u8)> {
    match (data[1], data[2]) {
        (0, _) => None,
        link => Some(link),
    }
}

/// DOS 3.3 filesystem implementation
pub struct Dos33FileSystem<'a> {
    image: &'a DiskImage,
    sectors: LogicalSectors<'a>,
    vtoc: Vtoc,
}

impl<'a> Dos33FileSystem<'a> {
    /// Get the parsed VTOC
    pub fn vtoc(&self) -> &Vtoc {
        &self.vtoc
    }

    fn parse_entry(&self, raw: &[u8]) -> Option<DirectoryEntry<'a>> {
        let tsl_track = raw[0];
        if tsl_track == 0 || tsl_track == DELETED_TRACK {
            return None;
        }
        let file_type = raw[2];
        let sectors = u16::from_le_bytes([raw[33], raw[34]]) as usize;
        Some(DirectoryEntry {
            name: high_bit_name(&raw[3..33]),
            file_type: file_type & !LOCKED_FLAG,
            type_label: type_label(file_type).to_string(),
            size: sectors * self.image.geometry().sector_size as usize,
            locked: file_type & LOCKED_FLAG != 0,
            sectors,
            locator: Locator::Dos33 {
                tsl_track,
                tsl_sector: raw[1],
            },
            kind: FilesystemKind::Dos33,
            image_id: self.image.id(),
            _image: PhantomData,
        })
    }
}

impl<'a> FileSystem<'a> for Dos33FileSystem<'a> {
    const KIND: FilesystemKind = FilesystemKind::Dos33;

    fn from_image(image: &'a DiskImage) -> Result<Self> {
        check_binding(image, Self::KIND)?;
        check_sector_size(image, Self::KIND)?;
        let sectors = LogicalSectors::new(image, skew_for(image.geometry()));
        let vtoc_data = sectors
            .read(VTOC_TRACK, VTOC_SECTOR)
            .ok_or_else(|| DiskError::catalog("VTOC at T17 S0 is unreadable"))?;
        let vtoc = Vtoc::parse(vtoc_data);
        if !sectors.in_range(vtoc.catalog_track, vtoc.catalog_sector) {
            return Err(DiskError::catalog(format!(
                "catalog pointer T{} S{} is out of range",
                vtoc.catalog_track, vtoc.catalog_sector
            )));
        }
        Ok(Self {
            image,
            sectors,
            vtoc,
        })
    }

    fn read_dir(&self) -> Result<Vec<DirectoryEntry<'a>>> {
        let mut entries = Vec::new();
        let mut walk = ChainWalk::new(
            self.sectors,
            (self.vtoc.catalog_track, self.vtoc.catalog_sector),
        );
        while let Some(((track, sector), data)) = walk.step(next_link) {
            debug!("Catalog sector T{} S{}", track, sector);
            for i in 0..CATALOG_ENTRIES_PER_SECTOR {
                let offset = CATALOG_ENTRIES_OFFSET + i * CATALOG_ENTRY_SIZE;
                if let Some(entry) = self.parse_entry(&data[offset..offset + CATALOG_ENTRY_SIZE]) {
                    entries.push(entry);
                }
            }
        }
        match walk.fault {
            Some(fault) => Err(DiskError::catalog(fault)),
            None => Ok(entries),
        }
    }

    fn read_file(&self, entry: &DirectoryEntry<'a>) -> Result<ExtractedFile> {
        check_entry(self.image, entry, Self::KIND)?;
        let Locator::Dos33 {
            tsl_track,
            tsl_sector,
        } = entry.locator
        else {
            return Err(DiskError::ForeignEntry(entry.name.clone()));
        };

        let size = self.image.geometry().sector_size as usize;
        let mut data = Vec::new();
        let mut holes = 0;
        let mut unreadable = 0;
        let mut broken = None;
        let mut walk = ChainWalk::new(self.sectors, (tsl_track, tsl_sector));

        'chain: while let Some((_, tsl)) = walk.step(next_link) {
            for pair in 0..TSL_PAIRS {
                let offset = TSL_PAIRS_OFFSET + pair * 2;
                let (track, sector) = (tsl[offset], tsl[offset + 1]);
                if track == 0 {
                    holes += 1;
                    continue;
                }
                // Holes only count when data follows them
                data.resize(data.len() + holes * size, 0);
                holes = 0;

                match self.sectors.get(track, sector) {
                    Some(s) if s.is_valid() => data.extend_from_slice(s.data()),
                    Some(_) => {
                        warn!("{}: data sector T{} S{} unreadable", entry.name, track, sector);
                        unreadable += 1;
                        data.resize(data.len() + size, 0);
                    }
                    None => {
                        broken = Some(format!(
                            "data pointer T{} S{} is out of range",
                            track, sector
                        ));
                        break 'chain;
                    }
                }
            }
        }

        let mut warnings = Vec::new();
        if let Some(reason) = broken.or(walk.fault) {
            warn!("{}: {}", entry.name, reason);
            warnings.push(Warning::Truncated {
                name: entry.name.clone(),
                recovered: data.len(),
                reason,
            });
        }
        if unreadable > 0 {
            warnings.push(Warning::UnreadableData {
                name: entry.name.clone(),
                sectors: unreadable,
            });
        }
        Ok(ExtractedFile { data, warnings })
    }

    fn info(&self) -> Result<FileSystemInfo> {
        Ok(FileSystemInfo {
            kind: Self::KIND,
            label: None,
            volume: self.vtoc.volume,
            catalog: (self.vtoc.catalog_track, self.vtoc.catalog_sector),
            total_sectors: self.vtoc.tracks as usize * self.vtoc.sectors as usize,
            free_sectors: Some(self.vtoc.free_sectors),
            sector_size: self.vtoc.bytes_per_sector as usize,
            file_count: self.read_dir()?.len(),
        })
    }

    /// Half the strength for a sane VTOC, the rest scaled by how far the
    /// catalog chain can be followed
    fn probe(image: &DiskImage) -> f64 {
        let geometry = image.geometry();
        if geometry.sectors_per_track != 16 || geometry.sector_size as usize != FS_SECTOR_SIZE {
            return 0.0;
        }
        let sectors = LogicalSectors::new(image, SectorSkew::Dos33);
        let Some(data) = sectors.read(VTOC_TRACK, VTOC_SECTOR) else {
            debug!("DOS 3.3: VTOC sector unreadable");
            return 0.0;
        };
        let vtoc = Vtoc::parse(data);
        if vtoc.version < 3 {
            debug!("DOS 3.3: VTOC wrong version {}", vtoc.version);
            return 0.0;
        }
        if !(1..=254).contains(&vtoc.volume) {
            debug!("DOS 3.3: volume {} out of range", vtoc.volume);
            return 0.0;
        }
        if vtoc.catalog_track != VTOC_TRACK || vtoc.catalog_sector != 15 {
            debug!(
                "DOS 3.3: catalog at T{} S{}",
                vtoc.catalog_track, vtoc.catalog_sector
            );
            return 0.0;
        }
        if vtoc.bytes_per_sector != 256
            || vtoc.sectors != 16
            || vtoc.tracks as usize != image.track_count()
        {
            debug!(
                "DOS 3.3: VTOC wrong bytes {}, sectors {}, tracks {}",
                vtoc.bytes_per_sector, vtoc.sectors, vtoc.tracks
            );
            return 0.0;
        }

        let mut walk = ChainWalk::new(sectors, (vtoc.catalog_track, vtoc.catalog_sector));
        let mut chain = 0;
        while chain < PROBE_FULL_CHAIN && walk.step(next_link).is_some() {
            chain += 1;
        }
        0.5 + 0.5 * chain as f64 / PROBE_FULL_CHAIN as f64
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Write a sector by DOS logical address
    pub(crate) fn put(image: &mut DiskImage, track: u8, sector: u8, data: &[u8]) {
        let physical = SectorSkew::Dos33.physical(sector, 16);
        image.write_sector(track, 0, physical, data).unwrap();
    }

    pub(crate) fn vtoc_sector(catalog: (u8, u8)) -> Vec<u8> {
        let mut vtoc = vec![0u8; 256];
        vtoc[0x01] = catalog.0;
        vtoc[0x02] = catalog.1;
        vtoc[0x03] = 3;
        vtoc[0x06] = 254;
        vtoc[0x27] = 122;
        vtoc[0x34] = 35;
        vtoc[0x35] = 16;
        vtoc[0x36] = 0x00;
        vtoc[0x37] = 0x01;
        // Tracks 18 and 19 fully free
        for t in [18usize, 19] {
            vtoc[0x38 + t * 4] = 0xFF;
            vtoc[0x38 + t * 4 + 1] = 0xFF;
        }
        vtoc
    }

    pub(crate) fn catalog_entry(
        sector: &mut [u8],
        slot: usize,
        tsl: (u8, u8),
        file_type: u8,
        name: &str,
        sectors: u16,
    ) {
        let e = CATALOG_ENTRIES_OFFSET + slot * CATALOG_ENTRY_SIZE;
        sector[e] = tsl.0;
        sector[e + 1] = tsl.1;
        sector[e + 2] = file_type;
        for i in 0..30 {
            sector[e + 3 + i] = name.as_bytes().get(i).copied().unwrap_or(b' ') | 0x80;
        }
        sector[e + 33..e + 35].copy_from_slice(&sectors.to_le_bytes());
    }

    /// A DOS 3.3 disk holding `HELLO` (3 data sectors) and a deleted file
    pub(crate) fn sample_disk() -> DiskImage {
        let mut image = DiskImage::create(Geometry::agat_140k())
            .unwrap()
            .with_filesystem(FilesystemKind::Dos33);
        put(&mut image, 17, 0, &vtoc_sector((17, 15)));

        let mut catalog = vec![0u8; 256];
        catalog[1] = 17;
        catalog[2] = 14;
        catalog_entry(&mut catalog, 0, (18, 0), 0x84, "HELLO", 4);
        catalog_entry(&mut catalog, 1, (DELETED_TRACK, 0), 0x04, "GONE", 2);
        put(&mut image, 17, 15, &catalog);

        let mut catalog2 = vec![0u8; 256];
        catalog2[1] = 17;
        catalog2[2] = 13;
        catalog_entry(&mut catalog2, 0, (20, 0), 0x00, "README", 2);
        put(&mut image, 17, 14, &catalog2);
        // Last catalog sector: T17 S13, all zero

        let mut tsl = vec![0u8; 256];
        for (i, (t, s)) in [(18u8, 1u8), (19, 5), (18, 2)].iter().enumerate() {
            tsl[0x0C + i * 2] = *t;
            tsl[0x0C + i * 2 + 1] = *s;
        }
        put(&mut image, 18, 0, &tsl);
        put(&mut image, 18, 1, &[0x11; 256]);
        put(&mut image, 19, 5, &[0x22; 256]);
        put(&mut image, 18, 2, &[0x33; 256]);

        let mut tsl2 = vec![0u8; 256];
        tsl2[0x0C] = 20;
        tsl2[0x0D] = 1;
        put(&mut image, 20, 0, &tsl2);
        put(&mut image, 20, 1, &[0xC1; 256]);
        image
    }

    #[test]
    fn test_vtoc_parse() {
        let vtoc = Vtoc::parse(&vtoc_sector((17, 15)));
        assert_eq!(vtoc.catalog_track, 17);
        assert_eq!(vtoc.catalog_sector, 15);
        assert_eq!(vtoc.volume, 254);
        assert_eq!(vtoc.bytes_per_sector, 256);
        assert_eq!(vtoc.free_sectors, 32);
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(type_label(0x00), "T");
        assert_eq!(type_label(0x84), "B");
        assert_eq!(type_label(0x40), "BB");
        assert_eq!(type_label(0x03), "?");
    }

    #[test]
    fn test_read_dir() {
        let image = sample_disk();
        let fs = Dos33FileSystem::from_image(&image).unwrap();
        let entries = fs.read_dir().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "HELLO");
        assert_eq!(entries[0].type_label, "B");
        assert!(entries[0].locked);
        assert_eq!(entries[0].sectors, 4);
        assert_eq!(entries[0].size, 1024);
        assert_eq!(entries[1].name, "README");
        assert!(!entries[1].locked);
    }

    #[test]
    fn test_read_file_in_chain_order() {
        let image = sample_disk();
        let fs = Dos33FileSystem::from_image(&image).unwrap();
        let hello = fs.find_file("hello").unwrap();
        let file = fs.read_file(&hello).unwrap();
        assert!(file.is_complete());
        assert_eq!(file.data.len(), 768);
        assert!(file.data[..256].iter().all(|&b| b == 0x11));
        assert!(file.data[256..512].iter().all(|&b| b == 0x22));
        assert!(file.data[512..].iter().all(|&b| b == 0x33));
    }

    #[test]
    fn test_interior_hole_zero_filled() {
        let mut image = sample_disk();
        let mut tsl = vec![0u8; 256];
        tsl[0x0C] = 18;
        tsl[0x0D] = 1;
        tsl[0x10] = 18;
        tsl[0x11] = 2;
        put(&mut image, 18, 0, &tsl);
        let fs = Dos33FileSystem::from_image(&image).unwrap();
        let file = fs.read_file(&fs.find_file("HELLO").unwrap()).unwrap();
        assert_eq!(file.data.len(), 768);
        assert!(file.data[256..512].iter().all(|&b| b == 0));
        assert!(file.data[512..].iter().all(|&b| b == 0x33));
    }

    #[test]
    fn test_broken_tsl_chain_truncates() {
        let mut image = sample_disk();
        let mut tsl = vec![0u8; 256];
        tsl[1] = 40; // next TSL off the disk
        tsl[0x0C] = 18;
        tsl[0x0D] = 1;
        put(&mut image, 18, 0, &tsl);
        let fs = Dos33FileSystem::from_image(&image).unwrap();
        let file = fs.read_file(&fs.find_file("HELLO").unwrap()).unwrap();
        assert_eq!(file.data.len(), 256);
        assert!(matches!(
            &file.warnings[..],
            [Warning::Truncated { recovered: 256, .. }]
        ));
    }

    #[test]
    fn test_catalog_cycle_is_corrupt() {
        let mut image = sample_disk();
        let mut catalog2 = vec![0u8; 256];
        catalog2[1] = 17;
        catalog2[2] = 15;
        put(&mut image, 17, 14, &catalog2);
        let fs = Dos33FileSystem::from_image(&image).unwrap();
        assert!(matches!(fs.read_dir(), Err(DiskError::CorruptCatalog(_))));
    }

    #[test]
    fn test_info() {
        let image = sample_disk();
        let info = Dos33FileSystem::from_image(&image).unwrap().info().unwrap();
        assert_eq!(info.volume, 254);
        assert_eq!(info.total_sectors, 560);
        assert_eq!(info.free_sectors, Some(32));
        assert_eq!(info.file_count, 2);
    }

    #[test]
    fn test_probe_strength_grows_with_catalog() {
        let image = sample_disk();
        let three = Dos33FileSystem::probe(&image);
        assert!((three - (0.5 + 0.5 * 3.0 / 15.0)).abs() < 1e-9);
        let blank = DiskImage::create(Geometry::agat_140k()).unwrap();
        assert_eq!(Dos33FileSystem::probe(&blank), 0.0);
    }

    #[test]
    fn test_rejects_other_binding() {
        let image = sample_disk().with_filesystem(FilesystemKind::SpriteOs);
        assert!(matches!(
            Dos33FileSystem::from_image(&image),
            Err(DiskError::FilesystemMismatch { .. })
        ));
    }
}
