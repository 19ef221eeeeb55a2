/// Agat Sprite OS filesystem implementation
///
/// Sprite OS addresses the 840K disk as 160 logical tracks (cylinder * 2 + head)
/// of 21 sectors. A descriptor at track 0 sector 1 points to a chain of
/// directory sectors; each file is located through a chain of index sectors.

use crate::error::{DiskError, Result, Warning};
use crate::filesystem::{
    check_binding, check_entry, check_sector_size, ChainWalk, DirectoryEntry, ExtractedFile,
    FileSystem, FileSystemInfo, FilesystemKind, Locator, LogicalSectors, FS_SECTOR_SIZE,
};
use crate::format::SectorSkew;
use crate::image::DiskImage;
use log::{debug, warn};
use std::marker::PhantomData;

/// Descriptor location
pub const DESCRIPTOR_TRACK: u8 = 0;
/// Descriptor location
pub const DESCRIPTOR_SECTOR: u8 = 1;

const DIR_ENTRIES_OFFSET: usize = 16;
const DIR_ENTRY_SIZE: usize = 30;
const DIR_ENTRIES_PER_SECTOR: usize = 8;
const INDEX_PAIRS_OFFSET: usize = 4;
const INDEX_PAIRS: usize = 126;

const STATUS_ACTIVE: u8 = 1;
const STATUS_DELETED: u8 = 2;
const PROTECTED_FLAG: u8 = 0x01;

const SPRITE_TRACKS: u8 = 160;
const SPRITE_SECTORS: u8 = 21;

/// Volume descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    /// Format version
    pub version: u8,
    /// First directory sector track
    pub dir_track: u8,
    /// First directory sector
    pub dir_sector: u8,
    /// Volume number
    pub volume: u8,
    /// Logical tracks
    pub tracks: u8,
    /// Sectors per track
    pub sectors: u8,
    /// Bytes per sector
    pub bytes_per_sector: u16,
    /// Volume name
    pub name: String,
}

impl Descriptor {
    /// Parse a descriptor sector
    pub fn parse(data: &[u8]) -> Self {
        Self {
            version: data[0],
            dir_track: data[1],
            dir_sector: data[2],
            volume: data[3],
            tracks: data[4],
            sectors: data[5],
            bytes_per_sector: u16::from_le_bytes([data[6], data[7]]),
            name: String::from_utf8_lossy(&data[8..40])
                .trim_end_matches(['\0', ' '])
                .to_string(),
        }
    }

    fn is_plausible(&self) -> bool {
        self.tracks == SPRITE_TRACKS
            && self.sectors == SPRITE_SECTORS
            && self.bytes_per_sector == 256
            && self.dir_track < SPRITE_TRACKS
            && self.dir_sector < SPRITE_SECTORS
    }
}

/// Next directory sector link at bytes 1-2; (0,0) ends the chain
fn dir_link(data: &[u8]) -> Option<(u8, u8)> {
    match (data[1], data[2]) {
        (0, 0) => None,
        link => Some(link),
    }
}

/// Next index sector link at bytes 0-1; (0,0) ends the chain
fn index_link(data: &[u8]) -> Option<(u8, u8)> {
    match (data[0], data[1]) {
        (0, 0) => None,
        link => Some(link),
    }
}

/// Sprite OS filesystem implementation
pub struct SpriteOsFileSystem<'a> {
    image: &'a DiskImage,
    sectors: LogicalSectors<'a>,
    descriptor: Descriptor,
}

impl<'a> SpriteOsFileSystem<'a> {
    /// Get the parsed descriptor
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    fn parse_entry(&self, raw: &[u8]) -> Option<DirectoryEntry<'a>> {
        match raw[0] {
            STATUS_ACTIVE => {}
            0 | STATUS_DELETED => return None,
            other => {
                debug!("Skipping directory entry with status {}", other);
                return None;
            }
        }
        let name = String::from_utf8_lossy(&raw[3..19])
            .trim_end_matches(['\0', ' '])
            .to_string();
        let length = u32::from_le_bytes([raw[19], raw[20], raw[21], 0]) as usize;
        Some(DirectoryEntry {
            name,
            file_type: raw[1],
            type_label: format!("{:02X}", raw[1]),
            size: length,
            locked: raw[2] & PROTECTED_FLAG != 0,
            sectors: u16::from_le_bytes([raw[24], raw[25]]) as usize,
            locator: Locator::SpriteOs {
                index_track: raw[22],
                index_sector: raw[23],
                length,
            },
            kind: FilesystemKind::SpriteOs,
            image_id: self.image.id(),
            _image: PhantomData,
        })
    }
}

impl<'a> FileSystem<'a> for SpriteOsFileSystem<'a> {
    const KIND: FilesystemKind = FilesystemKind::SpriteOs;

    fn from_image(image: &'a DiskImage) -> Result<Self> {
        check_binding(image, Self::KIND)?;
        check_sector_size(image, Self::KIND)?;
        let sectors = LogicalSectors::new(image, SectorSkew::Identity);
        let data = sectors
            .read(DESCRIPTOR_TRACK, DESCRIPTOR_SECTOR)
            .ok_or_else(|| DiskError::catalog("descriptor at T0 S1 is unreadable"))?;
        let descriptor = Descriptor::parse(data);
        if !sectors.in_range(descriptor.dir_track, descriptor.dir_sector) {
            return Err(DiskError::catalog(format!(
                "directory pointer T{} S{} is out of range",
                descriptor.dir_track, descriptor.dir_sector
            )));
        }
        Ok(Self {
            image,
            sectors,
            descriptor,
        })
    }

    fn read_dir(&self) -> Result<Vec<DirectoryEntry<'a>>> {
        let mut entries = Vec::new();
        let start = (self.descriptor.dir_track, self.descriptor.dir_sector);
        let mut walk = ChainWalk::new(self.sectors, start);
        while let Some((_, data)) = walk.step(dir_link) {
            for i in 0..DIR_ENTRIES_PER_SECTOR {
                let offset = DIR_ENTRIES_OFFSET + i * DIR_ENTRY_SIZE;
                if let Some(entry) = self.parse_entry(&data[offset..offset + DIR_ENTRY_SIZE]) {
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
        let Locator::SpriteOs {
            index_track,
            index_sector,
            length,
        } = entry.locator
        else {
            return Err(DiskError::ForeignEntry(entry.name.clone()));
        };

        let size = self.image.geometry().sector_size as usize;
        let mut data = Vec::with_capacity(length);
        let mut unreadable = 0;
        let mut broken = None;
        let mut walk = ChainWalk::new(self.sectors, (index_track, index_sector));

        'chain: while let Some((_, index)) = walk.step(index_link) {
            for pair in 0..INDEX_PAIRS {
                if data.len() >= length {
                    break 'chain;
                }
                let offset = INDEX_PAIRS_OFFSET + pair * 2;
                let (track, sector) = (index[offset], index[offset + 1]);
                if (track, sector) == (0, 0) {
                    break;
                }
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
        data.truncate(length);

        let mut warnings = Vec::new();
        let fault = broken.or(walk.fault);
        if data.len() < length || fault.is_some() {
            let reason = fault.unwrap_or_else(|| "index list ended early".to_string());
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
        let label = Some(self.descriptor.name.clone()).filter(|n| !n.is_empty());
        Ok(FileSystemInfo {
            kind: Self::KIND,
            label,
            volume: self.descriptor.volume,
            catalog: (self.descriptor.dir_track, self.descriptor.dir_sector),
            total_sectors: self.descriptor.tracks as usize * self.descriptor.sectors as usize,
            free_sectors: None,
            sector_size: self.descriptor.bytes_per_sector as usize,
            file_count: self.read_dir()?.len(),
        })
    }

    fn probe(image: &DiskImage) -> f64 {
        let geometry = image.geometry();
        if geometry.sectors_per_track != SPRITE_SECTORS
            || geometry.sector_size as usize != FS_SECTOR_SIZE
            || image.track_count() != SPRITE_TRACKS as usize
        {
            return 0.0;
        }
        let sectors = LogicalSectors::new(image, SectorSkew::Identity);
        let Some(data) = sectors.read(DESCRIPTOR_TRACK, DESCRIPTOR_SECTOR) else {
            debug!("Sprite OS: descriptor unreadable");
            return 0.0;
        };
        let descriptor = Descriptor::parse(data);
        if !descriptor.is_plausible() {
            debug!("Sprite OS: implausible descriptor {:?}", descriptor);
            return 0.0;
        }

        let mut walk = ChainWalk::new(sectors, (descriptor.dir_track, descriptor.dir_sector));
        while walk.step(dir_link).is_some() {}
        if walk.fault.is_some() {
            0.6
        } else {
            1.0
        }
    }
}
