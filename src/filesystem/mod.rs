/// Filesystem implementations

/// Apple DOS 3.3
pub mod dos33;
/// Agat Sprite OS
pub mod sprite;

pub use dos33::Dos33FileSystem;
pub use sprite::SpriteOsFileSystem;

use crate::error::{DiskError, Result, Warning};
use crate::format::SectorSkew;
use crate::image::{DiskImage, Sector};
use crate::view::ViewMode;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::str::FromStr;

/// Filesystem a disk image carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilesystemKind {
    /// Apple DOS 3.3
    Dos33,
    /// Agat Sprite OS
    SpriteOs,
    /// Sectors readable but no filesystem recognised
    Unknown,
}

impl FilesystemKind {
    /// Every kind, in probe order
    pub const ALL: [FilesystemKind; 3] = [
        FilesystemKind::Dos33,
        FilesystemKind::SpriteOs,
        FilesystemKind::Unknown,
    ];

    /// Get a human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            FilesystemKind::Dos33 => "DOS 3.3",
            FilesystemKind::SpriteOs => "Sprite OS",
            FilesystemKind::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for FilesystemKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for FilesystemKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "dos" | "dos33" | "dos3.3" => Ok(FilesystemKind::Dos33),
            "sprite" | "spriteos" | "sprite-os" => Ok(FilesystemKind::SpriteOs),
            "unknown" | "none" | "raw" => Ok(FilesystemKind::Unknown),
            other => Err(format!("unknown filesystem '{}'", other)),
        }
    }
}

/// Where a driver finds a file's sector list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// First track/sector list sector
    Dos33 {
        /// Track of the first list sector
        tsl_track: u8,
        /// Sector of the first list sector
        tsl_sector: u8,
    },
    /// First index sector and recorded byte length
    SpriteOs {
        /// Track of the first index sector
        index_track: u8,
        /// Sector of the first index sector
        index_sector: u8,
        /// File length in bytes
        length: usize,
    },
}

/// One listed file.
///
/// Entries borrow the image they were listed from; the locator is only
/// meaningful to the driver and image that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry<'a> {
    /// File name with padding removed
    pub name: String,
    /// Filesystem-specific type code
    pub file_type: u8,
    /// Short type label (e.g. `T`, `B`)
    pub type_label: String,
    /// Size in bytes
    pub size: usize,
    /// Locked / write-protected
    pub locked: bool,
    /// Sectors allocated, as recorded in the directory
    pub sectors: usize,
    pub(crate) locator: Locator,
    pub(crate) kind: FilesystemKind,
    pub(crate) image_id: u64,
    pub(crate) _image: PhantomData<&'a DiskImage>,
}

impl DirectoryEntry<'_> {
    /// Opaque reference used by the owning driver
    pub fn locator(&self) -> Locator {
        self.locator
    }

    /// Filesystem that listed this entry
    pub fn kind(&self) -> FilesystemKind {
        self.kind
    }

    /// View mode that suits the file type
    pub fn preferred_view(&self) -> ViewMode {
        match (self.kind, self.type_label.as_str()) {
            (FilesystemKind::Dos33, "T") => ViewMode::Text,
            _ => ViewMode::Binary,
        }
    }
}

/// Bytes extracted from a file, plus what went wrong while collecting them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedFile {
    /// File contents
    pub data: Vec<u8>,
    /// Partial-recovery warnings
    pub warnings: Vec<Warning>,
}

impl ExtractedFile {
    /// Check if the whole file was recovered
    pub fn is_complete(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Filesystem information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSystemInfo {
    /// Filesystem type
    pub kind: FilesystemKind,
    /// Volume name, if the filesystem records one
    pub label: Option<String>,
    /// Volume number
    pub volume: u8,
    /// First directory sector (track, sector)
    pub catalog: (u8, u8),
    /// Sectors addressable by the filesystem
    pub total_sectors: usize,
    /// Free sectors, when an allocation map exists
    pub free_sectors: Option<usize>,
    /// Sector size in bytes
    pub sector_size: usize,
    /// Number of listed files
    pub file_count: usize,
}

impl std::fmt::Display for FileSystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} filesystem", self.kind)?;
        if let Some(label) = &self.label {
            writeln!(f, "  Label: {}", label)?;
        }
        writeln!(f, "  Volume: {}", self.volume)?;
        writeln!(
            f,
            "  Catalog: T{} S{}",
            self.catalog.0, self.catalog.1
        )?;
        writeln!(f, "  Files: {}", self.file_count)?;
        writeln!(
            f,
            "  Total: {} sectors ({} KB)",
            self.total_sectors,
            self.total_sectors * self.sector_size / 1024
        )?;
        if let Some(free) = self.free_sectors {
            writeln!(
                f,
                "  Free: {} sectors ({} KB)",
                free,
                free * self.sector_size / 1024
            )?;
        }
        Ok(())
    }
}

/// Read-only filesystem driver over a decoded image
pub trait FileSystem<'a>: Sized {
    /// Filesystem this driver parses
    const KIND: FilesystemKind;

    /// Mount the filesystem; the image must be bound to [`Self::KIND`]
    fn from_image(image: &'a DiskImage) -> Result<Self>;

    /// List directory entries, skipping deleted ones
    fn read_dir(&self) -> Result<Vec<DirectoryEntry<'a>>>;

    /// Read a file listed by this driver
    fn read_file(&self, entry: &DirectoryEntry<'a>) -> Result<ExtractedFile>;

    /// Get filesystem information
    fn info(&self) -> Result<FileSystemInfo>;

    /// Signature strength (0.0 to 1.0) of this filesystem on an image,
    /// regardless of the filesystem bound to it
    fn probe(image: &DiskImage) -> f64;

    /// Find a file by name, ignoring case
    fn find_file(&self, name: &str) -> Result<DirectoryEntry<'a>> {
        let wanted = name.to_uppercase();
        self.read_dir()?
            .into_iter()
            .find(|e| e.name.to_uppercase() == wanted)
            .ok_or_else(|| DiskError::FileNotFound(name.to_string()))
    }
}

/// List the files of whichever filesystem is bound to the image
pub fn list_files(image: &DiskImage) -> Result<Vec<DirectoryEntry<'_>>> {
    match image.filesystem() {
        FilesystemKind::Dos33 => Dos33FileSystem::from_image(image)?.read_dir(),
        FilesystemKind::SpriteOs => SpriteOsFileSystem::from_image(image)?.read_dir(),
        FilesystemKind::Unknown => Err(DiskError::UnknownFilesystem),
    }
}

/// Extract a file listed from this image
pub fn extract<'a>(image: &'a DiskImage, entry: &DirectoryEntry<'a>) -> Result<ExtractedFile> {
    match entry.kind {
        FilesystemKind::Dos33 => Dos33FileSystem::from_image(image)?.read_file(entry),
        FilesystemKind::SpriteOs => SpriteOsFileSystem::from_image(image)?.read_file(entry),
        FilesystemKind::Unknown => Err(DiskError::UnknownFilesystem),
    }
}

/// Find a file by name on the bound filesystem
pub fn find_file<'a>(image: &'a DiskImage, name: &str) -> Result<DirectoryEntry<'a>> {
    match image.filesystem() {
        FilesystemKind::Dos33 => Dos33FileSystem::from_image(image)?.find_file(name),
        FilesystemKind::SpriteOs => SpriteOsFileSystem::from_image(image)?.find_file(name),
        FilesystemKind::Unknown => Err(DiskError::UnknownFilesystem),
    }
}

/// Describe the bound filesystem
pub fn info(image: &DiskImage) -> Result<FileSystemInfo> {
    match image.filesystem() {
        FilesystemKind::Dos33 => Dos33FileSystem::from_image(image)?.info(),
        FilesystemKind::SpriteOs => SpriteOsFileSystem::from_image(image)?.info(),
        FilesystemKind::Unknown => Err(DiskError::UnknownFilesystem),
    }
}

/// Signature strength of `kind` on the image; `Unknown` always probes 0
pub fn probe(image: &DiskImage, kind: FilesystemKind) -> f64 {
    match kind {
        FilesystemKind::Dos33 => Dos33FileSystem::probe(image),
        FilesystemKind::SpriteOs => SpriteOsFileSystem::probe(image),
        FilesystemKind::Unknown => 0.0,
    }
}

/// Fail unless the image is bound to `kind`
pub(crate) fn check_binding(image: &DiskImage, kind: FilesystemKind) -> Result<()> {
    if image.filesystem() != kind {
        return Err(DiskError::mismatch(kind, image.filesystem()));
    }
    Ok(())
}

/// Sector size both filesystems are laid out for
pub(crate) const FS_SECTOR_SIZE: usize = 256;

/// Fail unless the image's sectors are the size the drivers parse
pub(crate) fn check_sector_size(image: &DiskImage, kind: FilesystemKind) -> Result<()> {
    let size = image.geometry().sector_size as usize;
    if size != FS_SECTOR_SIZE {
        return Err(DiskError::unsupported(format!(
            "{} needs {}-byte sectors, image has {}",
            kind, FS_SECTOR_SIZE, size
        )));
    }
    Ok(())
}

/// Fail unless the entry was listed from this image by `kind`
pub(crate) fn check_entry(
    image: &DiskImage,
    entry: &DirectoryEntry<'_>,
    kind: FilesystemKind,
) -> Result<()> {
    if entry.image_id != image.id() || entry.kind != kind {
        return Err(DiskError::ForeignEntry(entry.name.clone()));
    }
    Ok(())
}

/// Sector access by filesystem (logical) track and sector numbers
#[derive(Debug, Clone, Copy)]
pub(crate) struct LogicalSectors<'a> {
    image: &'a DiskImage,
    skew: SectorSkew,
}

impl<'a> LogicalSectors<'a> {
    pub(crate) fn new(image: &'a DiskImage, skew: SectorSkew) -> Self {
        Self { image, skew }
    }

    pub(crate) fn tracks(&self) -> usize {
        self.image.track_count()
    }

    pub(crate) fn sectors_per_track(&self) -> u8 {
        self.image.geometry().sectors_per_track
    }

    /// Check that a track/sector pair addresses the disk
    pub(crate) fn in_range(&self, track: u8, sector: u8) -> bool {
        (track as usize) < self.tracks() && sector < self.sectors_per_track()
    }

    /// The sector at a logical address, `None` if out of range
    pub(crate) fn get(&self, track: u8, sector: u8) -> Option<&'a Sector> {
        if !self.in_range(track, sector) {
            return None;
        }
        let physical = self.skew.physical(sector, self.sectors_per_track());
        self.image.sector(track as usize, physical).ok()
    }

    /// Data of a valid sector, `None` if out of range or unreadable
    pub(crate) fn read(&self, track: u8, sector: u8) -> Option<&'a [u8]> {
        self.get(track, sector)
            .filter(|s| s.is_valid())
            .map(|s| s.data())
    }
}

/// Follow a linked sector chain with a cycle guard.
///
/// `next` returns the following link of a sector's data, or `None` at the end.
/// The walk stops with a description of the fault on a cycle, an out-of-range
/// link or an unreadable sector; links gathered so far are kept.
pub(crate) struct ChainWalk<'a> {
    sectors: LogicalSectors<'a>,
    visited: HashSet<(u8, u8)>,
    next: Option<(u8, u8)>,
    pub(crate) fault: Option<String>,
}

impl<'a> ChainWalk<'a> {
    pub(crate) fn new(sectors: LogicalSectors<'a>, start: (u8, u8)) -> Self {
        Self {
            sectors,
            visited: HashSet::new(),
            next: Some(start),
            fault: None,
        }
    }

    /// Advance to the next sector; `link` extracts the following address
    pub(crate) fn step(
        &mut self,
        link: impl Fn(&[u8]) -> Option<(u8, u8)>,
    ) -> Option<((u8, u8), &'a [u8])> {
        let (track, sector) = self.next.take()?;
        if !self.sectors.in_range(track, sector) {
            self.fault = Some(format!("link to T{} S{} is out of range", track, sector));
            return None;
        }
        if !self.visited.insert((track, sector)) {
            self.fault = Some(format!("chain loops back to T{} S{}", track, sector));
            return None;
        }
        let Some(data) = self.sectors.read(track, sector) else {
            self.fault = Some(format!("T{} S{} is unreadable", track, sector));
            return None;
        };
        self.next = link(data);
        Some(((track, sector), data))
    }
}

/// Decode a name stored with the high bit set, trimming padding
pub(crate) fn high_bit_name(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| match b & 0x7F {
            c @ 0x20..=0x7E => c as char,
            _ => '?',
        })
        .collect::<String>()
        .trim_end()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::Geometry;

    #[test]
    fn test_kind_parse_and_display() {
        assert_eq!("DOS33".parse(), Ok(FilesystemKind::Dos33));
        assert_eq!("sprite".parse(), Ok(FilesystemKind::SpriteOs));
        assert!("prodos".parse::<FilesystemKind>().is_err());
        assert_eq!(FilesystemKind::SpriteOs.to_string(), "Sprite OS");
    }

    #[test]
    fn test_unbound_image_has_no_files() {
        let image = DiskImage::create(Geometry::agat_140k()).unwrap();
        assert!(matches!(
            list_files(&image),
            Err(DiskError::UnknownFilesystem)
        ));
        assert_eq!(probe(&image, FilesystemKind::Unknown), 0.0);
    }

    #[test]
    fn test_small_sectors_are_rejected() {
        let geometry = Geometry::new(35, 1, 16, 128, crate::format::Encoding::Gcr62);
        for kind in [FilesystemKind::Dos33, FilesystemKind::SpriteOs] {
            let image = DiskImage::create(geometry).unwrap().with_filesystem(kind);
            assert!(matches!(
                list_files(&image),
                Err(DiskError::UnsupportedFormat(_))
            ));
            assert_eq!(probe(&image, kind), 0.0);
        }
    }

    #[test]
    fn test_high_bit_name() {
        let mut raw = b"HELLO".iter().map(|b| b | 0x80).collect::<Vec<_>>();
        raw.extend([0xA0; 25]);
        assert_eq!(high_bit_name(&raw), "HELLO");
    }

    #[test]
    fn test_chain_walk_stops_on_cycle() {
        let mut image = DiskImage::create(Geometry::agat_840k()).unwrap();
        image.write_sector(0, 0, 1, &[0, 0, 2]).unwrap();
        image.write_sector(0, 0, 2, &[0, 0, 1]).unwrap();
        let sectors = LogicalSectors::new(&image, SectorSkew::Identity);
        let mut walk = ChainWalk::new(sectors, (0, 1));
        let mut seen = Vec::new();
        while let Some((addr, _)) = walk.step(|d| Some((d[1], d[2]))) {
            seen.push(addr);
        }
        assert_eq!(seen, vec![(0, 1), (0, 2)]);
        assert!(walk.fault.unwrap().contains("loops"));
    }

    #[test]
    fn test_logical_sectors_apply_skew() {
        let mut image = DiskImage::create(Geometry::agat_140k()).unwrap();
        // Physical sector 13 holds DOS logical sector 1
        image.write_sector(17, 0, 13, &[0x42]).unwrap();
        let sectors = LogicalSectors::new(&image, SectorSkew::Dos33);
        assert_eq!(sectors.read(17, 1).unwrap()[0], 0x42);
        assert!(sectors.read(35, 0).is_none());
        assert!(sectors.read(0, 16).is_none());
    }
}
