/// Disk image data structures

/// Image builder for creating blank images
pub mod builder;
/// Sector definition and status
pub mod sector;
/// Track definition
pub mod track;

pub use builder::DiskImageBuilder;
pub use sector::{Sector, SectorId, SectorStatus};
pub use track::{Placement, Track};

use crate::detect::{self, OpenOptions};
use crate::error::{DiskError, Result, Warning};
use crate::filesystem::FilesystemKind;
use crate::format::{ContainerFormat, Geometry, DEFAULT_VOLUME};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_IMAGE_ID: AtomicU64 = AtomicU64::new(1);

fn next_image_id() -> u64 {
    NEXT_IMAGE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A decoded disk: every track of its geometry plus the container it came from
///
/// Tracks are stored cylinder-major, head-minor and each track holds one slot
/// per physical sector number. Invalid sectors stay in place with their status
/// flagged so that sector addressing never shifts.
#[derive(Debug, Clone)]
pub struct DiskImage {
    /// Identifies the decode that produced this image
    pub(crate) id: u64,
    /// Container the image was decoded from
    pub(crate) format: ContainerFormat,
    /// Physical layout shared by every track
    pub(crate) geometry: Geometry,
    /// Tracks in index order
    pub(crate) tracks: Vec<Track>,
    /// Filesystem the drivers may parse
    pub(crate) filesystem: FilesystemKind,
    /// Volume number written to address fields
    pub(crate) volume: u8,
    /// Original filename if loaded from disk
    pub(crate) filename: Option<String>,
    /// Non-fatal problems met while decoding
    pub(crate) warnings: Vec<Warning>,
}

impl DiskImage {
    /// Open an image file, detecting container, geometry and filesystem
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &OpenOptions::default())
    }

    /// Open an image file with explicit hints
    ///
    /// An explicit geometry skips scoring entirely; only decoding is attempted.
    pub fn open_with<P: AsRef<Path>>(path: P, options: &OpenOptions) -> Result<Self> {
        let (bytes, ext_hint) = crate::io::read_image_file(&path)?;
        let mut image = detect::open_bytes(&bytes, options, ext_hint)?;
        image.filename = Some(path.as_ref().to_string_lossy().into_owned());
        Ok(image)
    }

    /// Decode an in-memory image
    pub fn from_bytes(bytes: &[u8], options: &OpenOptions) -> Result<Self> {
        detect::open_bytes(bytes, options, None)
    }

    /// Assemble an image from decoded tracks, checking them against the geometry
    pub fn from_tracks(
        format: ContainerFormat,
        geometry: Geometry,
        tracks: Vec<Track>,
    ) -> Result<Self> {
        let expected = geometry.track_count();
        if tracks.len() != expected {
            return Err(DiskError::InvalidTrack {
                track: tracks.len(),
                max: expected.saturating_sub(1),
            });
        }

        for (index, track) in tracks.iter().enumerate() {
            if (track.cylinder, track.head) != geometry.cylinder_head(index) {
                return Err(DiskError::InvalidTrack {
                    track: index,
                    max: expected.saturating_sub(1),
                });
            }
            if track.sector_count() != geometry.sectors_per_track as usize {
                return Err(DiskError::InvalidSector {
                    track: index,
                    sector: track.sector_count() as u8,
                });
            }
            if let Some(bad) = track
                .sectors()
                .iter()
                .find(|s| s.data().len() != geometry.sector_size as usize)
            {
                return Err(DiskError::InvalidSector {
                    track: index,
                    sector: bad.id.sector,
                });
            }
        }

        let mut image = Self {
            id: next_image_id(),
            format,
            geometry,
            tracks,
            filesystem: FilesystemKind::Unknown,
            volume: DEFAULT_VOLUME,
            filename: None,
            warnings: Vec::new(),
        };

        let invalid = image.invalid_sector_count();
        if invalid > 0 {
            log::warn!(
                "{}: {} of {} sectors invalid",
                format,
                invalid,
                geometry.total_sectors()
            );
            image.warnings.push(Warning::IncompleteSectorData {
                invalid,
                total: geometry.total_sectors(),
            });
        }
        Ok(image)
    }

    /// Create a blank, fully valid image with the given geometry
    pub fn create(geometry: Geometry) -> Result<Self> {
        DiskImageBuilder::new().geometry(geometry).build()
    }

    /// Create a new builder for constructing images
    pub fn builder() -> DiskImageBuilder {
        DiskImageBuilder::new()
    }

    /// Get the container format
    pub fn format(&self) -> ContainerFormat {
        self.format
    }

    /// Get the geometry
    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Get the bound filesystem
    pub fn filesystem(&self) -> FilesystemKind {
        self.filesystem
    }

    /// Get the volume number
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Get the original filename if loaded from disk
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Warnings collected while decoding
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Bind the filesystem drivers should use
    pub fn bind_filesystem(&mut self, kind: FilesystemKind) {
        self.filesystem = kind;
    }

    /// Builder-style variant of [`bind_filesystem`](Self::bind_filesystem)
    pub fn with_filesystem(mut self, kind: FilesystemKind) -> Self {
        self.filesystem = kind;
        self
    }

    /// Set the volume number used when encoding flux formats
    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
    }

    /// Get all tracks
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Get a track by index
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Get the number of tracks
    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Get a sector by track index and physical sector number
    pub fn sector(&self, track: usize, sector: u8) -> Result<&Sector> {
        let track_obj = self.tracks.get(track).ok_or(DiskError::InvalidTrack {
            track,
            max: self.tracks.len().saturating_sub(1),
        })?;
        track_obj
            .get_sector(sector)
            .ok_or(DiskError::InvalidSector { track, sector })
    }

    /// Read sector data by cylinder, head and physical sector number
    pub fn read_sector(&self, cylinder: u8, head: u8, sector: u8) -> Result<&[u8]> {
        self.check_head(cylinder, head)?;
        let index = self.geometry.track_index(cylinder, head);
        Ok(self.sector(index, sector)?.data())
    }

    /// Write sector data, marking the sector valid
    pub fn write_sector(&mut self, cylinder: u8, head: u8, sector: u8, data: &[u8]) -> Result<()> {
        self.check_head(cylinder, head)?;
        let index = self.geometry.track_index(cylinder, head);
        let size = self.geometry.sector_size as usize;
        let max = self.tracks.len().saturating_sub(1);

        let track_obj = self
            .tracks
            .get_mut(index)
            .ok_or(DiskError::InvalidTrack { track: index, max })?;
        let sector_obj = track_obj
            .get_sector_mut(sector)
            .ok_or(DiskError::InvalidSector {
                track: index,
                sector,
            })?;

        let mut padded = data[..data.len().min(size)].to_vec();
        padded.resize(size, 0);
        sector_obj.set_data(&padded);
        Ok(())
    }

    fn check_head(&self, cylinder: u8, head: u8) -> Result<()> {
        if head >= self.geometry.heads {
            return Err(DiskError::InvalidTrack {
                track: self.geometry.track_index(cylinder, head),
                max: self.tracks.len().saturating_sub(1),
            });
        }
        Ok(())
    }

    /// Total number of sector slots
    pub fn total_sectors(&self) -> usize {
        self.tracks.iter().map(|t| t.sector_count()).sum()
    }

    /// Number of valid sectors
    pub fn valid_sector_count(&self) -> usize {
        self.tracks.iter().map(|t| t.valid_count()).sum()
    }

    /// Number of missing or failed sectors
    pub fn invalid_sector_count(&self) -> usize {
        self.total_sectors() - self.valid_sector_count()
    }

    /// Fraction of sectors that passed validation (0.0 to 1.0)
    pub fn valid_fraction(&self) -> f64 {
        let total = self.total_sectors();
        if total == 0 {
            return 0.0;
        }
        self.valid_sector_count() as f64 / total as f64
    }

    /// Encode into a container format; fails if any sector is invalid
    pub fn to_bytes(&self, target: ContainerFormat) -> Result<Vec<u8>> {
        crate::codec::encode(self, target)
    }

    /// Export to a file, returning any warnings
    pub fn save<P: AsRef<Path>>(&self, target: ContainerFormat, path: P) -> Result<Vec<Warning>> {
        crate::export::export_image(self, target, path)
    }

    /// Copy of this image with every sector marked valid, plus how many were not
    pub(crate) fn sanitized(&self) -> (DiskImage, usize) {
        let mut copy = self.clone();
        let mut repaired = 0;
        for track in &mut copy.tracks {
            for s in 0..track.sector_count() as u8 {
                if let Some(sector) = track.get_sector_mut(s) {
                    if !sector.is_valid() {
                        sector.mark_valid();
                        repaired += 1;
                    }
                }
            }
        }
        (copy, repaired)
    }
}
