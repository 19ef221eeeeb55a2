/// Builder for creating blank disk images

use crate::error::Result;
use crate::filesystem::FilesystemKind;
use crate::format::{ContainerFormat, Encoding, Geometry, DEFAULT_VOLUME};
use crate::image::{DiskImage, Track};

/// Builder for constructing blank, fully valid images
pub struct DiskImageBuilder {
    format: ContainerFormat,
    geometry: Geometry,
    volume: u8,
    filler_byte: u8,
    filesystem: FilesystemKind,
}

impl DiskImageBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            format: ContainerFormat::Raw,
            geometry: Geometry::agat_140k(),
            volume: DEFAULT_VOLUME,
            filler_byte: 0x00,
            filesystem: FilesystemKind::Unknown,
        }
    }

    /// Set the container format recorded on the image
    pub fn format(mut self, format: ContainerFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the geometry
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    /// Set the number of cylinders
    pub fn cylinders(mut self, cylinders: u8) -> Self {
        self.geometry.cylinders = cylinders;
        self
    }

    /// Set the number of heads
    pub fn heads(mut self, heads: u8) -> Self {
        self.geometry.heads = heads;
        self
    }

    /// Set sectors per track
    pub fn sectors_per_track(mut self, sectors_per_track: u8) -> Self {
        self.geometry.sectors_per_track = sectors_per_track;
        self
    }

    /// Set the track encoding
    pub fn encoding(mut self, encoding: Encoding) -> Self {
        self.geometry.encoding = encoding;
        self
    }

    /// Set the volume number
    pub fn volume(mut self, volume: u8) -> Self {
        self.volume = volume;
        self
    }

    /// Set the byte every sector is filled with
    pub fn filler_byte(mut self, filler_byte: u8) -> Self {
        self.filler_byte = filler_byte;
        self
    }

    /// Bind a filesystem to the new image
    pub fn filesystem(mut self, filesystem: FilesystemKind) -> Self {
        self.filesystem = filesystem;
        self
    }

    /// Build the image with the specified configuration
    pub fn build(self) -> Result<DiskImage> {
        let geometry = self.geometry;
        let payload = vec![self.filler_byte; geometry.sector_size as usize];

        let tracks = (0..geometry.track_count())
            .map(|index| {
                let (cylinder, head) = geometry.cylinder_head(index);
                let payloads = vec![payload.clone(); geometry.sectors_per_track as usize];
                Track::from_payloads(cylinder, head, payloads)
            })
            .collect();

        let mut image = DiskImage::from_tracks(self.format, geometry, tracks)?;
        image.volume = self.volume;
        image.filesystem = self.filesystem;
        Ok(image)
    }
}

impl Default for DiskImageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
