/// Export pipeline: re-encode a decoded image into any container

use crate::codec;
use crate::error::{Result, Warning};
use crate::format::ContainerFormat;
use crate::image::DiskImage;
use std::path::Path;

/// Encoded bytes plus the warnings raised while producing them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exported {
    /// Container file contents
    pub bytes: Vec<u8>,
    /// Non-fatal problems, e.g. [`Warning::LossyExport`]
    pub warnings: Vec<Warning>,
}

impl Exported {
    /// Check if the export reproduced every sector faithfully
    pub fn is_lossless(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Encode an image into `target`.
///
/// Unlike [`codec::encode`], invalid sectors do not abort the export: they are
/// written with their last-known contents (zeros for sectors never read) and
/// the result carries a [`Warning::LossyExport`].
pub fn export(image: &DiskImage, target: ContainerFormat) -> Result<Exported> {
    if image.invalid_sector_count() == 0 {
        return Ok(Exported {
            bytes: codec::encode(image, target)?,
            warnings: Vec::new(),
        });
    }

    let (clean, invalid_sectors) = image.sanitized();
    log::warn!(
        "Exporting {} with {} invalid sectors",
        target,
        invalid_sectors
    );
    Ok(Exported {
        bytes: codec::encode(&clean, target)?,
        warnings: vec![Warning::LossyExport { invalid_sectors }],
    })
}

/// Export an image to a file, returning the export warnings
pub fn export_image<P: AsRef<Path>>(
    image: &DiskImage,
    target: ContainerFormat,
    path: P,
) -> Result<Vec<Warning>> {
    let exported = export(image, target)?;
    crate::io::write_image_file(path, &exported.bytes)?;
    Ok(exported.warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiskError;
    use crate::format::Geometry;
    use crate::image::{SectorStatus, Track};

    fn damaged() -> DiskImage {
        let geometry = Geometry::agat_140k();
        let mut tracks: Vec<Track> = (0..35)
            .map(|c| Track::from_payloads(c, 0, vec![vec![0x5A; 256]; 16]))
            .collect();
        let mut bad = Track::new(9, 0, 16, 256);
        for s in 0..15 {
            bad.place(s, SectorStatus::Valid, vec![0x5A; 256]);
        }
        bad.place(15, SectorStatus::BadChecksum, vec![0x77; 256]);
        tracks[9] = bad;
        DiskImage::from_tracks(ContainerFormat::NibMfm, geometry, tracks).unwrap()
    }

    #[test]
    fn test_clean_export_has_no_warnings() {
        let image = DiskImage::create(Geometry::agat_140k()).unwrap();
        let exported = export(&image, ContainerFormat::NibMfm).unwrap();
        assert!(exported.is_lossless());
        assert_eq!(exported.bytes, codec::encode(&image, ContainerFormat::NibMfm).unwrap());
    }

    #[test]
    fn test_lossy_export_keeps_last_known_data() {
        let image = damaged();
        assert!(matches!(
            codec::encode(&image, ContainerFormat::Raw),
            Err(DiskError::CorruptTrack { track: 9 })
        ));

        let exported = export(&image, ContainerFormat::Raw).unwrap();
        assert_eq!(
            exported.warnings,
            vec![Warning::LossyExport { invalid_sectors: 1 }]
        );
        let back = codec::decode(&exported.bytes, ContainerFormat::Raw, image.geometry()).unwrap();
        assert_eq!(back.read_sector(9, 0, 15).unwrap(), &[0x77; 256][..]);
        // The source image is left untouched
        assert_eq!(image.invalid_sector_count(), 1);
    }

    #[test]
    fn test_export_image_writes_file() {
        let image = damaged();
        let path = std::env::temp_dir().join(format!("dskc-export-{}.nic", std::process::id()));
        let warnings = export_image(&image, ContainerFormat::NicMfm, &path).unwrap();
        let len = std::fs::metadata(&path).unwrap().len();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(warnings.len(), 1);
        assert_eq!(len as usize, crate::format::NIC_IMAGE_SIZE);
    }
}
