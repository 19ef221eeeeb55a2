/// Container codec layer: bytes of each container format to a DiskImage and back

/// HxC HFE v1 images
pub mod hfe;
/// HxC MFM stream images
pub mod hxc_mfm;
/// NIB and NIC nibble dumps
pub mod nib;
/// Plain sector dumps (RAW, Agat 140K, Agat 840K)
pub mod raw;

use crate::error::{DiskError, Result};
use crate::format::{ContainerFormat, Geometry, DEFAULT_VOLUME};
use crate::image::{DiskImage, Track};
use crate::track::{decode_track, RawTrack};

/// Geometry a container fixes regardless of caller hints
pub fn fixed_geometry(format: ContainerFormat) -> Option<Geometry> {
    match format {
        ContainerFormat::Agat140k => Some(Geometry::agat_140k()),
        ContainerFormat::Agat840k => Some(Geometry::agat_840k()),
        _ => None,
    }
}

/// Decode container bytes using the given geometry.
///
/// Agat 140K and 840K dumps bind their own geometry; `geometry` is ignored for them.
/// Flux containers tolerate unreadable sectors and report them through
/// [`DiskImage::warnings`].
pub fn decode(bytes: &[u8], format: ContainerFormat, geometry: &Geometry) -> Result<DiskImage> {
    match format {
        ContainerFormat::Raw => raw::decode(bytes, format, *geometry),
        ContainerFormat::Agat140k | ContainerFormat::Agat840k => {
            let fixed = fixed_geometry(format).unwrap_or(*geometry);
            raw::decode(bytes, format, fixed)
        }
        ContainerFormat::HxcMfm => hxc_mfm::decode(bytes, geometry),
        ContainerFormat::HxcHfe => hfe::decode(bytes, geometry),
        ContainerFormat::NibMfm => nib::decode_nib(bytes, geometry),
        ContainerFormat::NicMfm => nib::decode_nic(bytes, geometry),
    }
}

/// Encode an image into a container format.
///
/// Every sector must be valid; the first track holding an invalid sector is
/// reported as [`DiskError::CorruptTrack`]. Use [`crate::export::export`] to
/// write damaged images.
pub fn encode(image: &DiskImage, target: ContainerFormat) -> Result<Vec<u8>> {
    if let Some(track) = image.tracks().iter().position(|t| !t.is_fully_valid()) {
        return Err(DiskError::CorruptTrack { track });
    }

    match target {
        ContainerFormat::Raw => Ok(raw::encode(image, image.geometry().skew)),
        ContainerFormat::Agat140k | ContainerFormat::Agat840k => {
            let fixed = fixed_geometry(target).unwrap_or(*image.geometry());
            let g = image.geometry();
            let same_shape = (g.cylinders, g.heads, g.sectors_per_track, g.sector_size)
                == (
                    fixed.cylinders,
                    fixed.heads,
                    fixed.sectors_per_track,
                    fixed.sector_size,
                );
            if !same_shape {
                return Err(DiskError::unsupported(format!(
                    "{} cannot hold a {} disk",
                    target, g
                )));
            }
            Ok(raw::encode(image, fixed.skew))
        }
        ContainerFormat::HxcMfm => hxc_mfm::encode(image),
        ContainerFormat::HxcHfe => hfe::encode(image),
        ContainerFormat::NibMfm => nib::encode_nib(image),
        ContainerFormat::NicMfm => nib::encode_nic(image),
    }
}

/// Decode raw tracks (indexed like the geometry; `None` for absent tracks)
/// into an image, carrying over the first volume number found
pub(crate) fn assemble(
    format: ContainerFormat,
    geometry: &Geometry,
    raw_tracks: Vec<Option<RawTrack>>,
) -> Result<DiskImage> {
    let mut volume = None;
    let tracks: Vec<Track> = raw_tracks
        .iter()
        .enumerate()
        .map(|(index, raw)| match raw {
            Some(raw) => {
                let decoded = decode_track(raw, geometry, index);
                if volume.is_none() {
                    volume = decoded.volume;
                }
                decoded.track
            }
            None => {
                let (c, h) = geometry.cylinder_head(index);
                log::debug!("{}: track {} absent from container", format, index);
                Track::new(c, h, geometry.sectors_per_track, geometry.sector_size as usize)
            }
        })
        .collect();

    let mut image = DiskImage::from_tracks(format, *geometry, tracks)?;
    image.volume = volume.unwrap_or(DEFAULT_VOLUME);
    Ok(image)
}

pub(crate) fn read_u16_le(bytes: &[u8], offset: usize) -> Result<u16> {
    bytes
        .get(offset..offset + 2)
        .map(|b| u16::from_le_bytes([b[0], b[1]]))
        .ok_or_else(|| DiskError::parse(offset, "unexpected end of file"))
}

pub(crate) fn read_u32_le(bytes: &[u8], offset: usize) -> Result<u32> {
    bytes
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| DiskError::parse(offset, "unexpected end of file"))
}

/// Round up to the next 512-byte block boundary
pub(crate) fn align_block(n: usize) -> usize {
    n.div_ceil(crate::format::HXC_BLOCK_SIZE) * crate::format::HXC_BLOCK_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::SectorStatus;

    fn patterned(geometry: Geometry) -> DiskImage {
        let mut image = DiskImage::create(geometry).unwrap();
        for index in 0..geometry.track_count() {
            let (c, h) = geometry.cylinder_head(index);
            for s in 0..geometry.sectors_per_track {
                let data: Vec<u8> = (0..256u32)
                    .map(|i| (i as u8) ^ (index as u8).wrapping_mul(3) ^ s)
                    .collect();
                image.write_sector(c, h, s, &data).unwrap();
            }
        }
        image
    }

    #[test]
    fn test_encode_rejects_invalid_sector() {
        let geometry = Geometry::agat_140k();
        let mut image = patterned(geometry);
        image.tracks[7] = Track::new(7, 0, 16, 256);
        image.tracks[7].place(0, SectorStatus::Valid, vec![0; 256]);
        assert!(matches!(
            encode(&image, ContainerFormat::Raw),
            Err(DiskError::CorruptTrack { track: 7 })
        ));
    }

    #[test]
    fn test_every_format_preserves_sectors() {
        let gcr = patterned(Geometry::agat_140k());
        for format in [
            ContainerFormat::Raw,
            ContainerFormat::Agat140k,
            ContainerFormat::HxcMfm,
            ContainerFormat::HxcHfe,
            ContainerFormat::NibMfm,
            ContainerFormat::NicMfm,
        ] {
            let bytes = encode(&gcr, format).unwrap();
            let back = decode(&bytes, format, gcr.geometry()).unwrap();
            assert_eq!(back.tracks(), gcr.tracks(), "{}", format);
            assert_eq!(back.format(), format);
        }
    }

    #[test]
    fn test_agat_840k_formats_preserve_sectors() {
        let mfm = patterned(Geometry::agat_840k());
        for format in [
            ContainerFormat::Agat840k,
            ContainerFormat::HxcMfm,
            ContainerFormat::HxcHfe,
            ContainerFormat::NibMfm,
        ] {
            let bytes = encode(&mfm, format).unwrap();
            let back = decode(&bytes, format, mfm.geometry()).unwrap();
            assert_eq!(back.tracks(), mfm.tracks(), "{}", format);
        }
    }

    #[test]
    fn test_fixed_geometry_shape_check() {
        let image = DiskImage::create(Geometry::agat_840k()).unwrap();
        assert!(matches!(
            encode(&image, ContainerFormat::Agat140k),
            Err(DiskError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            encode(&image, ContainerFormat::NicMfm),
            Err(DiskError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_volume_carried_through_flux() {
        let mut image = patterned(Geometry::agat_140k());
        image.set_volume(33);
        let bytes = encode(&image, ContainerFormat::NibMfm).unwrap();
        let back = decode(&bytes, ContainerFormat::NibMfm, image.geometry()).unwrap();
        assert_eq!(back.volume(), 33);
    }

    #[test]
    fn test_align_block() {
        assert_eq!(align_block(0), 0);
        assert_eq!(align_block(19 + 11 * 35), 512);
        assert_eq!(align_block(12_500), 12_800);
    }
}
