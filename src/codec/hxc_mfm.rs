/// HxC MFM stream images
///
/// Layout (little-endian):
/// - header: signature "HXCMFM\0", u16 track count, u8 side count, u16 rpm,
///   u16 bitrate (kbit/s), u8 interface type, u32 track list offset
/// - track list: per (track, side), u16 track, u8 side, u32 size, u32 offset
/// - track data: MSB-first cells, each track starting on a 512-byte boundary

use super::{align_block, assemble, read_u16_le, read_u32_le};
use crate::error::{DiskError, Result};
use crate::format::{
    ContainerFormat, Geometry, FLOPPY_BITRATE_KBPS, FLOPPY_INTERFACE_MODE, FLOPPY_RPM,
    HXC_MFM_HEADER_SIZE, HXC_MFM_SIGNATURE, HXC_MFM_TRACK_ENTRY_SIZE,
};
use crate::image::DiskImage;
use crate::track::{check_geometry, encode_track, BitBuffer, RawTrack, TrackLayout};
use log::debug;

/// Parsed file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HxcMfmHeader {
    /// Tracks per side
    pub tracks: u16,
    /// Number of sides
    pub sides: u8,
    /// Rotation speed
    pub rpm: u16,
    /// Bit rate in kbit/s
    pub bitrate: u16,
    /// Floppy interface type
    pub interface: u8,
    /// Offset of the track list
    pub track_list_offset: u32,
}

impl HxcMfmHeader {
    /// Parse the header at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(HXC_MFM_SIGNATURE) {
            return Err(DiskError::unsupported("missing HXCMFM signature"));
        }
        if bytes.len() < HXC_MFM_HEADER_SIZE {
            return Err(DiskError::parse(bytes.len(), "header truncated"));
        }
        Ok(Self {
            tracks: read_u16_le(bytes, 7)?,
            sides: bytes[9],
            rpm: read_u16_le(bytes, 10)?,
            bitrate: read_u16_le(bytes, 12)?,
            interface: bytes[14],
            track_list_offset: read_u32_le(bytes, 15)?,
        })
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(HXC_MFM_SIGNATURE);
        out.extend_from_slice(&self.tracks.to_le_bytes());
        out.push(self.sides);
        out.extend_from_slice(&self.rpm.to_le_bytes());
        out.extend_from_slice(&self.bitrate.to_le_bytes());
        out.push(self.interface);
        out.extend_from_slice(&self.track_list_offset.to_le_bytes());
    }
}

/// Decode an HxC MFM image.
///
/// Track list entries outside the geometry are skipped; geometry tracks
/// absent from the file decode as all-missing.
pub fn decode(bytes: &[u8], geometry: &Geometry) -> Result<DiskImage> {
    check_geometry(geometry)?;
    let header = HxcMfmHeader::parse(bytes)?;
    debug!(
        "HxC MFM: {} tracks, {} sides, {} kbit/s",
        header.tracks, header.sides, header.bitrate
    );

    let mut raw: Vec<Option<RawTrack>> = vec![None; geometry.track_count()];
    let entries = header.tracks as usize * header.sides as usize;
    for n in 0..entries {
        let entry = header.track_list_offset as usize + n * HXC_MFM_TRACK_ENTRY_SIZE;
        if entry + HXC_MFM_TRACK_ENTRY_SIZE > bytes.len() {
            return Err(DiskError::parse(entry, "track list truncated"));
        }
        let track = read_u16_le(bytes, entry)?;
        let side = bytes[entry + 2];
        let size = read_u32_le(bytes, entry + 3)? as usize;
        let offset = read_u32_le(bytes, entry + 7)? as usize;

        let data = offset
            .checked_add(size)
            .and_then(|end| bytes.get(offset..end))
            .ok_or_else(|| DiskError::parse(offset, "track data out of bounds"))?;

        if track >= geometry.cylinders as u16 || side >= geometry.heads {
            debug!("Skipping track {} side {} outside geometry", track, side);
            continue;
        }
        let index = geometry.track_index(track as u8, side);
        raw[index] = Some(RawTrack::Cells(BitBuffer::from_bytes(data.to_vec())));
    }

    assemble(ContainerFormat::HxcMfm, geometry, raw)
}

/// Encode an image as an HxC MFM file
pub fn encode(image: &DiskImage) -> Result<Vec<u8>> {
    let geometry = image.geometry();
    check_geometry(geometry)?;

    let mut tracks = Vec::with_capacity(image.track_count());
    for (index, track) in image.tracks().iter().enumerate() {
        match encode_track(track, geometry, index, image.volume(), TrackLayout::Cells)? {
            RawTrack::Cells(cells) => tracks.push(cells.into_bytes()),
            RawTrack::Bytes(_) => {
                return Err(DiskError::unsupported("cell layout produced byte data"))
            }
        }
    }

    let header = HxcMfmHeader {
        tracks: geometry.cylinders as u16,
        sides: geometry.heads,
        rpm: FLOPPY_RPM,
        bitrate: FLOPPY_BITRATE_KBPS,
        interface: FLOPPY_INTERFACE_MODE,
        track_list_offset: HXC_MFM_HEADER_SIZE as u32,
    };
    let list_end = HXC_MFM_HEADER_SIZE + tracks.len() * HXC_MFM_TRACK_ENTRY_SIZE;

    let mut out = Vec::new();
    header.write(&mut out);

    let mut offset = align_block(list_end);
    for (index, data) in tracks.iter().enumerate() {
        let (cylinder, head) = geometry.cylinder_head(index);
        out.extend_from_slice(&(cylinder as u16).to_le_bytes());
        out.push(head);
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(offset as u32).to_le_bytes());
        offset += align_block(data.len());
    }

    for data in &tracks {
        out.resize(align_block(out.len()), 0);
        out.extend_from_slice(data);
    }
    out.resize(align_block(out.len()), 0);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::CELL_TRACK_BYTES;

    #[test]
    fn test_header_layout() {
        let image = DiskImage::create(Geometry::agat_140k()).unwrap();
        let bytes = encode(&image).unwrap();
        let header = HxcMfmHeader::parse(&bytes).unwrap();
        assert_eq!(header.tracks, 35);
        assert_eq!(header.sides, 1);
        assert_eq!(header.rpm, 300);
        assert_eq!(header.bitrate, 250);
        assert_eq!(header.interface, 7);
        assert_eq!(header.track_list_offset, 19);

        // First entry: track 0 side 0, 12500 bytes at the first block boundary
        assert_eq!(read_u16_le(&bytes, 19).unwrap(), 0);
        assert_eq!(bytes[21], 0);
        assert_eq!(read_u32_le(&bytes, 22).unwrap() as usize, CELL_TRACK_BYTES);
        assert_eq!(read_u32_le(&bytes, 26).unwrap(), 512);
        // Second entry follows at the next block-aligned offset
        assert_eq!(read_u32_le(&bytes, 30 + 7).unwrap(), 512 + 12_800);
        assert_eq!(bytes.len(), 512 + 35 * 12_800);
    }

    #[test]
    fn test_double_sided_entry_order() {
        let image = DiskImage::create(Geometry::agat_840k()).unwrap();
        let bytes = encode(&image).unwrap();
        let second = 19 + 11;
        assert_eq!(read_u16_le(&bytes, second).unwrap(), 0);
        assert_eq!(bytes[second + 2], 1);
        let third = 19 + 22;
        assert_eq!(read_u16_le(&bytes, third).unwrap(), 1);
        assert_eq!(bytes[third + 2], 0);
    }

    #[test]
    fn test_missing_signature() {
        assert!(matches!(
            decode(b"NOTHXC", &Geometry::agat_140k()),
            Err(DiskError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_out_of_bounds_track() {
        let image = DiskImage::create(Geometry::agat_140k()).unwrap();
        let mut bytes = encode(&image).unwrap();
        bytes.truncate(600);
        assert!(matches!(
            decode(&bytes, image.geometry()),
            Err(DiskError::ParseError { .. })
        ));
    }

    #[test]
    fn test_fewer_tracks_than_geometry() {
        let mut header = Vec::new();
        HxcMfmHeader {
            tracks: 0,
            sides: 1,
            rpm: 300,
            bitrate: 250,
            interface: 7,
            track_list_offset: 19,
        }
        .write(&mut header);
        let image = decode(&header, &Geometry::agat_140k()).unwrap();
        assert_eq!(image.valid_sector_count(), 0);
        assert_eq!(image.track_count(), 35);
    }
}
