/// Plain sector dumps: tracks in index order, sectors in the geometry's raw order

use crate::error::{DiskError, Result};
use crate::format::{ContainerFormat, Geometry, SectorSkew};
use crate::image::{DiskImage, Track};

/// Decode a sector dump whose length must equal the geometry's capacity
pub fn decode(bytes: &[u8], format: ContainerFormat, geometry: Geometry) -> Result<DiskImage> {
    let expected = geometry.total_capacity();
    if bytes.len() != expected {
        return Err(DiskError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }

    let spt = geometry.sectors_per_track;
    let size = geometry.sector_size as usize;
    let tracks = bytes
        .chunks_exact(geometry.track_capacity())
        .enumerate()
        .map(|(index, chunk)| {
            let (cylinder, head) = geometry.cylinder_head(index);
            let mut payloads = vec![Vec::new(); spt as usize];
            for (pos, data) in chunk.chunks_exact(size).enumerate() {
                let physical = geometry.skew.physical(pos as u8, spt) as usize;
                payloads[physical] = data.to_vec();
            }
            Track::from_payloads(cylinder, head, payloads)
        })
        .collect();

    DiskImage::from_tracks(format, geometry, tracks)
}

/// Lay every sector out in `skew` order.
///
/// Callers check validity first; sector contents are written as held.
pub fn encode(image: &DiskImage, skew: SectorSkew) -> Vec<u8> {
    let geometry = image.geometry();
    let spt = geometry.sectors_per_track;
    let mut out = Vec::with_capacity(geometry.total_capacity());
    for track in image.tracks() {
        for pos in 0..spt {
            let physical = skew.physical(pos, spt);
            match track.get_sector(physical) {
                Some(sector) => out.extend_from_slice(sector.data()),
                None => out.resize(out.len() + geometry.sector_size as usize, 0),
            }
        }
    }
    out
}
