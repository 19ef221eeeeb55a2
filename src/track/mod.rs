/// Track decoder: raw track data to validated sectors and back

/// Agat 840K MFM coding
pub mod agat_mfm;
/// Bit cell buffers and MFM cell coding
pub mod bits;
/// Apple II / Agat 6-and-2 GCR coding
pub mod gcr;

pub use bits::BitBuffer;

use crate::error::{DiskError, Result};
use crate::format::{Encoding, Geometry};
use crate::image::Track;
use log::debug;

/// One revolution of raw track data as stored by a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTrack {
    /// Bit cells including clock cells (HxC MFM, HFE)
    Cells(BitBuffer),
    /// Byte-framed stream (NIB, NIC)
    Bytes(Vec<u8>),
}

/// Byte layout used when encoding a byte-framed track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackLayout {
    /// Bit cells at 250 kbit/s
    Cells,
    /// Continuous nibble track
    Nib,
    /// One 512-byte slot per sector
    Nic,
}

/// Sectors recovered from one track plus the volume found in its address fields
#[derive(Debug, Clone)]
pub struct DecodedTrack {
    /// Every sector slot of the geometry, flagged by validity
    pub track: Track,
    /// Volume number of the first readable address field
    pub volume: Option<u8>,
}

/// Decode a raw track into sectors.
///
/// Never fails: unreadable sectors are left missing or flagged, and a track
/// with no valid sector at all is still returned.
pub fn decode_track(raw: &RawTrack, geometry: &Geometry, index: usize) -> DecodedTrack {
    let (cylinder, head) = geometry.cylinder_head(index);
    let mut track = Track::new(
        cylinder,
        head,
        geometry.sectors_per_track,
        geometry.sector_size as usize,
    );

    let volume = match (geometry.encoding, raw) {
        (Encoding::Gcr62, RawTrack::Cells(cells)) => gcr::decode_cell_track(cells, &mut track),
        (Encoding::Gcr62, RawTrack::Bytes(bytes)) => gcr::decode_nibble_track(bytes, &mut track),
        (Encoding::AgatMfm, RawTrack::Cells(cells)) => {
            agat_mfm::decode_cell_track(cells, &mut track)
        }
        (Encoding::AgatMfm, RawTrack::Bytes(bytes)) => {
            agat_mfm::decode_byte_track(bytes, &mut track)
        }
    };

    if track.valid_count() == 0 {
        debug!("Track {} yielded no valid sectors", index);
    }
    DecodedTrack { track, volume }
}

/// Encode a track's sectors into raw track data
pub fn encode_track(
    track: &Track,
    geometry: &Geometry,
    index: usize,
    volume: u8,
    layout: TrackLayout,
) -> Result<RawTrack> {
    match (geometry.encoding, layout) {
        (Encoding::Gcr62, TrackLayout::Cells) => {
            Ok(RawTrack::Cells(gcr::encode_cell_track(track, volume)))
        }
        (Encoding::Gcr62, TrackLayout::Nib) => {
            Ok(RawTrack::Bytes(gcr::encode_nib_track(track, volume)))
        }
        (Encoding::Gcr62, TrackLayout::Nic) => {
            Ok(RawTrack::Bytes(gcr::encode_nic_track(track, volume)))
        }
        (Encoding::AgatMfm, TrackLayout::Cells) => Ok(RawTrack::Cells(
            agat_mfm::encode_cell_track(track, volume, index),
        )),
        (Encoding::AgatMfm, TrackLayout::Nib) => Ok(RawTrack::Bytes(
            agat_mfm::encode_byte_track(track, volume, index),
        )),
        (Encoding::AgatMfm, TrackLayout::Nic) => Err(DiskError::unsupported(
            "NIC images hold GCR tracks only",
        )),
    }
}

/// Check that the track coder can represent this geometry
pub fn check_geometry(geometry: &Geometry) -> Result<()> {
    let supported = match geometry.encoding {
        Encoding::Gcr62 => geometry.sectors_per_track == 16,
        Encoding::AgatMfm => geometry.sectors_per_track <= 21,
    };
    if !supported || geometry.sector_size != 256 {
        return Err(DiskError::unsupported(format!(
            "{} cannot record {} sectors of {} bytes",
            geometry.encoding, geometry.sectors_per_track, geometry.sector_size
        )));
    }
    Ok(())
}
