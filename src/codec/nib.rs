/// NIB and NIC nibble dumps
///
/// A NIB image stores each track as a fixed-length byte stream: 6656 GCR nibbles
/// or 6250 Agat MFM data bytes. A NIC image stores 16 GCR sectors per track, each
/// in its own 512-byte slot.

use super::assemble;
use crate::error::{DiskError, Result};
use crate::format::{
    ContainerFormat, Encoding, Geometry, NIB_AGAT_TRACK_SIZE, NIB_GCR_TRACK_SIZE, NIC_SECTOR_SIZE,
};
use crate::image::DiskImage;
use crate::track::{check_geometry, encode_track, RawTrack, TrackLayout};

/// Bytes per NIB track for an encoding
pub fn nib_track_size(encoding: Encoding) -> usize {
    match encoding {
        Encoding::Gcr62 => NIB_GCR_TRACK_SIZE,
        Encoding::AgatMfm => NIB_AGAT_TRACK_SIZE,
    }
}

fn nic_track_size(geometry: &Geometry) -> usize {
    geometry.sectors_per_track as usize * NIC_SECTOR_SIZE
}

fn require_gcr(geometry: &Geometry) -> Result<()> {
    if geometry.encoding != Encoding::Gcr62 {
        return Err(DiskError::unsupported("NIC images hold GCR tracks only"));
    }
    Ok(())
}

fn split_tracks(
    bytes: &[u8],
    format: ContainerFormat,
    geometry: &Geometry,
    track_size: usize,
) -> Result<DiskImage> {
    let expected = track_size * geometry.track_count();
    if bytes.len() != expected {
        return Err(DiskError::SizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    let raw = bytes
        .chunks_exact(track_size)
        .map(|chunk| Some(RawTrack::Bytes(chunk.to_vec())))
        .collect();
    assemble(format, geometry, raw)
}

/// Decode a NIB image
pub fn decode_nib(bytes: &[u8], geometry: &Geometry) -> Result<DiskImage> {
    check_geometry(geometry)?;
    split_tracks(
        bytes,
        ContainerFormat::NibMfm,
        geometry,
        nib_track_size(geometry.encoding),
    )
}

/// Decode a NIC image
pub fn decode_nic(bytes: &[u8], geometry: &Geometry) -> Result<DiskImage> {
    check_geometry(geometry)?;
    require_gcr(geometry)?;
    split_tracks(
        bytes,
        ContainerFormat::NicMfm,
        geometry,
        nic_track_size(geometry),
    )
}

fn join_tracks(image: &DiskImage, layout: TrackLayout) -> Result<Vec<u8>> {
    let geometry = image.geometry();
    check_geometry(geometry)?;
    let mut out = Vec::new();
    for (index, track) in image.tracks().iter().enumerate() {
        match encode_track(track, geometry, index, image.volume(), layout)? {
            RawTrack::Bytes(bytes) => out.extend_from_slice(&bytes),
            RawTrack::Cells(_) => {
                return Err(DiskError::unsupported("nibble layout produced cell data"))
            }
        }
    }
    Ok(out)
}

/// Encode an image as a NIB dump
pub fn encode_nib(image: &DiskImage) -> Result<Vec<u8>> {
    join_tracks(image, TrackLayout::Nib)
}

/// Encode an image as a NIC dump
pub fn encode_nic(image: &DiskImage) -> Result<Vec<u8>> {
    require_gcr(image.geometry())?;
    join_tracks(image, TrackLayout::Nic)
}
