/// HxC HFE v1 images
///
/// A 512-byte header block is followed by the track lookup table (one
/// `u16 block offset, u16 byte length` pair per cylinder) and the track data.
/// Track data is stored in 512-byte blocks holding 256 bytes of side 0 then
/// 256 bytes of side 1, with cells in LSB-first order.

use super::{align_block, assemble, read_u16_le};
use crate::error::{DiskError, Result};
use crate::format::{
    ContainerFormat, Encoding, Geometry, FLOPPY_BITRATE_KBPS, FLOPPY_INTERFACE_MODE, FLOPPY_RPM,
    HFE_ENCODING_MFM, HFE_ENCODING_UNKNOWN, HFE_SIGNATURE, HXC_BLOCK_SIZE,
};
use crate::image::DiskImage;
use crate::track::{check_geometry, encode_track, BitBuffer, RawTrack, TrackLayout};
use log::debug;

const SIDE_CHUNK: usize = HXC_BLOCK_SIZE / 2;
const TRACK_LIST_BLOCK: u16 = 1;

/// Parsed HFE header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HfeHeader {
    /// Format revision, only 0 is read
    pub revision: u8,
    /// Number of cylinders
    pub tracks: u8,
    /// Number of sides
    pub sides: u8,
    /// Track encoding code
    pub encoding: u8,
    /// Bit rate in kbit/s
    pub bitrate: u16,
    /// Rotation speed
    pub rpm: u16,
    /// Floppy interface mode
    pub interface: u8,
    /// Block holding the track lookup table
    pub track_list_block: u16,
}

impl HfeHeader {
    /// Parse the header block
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if !bytes.starts_with(HFE_SIGNATURE) {
            return Err(DiskError::unsupported("missing HXCPICFE signature"));
        }
        if bytes.len() < HXC_BLOCK_SIZE {
            return Err(DiskError::parse(bytes.len(), "header block truncated"));
        }
        let header = Self {
            revision: bytes[8],
            tracks: bytes[9],
            sides: bytes[10],
            encoding: bytes[11],
            bitrate: read_u16_le(bytes, 12)?,
            rpm: read_u16_le(bytes, 14)?,
            interface: bytes[16],
            track_list_block: read_u16_le(bytes, 18)?,
        };
        if header.revision != 0 {
            return Err(DiskError::unsupported(format!(
                "HFE revision {} is not supported",
                header.revision
            )));
        }
        Ok(header)
    }

    fn to_block(self) -> Vec<u8> {
        let mut block = vec![0xFF; HXC_BLOCK_SIZE];
        block[..8].copy_from_slice(HFE_SIGNATURE);
        block[8] = self.revision;
        block[9] = self.tracks;
        block[10] = self.sides;
        block[11] = self.encoding;
        block[12..14].copy_from_slice(&self.bitrate.to_le_bytes());
        block[14..16].copy_from_slice(&self.rpm.to_le_bytes());
        block[16] = self.interface;
        // Reserved byte, always 1
        block[17] = 0x01;
        block[18..20].copy_from_slice(&self.track_list_block.to_le_bytes());
        block
    }
}

fn encoding_code(encoding: Encoding) -> u8 {
    match encoding {
        Encoding::AgatMfm => HFE_ENCODING_MFM,
        Encoding::Gcr62 => HFE_ENCODING_UNKNOWN,
    }
}

/// Pull one side's bytes out of interleaved track blocks
fn read_side(bytes: &[u8], start: usize, side_len: usize, side: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(side_len);
    let mut block = start;
    while out.len() < side_len {
        let take = (side_len - out.len()).min(SIDE_CHUNK);
        let from = block + side * SIDE_CHUNK;
        let chunk = bytes
            .get(from..from + take)
            .ok_or_else(|| DiskError::parse(from, "track data out of bounds"))?;
        out.extend_from_slice(chunk);
        block += HXC_BLOCK_SIZE;
    }
    Ok(out)
}

/// Decode an HFE image
pub fn decode(bytes: &[u8], geometry: &Geometry) -> Result<DiskImage> {
    check_geometry(geometry)?;
    let header = HfeHeader::parse(bytes)?;
    debug!(
        "HFE: {} tracks, {} sides, encoding {:#04x}",
        header.tracks, header.sides, header.encoding
    );

    let lut = header.track_list_block as usize * HXC_BLOCK_SIZE;
    let mut raw: Vec<Option<RawTrack>> = vec![None; geometry.track_count()];
    let cylinders = header.tracks.min(geometry.cylinders);
    let sides = header.sides.min(geometry.heads).min(2);

    for cylinder in 0..cylinders {
        let entry = lut + cylinder as usize * 4;
        let offset = read_u16_le(bytes, entry)? as usize * HXC_BLOCK_SIZE;
        let side_len = read_u16_le(bytes, entry + 2)? as usize / 2;
        for side in 0..sides {
            let data = read_side(bytes, offset, side_len, side as usize)?;
            raw[geometry.track_index(cylinder, side)] =
                Some(RawTrack::Cells(BitBuffer::from_lsb_bytes(&data)));
        }
    }

    assemble(ContainerFormat::HxcHfe, geometry, raw)
}

/// Encode an image as an HFE v1 file
pub fn encode(image: &DiskImage) -> Result<Vec<u8>> {
    let geometry = image.geometry();
    check_geometry(geometry)?;

    let mut sides: Vec<Vec<u8>> = Vec::with_capacity(image.track_count());
    for (index, track) in image.tracks().iter().enumerate() {
        match encode_track(track, geometry, index, image.volume(), TrackLayout::Cells)? {
            RawTrack::Cells(cells) => sides.push(cells.to_lsb_bytes()),
            RawTrack::Bytes(_) => {
                return Err(DiskError::unsupported("cell layout produced byte data"))
            }
        }
    }

    let header = HfeHeader {
        revision: 0,
        tracks: geometry.cylinders,
        sides: geometry.heads,
        encoding: encoding_code(geometry.encoding),
        bitrate: FLOPPY_BITRATE_KBPS,
        rpm: FLOPPY_RPM,
        interface: FLOPPY_INTERFACE_MODE,
        track_list_block: TRACK_LIST_BLOCK,
    };

    let mut out = header.to_block();
    let lut_start = out.len();
    let lut_len = align_block(geometry.cylinders as usize * 4);
    out.resize(lut_start + lut_len, 0xFF);

    let heads = geometry.heads as usize;
    for cylinder in 0..geometry.cylinders as usize {
        let side0 = &sides[cylinder * heads];
        let side1 = sides.get(cylinder * heads + 1).filter(|_| heads > 1);
        let side_len = side0.len();

        let block = out.len() / HXC_BLOCK_SIZE;
        let entry = lut_start + cylinder * 4;
        out[entry..entry + 2].copy_from_slice(&(block as u16).to_le_bytes());
        out[entry + 2..entry + 4].copy_from_slice(&((side_len * 2) as u16).to_le_bytes());

        for chunk in 0..side_len.div_ceil(SIDE_CHUNK) {
            let range = chunk * SIDE_CHUNK..((chunk + 1) * SIDE_CHUNK).min(side_len);
            let mut data = [0u8; HXC_BLOCK_SIZE];
            data[..range.len()].copy_from_slice(&side0[range.clone()]);
            if let Some(side1) = side1 {
                data[SIDE_CHUNK..SIDE_CHUNK + range.len()].copy_from_slice(&side1[range]);
            }
            out.extend_from_slice(&data);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_block() {
        let image = DiskImage::create(Geometry::agat_840k()).unwrap();
        let bytes = encode(&image).unwrap();
        let header = HfeHeader::parse(&bytes).unwrap();
        assert_eq!(header.tracks, 80);
        assert_eq!(header.sides, 2);
        assert_eq!(header.encoding, HFE_ENCODING_MFM);
        assert_eq!(header.bitrate, 250);
        assert_eq!(header.rpm, 300);
        assert_eq!(header.track_list_block, 1);
        assert!(bytes[20..512].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_lookup_table() {
        let image = DiskImage::create(Geometry::agat_140k()).unwrap();
        let bytes = encode(&image).unwrap();
        assert_eq!(bytes[11], HFE_ENCODING_UNKNOWN);
        // Track 0 starts at block 2, each side holds 12500 bytes
        assert_eq!(read_u16_le(&bytes, 512).unwrap(), 2);
        assert_eq!(read_u16_le(&bytes, 514).unwrap(), 25_000);
        assert_eq!(read_u16_le(&bytes, 516).unwrap(), 2 + 49);
        assert_eq!(bytes[512 + 35 * 4], 0xFF);
        assert_eq!(bytes.len(), 1024 + 35 * 49 * 512);
    }

    #[test]
    fn test_single_sided_zero_fills_side_one() {
        let image = DiskImage::create(Geometry::agat_140k()).unwrap();
        let bytes = encode(&image).unwrap();
        let first_track = 2 * HXC_BLOCK_SIZE;
        assert!(bytes[first_track + 256..first_track + 512]
            .iter()
            .all(|&b| b == 0));
        assert!(bytes[first_track..first_track + 256].iter().any(|&b| b != 0));
    }

    #[test]
    fn test_rejects_other_revisions() {
        let image = DiskImage::create(Geometry::agat_140k()).unwrap();
        let mut bytes = encode(&image).unwrap();
        bytes[8] = 3;
        assert!(matches!(
            decode(&bytes, image.geometry()),
            Err(DiskError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_truncated_track_data() {
        let image = DiskImage::create(Geometry::agat_140k()).unwrap();
        let mut bytes = encode(&image).unwrap();
        bytes.truncate(4096);
        assert!(matches!(
            decode(&bytes, image.geometry()),
            Err(DiskError::ParseError { .. })
        ));
    }
}
