/// Agat 840K MFM track coding
///
/// Each sector is recorded as
/// `AA x12, A4 95 6A, volume, track, sector, 5A, AA x8, A4 6A 95, data x256, checksum, 5A`
/// and every `A4` that opens a field is written with one clock cell removed.
/// The track field holds the logical track index (cylinder * 2 + head).

use crate::image::{SectorStatus, Track};
use crate::track::bits::{cell_word, mfm_byte_at, BitBuffer, MfmWriter};
use crate::track::gcr::mark_matches;
use log::debug;

/// Gap filler byte
pub const GAP_BYTE: u8 = 0xAA;
/// Byte opening every field
pub const SYNC_BYTE: u8 = 0xA4;
/// Address field mark
pub const ADDRESS_MARK: [u8; 3] = [0xA4, 0x95, 0x6A];
/// Data field mark
pub const DATA_MARK: [u8; 3] = [0xA4, 0x6A, 0x95];
/// Byte closing every field
pub const EPILOGUE: u8 = 0x5A;

/// Cell pattern of a sync `A4` (clock before data bit 3 removed)
pub const SYNC_CELLS: u16 = 0x4412;
const SYNC_MISSING_CLOCK: u8 = 0x08;

const GAP1: usize = 12;
const GAP2: usize = 8;
const SECTOR_SIZE: usize = 256;
const ADDRESS_OFFSET: usize = GAP1;
const DATA_OFFSET: usize = GAP1 + 7 + GAP2;
/// Bytes occupied by one sector including its leading gap
pub const SECTOR_BYTES: usize = DATA_OFFSET + 3 + SECTOR_SIZE + 2;
/// Bytes per track (6250 = 50000 data bits)
pub const TRACK_BYTES: usize = 6250;

const DATA_SEARCH_WINDOW: usize = 32;
const WRAP_BYTES: usize = 600;
const MAX_SEGMENT: usize = 300;

/// Sum the payload adding the carry back in before each byte
pub fn checksum(data: &[u8]) -> u8 {
    let mut sum: u16 = 0;
    for &b in data {
        if sum > 0xFF {
            sum = (sum + 1) & 0xFF;
        }
        sum += b as u16;
    }
    (sum & 0xFF) as u8
}

/// Encode a track as 6250 data bytes
pub fn encode_byte_track(track: &Track, volume: u8, index: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(TRACK_BYTES);
    for sector in track.sectors() {
        out.extend_from_slice(&[GAP_BYTE; GAP1]);
        out.extend_from_slice(&ADDRESS_MARK);
        out.extend_from_slice(&[volume, index as u8, sector.id.sector, EPILOGUE]);
        out.extend_from_slice(&[GAP_BYTE; GAP2]);
        out.extend_from_slice(&DATA_MARK);
        out.extend_from_slice(sector.data());
        out.push(checksum(sector.data()));
        out.push(EPILOGUE);
    }
    out.resize(TRACK_BYTES, GAP_BYTE);
    out
}

/// Encode a track as 100000 MFM cells
pub fn encode_cell_track(track: &Track, volume: u8, index: usize) -> BitBuffer {
    let bytes = encode_byte_track(track, volume, index);
    let sector_area = track.sector_count() * SECTOR_BYTES;
    let mut writer = MfmWriter::with_capacity(TRACK_BYTES * 16);

    for (pos, &b) in bytes.iter().enumerate() {
        let offset = pos % SECTOR_BYTES;
        if pos < sector_area && (offset == ADDRESS_OFFSET || offset == DATA_OFFSET) {
            writer.write_mark(b, SYNC_MISSING_CLOCK);
        } else {
            writer.write_byte(b);
        }
    }
    writer.finish(TRACK_BYTES * 16)
}

/// Decode a byte-level track (NIB) into `track`, returning the volume seen
pub fn decode_byte_track(bytes: &[u8], track: &mut Track) -> Option<u8> {
    let wrap = bytes.len().min(WRAP_BYTES);
    let mut stream = Vec::with_capacity(bytes.len() + wrap);
    stream.extend_from_slice(bytes);
    stream.extend_from_slice(&bytes[..wrap]);
    scan_bytes(&stream, bytes.len(), track)
}

/// Decode a cell track (HxC MFM or HFE) into `track`, returning the volume seen.
///
/// Sync marks are located by their missing clock, then the bytes following each
/// mark are read up to the next mark and handed to the byte-level parser.
pub fn decode_cell_track(cells: &BitBuffer, track: &mut Track) -> Option<u8> {
    let n = cells.len();
    if n < 16 {
        return None;
    }

    let mut syncs = Vec::new();
    let mut word = cell_word(cells, 0);
    for p in 0..n {
        if word == SYNC_CELLS {
            syncs.push(p);
        }
        word = (word << 1) | cells.get_wrapped(p + 16) as u16;
    }
    if syncs.is_empty() {
        debug!("No sync marks on track C{}:H{}", track.cylinder, track.head);
        return None;
    }

    let mut stream = Vec::with_capacity(n / 16);
    for (k, &start) in syncs.iter().enumerate() {
        let end = syncs.get(k + 1).copied().unwrap_or(syncs[0] + n);
        let count = ((end - start) / 16).clamp(1, MAX_SEGMENT);
        stream.extend((0..count).map(|b| mfm_byte_at(cells, start + b * 16)));
    }
    let len = stream.len();
    scan_bytes(&stream, len, track)
}

fn scan_bytes(stream: &[u8], limit: usize, track: &mut Track) -> Option<u8> {
    let mut volume = None;
    let mut i = 0;

    while i < limit && i + 7 <= stream.len() {
        if !mark_matches(&stream[i..i + 3], &ADDRESS_MARK) {
            i += 1;
            continue;
        }
        let (vol, sec) = (stream[i + 3], stream[i + 5]);
        if stream[i + 6] != EPILOGUE {
            debug!("Address field at byte {} has no epilogue", i);
            i += 3;
            continue;
        }
        volume.get_or_insert(vol);

        let search_from = i + 7;
        let search_to = (search_from + DATA_SEARCH_WINDOW).min(stream.len().saturating_sub(3));
        let data_mark =
            (search_from..search_to).find(|&j| mark_matches(&stream[j..j + 3], &DATA_MARK));

        match data_mark {
            Some(j) if j + 3 + SECTOR_SIZE + 1 <= stream.len() => {
                let start = j + 3;
                let data = stream[start..start + SECTOR_SIZE].to_vec();
                let status = if checksum(&data) == stream[start + SECTOR_SIZE] {
                    SectorStatus::Valid
                } else {
                    debug!("Sector {} data checksum mismatch", sec);
                    SectorStatus::BadChecksum
                };
                track.place(sec, status, data);
                i = start + SECTOR_SIZE + 1;
            }
            _ => {
                debug!("Sector {} has no data field", sec);
                i = search_from;
            }
        }
    }
    volume
}
