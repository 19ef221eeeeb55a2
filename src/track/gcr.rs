/// Apple II / Agat 6-and-2 GCR track coding
///
/// Address fields carry volume, track, sector and their XOR in 4-and-4 form.
/// Data fields carry 342 six-bit values (86 auxiliary low-bit groups followed
/// by 256 high parts) XOR-chained through the write translate table.

use crate::image::{SectorStatus, Track};
use crate::track::bits::{bits_to_cells, cells_to_bits, BitBuffer};
use log::debug;

/// Disk nibbles for each six-bit value
pub const WRITE_TABLE: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6, 0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3,
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC, 0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3,
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE, 0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC,
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6, 0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

const INVALID_NIBBLE: u8 = 0xFF;

const fn build_read_table() -> [u8; 256] {
    let mut table = [INVALID_NIBBLE; 256];
    let mut i = 0;
    while i < WRITE_TABLE.len() {
        table[WRITE_TABLE[i] as usize] = i as u8;
        i += 1;
    }
    table
}

/// Six-bit value for each disk nibble (0xFF when not a valid nibble)
pub const READ_TABLE: [u8; 256] = build_read_table();

/// Address field prologue
pub const ADDRESS_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0x96];
/// Data field prologue
pub const DATA_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0xAD];
/// Field epilogue
pub const EPILOGUE: [u8; 3] = [0xDE, 0xAA, 0xEB];

/// Self-sync gap byte
pub const SYNC_BYTE: u8 = 0xFF;

const AUX_COUNT: usize = 86;
const DATA_NIBBLES: usize = 342;
/// Data field nibbles including the checksum nibble
pub const DATA_FIELD_NIBBLES: usize = DATA_NIBBLES + 1;
/// Bytes in a complete address field
pub const ADDRESS_FIELD_LEN: usize = 3 + 8 + 3;
/// Bytes in a complete data field
pub const DATA_FIELD_LEN: usize = 3 + DATA_FIELD_NIBBLES + 3;

const GAP1_NIB: usize = 512;
const GAP1_SYNC_GROUPS: usize = 17;
const GAP2: usize = 5;
const GAP3: usize = 16;
const NIC_LEAD_IN: usize = 22;
const NIC_SLOT: usize = 512;
const SECTORS: u8 = 16;
const SECTOR_SIZE: usize = 256;

/// GCR bits per track at 250 kbit/s and 300 rpm
pub const TRACK_BITS: usize = 50_000;

const DATA_SEARCH_WINDOW: usize = 48;
const WRAP_NIBBLES: usize = 512;
const WRAP_BITS: usize = WRAP_NIBBLES * 10;

/// Encode a value as two 4-and-4 nibbles (odd bits, then even bits)
pub fn encode_44(value: u8) -> [u8; 2] {
    [(value >> 1) | 0xAA, value | 0xAA]
}

/// Decode a 4-and-4 nibble pair
pub fn decode_44(odd: u8, even: u8) -> u8 {
    ((odd << 1) | 1) & even
}

fn swap_pair(bits: u8) -> u8 {
    ((bits & 1) << 1) | ((bits >> 1) & 1)
}

/// Build a complete address field
pub fn address_field(volume: u8, track: u8, sector: u8) -> [u8; ADDRESS_FIELD_LEN] {
    let mut field = [0u8; ADDRESS_FIELD_LEN];
    field[..3].copy_from_slice(&ADDRESS_PROLOGUE);
    for (i, value) in [volume, track, sector, volume ^ track ^ sector]
        .iter()
        .enumerate()
    {
        field[3 + i * 2..5 + i * 2].copy_from_slice(&encode_44(*value));
    }
    field[11..].copy_from_slice(&EPILOGUE);
    field
}

/// Translate a 256-byte payload into 343 disk nibbles
pub fn encode_62(data: &[u8]) -> Vec<u8> {
    let mut values = [0u8; DATA_NIBBLES];
    for i in 0..SECTOR_SIZE {
        let byte = data.get(i).copied().unwrap_or(0);
        values[AUX_COUNT + i] = byte >> 2;
        values[i % AUX_COUNT] |= swap_pair(byte & 3) << (2 * (i / AUX_COUNT));
    }

    let mut out = Vec::with_capacity(DATA_FIELD_NIBBLES);
    let mut prev = 0u8;
    for &v in &values {
        out.push(WRITE_TABLE[(v ^ prev) as usize]);
        prev = v;
    }
    out.push(WRITE_TABLE[prev as usize]);
    out
}

/// Translate 343 disk nibbles back into 256 bytes.
///
/// Returns the payload and whether every nibble was valid and the checksum matched.
pub fn decode_62(nibbles: &[u8]) -> (Vec<u8>, bool) {
    let mut values = [0u8; DATA_NIBBLES];
    let mut ok = nibbles.len() >= DATA_FIELD_NIBBLES;
    let mut prev = 0u8;

    for (i, slot) in values.iter_mut().enumerate() {
        let raw = READ_TABLE[nibbles.get(i).copied().unwrap_or(0) as usize];
        if raw == INVALID_NIBBLE {
            ok = false;
        }
        prev ^= raw & 0x3F;
        *slot = prev;
    }

    let check = READ_TABLE[nibbles.get(DATA_NIBBLES).copied().unwrap_or(0) as usize];
    if check != prev {
        ok = false;
    }

    let data = (0..SECTOR_SIZE)
        .map(|i| {
            let low = (values[i % AUX_COUNT] >> (2 * (i / AUX_COUNT))) & 3;
            (values[AUX_COUNT + i] << 2) | swap_pair(low)
        })
        .collect();
    (data, ok)
}

/// Build a complete data field
pub fn data_field(data: &[u8]) -> Vec<u8> {
    let mut field = Vec::with_capacity(DATA_FIELD_LEN);
    field.extend_from_slice(&DATA_PROLOGUE);
    field.extend(encode_62(data));
    field.extend_from_slice(&EPILOGUE);
    field
}

/// Mark comparison tolerant to one damaged byte; the final byte must match
pub fn mark_matches(window: &[u8], mark: &[u8; 3]) -> bool {
    window.len() >= 3
        && window[2] == mark[2]
        && window.iter().zip(mark).filter(|(a, b)| a == b).count() >= 2
}

/// Encode a track as a 6656-byte NIB track
pub fn encode_nib_track(track: &Track, volume: u8) -> Vec<u8> {
    let mut out = vec![SYNC_BYTE; GAP1_NIB];
    for sector in track.sectors() {
        out.extend_from_slice(&address_field(volume, track.cylinder, sector.id.sector));
        out.extend_from_slice(&[SYNC_BYTE; GAP2]);
        out.extend(data_field(sector.data()));
        out.extend_from_slice(&[SYNC_BYTE; GAP3]);
    }
    out
}

/// Encode a track as sixteen 512-byte NIC sector slots
pub fn encode_nic_track(track: &Track, volume: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(NIC_SLOT * SECTORS as usize);
    for sector in track.sectors() {
        let start = out.len();
        out.extend_from_slice(&[SYNC_BYTE; NIC_LEAD_IN]);
        out.extend_from_slice(&address_field(volume, track.cylinder, sector.id.sector));
        out.extend_from_slice(&[SYNC_BYTE; GAP2]);
        out.extend(data_field(sector.data()));
        out.resize(start + NIC_SLOT, SYNC_BYTE);
    }
    out
}

fn push_sync(bits: &mut BitBuffer, count: usize) {
    for _ in 0..count {
        bits.push_byte(SYNC_BYTE);
        bits.push_bits(0, 2);
    }
}

/// Encode a track as 100000 bit cells (50000 GCR bits, clock cells empty)
pub fn encode_cell_track(track: &Track, volume: u8) -> BitBuffer {
    let mut bits = BitBuffer::with_capacity(TRACK_BITS);
    push_sync(&mut bits, GAP1_SYNC_GROUPS);
    for sector in track.sectors() {
        for b in address_field(volume, track.cylinder, sector.id.sector) {
            bits.push_byte(b);
        }
        push_sync(&mut bits, GAP2);
        for b in data_field(sector.data()) {
            bits.push_byte(b);
        }
        push_sync(&mut bits, GAP3);
    }
    bits.pad_to(TRACK_BITS);
    bits_to_cells(&bits)
}

/// Decode a nibble stream (NIB or NIC track) into `track`, returning the volume seen
pub fn decode_nibble_track(nibbles: &[u8], track: &mut Track) -> Option<u8> {
    let wrap = nibbles.len().min(WRAP_NIBBLES);
    let mut stream = Vec::with_capacity(nibbles.len() + wrap);
    stream.extend_from_slice(nibbles);
    stream.extend_from_slice(&nibbles[..wrap]);
    scan_nibbles(&stream, nibbles.len(), track)
}

/// Decode a cell track (HxC MFM or HFE) into `track`, returning the volume seen
pub fn decode_cell_track(cells: &BitBuffer, track: &mut Track) -> Option<u8> {
    let bits = cells_to_bits(cells);
    let (nibbles, limit) = frame_nibbles(&bits);
    scan_nibbles(&nibbles, limit, track)
}

/// Frame a circular bit stream into nibbles the way the disk controller latch
/// does: shift bits in until the top bit is set.
///
/// Returns the nibbles and how many of them started before the end of one revolution.
fn frame_nibbles(bits: &BitBuffer) -> (Vec<u8>, usize) {
    let mut out = Vec::with_capacity(bits.len() / 8);
    let mut limit = 0;
    let mut latch = 0u8;
    let mut start = 0;
    let total = bits.len() + WRAP_BITS.min(bits.len());

    for k in 0..total {
        if latch == 0 {
            start = k;
        }
        latch = (latch << 1) | bits.get_wrapped(k) as u8;
        if latch & 0x80 != 0 {
            out.push(latch);
            if start < bits.len() {
                limit = out.len();
            }
            latch = 0;
        }
    }
    (out, limit)
}

/// Find address/data field pairs; only marks starting before `limit` are considered
fn scan_nibbles(stream: &[u8], limit: usize, track: &mut Track) -> Option<u8> {
    let mut volume = None;
    let mut i = 0;

    while i < limit && i + ADDRESS_FIELD_LEN <= stream.len() {
        if !mark_matches(&stream[i..i + 3], &ADDRESS_PROLOGUE) {
            i += 1;
            continue;
        }

        let f = &stream[i + 3..i + 11];
        let vol = decode_44(f[0], f[1]);
        let trk = decode_44(f[2], f[3]);
        let sec = decode_44(f[4], f[5]);
        let chk = decode_44(f[6], f[7]);
        if vol ^ trk ^ sec != chk {
            debug!("Address field checksum mismatch at nibble {}", i);
            i += 3;
            continue;
        }
        if trk != track.cylinder {
            debug!(
                "Sector {} claims track {} on cylinder {}",
                sec, trk, track.cylinder
            );
        }
        volume.get_or_insert(vol);

        let search_from = i + 11;
        let search_to = (search_from + DATA_SEARCH_WINDOW).min(stream.len().saturating_sub(3));
        let data_mark = (search_from..search_to)
            .find(|&j| mark_matches(&stream[j..j + 3], &DATA_PROLOGUE));

        match data_mark {
            Some(j) if j + 3 + DATA_FIELD_NIBBLES <= stream.len() => {
                let start = j + 3;
                let (data, ok) = decode_62(&stream[start..start + DATA_FIELD_NIBBLES]);
                let status = if ok {
                    SectorStatus::Valid
                } else {
                    debug!("Sector {} data checksum mismatch", sec);
                    SectorStatus::BadChecksum
                };
                track.place(sec, status, data);
                i = start + DATA_FIELD_NIBBLES;
            }
            _ => {
                debug!("Sector {} has no data field", sec);
                i = search_from;
            }
        }
    }
    volume
}
