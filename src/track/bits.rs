/// Bit cell buffers and MFM cell coding

/// Growable sequence of bits stored most significant bit first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitBuffer {
    bytes: Vec<u8>,
    len: usize,
}

impl BitBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `bits` bits
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bits.div_ceil(8)),
            len: 0,
        }
    }

    /// Wrap bytes whose bits are ordered MSB first
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len() * 8;
        Self { bytes, len }
    }

    /// Wrap bytes whose bits are ordered LSB first (HFE)
    pub fn from_lsb_bytes(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes.iter().map(|b| b.reverse_bits()).collect())
    }

    /// Number of bits held
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer holds no bits
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one bit
    pub fn push(&mut self, bit: bool) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        if bit {
            self.bytes[self.len / 8] |= 0x80 >> (self.len % 8);
        }
        self.len += 1;
    }

    /// Append the low `count` bits of `value`, most significant first
    pub fn push_bits(&mut self, value: u32, count: u8) {
        for i in (0..count).rev() {
            self.push((value >> i) & 1 == 1);
        }
    }

    /// Append a whole byte
    pub fn push_byte(&mut self, value: u8) {
        self.push_bits(value as u32, 8);
    }

    /// Read bit `index`; out-of-range bits read as zero
    pub fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        self.bytes[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Read bit `index` treating the buffer as circular
    pub fn get_wrapped(&self, index: usize) -> bool {
        if self.len == 0 {
            return false;
        }
        self.get(index % self.len)
    }

    /// Append zero bits until the buffer holds `bits` bits
    pub fn pad_to(&mut self, bits: usize) {
        while self.len < bits {
            self.push(false);
        }
    }

    /// Count bits set at positions congruent to `phase` modulo 2
    pub fn ones_in_phase(&self, phase: usize) -> usize {
        (phase..self.len).step_by(2).filter(|&i| self.get(i)).count()
    }

    /// Get the packed bytes, MSB first
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the buffer, returning packed bytes MSB first
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Packed bytes with each byte's bit order reversed (HFE)
    pub fn to_lsb_bytes(&self) -> Vec<u8> {
        self.bytes.iter().map(|b| b.reverse_bits()).collect()
    }
}

/// Writes data bytes as MFM cells: each data bit is preceded by a clock cell
/// that is set only when both neighbouring data bits are zero
#[derive(Debug, Default)]
pub struct MfmWriter {
    cells: BitBuffer,
    last_data: bool,
}

impl MfmWriter {
    /// Create a writer with room for `cells` cells
    pub fn with_capacity(cells: usize) -> Self {
        Self {
            cells: BitBuffer::with_capacity(cells),
            last_data: false,
        }
    }

    /// Write a normally clocked byte
    pub fn write_byte(&mut self, byte: u8) {
        self.write_masked(byte, 0);
    }

    /// Write a sync mark whose clocks in `missing_clocks` are suppressed
    pub fn write_mark(&mut self, byte: u8, missing_clocks: u8) {
        self.write_masked(byte, missing_clocks);
    }

    fn write_masked(&mut self, byte: u8, missing_clocks: u8) {
        for i in (0..8).rev() {
            let data = (byte >> i) & 1 == 1;
            let clock = !(self.last_data || data) && missing_clocks & (1 << i) == 0;
            self.cells.push(clock);
            self.cells.push(data);
            self.last_data = data;
        }
    }

    /// Finish the track, zero-padding to `cells` cells
    pub fn finish(mut self, cells: usize) -> BitBuffer {
        self.cells.pad_to(cells);
        self.cells
    }
}

/// 16-cell word starting at `pos`, reading circularly
pub fn cell_word(cells: &BitBuffer, pos: usize) -> u16 {
    (0..16).fold(0u16, |w, i| (w << 1) | cells.get_wrapped(pos + i) as u16)
}

/// Data bits of the MFM byte whose first (clock) cell is at `pos`
pub fn mfm_byte_at(cells: &BitBuffer, pos: usize) -> u8 {
    (0..8).fold(0u8, |b, i| (b << 1) | cells.get_wrapped(pos + 2 * i + 1) as u8)
}

/// Expand data bits into cells with an empty clock before every bit
pub fn bits_to_cells(bits: &BitBuffer) -> BitBuffer {
    let mut cells = BitBuffer::with_capacity(bits.len() * 2);
    for i in 0..bits.len() {
        cells.push(false);
        cells.push(bits.get(i));
    }
    cells
}

/// Drop the clock cells, keeping whichever phase carries more transitions
pub fn cells_to_bits(cells: &BitBuffer) -> BitBuffer {
    let phase = if cells.ones_in_phase(1) >= cells.ones_in_phase(0) {
        1
    } else {
        0
    };
    let mut bits = BitBuffer::with_capacity(cells.len() / 2);
    for i in (phase..cells.len()).step_by(2) {
        bits.push(cells.get(i));
    }
    bits
}
