/// Sector data structures

/// Sector address as recorded in its address field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorId {
    /// Cylinder number
    pub cylinder: u8,
    /// Head/side number
    pub head: u8,
    /// Physical sector number within the track
    pub sector: u8,
}

impl SectorId {
    /// Create a new sector ID
    pub fn new(cylinder: u8, head: u8, sector: u8) -> Self {
        Self {
            cylinder,
            head,
            sector,
        }
    }
}

impl std::fmt::Display for SectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "C{}:H{}:S{}", self.cylinder, self.head, self.sector)
    }
}

/// Result of checksum validation for a sector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorStatus {
    /// Data field found and checksum matched
    Valid,
    /// Data field found but checksum or nibble translation failed
    BadChecksum,
    /// No address or data field found for this sector number
    Missing,
}

impl std::fmt::Display for SectorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SectorStatus::Valid => write!(f, "OK"),
            SectorStatus::BadChecksum => write!(f, "Bad checksum"),
            SectorStatus::Missing => write!(f, "Missing"),
        }
    }
}

/// A disk sector containing data and its validity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sector {
    /// Sector address
    pub id: SectorId,
    /// Validation result
    pub status: SectorStatus,
    data: Vec<u8>,
}

impl Sector {
    /// Create a valid sector holding `data`
    pub fn new(id: SectorId, data: Vec<u8>) -> Self {
        Self {
            id,
            status: SectorStatus::Valid,
            data,
        }
    }

    /// Create a sector with an explicit status
    pub fn with_status(id: SectorId, status: SectorStatus, data: Vec<u8>) -> Self {
        Self { id, status, data }
    }

    /// Create a zero-filled placeholder for a sector that was never found
    pub fn missing(id: SectorId, size: usize) -> Self {
        Self {
            id,
            status: SectorStatus::Missing,
            data: vec![0; size],
        }
    }

    /// Get a reference to the sector data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether the checksum passed
    pub fn is_valid(&self) -> bool {
        self.status == SectorStatus::Valid
    }

    /// Replace the payload and mark the sector valid
    pub(crate) fn set_data(&mut self, data: &[u8]) {
        self.data.clear();
        self.data.extend_from_slice(data);
        self.status = SectorStatus::Valid;
    }

    /// Mark the sector valid, keeping whatever payload it holds
    pub(crate) fn mark_valid(&mut self) {
        self.status = SectorStatus::Valid;
    }

    /// Check whether every byte equals `value`
    pub fn is_filled_with(&self, value: u8) -> bool {
        self.data.iter().all(|&b| b == value)
    }
}
