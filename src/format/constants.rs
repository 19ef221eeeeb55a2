/// Container signatures, sizes and track layout constants

/// HxC MFM stream signature (NUL terminated)
pub const HXC_MFM_SIGNATURE: &[u8] = b"HXCMFM\0";

/// HxC HFE v1 signature
pub const HFE_SIGNATURE: &[u8] = b"HXCPICFE";

/// Size of the HxC MFM file header
pub const HXC_MFM_HEADER_SIZE: usize = 19;

/// Size of one HxC MFM track descriptor
pub const HXC_MFM_TRACK_ENTRY_SIZE: usize = 11;

/// HFE and HxC MFM files are laid out in 512-byte blocks
pub const HXC_BLOCK_SIZE: usize = 512;

/// Nominal rotation speed written to flux headers
pub const FLOPPY_RPM: u16 = 300;

/// Nominal data rate in kbit/s written to flux headers
pub const FLOPPY_BITRATE_KBPS: u16 = 250;

/// Generic Shugart double density interface mode
pub const FLOPPY_INTERFACE_MODE: u8 = 7;

/// HFE track encoding byte for ISO/IBM style MFM
pub const HFE_ENCODING_MFM: u8 = 0x00;

/// HFE track encoding byte for anything else (Apple GCR)
pub const HFE_ENCODING_UNKNOWN: u8 = 0xFF;

/// Cell bytes per track side at 250 kbit/s and 300 rpm
pub const CELL_TRACK_BYTES: usize = 12_500;

/// Byte length of a 140K sector image
pub const AGAT_140K_SIZE: usize = 35 * 16 * 256;

/// Byte length of an 840K sector image
pub const AGAT_840K_SIZE: usize = 160 * 21 * 256;

/// Nibble bytes per GCR track in a NIB file
pub const NIB_GCR_TRACK_SIZE: usize = 6656;

/// Nibble bytes per Agat MFM track in a NIB file
pub const NIB_AGAT_TRACK_SIZE: usize = 6250;

/// Byte length of a 35 track GCR NIB file
pub const NIB_GCR_IMAGE_SIZE: usize = 35 * NIB_GCR_TRACK_SIZE;

/// Byte length of a 160 track Agat NIB file
pub const NIB_AGAT_IMAGE_SIZE: usize = 160 * NIB_AGAT_TRACK_SIZE;

/// Bytes per sector slot in a NIC file
pub const NIC_SECTOR_SIZE: usize = 512;

/// Byte length of a 35 track NIC file
pub const NIC_IMAGE_SIZE: usize = 35 * 16 * NIC_SECTOR_SIZE;

/// Default volume number written to address fields
pub const DEFAULT_VOLUME: u8 = 254;
