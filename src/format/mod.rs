/// Container formats and disk geometries

/// Container signatures, sizes and track layout constants
pub mod constants;
/// Disk geometry descriptors and presets
pub mod geometry;

pub use constants::*;
pub use geometry::{Encoding, Geometry, SectorSkew};

use std::path::Path;
use std::str::FromStr;

/// Host file layout used to store a disk image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerFormat {
    /// Plain sector dump in the geometry's raw sector order
    Raw,
    /// HxC MFM stream image (cell level, MSB first)
    HxcMfm,
    /// HxC HFE v1 image (cell level, LSB first, interleaved sides)
    HxcHfe,
    /// Nibble track dump
    NibMfm,
    /// Fixed 512-byte per sector nibble dump
    NicMfm,
    /// Agat 840K sector dump (80 tracks, 2 sides, 21 sectors)
    Agat840k,
    /// Agat or Apple II 140K sector dump in DOS order
    Agat140k,
}

impl ContainerFormat {
    /// Every supported container, in detection order
    pub const ALL: [ContainerFormat; 7] = [
        ContainerFormat::HxcMfm,
        ContainerFormat::HxcHfe,
        ContainerFormat::Agat140k,
        ContainerFormat::Agat840k,
        ContainerFormat::NibMfm,
        ContainerFormat::NicMfm,
        ContainerFormat::Raw,
    ];

    /// Get a human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            ContainerFormat::Raw => "RAW sector image",
            ContainerFormat::HxcMfm => "HxC MFM",
            ContainerFormat::HxcHfe => "HxC HFE",
            ContainerFormat::NibMfm => "NIB",
            ContainerFormat::NicMfm => "NIC",
            ContainerFormat::Agat840k => "Agat 840K",
            ContainerFormat::Agat140k => "Agat/Apple 140K",
        }
    }

    /// Preferred file extension when writing this format
    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::Raw => "img",
            ContainerFormat::HxcMfm => "mfm",
            ContainerFormat::HxcHfe => "hfe",
            ContainerFormat::NibMfm => "nib",
            ContainerFormat::NicMfm => "nic",
            ContainerFormat::Agat840k => "dsk",
            ContainerFormat::Agat140k => "dsk",
        }
    }

    /// Whether sector data is stored as track bitstreams rather than plain sectors
    pub fn is_flux(&self) -> bool {
        matches!(
            self,
            ContainerFormat::HxcMfm
                | ContainerFormat::HxcHfe
                | ContainerFormat::NibMfm
                | ContainerFormat::NicMfm
        )
    }

    /// Guess a format from a host file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mfm" => Some(ContainerFormat::HxcMfm),
            "hfe" => Some(ContainerFormat::HxcHfe),
            "nib" => Some(ContainerFormat::NibMfm),
            "nic" => Some(ContainerFormat::NicMfm),
            "do" => Some(ContainerFormat::Agat140k),
            "dsk" | "img" | "po" | "raw" => Some(ContainerFormat::Raw),
            _ => None,
        }
    }

    /// Guess a format from a path's extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ContainerFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" | "img" => Ok(ContainerFormat::Raw),
            "mfm" | "hxcmfm" => Ok(ContainerFormat::HxcMfm),
            "hfe" | "hxchfe" => Ok(ContainerFormat::HxcHfe),
            "nib" => Ok(ContainerFormat::NibMfm),
            "nic" => Ok(ContainerFormat::NicMfm),
            "agat840" | "agat840k" | "840k" => Ok(ContainerFormat::Agat840k),
            "agat140" | "agat140k" | "140k" | "dsk" | "do" => Ok(ContainerFormat::Agat140k),
            other => Err(format!("unknown container format '{}'", other)),
        }
    }
}

/// Identify a container from its signature, falling back to exact file size
///
/// A 140K dump is reported as [`ContainerFormat::Raw`] since its sector order
/// (DOS or ProDOS) can only be settled by looking at the filesystem.
pub fn detect_format(bytes: &[u8]) -> Option<ContainerFormat> {
    if bytes.starts_with(HXC_MFM_SIGNATURE) {
        return Some(ContainerFormat::HxcMfm);
    }
    if bytes.starts_with(HFE_SIGNATURE) {
        return Some(ContainerFormat::HxcHfe);
    }

    match bytes.len() {
        AGAT_140K_SIZE => Some(ContainerFormat::Raw),
        AGAT_840K_SIZE => Some(ContainerFormat::Agat840k),
        NIB_GCR_IMAGE_SIZE | NIB_AGAT_IMAGE_SIZE => Some(ContainerFormat::NibMfm),
        NIC_IMAGE_SIZE => Some(ContainerFormat::NicMfm),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_hxc_signatures() {
        let mut mfm = HXC_MFM_SIGNATURE.to_vec();
        mfm.extend_from_slice(&[0; 32]);
        assert_eq!(detect_format(&mfm), Some(ContainerFormat::HxcMfm));

        let mut hfe = HFE_SIGNATURE.to_vec();
        hfe.extend_from_slice(&[0xFF; 32]);
        assert_eq!(detect_format(&hfe), Some(ContainerFormat::HxcHfe));
    }

    #[test]
    fn test_detect_by_size() {
        assert_eq!(
            detect_format(&vec![0; AGAT_140K_SIZE]),
            Some(ContainerFormat::Raw)
        );
        assert_eq!(
            detect_format(&vec![0; AGAT_840K_SIZE]),
            Some(ContainerFormat::Agat840k)
        );
        assert_eq!(
            detect_format(&vec![0xFF; NIB_GCR_IMAGE_SIZE]),
            Some(ContainerFormat::NibMfm)
        );
        assert_eq!(
            detect_format(&vec![0xFF; NIC_IMAGE_SIZE]),
            Some(ContainerFormat::NicMfm)
        );
    }

    #[test]
    fn test_detect_invalid_format() {
        assert_eq!(detect_format(b"INVALID DATA"), None);
    }

    #[test]
    fn test_from_extension() {
        assert_eq!(
            ContainerFormat::from_path("disk.HFE"),
            Some(ContainerFormat::HxcHfe)
        );
        assert_eq!(ContainerFormat::from_path("disk.po"), Some(ContainerFormat::Raw));
        assert_eq!(ContainerFormat::from_path("disk"), None);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("hfe".parse(), Ok(ContainerFormat::HxcHfe));
        assert_eq!("Agat840".parse(), Ok(ContainerFormat::Agat840k));
        assert!("zip".parse::<ContainerFormat>().is_err());
    }
}
