/// Image file reader

use crate::error::{DiskError, Result};
use crate::format::ContainerFormat;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Largest image accepted (a 1 MB NIB plus slack for HFE headers)
const MAX_IMAGE_SIZE: u64 = 4 * 1024 * 1024;

/// Read an image file, returning its bytes and the container its extension suggests
pub fn read_image_file<P: AsRef<Path>>(path: P) -> Result<(Vec<u8>, Option<ContainerFormat>)> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let len = file.metadata()?.len();
    if len > MAX_IMAGE_SIZE {
        return Err(DiskError::unsupported(format!(
            "{} is {} bytes, too large for a floppy image",
            path.display(),
            len
        )));
    }

    let mut bytes = Vec::with_capacity(len as usize);
    file.read_to_end(&mut bytes)?;
    log::debug!("Read {} bytes from {}", bytes.len(), path.display());

    Ok((bytes, ContainerFormat::from_path(path)))
}
