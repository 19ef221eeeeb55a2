/// Image and extracted file writer

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Write encoded image bytes to a file, replacing it
pub fn write_image_file<P: AsRef<Path>>(path: P, bytes: &[u8]) -> Result<()> {
    write_all(path.as_ref(), bytes)?;
    log::info!("Wrote {} bytes to {}", bytes.len(), path.as_ref().display());
    Ok(())
}

/// Write an extracted file's contents to the host
pub fn write_extracted_file<P: AsRef<Path>>(path: P, data: &[u8]) -> Result<()> {
    write_all(path.as_ref(), data)
}

fn write_all(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(())
}
