/*!
# dskcommander

A Rust library for converting Agat and Apple II floppy disk images and reading
the files stored on them.

## Features

- Read and write RAW, HxC MFM, HxC HFE, NIB, NIC, Agat 840K and Agat/Apple 140K images
- Track decoding for Apple 6&2 GCR and Agat 840K MFM with per-sector validation
- Geometry and filesystem autodetection that reports ambiguous disks instead of guessing
- DOS 3.3 and Sprite OS catalog listing and file extraction
- Export to any container, flagging sectors that could not be read
- Binary and text file views with Agat, Apple and KOI-8 character sets

## Quick Start

```rust,no_run
use dskcommander::{filesystem, view, ContainerFormat, DiskImage, ViewMode};

// Open an image, detecting container, geometry and filesystem
let image = DiskImage::open("disk.nib")?;
println!("{} / {}", image.geometry(), image.filesystem());

// List and extract files
for entry in filesystem::list_files(&image)? {
    println!("{:<30} {:>2} {} bytes", entry.name, entry.type_label, entry.size);
}
let entry = filesystem::find_file(&image, "HELLO")?;
let file = filesystem::extract(&image, &entry)?;
for warning in &file.warnings {
    eprintln!("{}", warning);
}

// Render a file as text
let shown = view::view_file(&image, &entry, ViewMode::Text, None)?;
println!("{}", shown.text);

// Convert to another container
let warnings = image.save(ContainerFormat::HxcHfe, "disk.hfe")?;
# Ok::<(), dskcommander::DiskError>(())
```

## Disk Types

- Apple II / Agat 140K: 35 tracks, 1 side, 16 sectors of 256 bytes, 6&2 GCR
- Agat 840K: 80 tracks, 2 sides, 21 sectors of 256 bytes, Agat MFM

## Modules

- `format`: container formats, geometries and constants
- `image`: decoded image data structures (DiskImage, Track, Sector)
- `track`: track encoders and decoders
- `codec`: container readers and writers
- `detect`: geometry and filesystem autodetection
- `filesystem`: DOS 3.3 and Sprite OS drivers
- `export`: export pipeline
- `view`: binary and text views
- `error`: error and warning types
*/

#![warn(missing_docs)]

/// Container readers and writers
pub mod codec;
/// Geometry and filesystem autodetection
pub mod detect;
/// Error types and Result alias
pub mod error;
/// Export pipeline
pub mod export;
/// Filesystem implementations (DOS 3.3, Sprite OS)
pub mod filesystem;
/// Container formats, geometries and constants
pub mod format;
/// Decoded image data structures (DiskImage, Track, Sector)
pub mod image;
/// I/O operations for reading and writing image files
pub mod io;
/// Sector map visualization
pub mod map;
/// Track encoders and decoders
pub mod track;
/// Binary and text file views
pub mod view;

// Re-export common types
pub use detect::{Candidate, DetectConfig, Detection, OpenOptions};
pub use error::{DiskError, Result, Warning};
pub use export::Exported;
pub use filesystem::{
    DirectoryEntry, Dos33FileSystem, ExtractedFile, FileSystem, FileSystemInfo, FilesystemKind,
    Locator, SpriteOsFileSystem,
};
pub use format::{ContainerFormat, Encoding, Geometry, SectorSkew};
pub use image::{DiskImage, DiskImageBuilder, Sector, SectorId, SectorStatus, Track};
pub use track::{DecodedTrack, RawTrack};
pub use view::{FileView, TextEncoding, ViewMode};
