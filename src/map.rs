/// Sector map visualization

use crate::error::{DiskError, Result};
use crate::image::{DiskImage, SectorStatus};
use std::fmt::Write as _;

/// ANSI color codes for sector map
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BRIGHT_WHITE: &str = "\x1b[97m";
    pub const DARK_WHITE: &str = "\x1b[37m";
    pub const BRIGHT_RED: &str = "\x1b[91m";
    pub const BRIGHT_YELLOW: &str = "\x1b[93m";
}

const BLOCK_NO_DATA: char = '\u{2591}'; // ░ - Light shade (blank)
const BLOCK_HAS_DATA: char = '\u{2593}'; // ▓ - Dark shade (in-use)
const BLOCK_BAD: char = 'X';
const BLOCK_MISSING: char = '?';

/// Render the sector map of one side.
///
/// Columns are cylinders, rows physical sector numbers with sector 0 at the
/// bottom. With `color` off the blocks alone tell the states apart.
pub fn render_sector_map(image: &DiskImage, head: u8, color: bool) -> Result<String> {
    let geometry = image.geometry();
    if head >= geometry.heads {
        return Err(DiskError::InvalidTrack {
            track: geometry.track_index(0, head),
            max: image.track_count().saturating_sub(1),
        });
    }

    let cylinders = geometry.cylinders as usize;
    let mut out = String::new();
    let _ = writeln!(out, "=== Sector Map (Side {}) ===", head);
    if color {
        let _ = writeln!(
            out,
            "Legend: {}In Use{} {}Blank{} {}Bad checksum{} {}Missing{}",
            colors::BRIGHT_WHITE,
            colors::RESET,
            colors::DARK_WHITE,
            colors::RESET,
            colors::BRIGHT_RED,
            colors::RESET,
            colors::BRIGHT_YELLOW,
            colors::RESET
        );
    } else {
        let _ = writeln!(
            out,
            "Legend: {} In Use {} Blank {} Bad checksum {} Missing",
            BLOCK_HAS_DATA, BLOCK_NO_DATA, BLOCK_BAD, BLOCK_MISSING
        );
    }
    out.push('\n');

    for sector in (0..geometry.sectors_per_track).rev() {
        let _ = write!(out, "{:>2} ", sector);
        for cylinder in 0..geometry.cylinders {
            let index = geometry.track_index(cylinder, head);
            let Ok(s) = image.sector(index, sector) else {
                out.push(' ');
                continue;
            };
            let (block, paint) = match s.status {
                SectorStatus::Valid if s.is_filled_with(0) => (BLOCK_NO_DATA, colors::DARK_WHITE),
                SectorStatus::Valid => (BLOCK_HAS_DATA, colors::BRIGHT_WHITE),
                SectorStatus::BadChecksum => (BLOCK_BAD, colors::BRIGHT_RED),
                SectorStatus::Missing => (BLOCK_MISSING, colors::BRIGHT_YELLOW),
            };
            if color {
                let _ = write!(out, "{}{}{}", paint, block, colors::RESET);
            } else {
                out.push(block);
            }
        }
        out.push('\n');
    }

    // Cylinder axis, labelled every five columns
    out.push_str("   ");
    let mut col = 0;
    while col < cylinders {
        if col % 5 == 0 {
            let label = col.to_string();
            let fits = label.len().min(cylinders - col);
            out.push_str(&label[..fits]);
            col += fits;
        } else {
            out.push(' ');
            col += 1;
        }
    }
    out.push('\n');
    Ok(out)
}

/// Print a colored sector map for a disk side
pub fn draw_sector_map(image: &DiskImage, head: u8) {
    match render_sector_map(image, head, true) {
        Ok(map) => print!("{}", map),
        Err(_) => println!("Side {} not found.", head),
    }
}
