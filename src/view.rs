/// Binary and text views of extracted files

use crate::error::{Result, Warning};
use crate::filesystem::{self, DirectoryEntry};
use crate::image::DiskImage;
use std::fmt::Write as _;
use std::str::FromStr;

/// Agat upper-half letters (KOI-7 positions 0x60-0x7F)
const AGAT_CYRILLIC: [char; 32] = [
    'Ю', 'А', 'Б', 'Ц', 'Д', 'Е', 'Ф', 'Г', 'Х', 'И', 'Й', 'К', 'Л', 'М', 'Н', 'О', 'П', 'Я', 'Р',
    'С', 'Т', 'У', 'Ж', 'В', 'Ь', 'Ы', 'З', 'Ш', 'Э', 'Щ', 'Ч', 'Ъ',
];

/// KOI-8 lower case letters at 0xC0-0xDF
const KOI8_LOWER: [char; 32] = [
    'ю', 'а', 'б', 'ц', 'д', 'е', 'ф', 'г', 'х', 'и', 'й', 'к', 'л', 'м', 'н', 'о', 'п', 'я', 'р',
    'с', 'т', 'у', 'ж', 'в', 'ь', 'ы', 'з', 'ш', 'э', 'щ', 'ч', 'ъ',
];

const BYTES_PER_ROW: usize = 16;

/// How file contents are presented
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    /// Hex dump with a character column
    #[default]
    Binary,
    /// Decoded text
    Text,
}

impl std::fmt::Display for ViewMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ViewMode::Binary => write!(f, "Binary"),
            ViewMode::Text => write!(f, "Text"),
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bin" | "binary" | "hex" => Ok(ViewMode::Binary),
            "txt" | "text" => Ok(ViewMode::Text),
            other => Err(format!("unknown view mode '{}'", other)),
        }
    }
}

/// Character set used to decode bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    /// Agat KOI-7 letters, high bit ignored
    #[default]
    Agat,
    /// Apple II high-bit ASCII
    Apple,
    /// KOI-8
    Koi8,
}

impl TextEncoding {
    /// Printable character for a byte; control codes render as `.`
    pub fn decode_byte(&self, byte: u8) -> char {
        match self {
            TextEncoding::Agat => match byte & 0x7F {
                c @ 0x20..=0x5F => c as char,
                c @ 0x60..=0x7F => AGAT_CYRILLIC[(c - 0x60) as usize],
                _ => '.',
            },
            TextEncoding::Apple => match byte & 0x7F {
                c @ 0x20..=0x7E => c as char,
                _ => '.',
            },
            TextEncoding::Koi8 => match byte {
                0x20..=0x7E => byte as char,
                0xA3 => 'ё',
                0xB3 => 'Ё',
                0xC0..=0xDF => KOI8_LOWER[(byte - 0xC0) as usize],
                0xE0..=0xFF => AGAT_CYRILLIC[(byte - 0xE0) as usize],
                _ => '.',
            },
        }
    }

    fn is_line_break(&self, byte: u8) -> bool {
        match self {
            TextEncoding::Agat | TextEncoding::Apple => byte == 0x8D || byte == 0x13,
            TextEncoding::Koi8 => byte == 0x0A,
        }
    }

    fn is_ignored(&self, byte: u8) -> bool {
        matches!(self, TextEncoding::Koi8) && byte == 0x0D
    }
}

impl std::fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextEncoding::Agat => write!(f, "Agat"),
            TextEncoding::Apple => write!(f, "Apple"),
            TextEncoding::Koi8 => write!(f, "KOI-8"),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "agat" => Ok(TextEncoding::Agat),
            "apple" | "ascii" => Ok(TextEncoding::Apple),
            "koi8" | "koi-8" | "koi8r" => Ok(TextEncoding::Koi8),
            other => Err(format!("unknown encoding '{}'", other)),
        }
    }
}

/// Decode bytes as text, turning the encoding's line break into `\n`
pub fn decode_text(data: &[u8], encoding: TextEncoding) -> String {
    data.iter()
        .filter(|&&b| !encoding.is_ignored(b))
        .map(|&b| {
            if encoding.is_line_break(b) {
                '\n'
            } else {
                encoding.decode_byte(b)
            }
        })
        .collect()
}

/// Hex dump: offset, 16 hex bytes, then the decoded characters
pub fn hex_dump(data: &[u8], encoding: TextEncoding) -> String {
    let mut out = String::new();
    for (row, chunk) in data.chunks(BYTES_PER_ROW).enumerate() {
        let _ = write!(out, "{:04X} ", row * BYTES_PER_ROW);
        for b in chunk {
            let _ = write!(out, " {:02X}", b);
        }
        for _ in chunk.len()..BYTES_PER_ROW {
            out.push_str("   ");
        }
        out.push_str("    ");
        out.extend(chunk.iter().map(|&b| encoding.decode_byte(b)));
        out.push('\n');
    }
    out
}

/// Rendered file contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileView {
    /// Rendered text
    pub text: String,
    /// Mode used
    pub mode: ViewMode,
    /// Encoding used
    pub encoding: TextEncoding,
    /// Extraction warnings for the underlying file
    pub warnings: Vec<Warning>,
}

/// Extract a file and render it
pub fn view_file<'a>(
    image: &'a DiskImage,
    entry: &DirectoryEntry<'a>,
    mode: ViewMode,
    encoding: Option<TextEncoding>,
) -> Result<FileView> {
    let file = filesystem::extract(image, entry)?;
    let encoding = encoding.unwrap_or_default();
    let text = match mode {
        ViewMode::Binary => hex_dump(&file.data, encoding),
        ViewMode::Text => decode_text(&file.data, encoding),
    };
    Ok(FileView {
        text,
        mode,
        encoding,
        warnings: file.warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filesystem::dos33::tests::sample_disk;

    #[test]
    fn test_agat_charset() {
        let enc = TextEncoding::Agat;
        assert_eq!(enc.decode_byte(0xC1), 'A');
        assert_eq!(enc.decode_byte(0x41), 'A');
        assert_eq!(enc.decode_byte(0xE0), 'Ю');
        assert_eq!(enc.decode_byte(0x61), 'А');
        assert_eq!(enc.decode_byte(0x7F), 'Ъ');
        assert_eq!(enc.decode_byte(0x07), '.');
    }

    #[test]
    fn test_koi8_charset() {
        let enc = TextEncoding::Koi8;
        assert_eq!(enc.decode_byte(b'z'), 'z');
        assert_eq!(enc.decode_byte(0x7F), '.');
        assert_eq!(enc.decode_byte(0xC1), 'а');
        assert_eq!(enc.decode_byte(0xFF), 'Ъ');
        assert_eq!(enc.decode_byte(0xA3), 'ё');
        assert_eq!(enc.decode_byte(0x90), '.');
    }

    #[test]
    fn test_decode_text_line_breaks() {
        let data = [0xC8, 0xC9, 0x8D, 0xD9, 0xCF];
        assert_eq!(decode_text(&data, TextEncoding::Apple), "HI\nYO");
        assert_eq!(decode_text(b"ab\r\ncd", TextEncoding::Koi8), "ab\ncd");
    }

    #[test]
    fn test_agat_breaks_on_13_not_0d() {
        let data = [0xC1, 0x13, 0xC2, 0x0D, 0xC3];
        assert_eq!(decode_text(&data, TextEncoding::Agat), "A\nB.C");
        assert_eq!(decode_text(&data, TextEncoding::Apple), "A\nB.C");
    }

    #[test]
    fn test_hex_dump_layout() {
        let data: Vec<u8> = (0x41..0x53).collect();
        let dump = hex_dump(&data, TextEncoding::Apple);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0000  41 42"));
        assert!(lines[0].ends_with("    ABCDEFGHIJKLMNOP"));
        assert!(lines[1].starts_with("0010  51 52"));
        assert!(lines[1].ends_with("    QR"));
        assert_eq!(lines[0].len(), lines[1].len() + 14);
    }

    #[test]
    fn test_view_text_file() {
        let image = sample_disk();
        let entry = filesystem::find_file(&image, "README").unwrap();
        assert_eq!(entry.preferred_view(), ViewMode::Text);
        let view = view_file(&image, &entry, ViewMode::Text, None).unwrap();
        assert_eq!(view.encoding, TextEncoding::Agat);
        assert!(view.text.starts_with("AAAA"));
        assert_eq!(view.text.chars().count(), 256);
    }

    #[test]
    fn test_parse_mode_and_encoding() {
        assert_eq!("txt".parse(), Ok(ViewMode::Text));
        assert_eq!("KOI8".parse(), Ok(TextEncoding::Koi8));
        assert!("ebcdic".parse::<TextEncoding>().is_err());
    }
}
