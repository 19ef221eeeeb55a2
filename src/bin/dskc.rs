/// Interactive console for Agat and Apple II disk images

use dskcommander::*;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

/// Bytes shown by read-sector and view before truncating
const DUMP_LIMIT: usize = 4096;

/// Command completer for the REPL
struct CommandCompleter {
    commands: Vec<&'static str>,
}

impl CommandCompleter {
    fn new() -> Self {
        Self {
            commands: vec![
                "cat",
                "detect",
                "dir",
                "exit",
                "export",
                "extract",
                "fs-info",
                "help",
                "info",
                "load",
                "ls",
                "map",
                "open",
                "quit",
                "read-sector",
                "sectors",
                "tracks",
                "view",
                "warnings",
            ],
        }
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        // Only complete the first word (command name)
        let line_to_cursor = &line[..pos];
        if line_to_cursor.contains(' ') {
            return Ok((pos, vec![]));
        }

        let prefix = line_to_cursor.to_lowercase();
        let matches: Vec<Pair> = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(&prefix))
            .map(|cmd| Pair {
                display: cmd.to_string(),
                replacement: cmd.to_string(),
            })
            .collect();

        Ok((0, matches))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
}

impl Highlighter for CommandCompleter {}
impl Validator for CommandCompleter {}
impl Helper for CommandCompleter {}

/// Get the path to the history file
fn history_path() -> Option<std::path::PathBuf> {
    dirs::home_dir().map(|mut p| {
        p.push(".dskc_history");
        p
    })
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    println!("=== DSK Commander ===");
    println!("Interactive console for Agat and Apple II disk images.");
    println!("Type 'help' for available commands\n");

    let mut rl = match Editor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Failed to create editor: {}", e);
            std::process::exit(1);
        }
    };
    rl.set_helper(Some(CommandCompleter::new()));

    if let Some(history_path) = history_path() {
        let _ = rl.load_history(&history_path);
    }

    // Opening a path given on the command line saves a step
    let mut image: Option<DiskImage> = None;
    if let Some(path) = std::env::args().nth(1) {
        image = open_image(&path, &[]);
    }

    loop {
        let readline = rl.readline("> ");
        let input = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        };

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let _ = rl.add_history_entry(input);

        let parts = parse_command_line(input);
        if parts.is_empty() {
            continue;
        }
        let command = parts[0].to_lowercase();

        match command.as_str() {
            "help" => {
                print_help();
            }
            "quit" | "exit" => {
                if let Some(history_path) = history_path() {
                    let _ = rl.save_history(&history_path);
                }
                println!("Goodbye!");
                break;
            }
            "open" | "load" => {
                if parts.len() < 2 {
                    println!("Usage: open <path> [format=<f>] [geometry=<g>] [fs=<fs>]");
                    continue;
                }
                if let Some(img) = open_image(&parts[1], &parts[2..]) {
                    image = Some(img);
                }
            }
            "detect" => {
                if parts.len() < 2 {
                    println!("Usage: detect <path>");
                    continue;
                }
                print_detection(&parts[1]);
            }
            "info" => {
                if let Some(ref img) = image {
                    print_info(img);
                } else {
                    println!("No image loaded. Use 'open <path>' first.");
                }
            }
            "warnings" => {
                if let Some(ref img) = image {
                    if img.warnings().is_empty() {
                        println!("No warnings.");
                    }
                    for warning in img.warnings() {
                        println!("Warning: {}", warning);
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "tracks" => {
                if let Some(ref img) = image {
                    list_tracks(img);
                } else {
                    println!("No image loaded.");
                }
            }
            "sectors" => {
                if let Some(ref img) = image {
                    if parts.len() < 2 {
                        println!("Usage: sectors <cylinder> [head]");
                        continue;
                    }
                    let Some(cylinder) = parse_hex_or_dec(&parts[1]) else {
                        println!("Invalid cylinder: {}", parts[1]);
                        continue;
                    };
                    let head = parts.get(2).and_then(|s| parse_hex_or_dec(s)).unwrap_or(0);
                    list_sectors_on_track(img, cylinder, head);
                } else {
                    println!("No image loaded.");
                }
            }
            "read-sector" => {
                if let Some(ref img) = image {
                    if parts.len() < 4 {
                        println!("Usage: read-sector <cylinder> <head> <sector>");
                        continue;
                    }
                    let address: Vec<Option<u8>> =
                        parts[1..4].iter().map(|s| parse_hex_or_dec(s)).collect();
                    let [Some(cylinder), Some(head), Some(sector)] = address[..] else {
                        println!("Invalid sector address.");
                        continue;
                    };
                    let index = img.geometry().track_index(cylinder, head);
                    match img.sector(index, sector) {
                        Ok(s) => {
                            println!("Sector {} ({}, {} bytes):", s.id, s.status, s.data().len());
                            print_hex_dump(s.data(), DUMP_LIMIT);
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "fs-info" => {
                if let Some(ref img) = image {
                    match filesystem::info(img) {
                        Ok(info) => print!("{}", info),
                        Err(e) => println!("Error: {}", e),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "dir" | "cat" | "ls" => {
                if let Some(ref img) = image {
                    list_directory(img);
                } else {
                    println!("No image loaded.");
                }
            }
            "view" => {
                if let Some(ref img) = image {
                    if parts.len() < 2 {
                        println!("Usage: view <filename> [bin|txt] [agat|apple|koi8]");
                        continue;
                    }
                    view_command(img, &parts[1], &parts[2..]);
                } else {
                    println!("No image loaded.");
                }
            }
            "extract" => {
                if let Some(ref img) = image {
                    if parts.len() < 2 {
                        println!("Usage: extract <filename> [output_path]");
                        continue;
                    }
                    let output = parts.get(2).unwrap_or(&parts[1]);
                    extract_command(img, &parts[1], output);
                } else {
                    println!("No image loaded.");
                }
            }
            "export" => {
                if let Some(ref img) = image {
                    if parts.len() < 3 {
                        println!("Usage: export <format> <path>");
                        continue;
                    }
                    let target: ContainerFormat = match parts[1].parse() {
                        Ok(f) => f,
                        Err(e) => {
                            println!("Error: {}", e);
                            continue;
                        }
                    };
                    match img.save(target, &parts[2]) {
                        Ok(warnings) => {
                            println!("Exported {} to {}", target, parts[2]);
                            for warning in warnings {
                                println!("Warning: {}", warning);
                            }
                        }
                        Err(e) => println!("Error: {}", e),
                    }
                } else {
                    println!("No image loaded.");
                }
            }
            "map" => {
                if let Some(ref img) = image {
                    let head = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(0);
                    map::draw_sector_map(img, head);
                } else {
                    println!("No image loaded.");
                }
            }
            _ => {
                println!("Unknown command: {}. Type 'help' for available commands.", command);
            }
        }
    }
}

/// Parse command line input, respecting quoted strings
fn parse_command_line(input: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    parts.push(current.clone());
                    current.clear();
                }
            }
            _ => {
                current.push(ch);
            }
        }
    }

    if !current.is_empty() {
        parts.push(current);
    }

    parts
}

/// Build open options from `key=value` arguments
fn parse_open_options(args: &[String]) -> std::result::Result<OpenOptions, String> {
    let mut options = OpenOptions::new();
    for arg in args {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{}'", arg))?;
        options = match key.to_lowercase().as_str() {
            "format" => options.format(value.parse()?),
            "geometry" | "type" => options.geometry(value.parse()?),
            "fs" | "filesystem" => options.filesystem(value.parse()?),
            other => return Err(format!("unknown option '{}'", other)),
        };
    }
    Ok(options)
}

fn open_image(path: &str, args: &[String]) -> Option<DiskImage> {
    let options = match parse_open_options(args) {
        Ok(o) => o,
        Err(e) => {
            println!("Error: {}", e);
            return None;
        }
    };
    match DiskImage::open_with(path, &options) {
        Ok(img) => {
            println!(
                "Opened: {} ({}, {}, {})",
                path,
                img.format(),
                img.geometry().name,
                img.filesystem()
            );
            for warning in img.warnings() {
                println!("Warning: {}", warning);
            }
            Some(img)
        }
        Err(DiskError::Ambiguous { candidates }) => {
            println!("Ambiguous disk type. Reopen with geometry= and fs= to pick one of:");
            for candidate in candidates {
                println!("  {}", candidate);
            }
            None
        }
        Err(e) => {
            println!("Error: {}", e);
            None
        }
    }
}

fn print_detection(path: &str) {
    let (bytes, _) = match io::read_image_file(path) {
        Ok(r) => r,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    let config = DetectConfig::default();
    let ranked = detect::rank(&bytes, None, &config);
    if ranked.is_empty() {
        println!("No decodable layout.");
    }
    for candidate in &ranked {
        println!("  {}", candidate);
    }
    match detect::detect(&bytes, None, &config) {
        Detection::Match {
            geometry,
            filesystem,
            confidence,
            ..
        } => println!(
            "Result: {} / {} (confidence {:.3})",
            geometry.name, filesystem, confidence
        ),
        Detection::Ambiguous(tied) => println!("Result: ambiguous between {} candidates", tied.len()),
        Detection::NoMatch => println!("Result: no match"),
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  open <path> [opts]             - Open a disk image (use quotes for paths with spaces)");
    println!("                                   opts: format=<raw|mfm|hfe|nib|nic|agat140|agat840>");
    println!("                                         geometry=<140k|prodos|840k> fs=<dos|sprite|unknown>");
    println!("  detect <path>                  - Score every interpretation of an image file");
    println!("  info                           - Show disk information");
    println!("  warnings                       - Show decode warnings");
    println!("  tracks                         - List all tracks");
    println!("  sectors <cyl> [head]           - List sectors of a track");
    println!("  read-sector <c> <h> <s>        - Read and display a sector");
    println!("  fs-info                        - Show filesystem information");
    println!("  dir, ls, cat                   - List files on disk");
    println!("  view <file> [bin|txt] [enc]    - View a file (enc: agat, apple, koi8)");
    println!("  extract <file> [output_path]   - Extract a file to the host filesystem");
    println!("  export <format> <path>         - Write the image in another container format");
    println!("  map [side]                     - Visual sector map (white=ok, red=bad, yellow=missing)");
    println!("  help                           - Show this help");
    println!("  quit, exit                     - Exit");
}

fn print_info(image: &DiskImage) {
    let geometry = image.geometry();
    if let Some(filename) = image.filename() {
        println!("Filename: {}", filename);
    }
    println!("Format: {}", image.format().name());
    println!("Geometry: {}", geometry.name);
    println!("Encoding: {}", geometry.encoding);
    println!("Sides: {}", geometry.heads);
    println!("Tracks per side: {}", geometry.cylinders);
    println!("Sectors per track: {}", geometry.sectors_per_track);
    println!("Sector size: {} bytes", geometry.sector_size);
    println!("Total capacity: {} KB", geometry.total_capacity_kb());
    println!("Volume: {}", image.volume());
    println!("Filesystem: {}", image.filesystem());
    println!(
        "Valid sectors: {} of {} ({:.1}%)",
        image.valid_sector_count(),
        image.total_sectors(),
        image.valid_fraction() * 100.0
    );
}

fn list_tracks(image: &DiskImage) {
    println!(
        "{:<6} {:<5} {:<5} {:<8} {:<6} {:<8}",
        "Index", "Cyl", "Head", "Sectors", "Valid", "Status"
    );
    println!("{}", "-".repeat(43));
    for (index, track) in image.tracks().iter().enumerate() {
        let status = if track.is_fully_valid() {
            "OK"
        } else if track.valid_count() == 0 {
            "Unreadable"
        } else {
            "Damaged"
        };
        println!(
            "{:<6} {:<5} {:<5} {:<8} {:<6} {:<8}",
            index,
            track.cylinder,
            track.head,
            track.sector_count(),
            track.valid_count(),
            status
        );
    }
}

fn list_sectors_on_track(image: &DiskImage, cylinder: u8, head: u8) {
    let geometry = image.geometry();
    if head >= geometry.heads || cylinder >= geometry.cylinders {
        println!("Track {} not found on side {}.", cylinder, head);
        return;
    }
    let Some(track) = image.track(geometry.track_index(cylinder, head)) else {
        println!("Track {} not found on side {}.", cylinder, head);
        return;
    };
    println!("{:<7} {:<14} {:<6} {:<12}", "Sector", "Address", "Size", "Status");
    println!("{}", "-".repeat(42));
    for sector in track.sectors() {
        println!(
            "{:<7} {:<14} {:<6} {:<12}",
            sector.id.sector,
            sector.id.to_string(),
            sector.data().len(),
            sector.status
        );
    }
}

fn list_directory(image: &DiskImage) {
    match filesystem::list_files(image) {
        Ok(entries) => {
            if entries.is_empty() {
                println!("No files found.");
                return;
            }
            println!(
                "{:<30} {:<4} {:>7} {:>7} {:<6}",
                "Name", "Type", "Sectors", "Size", "Locked"
            );
            println!("{}", "-".repeat(58));
            for entry in entries {
                println!(
                    "{:<30} {:<4} {:>7} {:>7} {:<6}",
                    entry.name,
                    entry.type_label,
                    entry.sectors,
                    entry.size,
                    if entry.locked { "Yes" } else { "" }
                );
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn view_command(image: &DiskImage, name: &str, args: &[String]) {
    let entry = match filesystem::find_file(image, name) {
        Ok(e) => e,
        Err(e) => {
            println!("Error: {}", e);
            return;
        }
    };
    let mut mode = entry.preferred_view();
    let mut encoding = None;
    for arg in args {
        if let Ok(m) = arg.parse::<ViewMode>() {
            mode = m;
        } else if let Ok(enc) = arg.parse::<TextEncoding>() {
            encoding = Some(enc);
        } else {
            println!("Unknown view option: {}", arg);
            return;
        }
    }
    match view::view_file(image, &entry, mode, encoding) {
        Ok(view) => {
            println!("File: {} ({}, {})", entry.name, view.mode, view.encoding);
            for warning in &view.warnings {
                println!("Warning: {}", warning);
            }
            let shown: String = view.text.chars().take(DUMP_LIMIT * 5).collect();
            print!("{}", shown);
            if !shown.ends_with('\n') {
                println!();
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn extract_command(image: &DiskImage, name: &str, output: &str) {
    let result = filesystem::find_file(image, name)
        .and_then(|entry| filesystem::extract(image, &entry));
    match result {
        Ok(file) => {
            for warning in &file.warnings {
                println!("Warning: {}", warning);
            }
            match io::write_extracted_file(output, &file.data) {
                Ok(()) => println!("Extracted {} ({} bytes) to {}", name, file.data.len(), output),
                Err(e) => println!("Error: {}", e),
            }
        }
        Err(e) => println!("Error: {}", e),
    }
}

fn print_hex_dump(data: &[u8], max_bytes: usize) {
    let len = data.len().min(max_bytes);
    print!("{}", view::hex_dump(&data[..len], TextEncoding::Agat));
    if data.len() > max_bytes {
        println!("... ({} more bytes)", data.len() - max_bytes);
    }
}

fn parse_hex_or_dec(s: &str) -> Option<u8> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}
