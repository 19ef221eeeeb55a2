/// Geometry and filesystem autodetection
///
/// Each plausible (container, geometry) layout is decoded and, if enough
/// sectors validate, every filesystem is probed against it. A candidate scores
/// `valid fraction * probe strength`; the best candidate wins unless another
/// one is within the tie tolerance, in which case the caller has to choose.

use crate::codec;
use crate::error::{DiskError, Result};
use crate::filesystem::{self, Dos33FileSystem, FileSystem, FilesystemKind};
use crate::format::{
    detect_format, ContainerFormat, Geometry, AGAT_140K_SIZE, AGAT_840K_SIZE,
    NIB_AGAT_IMAGE_SIZE, NIB_GCR_IMAGE_SIZE,
};
use crate::image::DiskImage;
use log::{debug, info};
use std::cmp::Ordering;

/// Detection thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectConfig {
    /// Layouts decoding fewer valid sectors than this fraction are rejected
    pub min_valid_fraction: f64,
    /// Best score must reach this to count as a match
    pub min_score: f64,
    /// Scores closer than this are treated as equal
    pub tie_epsilon: f64,
    /// Strength given to "readable sectors, no known filesystem"
    pub unknown_fs_strength: f64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            min_valid_fraction: 0.90,
            min_score: 0.20,
            tie_epsilon: 1e-6,
            unknown_fs_strength: 0.25,
        }
    }
}

impl DetectConfig {
    /// Set the minimum valid-sector fraction
    pub fn with_min_valid_fraction(mut self, fraction: f64) -> Self {
        self.min_valid_fraction = fraction;
        self
    }

    /// Set the minimum winning score
    pub fn with_min_score(mut self, score: f64) -> Self {
        self.min_score = score;
        self
    }

    /// Set the tie tolerance
    pub fn with_tie_epsilon(mut self, epsilon: f64) -> Self {
        self.tie_epsilon = epsilon;
        self
    }

    /// Set the strength of the unknown-filesystem fallback
    pub fn with_unknown_fs_strength(mut self, strength: f64) -> Self {
        self.unknown_fs_strength = strength;
        self
    }
}

/// Hints for opening an image
///
/// An explicit geometry skips scoring: the bytes are only decoded, and the
/// filesystem is the explicit one or the strongest probe.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OpenOptions {
    /// Container format, instead of sniffing
    pub format: Option<ContainerFormat>,
    /// Disk geometry, instead of detection
    pub geometry: Option<Geometry>,
    /// Filesystem, instead of probing
    pub filesystem: Option<FilesystemKind>,
    /// Detection thresholds
    pub detect: DetectConfig,
}

impl OpenOptions {
    /// Options with everything detected
    pub fn new() -> Self {
        Self::default()
    }

    /// Force the container format
    pub fn format(mut self, format: ContainerFormat) -> Self {
        self.format = Some(format);
        self
    }

    /// Force the geometry
    pub fn geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Force the filesystem
    pub fn filesystem(mut self, filesystem: FilesystemKind) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    /// Replace the detection thresholds
    pub fn detect_config(mut self, config: DetectConfig) -> Self {
        self.detect = config;
        self
    }
}

/// One scored interpretation of the bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Container the bytes were decoded as
    pub format: ContainerFormat,
    /// Geometry used for decoding
    pub geometry: Geometry,
    /// Filesystem probed
    pub filesystem: FilesystemKind,
    /// Valid fraction times probe strength
    pub score: f64,
}

impl std::fmt::Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} / {} ({}, score {:.3})",
            self.geometry.name, self.filesystem, self.format, self.score
        )
    }
}

/// Outcome of detection
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// A single best interpretation
    Match {
        /// Container format
        format: ContainerFormat,
        /// Disk geometry
        geometry: Geometry,
        /// Filesystem
        filesystem: FilesystemKind,
        /// Winning score
        confidence: f64,
    },
    /// Several interpretations scored the same
    Ambiguous(Vec<Candidate>),
    /// Nothing scored above the threshold
    NoMatch,
}

/// Pick the container: explicit choice, then content sniffing, then extension
fn choose_container(
    bytes: &[u8],
    explicit: Option<ContainerFormat>,
    ext_hint: Option<ContainerFormat>,
) -> Option<ContainerFormat> {
    explicit.or_else(|| detect_format(bytes)).or(ext_hint)
}

fn flux_header(bytes: &[u8], format: ContainerFormat) -> Option<(usize, u8)> {
    match format {
        ContainerFormat::HxcMfm => codec::hxc_mfm::HxcMfmHeader::parse(bytes)
            .ok()
            .map(|h| (h.tracks as usize, h.sides)),
        ContainerFormat::HxcHfe => codec::hfe::HfeHeader::parse(bytes)
            .ok()
            .map(|h| (h.tracks as usize, h.sides)),
        _ => None,
    }
}

/// Layouts worth trying for a container, most likely first
pub fn candidate_layouts(bytes: &[u8], format: ContainerFormat) -> Vec<(ContainerFormat, Geometry)> {
    let geometries = match format {
        ContainerFormat::Raw => match bytes.len() {
            AGAT_140K_SIZE => vec![Geometry::agat_140k(), Geometry::apple_140k_prodos()],
            AGAT_840K_SIZE => vec![Geometry::agat_840k()],
            _ => Vec::new(),
        },
        ContainerFormat::Agat140k => vec![Geometry::agat_140k()],
        ContainerFormat::Agat840k => vec![Geometry::agat_840k()],
        ContainerFormat::NibMfm => match bytes.len() {
            NIB_GCR_IMAGE_SIZE => vec![Geometry::agat_140k()],
            NIB_AGAT_IMAGE_SIZE => vec![Geometry::agat_840k()],
            _ => Vec::new(),
        },
        ContainerFormat::NicMfm => vec![Geometry::agat_140k()],
        ContainerFormat::HxcMfm | ContainerFormat::HxcHfe => match flux_header(bytes, format) {
            Some((tracks, sides)) => [Geometry::agat_140k(), Geometry::agat_840k()]
                .into_iter()
                .filter(|g| g.heads <= sides && tracks > 0)
                .collect(),
            None => Vec::new(),
        },
    };
    geometries.into_iter().map(|g| (format, g)).collect()
}

/// Decoded layouts and their scored candidates, best first
struct Ranking {
    images: Vec<DiskImage>,
    scored: Vec<(Candidate, usize)>,
}

fn rank_decoded(
    bytes: &[u8],
    format: ContainerFormat,
    only: Option<FilesystemKind>,
    config: &DetectConfig,
) -> Ranking {
    let mut images = Vec::new();
    let mut scored = Vec::new();

    for (format, geometry) in candidate_layouts(bytes, format) {
        let image = match codec::decode(bytes, format, &geometry) {
            Ok(image) => image,
            Err(e) => {
                debug!("{} as {}: {}", format, geometry, e);
                continue;
            }
        };
        let valid = image.valid_fraction();
        if valid < config.min_valid_fraction {
            debug!(
                "{} as {}: only {:.1}% sectors valid",
                format,
                geometry,
                valid * 100.0
            );
            continue;
        }

        for kind in FilesystemKind::ALL {
            if only.is_some_and(|k| k != kind) {
                continue;
            }
            let strength = match kind {
                FilesystemKind::Unknown => config.unknown_fs_strength,
                known => filesystem::probe(&image, known),
            };
            if strength <= 0.0 {
                continue;
            }
            let candidate = Candidate {
                format,
                geometry,
                filesystem: kind,
                score: valid * strength,
            };
            debug!("Candidate {}", candidate);
            scored.push((candidate, images.len()));
        }
        images.push(image);
    }

    scored.sort_by(|a, b| b.0.score.partial_cmp(&a.0.score).unwrap_or(Ordering::Equal));
    Ranking { images, scored }
}

/// Score every interpretation of the bytes, best first
pub fn rank(
    bytes: &[u8],
    format: Option<ContainerFormat>,
    config: &DetectConfig,
) -> Vec<Candidate> {
    match choose_container(bytes, format, None) {
        Some(format) => rank_decoded(bytes, format, None, config)
            .scored
            .into_iter()
            .map(|(c, _)| c)
            .collect(),
        None => Vec::new(),
    }
}

/// Index into `scored` of the winner, or the detection outcome when there is none
fn decide(scored: &[(Candidate, usize)], config: &DetectConfig) -> std::result::Result<usize, Detection> {
    let Some((best, _)) = scored.first() else {
        return Err(Detection::NoMatch);
    };
    if best.score < config.min_score {
        debug!("Best score {:.3} below threshold", best.score);
        return Err(Detection::NoMatch);
    }
    let tied: Vec<Candidate> = scored
        .iter()
        .map(|(c, _)| c)
        .filter(|c| best.score - c.score <= config.tie_epsilon)
        .cloned()
        .collect();
    if tied.len() > 1 {
        return Err(Detection::Ambiguous(tied));
    }
    Ok(0)
}

/// Detect container, geometry and filesystem from content alone.
///
/// `format` forces the container; detection still scores geometries and
/// filesystems. Running it twice on the same bytes yields the same outcome.
pub fn detect(bytes: &[u8], format: Option<ContainerFormat>, config: &DetectConfig) -> Detection {
    let Some(format) = choose_container(bytes, format, None) else {
        return Detection::NoMatch;
    };
    let ranking = rank_decoded(bytes, format, None, config);
    match decide(&ranking.scored, config) {
        Ok(winner) => {
            let best = &ranking.scored[winner].0;
            Detection::Match {
                format: best.format,
                geometry: best.geometry,
                filesystem: best.filesystem,
                confidence: best.score,
            }
        }
        Err(outcome) => outcome,
    }
}

/// Strongest filesystem probe on a decoded image
fn best_filesystem(image: &DiskImage) -> FilesystemKind {
    [FilesystemKind::Dos33, FilesystemKind::SpriteOs]
        .into_iter()
        .map(|k| (k, filesystem::probe(image, k)))
        .filter(|&(_, strength)| strength > 0.0)
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal))
        .map(|(k, _)| k)
        .unwrap_or(FilesystemKind::Unknown)
}

/// Decode and bind an image according to the options.
///
/// `ext_hint` is the container suggested by the host file extension.
pub fn open_bytes(
    bytes: &[u8],
    options: &OpenOptions,
    ext_hint: Option<ContainerFormat>,
) -> Result<DiskImage> {
    let format = choose_container(bytes, options.format, ext_hint).ok_or(DiskError::NoMatch)?;

    let mut image = match options.geometry {
        Some(geometry) => {
            let image = codec::decode(bytes, format, &geometry).map_err(|e| {
                info!("Decoding as {} {} failed: {}", format, geometry, e);
                DiskError::NoMatch
            })?;
            if image.valid_sector_count() == 0 {
                info!("No readable sectors as {} {}", format, geometry);
                return Err(DiskError::NoMatch);
            }
            let kind = options
                .filesystem
                .unwrap_or_else(|| best_filesystem(&image));
            image.with_filesystem(kind)
        }
        None => {
            let mut ranking = rank_decoded(bytes, format, options.filesystem, &options.detect);
            match decide(&ranking.scored, &options.detect) {
                Ok(winner) => {
                    let (best, index) = ranking.scored.swap_remove(winner);
                    info!("Detected {}", best);
                    ranking.images.swap_remove(index).with_filesystem(best.filesystem)
                }
                Err(Detection::Ambiguous(tied)) => {
                    return Err(DiskError::Ambiguous {
                        candidates: tied.iter().map(|c| c.to_string()).collect(),
                    })
                }
                Err(_) => return Err(DiskError::NoMatch),
            }
        }
    };

    // Sector dumps carry no address fields; take the volume from the VTOC
    if !image.format().is_flux() && image.filesystem() == FilesystemKind::Dos33 {
        if let Ok(fs) = Dos33FileSystem::from_image(&image) {
            let volume = fs.vtoc().volume;
            if (1..=254).contains(&volume) {
                image.set_volume(volume);
            }
        }
    }
    Ok(image)
}
