/// Integration tests for dskcommander

use dskcommander::track::gcr;
use dskcommander::*;
use proptest::prelude::*;

const HELLO_SECTORS: [(u8, u8, u8); 3] = [(18, 14, 0x11), (18, 13, 0x22), (18, 12, 0x33)];

/// Write a sector by DOS 3.3 logical address
fn put_dos(image: &mut DiskImage, track: u8, sector: u8, data: &[u8]) {
    let physical = SectorSkew::Dos33.physical(sector, 16);
    image
        .write_sector(track, 0, physical, data)
        .expect("Failed to write sector");
}

fn dos_catalog_entry(sector: &mut [u8], slot: usize, tsl: (u8, u8), file_type: u8, name: &str) {
    let e = 0x0B + slot * 0x23;
    sector[e] = tsl.0;
    sector[e + 1] = tsl.1;
    sector[e + 2] = file_type;
    for i in 0..30 {
        sector[e + 3 + i] = name.as_bytes().get(i).copied().unwrap_or(b' ') | 0x80;
    }
    sector[e + 33] = 2;
}

/// A freshly initialised DOS 3.3 disk with a binary and a text file
fn dos_disk() -> DiskImage {
    let mut image = DiskImage::create(Geometry::agat_140k())
        .expect("Failed to create image")
        .with_filesystem(FilesystemKind::Dos33);

    let mut vtoc = vec![0u8; 256];
    vtoc[0x01] = 17;
    vtoc[0x02] = 15;
    vtoc[0x03] = 3;
    vtoc[0x06] = 254;
    vtoc[0x27] = 122;
    vtoc[0x34] = 35;
    vtoc[0x35] = 16;
    vtoc[0x37] = 0x01;
    put_dos(&mut image, 17, 0, &vtoc);

    // Full catalog chain from S15 down to S1
    for sector in 1..=15u8 {
        let mut catalog = vec![0u8; 256];
        if sector > 1 {
            catalog[1] = 17;
            catalog[2] = sector - 1;
        }
        if sector == 15 {
            dos_catalog_entry(&mut catalog, 0, (18, 15), 0x84, "HELLO");
            dos_catalog_entry(&mut catalog, 1, (19, 15), 0x00, "NOTES");
        }
        put_dos(&mut image, 17, sector, &catalog);
    }

    let mut tsl = vec![0u8; 256];
    for (i, &(t, s, fill)) in HELLO_SECTORS.iter().enumerate() {
        tsl[0x0C + i * 2] = t;
        tsl[0x0D + i * 2] = s;
        put_dos(&mut image, t, s, &[fill; 256]);
    }
    put_dos(&mut image, 18, 15, &tsl);

    let mut notes_tsl = vec![0u8; 256];
    notes_tsl[0x0C] = 19;
    notes_tsl[0x0D] = 14;
    put_dos(&mut image, 19, 15, &notes_tsl);
    let mut text: Vec<u8> = b"HELLO\rAGAT\r".iter().map(|b| b | 0x80).collect();
    text.resize(256, 0x80);
    put_dos(&mut image, 19, 14, &text);

    image
}

/// Write a sector by Sprite OS logical track (cylinder * 2 + head)
fn put_sprite(image: &mut DiskImage, track: u8, sector: u8, data: &[u8]) {
    image
        .write_sector(track / 2, track % 2, sector, data)
        .expect("Failed to write sector");
}

/// A Sprite OS disk holding `DEMO`, 700 bytes over 3 sectors on both sides
fn sprite_disk() -> DiskImage {
    let mut image = DiskImage::create(Geometry::agat_840k())
        .expect("Failed to create image")
        .with_filesystem(FilesystemKind::SpriteOs);

    let mut descriptor = vec![0u8; 256];
    descriptor[0] = 1;
    descriptor[2] = 2;
    descriptor[3] = 12;
    descriptor[4] = 160;
    descriptor[5] = 21;
    descriptor[6..8].copy_from_slice(&256u16.to_le_bytes());
    descriptor[8..16].copy_from_slice(b"WORKDISK");
    put_sprite(&mut image, 0, 1, &descriptor);

    let mut dir = vec![0u8; 256];
    let e = 16;
    dir[e] = 1;
    dir[e + 1] = 0x05;
    dir[e + 3..e + 19].fill(b' ');
    dir[e + 3..e + 7].copy_from_slice(b"DEMO");
    dir[e + 19..e + 22].copy_from_slice(&700u32.to_le_bytes()[..3]);
    dir[e + 22] = 40;
    dir[e + 23] = 0;
    dir[e + 24] = 3;
    put_sprite(&mut image, 0, 2, &dir);

    let mut index = vec![0u8; 256];
    for (i, (t, s)) in [(40u8, 1u8), (41, 7), (159, 20)].iter().enumerate() {
        index[4 + i * 2] = *t;
        index[5 + i * 2] = *s;
        put_sprite(&mut image, *t, *s, &[0xB0 + i as u8; 256]);
    }
    put_sprite(&mut image, 40, 0, &index);
    image
}

fn assert_same_sectors(a: &DiskImage, b: &DiskImage) {
    assert_eq!(a.track_count(), b.track_count());
    for (ta, tb) in a.tracks().iter().zip(b.tracks()) {
        assert!(tb.is_fully_valid(), "track {}:{} not fully valid", tb.cylinder, tb.head);
        for (sa, sb) in ta.sectors().iter().zip(tb.sectors()) {
            assert_eq!(sa.data(), sb.data(), "sector {} differs", sa.id);
        }
    }
}

fn hello_bytes() -> Vec<u8> {
    HELLO_SECTORS
        .iter()
        .flat_map(|&(_, _, fill)| std::iter::repeat(fill).take(256))
        .collect()
}

#[test]
fn test_140k_round_trip_through_every_container() {
    let source = dos_disk();
    for target in [
        ContainerFormat::Raw,
        ContainerFormat::Agat140k,
        ContainerFormat::NibMfm,
        ContainerFormat::NicMfm,
        ContainerFormat::HxcMfm,
        ContainerFormat::HxcHfe,
    ] {
        let bytes = source.to_bytes(target).expect("Failed to encode");
        let options = OpenOptions::new().format(target);
        let back = DiskImage::from_bytes(&bytes, &options)
            .unwrap_or_else(|e| panic!("{} failed to reopen: {}", target, e));

        assert_eq!(back.filesystem(), FilesystemKind::Dos33, "{}", target);
        assert_eq!(back.volume(), 254, "{}", target);
        assert!(back.warnings().is_empty(), "{}", target);
        assert_same_sectors(&source, &back);

        let entry = filesystem::find_file(&back, "HELLO").expect("HELLO missing");
        let file = filesystem::extract(&back, &entry).expect("Failed to extract");
        assert_eq!(file.data, hello_bytes(), "{}", target);
    }
}

#[test]
fn test_840k_round_trip_through_every_container() {
    let source = sprite_disk();
    for target in [
        ContainerFormat::Raw,
        ContainerFormat::Agat840k,
        ContainerFormat::NibMfm,
        ContainerFormat::HxcMfm,
        ContainerFormat::HxcHfe,
    ] {
        let bytes = source.to_bytes(target).expect("Failed to encode");
        let back = DiskImage::from_bytes(&bytes, &OpenOptions::new().format(target))
            .unwrap_or_else(|e| panic!("{} failed to reopen: {}", target, e));

        assert_eq!(back.geometry().heads, 2);
        assert_eq!(back.filesystem(), FilesystemKind::SpriteOs, "{}", target);
        assert_same_sectors(&source, &back);

        let entry = filesystem::find_file(&back, "demo").expect("DEMO missing");
        let file = filesystem::extract(&back, &entry).expect("Failed to extract");
        assert_eq!(file.data.len(), 700);
        assert!(file.data[..256].iter().all(|&b| b == 0xB0));
        assert!(file.data[512..].iter().all(|&b| b == 0xB2));
    }
}

#[test]
fn test_840k_cannot_be_written_as_nic_or_140k() {
    let image = sprite_disk();
    assert!(matches!(
        image.to_bytes(ContainerFormat::NicMfm),
        Err(DiskError::UnsupportedFormat(_))
    ));
    assert!(matches!(
        image.to_bytes(ContainerFormat::Agat140k),
        Err(DiskError::UnsupportedFormat(_))
    ));
}

#[test]
fn test_flux_reencode_is_stable() {
    let nib = dos_disk().to_bytes(ContainerFormat::NibMfm).unwrap();
    let image = DiskImage::from_bytes(&nib, &OpenOptions::new()).unwrap();
    assert_eq!(image.format(), ContainerFormat::NibMfm);
    assert_eq!(image.to_bytes(ContainerFormat::NibMfm).unwrap(), nib);
}

#[test]
fn test_detection_is_repeatable() {
    let config = DetectConfig::default();
    let bytes = dos_disk().to_bytes(ContainerFormat::Raw).unwrap();
    let first = detect::detect(&bytes, None, &config);
    let second = detect::detect(&bytes, None, &config);
    assert_eq!(first, second);

    match first {
        Detection::Match {
            format,
            geometry,
            filesystem,
            confidence,
        } => {
            assert_eq!(format, ContainerFormat::Raw);
            assert_eq!(geometry.skew, SectorSkew::Dos33);
            assert_eq!(filesystem, FilesystemKind::Dos33);
            assert!((confidence - 1.0).abs() < 1e-9);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_blank_140k_dump_is_ambiguous() {
    let bytes = vec![0u8; 143_360];
    match detect::detect(&bytes, None, &DetectConfig::default()) {
        Detection::Ambiguous(candidates) => {
            assert_eq!(candidates.len(), 2);
            assert!(candidates
                .iter()
                .all(|c| c.filesystem == FilesystemKind::Unknown));
        }
        other => panic!("unexpected {:?}", other),
    }

    assert!(matches!(
        DiskImage::from_bytes(&bytes, &OpenOptions::new()),
        Err(DiskError::Ambiguous { .. })
    ));

    // An explicit geometry settles it
    let image = DiskImage::from_bytes(
        &bytes,
        &OpenOptions::new().geometry(Geometry::apple_140k_prodos()),
    )
    .unwrap();
    assert_eq!(image.geometry().skew, SectorSkew::ProDos);
    assert_eq!(image.filesystem(), FilesystemKind::Unknown);
    assert!(matches!(
        filesystem::list_files(&image),
        Err(DiskError::UnknownFilesystem)
    ));
}

#[test]
fn test_garbage_is_no_match() {
    let bytes = vec![0x42u8; 5000];
    assert_eq!(
        detect::detect(&bytes, None, &DetectConfig::default()),
        Detection::NoMatch
    );
    assert!(matches!(
        DiskImage::from_bytes(&bytes, &OpenOptions::new()),
        Err(DiskError::NoMatch)
    ));
}

/// NIB bytes with one data nibble altered on track 20
fn nib_with_bad_sector() -> Vec<u8> {
    let mut nib = dos_disk().to_bytes(ContainerFormat::NibMfm).unwrap();
    let start = 20 * format::NIB_GCR_TRACK_SIZE;
    let track = &nib[start..start + format::NIB_GCR_TRACK_SIZE];
    let prologue = track
        .windows(3)
        .position(|w| w == gcr::DATA_PROLOGUE)
        .expect("no data field on track 20");
    let at = start + prologue + 3 + 10;
    nib[at] = if nib[at] == 0x96 { 0x97 } else { 0x96 };
    nib
}

#[test]
fn test_single_corrupt_sector_is_isolated() {
    let nib = nib_with_bad_sector();
    let image = DiskImage::from_bytes(&nib, &OpenOptions::new()).unwrap();

    assert_eq!(image.filesystem(), FilesystemKind::Dos33);
    assert_eq!(image.invalid_sector_count(), 1);
    assert_eq!(image.track(20).unwrap().valid_count(), 15);
    assert_eq!(
        image.warnings(),
        &[Warning::IncompleteSectorData {
            invalid: 1,
            total: 560
        }]
    );

    // Other files are untouched
    let entry = filesystem::find_file(&image, "HELLO").unwrap();
    let file = filesystem::extract(&image, &entry).unwrap();
    assert!(file.is_complete());
    assert_eq!(file.data, hello_bytes());
}

#[test]
fn test_export_of_damaged_image_is_lossy() {
    let image = DiskImage::from_bytes(&nib_with_bad_sector(), &OpenOptions::new()).unwrap();
    assert!(matches!(
        image.to_bytes(ContainerFormat::Raw),
        Err(DiskError::CorruptTrack { track: 20 })
    ));

    let exported = export::export(&image, ContainerFormat::Raw).unwrap();
    assert!(!exported.is_lossless());
    assert_eq!(
        exported.warnings,
        vec![Warning::LossyExport { invalid_sectors: 1 }]
    );
    assert_eq!(exported.bytes.len(), format::AGAT_140K_SIZE);
}

#[test]
fn test_catalog_cycle_is_reported() {
    let mut image = dos_disk();
    let mut catalog = image
        .read_sector(17, 0, SectorSkew::Dos33.physical(14, 16))
        .unwrap()
        .to_vec();
    catalog[1] = 17;
    catalog[2] = 15;
    put_dos(&mut image, 17, 14, &catalog);

    assert!(matches!(
        filesystem::list_files(&image),
        Err(DiskError::CorruptCatalog(_))
    ));
}

#[test]
fn test_extract_three_sector_file_in_order() {
    let image = dos_disk();
    let entries = filesystem::list_files(&image).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["HELLO", "NOTES"]);
    assert!(entries[0].locked);
    assert_eq!(entries[0].type_label, "B");

    let file = filesystem::extract(&image, &entries[0]).unwrap();
    assert_eq!(file.data.len(), 768);
    assert_eq!(file.data, hello_bytes());
    assert!(file.warnings.is_empty());
}

#[test]
fn test_view_text_file() {
    let image = dos_disk();
    let entry = filesystem::find_file(&image, "NOTES").unwrap();
    assert_eq!(entry.preferred_view(), ViewMode::Text);

    let shown = view::view_file(&image, &entry, ViewMode::Text, Some(TextEncoding::Apple)).unwrap();
    assert!(shown.text.starts_with("HELLO\nAGAT\n"));

    let hex = view::view_file(&image, &entry, ViewMode::Binary, None).unwrap();
    assert!(hex.text.starts_with("0000  C8 C5 CC CC CF 8D"));
    assert_eq!(hex.text.lines().count(), 16);
}

#[test]
fn test_driver_on_wrong_filesystem() {
    let image = dos_disk();
    assert!(matches!(
        SpriteOsFileSystem::from_image(&image),
        Err(DiskError::FilesystemMismatch { .. })
    ));

    let sprite = sprite_disk();
    let entry = filesystem::find_file(&sprite, "DEMO").unwrap();
    assert!(matches!(
        filesystem::extract(&image, &entry),
        Err(DiskError::ForeignEntry(_))
    ));
}

#[test]
fn test_filesystem_info() {
    let info = filesystem::info(&sprite_disk()).unwrap();
    assert_eq!(info.kind, FilesystemKind::SpriteOs);
    assert_eq!(info.label.as_deref(), Some("WORKDISK"));
    assert_eq!(info.volume, 12);
    assert_eq!(info.file_count, 1);

    let info = filesystem::info(&dos_disk()).unwrap();
    assert_eq!(info.volume, 254);
    assert_eq!(info.catalog, (17, 15));
    assert_eq!(info.file_count, 2);
}

#[test]
fn test_save_and_open_file() {
    let path = std::env::temp_dir().join(format!("dskc-it-{}.hfe", std::process::id()));
    let warnings = dos_disk().save(ContainerFormat::HxcHfe, &path).unwrap();
    assert!(warnings.is_empty());

    let image = DiskImage::open(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(image.format(), ContainerFormat::HxcHfe);
    assert_eq!(image.filesystem(), FilesystemKind::Dos33);
    assert!(image.filename().is_some());
}

#[test]
fn test_forced_filesystem_on_small_sectors_errors() {
    let bytes = vec![0u8; 35 * 16 * 128];
    for kind in [FilesystemKind::Dos33, FilesystemKind::SpriteOs] {
        let options = OpenOptions::new()
            .format(ContainerFormat::Raw)
            .geometry(Geometry::new(35, 1, 16, 128, Encoding::Gcr62))
            .filesystem(kind);
        let image = DiskImage::from_bytes(&bytes, &options).expect("Failed to open image");
        assert!(matches!(
            filesystem::list_files(&image),
            Err(DiskError::UnsupportedFormat(_))
        ));
        assert!(SpriteOsFileSystem::from_image(&image).is_err());
        assert!(Dos33FileSystem::from_image(&image).is_err());
    }
}

proptest! {
    #[test]
    fn prop_detection_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..4096)) {
        let _ = detect::detect(&bytes, None, &DetectConfig::default());
        let _ = codec::decode(&bytes, ContainerFormat::HxcHfe, &Geometry::agat_140k());
        let _ = codec::decode(&bytes, ContainerFormat::HxcMfm, &Geometry::agat_840k());
    }

    #[test]
    fn prop_flux_headers_with_garbage_never_panic(tail in proptest::collection::vec(any::<u8>(), 0..2048)) {
        for signature in [format::HFE_SIGNATURE, format::HXC_MFM_SIGNATURE] {
            let mut bytes = signature.to_vec();
            bytes.extend_from_slice(&tail);
            let _ = DiskImage::from_bytes(&bytes, &OpenOptions::new());
        }
    }

    #[test]
    fn prop_gcr_payload_survives(data in proptest::collection::vec(any::<u8>(), 256)) {
        let (decoded, ok) = gcr::decode_62(&gcr::encode_62(&data));
        prop_assert!(ok);
        prop_assert_eq!(decoded, data);
    }
}
