//! End-to-end tests: generated codes through the decode chain and classifier

use image::{imageops, GrayImage, Luma};
use scan_core::decoding::{DecodeBackend, RawCode, RestorationBackend};
use scan_core::payload::{self, ContactCard, EventDraft};
use scan_core::restoration::invert;
use scan_core::{
    BackendOutcome, ContentType, DecodeChain, DecoderKind, HistoryStore, ParsedContent,
    QRGenerator, QRScanner, ScanSettings, Verdict,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn init_logs() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .is_test(true)
        .try_init();
}

fn render(content: &str) -> GrayImage {
    QRGenerator::default().generate(content).unwrap()
}

/// Backend that never finds anything and counts its calls
struct Empty {
    kind: DecoderKind,
    calls: Arc<AtomicUsize>,
}

impl DecodeBackend for Empty {
    fn kind(&self) -> DecoderKind {
        self.kind
    }

    fn decode(&self, _img: &GrayImage) -> BackendOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        BackendOutcome::Success(Vec::<RawCode>::new())
    }
}

fn empty(kind: DecoderKind) -> (Empty, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    (
        Empty {
            kind,
            calls: calls.clone(),
        },
        calls,
    )
}

#[test]
fn test_every_content_type_survives_scanning() {
    init_logs();
    let cases = vec![
        (payload::wifi("Office", "pw;1", "WPA", false), ContentType::Wifi),
        (
            payload::vcard(&ContactCard {
                name: "Ada Lovelace",
                phone: "+44 20 7946 0000",
                ..Default::default()
            }),
            ContentType::Contact,
        ),
        (
            payload::event(&EventDraft {
                title: "Standup",
                start_time_ms: 1_710_493_200_000,
                ..Default::default()
            }),
            ContentType::Calendar,
        ),
        (payload::mailto("a@example.com", "Hi", ""), ContentType::Email),
        (payload::geo(48.8584, 2.2945, ""), ContentType::Geo),
        (payload::sms("+15550100", "hello"), ContentType::Sms),
        (payload::tel("+15550100"), ContentType::Phone),
        ("https://example.com/a".to_string(), ContentType::Url),
        ("just some words".to_string(), ContentType::Text),
    ];

    let scanner = QRScanner::new();
    for (content, expected) in cases {
        let result = scanner.scan_image(&render(&content)).unwrap();
        assert_eq!(result.codes.len(), 1, "{}", content);
        assert_eq!(result.codes[0].content, content);
        assert_eq!(result.codes[0].content_type, expected, "{}", content);
    }
}

#[test]
fn test_rotated_and_low_contrast_codes() {
    let scanner = QRScanner::new();
    let img = render("rotated payload");

    let rotated = imageops::rotate90(&img);
    assert_eq!(scanner.scan_image(&rotated).unwrap().codes[0].content, "rotated payload");

    let mut faded = img.clone();
    for p in faded.pixels_mut() {
        p.0[0] = 100 + (p.0[0] as u32 * 50 / 255) as u8;
    }
    assert_eq!(scanner.scan_image(&faded).unwrap().codes[0].content, "rotated payload");
}

#[test]
fn test_inverted_code_is_found_by_sync_chain() {
    let result = QRScanner::new().scan_image(&invert(&render("dark mode"))).unwrap();
    assert_eq!(result.codes.len(), 1);
    assert_eq!(result.codes[0].content, "dark mode");
    assert_ne!(result.codes[0].source, DecoderKind::Restoration);
}

#[test]
fn test_two_codes_in_one_frame_are_both_reported() {
    let first = render("WIFI:T:WPA;S:Lobby;P:guest;;");
    let second = render("tel:+15550100");
    let gap = 160;
    let mut frame = GrayImage::from_pixel(
        first.width() + second.width() + gap,
        first.height().max(second.height()) + 80,
        Luma([255]),
    );
    imageops::overlay(&mut frame, &first, 0, 40);
    imageops::overlay(&mut frame, &second, (first.width() + gap) as i64, 40);

    let result = QRScanner::new().scan_image(&frame).unwrap();
    assert_eq!(result.codes.len(), 2);
    assert!(result.codes.iter().all(|c| c.source == DecoderKind::Rxing));

    let mut types: Vec<ContentType> = result.codes.iter().map(|c| c.content_type).collect();
    types.sort_by_key(|t| format!("{:?}", t));
    assert_eq!(types, vec![ContentType::Phone, ContentType::Wifi]);
}

#[test]
fn test_sync_chain_never_reaches_restoration() {
    let (a, a_calls) = empty(DecoderKind::Rxing);
    let (b, b_calls) = empty(DecoderKind::Rqrr);
    let chain = DecodeChain::builder()
        .primary(a)
        .secondary(b)
        .restoring(RestorationBackend::default())
        .build();

    assert!(chain.decode(&render("needs restoration")).is_empty());
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(b_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_async_chain_falls_back_to_restoration() {
    init_logs();
    let (a, _) = empty(DecoderKind::Rxing);
    let (b, _) = empty(DecoderKind::Rqrr);
    let chain = DecodeChain::builder()
        .primary(a)
        .secondary(b)
        .restoring(RestorationBackend::default())
        .build();

    let candidates = chain.decode_async(&render("restored")).await;
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].text, "restored");
    assert_eq!(candidates[0].source_decoder, DecoderKind::Restoration);
}

#[tokio::test]
async fn test_async_scan_of_blank_image_is_empty() {
    let blank = GrayImage::from_pixel(300, 300, Luma([255]));
    let result = QRScanner::new().scan_image_async(blank).await.unwrap();
    assert!(result.codes.is_empty());
}

#[test]
fn test_downscaled_large_image_still_decodes() {
    let settings = ScanSettings {
        max_dimension: 400,
        ..ScanSettings::default()
    };
    let big = imageops::resize(&render("big"), 1200, 1200, imageops::FilterType::Nearest);
    let result = QRScanner::with_settings(settings).scan_image(&big).unwrap();
    assert_eq!(result.codes[0].content, "big");
}

#[test]
fn test_suspicious_link_is_reported() {
    let result = QRScanner::new().scan_image(&render("http://bit.ly/3xYz")).unwrap();
    let item = &result.codes[0];
    assert_eq!(item.content_type, ContentType::Url);
    assert_eq!(item.link_report.as_ref().unwrap().verdict, Verdict::Suspicious);
}

#[test]
fn test_scan_history_backup_restore() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::open(dir.path().join("history.db")).unwrap();
    let scanner = QRScanner::new();

    for content in ["tel:+15550100", "WIFI:T:WPA;S:Home;P:pw;;", "tel:+15550100"] {
        for item in scanner.scan_image(&render(content)).unwrap().codes {
            store
                .insert_if_absent(&item.content, item.content_type, false, &item.format)
                .unwrap();
        }
    }
    let records = store.query_all().unwrap();
    assert_eq!(records.len(), 2);

    let backup = store.export_json().unwrap();
    let restored = HistoryStore::open_in_memory().unwrap();
    assert_eq!(restored.import_json(&backup).unwrap(), 2);

    let wifi = restored
        .find_by_content("WIFI:T:WPA;S:Home;P:pw;;")
        .unwrap()
        .unwrap();
    assert_eq!(wifi.content_type, ContentType::Wifi);
    match scan_core::classify(&wifi.content) {
        ParsedContent::Wifi { ssid, .. } => assert_eq!(ssid, "Home"),
        other => panic!("expected wifi, got {:?}", other),
    }
}
