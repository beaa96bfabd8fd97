//! Decode fallback chain
//!
//! Three independent backends are consulted in a fixed order and the first
//! non-empty result wins:
//!
//! - A: rxing `MultiFormatReader` behind `GenericMultipleBarcodeReader` (every
//!   QR, 1D and 2D symbol in the frame), gated by a capability check that runs
//!   once per process
//! - B: rqrr, with one retry on a color-inverted copy
//! - C: restoration pipeline followed by rxing, asynchronous
//!
//! The synchronous entry point stops after B. Only [`DecodeChain::decode_async`]
//! reaches C.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::OnceLock;

use image::GrayImage;
use rxing::common::{GlobalHistogramBinarizer, HybridBinarizer};
use rxing::multi::{GenericMultipleBarcodeReader, MultipleBarcodeReader};
use rxing::qrcode::QRCodeReader;
use rxing::{
    BarcodeFormat, Binarizer, BinaryBitmap, DecodeHintType, DecodeHintValue,
    DecodingHintDictionary, Exceptions, Luma8LuminanceSource, MultiFormatReader, RXingResult,
    Reader,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generation::{render_code, GeneratorConfig};
use crate::restoration::{self, ImageRestorer, RestorationConfig};

const SELF_CHECK_PAYLOAD: &str = "codescan-self-check";

static RXING_READY: OnceLock<Result<(), String>> = OnceLock::new();

/// Decoding errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("No code found in image")]
    NotFound,

    #[error("Failed to decode: {0}")]
    DecodeFailed(String),

    #[error("Invalid image: {0}")]
    InvalidImage(String),

    #[error("Decoder backend unavailable: {0}")]
    BackendUnavailable(String),
}

/// Which backend produced a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecoderKind {
    /// Backend A
    Rxing,
    /// Backend B
    Rqrr,
    /// Backend C
    Restoration,
}

impl fmt::Display for DecoderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DecoderKind::Rxing => "rxing",
            DecoderKind::Rqrr => "rqrr",
            DecoderKind::Restoration => "restoration",
        };
        f.write_str(name)
    }
}

/// Text read by a single backend, before it is attributed to the chain
#[derive(Debug, Clone, PartialEq)]
pub struct RawCode {
    pub text: String,
    /// Symbology as reported by the engine, e.g. `QR_CODE` or `EAN_13`
    pub format: String,
}

impl RawCode {
    pub fn qr(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: "QR_CODE".to_string(),
        }
    }
}

/// Decoded text together with the backend that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedCandidate {
    pub text: String,
    pub source_decoder: DecoderKind,
    pub format: String,
}

/// Result of one backend call
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome {
    /// Backend ran; the list may be empty when nothing was found
    Success(Vec<RawCode>),
    /// Backend is not usable in this process
    Unavailable,
    /// Backend ran and failed
    Failed(String),
}

impl BackendOutcome {
    pub fn has_codes(&self) -> bool {
        matches!(self, BackendOutcome::Success(codes) if !codes.is_empty())
    }

    fn into_candidates(self, kind: DecoderKind) -> Vec<DecodedCandidate> {
        match self {
            BackendOutcome::Success(codes) => codes
                .into_iter()
                .map(|code| DecodedCandidate {
                    text: code.text,
                    source_decoder: kind,
                    format: code.format,
                })
                .collect(),
            BackendOutcome::Unavailable => {
                log::debug!("{}: unavailable, skipped", kind);
                Vec::new()
            }
            BackendOutcome::Failed(reason) => {
                log::warn!("{}: decode failed: {}", kind, reason);
                Vec::new()
            }
        }
    }
}

/// Synchronous decoding engine
pub trait DecodeBackend: Send + Sync {
    fn kind(&self) -> DecoderKind;

    /// Capability check; an error skips the backend without calling `decode`
    fn availability(&self) -> Result<(), DecodeError> {
        Ok(())
    }

    fn decode(&self, img: &GrayImage) -> BackendOutcome;
}

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Callback-style engine bridged into a future
pub trait AsyncDecodeBackend: Send + Sync {
    fn kind(&self) -> DecoderKind;

    fn decode(&self, img: GrayImage) -> BoxFuture<'static, BackendOutcome>;
}

/// Backend A: rxing multi-format reader
pub struct RxingBackend {
    hints: DecodingHintDictionary,
}

impl Default for RxingBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RxingBackend {
    pub fn new() -> Self {
        let mut hints = DecodingHintDictionary::new();
        hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
        Self { hints }
    }

    /// Decodes a known code once per process and remembers whether it worked
    pub fn capability_check() -> Result<(), DecodeError> {
        RXING_READY
            .get_or_init(|| {
                log::info!("RXING: running capability check");
                let code = qrcode::QrCode::new(SELF_CHECK_PAYLOAD.as_bytes())
                    .map_err(|e| format!("self-check encode failed: {}", e))?;
                let img = render_code(&code, &GeneratorConfig::default());
                let mut reader = MultiFormatReader::default();
                let hints = DecodingHintDictionary::new();
                match reader.decode_with_hints(&mut hybrid_bitmap(&img), &hints) {
                    Ok(result) if result.getText() == SELF_CHECK_PAYLOAD => Ok(()),
                    Ok(result) => Err(format!("self-check read back {:?}", result.getText())),
                    Err(e) => Err(format!("self-check decode failed: {}", e)),
                }
            })
            .clone()
            .map_err(DecodeError::BackendUnavailable)
    }
}

impl DecodeBackend for RxingBackend {
    fn kind(&self) -> DecoderKind {
        DecoderKind::Rxing
    }

    fn availability(&self) -> Result<(), DecodeError> {
        Self::capability_check()
    }

    fn decode(&self, img: &GrayImage) -> BackendOutcome {
        log::info!("RXING: Starting decode on {}x{} image", img.width(), img.height());

        let mut multi = GenericMultipleBarcodeReader::new(MultiFormatReader::default());
        match multi.decode_multiple_with_hints(&mut hybrid_bitmap(img), &self.hints) {
            Ok(results) => {
                log::debug!("RXING: {} symbol(s) in one pass", results.len());
                return BackendOutcome::Success(results.iter().map(to_raw).collect());
            }
            Err(e) => log::debug!("RXING: multi-symbol pass: {}", e),
        }

        let mut reader = MultiFormatReader::default();
        match reader.decode_with_hints(&mut hybrid_bitmap(img), &self.hints) {
            Ok(result) => return BackendOutcome::Success(vec![to_raw(&result)]),
            Err(e) => log::debug!("RXING: HybridBinarizer: {}", e),
        }

        match reader.decode_with_hints(&mut global_bitmap(img), &self.hints) {
            Ok(result) => BackendOutcome::Success(vec![to_raw(&result)]),
            Err(Exceptions::NotFoundException(_)) => BackendOutcome::Success(Vec::new()),
            Err(e) => BackendOutcome::Failed(e.to_string()),
        }
    }
}

/// Backend B: rqrr, all grids in the image
pub struct RqrrBackend {
    try_inverted: bool,
}

impl Default for RqrrBackend {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RqrrBackend {
    pub fn new(try_inverted: bool) -> Self {
        Self { try_inverted }
    }

    fn scan_grids(&self, img: &GrayImage) -> BackendOutcome {
        let mut prepared = rqrr::PreparedImage::prepare(img.clone());
        let grids = prepared.detect_grids();
        log::debug!("RQRR: Detected {} grids", grids.len());

        let mut codes = Vec::new();
        let mut last_error = None;
        for grid in &grids {
            match grid.decode() {
                Ok((meta, content)) => {
                    log::debug!("RQRR: version {} ecc {}", meta.version.0, meta.ecc_level);
                    codes.push(RawCode::qr(content));
                }
                Err(e) => last_error = Some(format!("{:?}", e)),
            }
        }

        match last_error {
            Some(reason) if codes.is_empty() => BackendOutcome::Failed(reason),
            _ => BackendOutcome::Success(codes),
        }
    }
}

impl DecodeBackend for RqrrBackend {
    fn kind(&self) -> DecoderKind {
        DecoderKind::Rqrr
    }

    fn decode(&self, img: &GrayImage) -> BackendOutcome {
        log::info!("RQRR: Starting detection on {}x{} image", img.width(), img.height());
        let first = self.scan_grids(img);
        if first.has_codes() || !self.try_inverted {
            return first;
        }

        log::info!("RQRR: nothing on first pass, trying inverted image");
        let second = self.scan_grids(&restoration::invert(img));
        if second.has_codes() {
            return second;
        }
        match first {
            BackendOutcome::Failed(_) => first,
            _ => second,
        }
    }
}

/// Restore the image, then read it with rxing's QR reader and rqrr
pub fn decode_restored(restorer: &ImageRestorer, img: &GrayImage) -> BackendOutcome {
    let restored = restorer.restore_gray(img);
    log::info!(
        "RESTORATION: decoding restored {}x{} image",
        restored.width(),
        restored.height()
    );

    let mut hints = DecodingHintDictionary::new();
    hints.insert(
        DecodeHintType::POSSIBLE_FORMATS,
        DecodeHintValue::PossibleFormats(HashSet::from([BarcodeFormat::QR_CODE])),
    );
    hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
    let mut reader = QRCodeReader::new();

    let rxing_error = match reader.decode_with_hints(&mut global_bitmap(&restored), &hints) {
        Ok(result) => return BackendOutcome::Success(vec![to_raw(&result)]),
        Err(e) => e,
    };

    let fallback = RqrrBackend::new(true).decode(&restored);
    if fallback.has_codes() {
        return fallback;
    }
    match rxing_error {
        Exceptions::NotFoundException(_) => fallback,
        e => BackendOutcome::Failed(e.to_string()),
    }
}

/// Backend C: restoration pipeline on a worker thread, completed through a oneshot
#[cfg(feature = "async")]
#[derive(Default)]
pub struct RestorationBackend {
    restorer: ImageRestorer,
}

#[cfg(feature = "async")]
impl RestorationBackend {
    pub fn new(config: RestorationConfig) -> Self {
        Self {
            restorer: ImageRestorer::new(config),
        }
    }
}

#[cfg(feature = "async")]
impl AsyncDecodeBackend for RestorationBackend {
    fn kind(&self) -> DecoderKind {
        DecoderKind::Restoration
    }

    fn decode(&self, img: GrayImage) -> BoxFuture<'static, BackendOutcome> {
        let restorer = self.restorer.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();

        let spawned = std::thread::Builder::new()
            .name("codescan-restoration".into())
            .spawn(move || {
                let outcome = decode_restored(&restorer, &img);
                if tx.send(outcome).is_err() {
                    log::debug!("RESTORATION: receiver dropped before completion");
                }
            });

        Box::pin(async move {
            if let Err(err) = spawned {
                return BackendOutcome::Failed(format!("failed to spawn worker: {}", err));
            }
            rx.await.unwrap_or_else(|_| {
                BackendOutcome::Failed("restoration worker exited without a result".to_string())
            })
        })
    }
}

/// Ordered short-circuit fallback over backends A, B and C
pub struct DecodeChain {
    primary: Option<Box<dyn DecodeBackend>>,
    secondary: Option<Box<dyn DecodeBackend>>,
    restoring: Option<Box<dyn AsyncDecodeBackend>>,
}

impl Default for DecodeChain {
    fn default() -> Self {
        Self::new()
    }
}

impl DecodeChain {
    /// Chain with the stock backends
    pub fn new() -> Self {
        Self::with_options(true, RestorationConfig::default())
    }

    pub fn with_options(try_inverted: bool, restoration: RestorationConfig) -> Self {
        let builder = Self::builder()
            .primary(RxingBackend::new())
            .secondary(RqrrBackend::new(try_inverted));

        #[cfg(feature = "async")]
        let builder = builder.restoring(RestorationBackend::new(restoration));
        #[cfg(not(feature = "async"))]
        let _ = restoration;

        builder.build()
    }

    /// Empty chain; every slot must be filled explicitly
    pub fn builder() -> DecodeChainBuilder {
        DecodeChainBuilder::default()
    }

    /// Backends A then B. Backend C is never consulted on this path.
    pub fn decode(&self, img: &GrayImage) -> Vec<DecodedCandidate> {
        for backend in [&self.primary, &self.secondary].into_iter().flatten() {
            let candidates = run_backend(backend.as_ref(), img);
            if !candidates.is_empty() {
                log::info!("{}: produced {} candidate(s)", backend.kind(), candidates.len());
                return candidates;
            }
        }
        log::info!("Decode chain: no codes found");
        Vec::new()
    }

    /// Backends A, B, then C
    pub async fn decode_async(&self, img: &GrayImage) -> Vec<DecodedCandidate> {
        let candidates = self.decode(img);
        if !candidates.is_empty() {
            return candidates;
        }

        let Some(backend) = &self.restoring else {
            return Vec::new();
        };
        let kind = backend.kind();
        log::info!("{}: falling back to asynchronous backend", kind);
        let candidates = backend.decode(img.clone()).await.into_candidates(kind);
        if !candidates.is_empty() {
            log::info!("{}: produced {} candidate(s)", kind, candidates.len());
        }
        candidates
    }

    /// Sync chain over several images
    pub fn decode_batch(&self, images: &[GrayImage]) -> Vec<Vec<DecodedCandidate>> {
        images.iter().map(|img| self.decode(img)).collect()
    }
}

fn run_backend(backend: &dyn DecodeBackend, img: &GrayImage) -> Vec<DecodedCandidate> {
    let kind = backend.kind();
    if let Err(e) = backend.availability() {
        log::info!("{}: skipped: {}", kind, e);
        return Vec::new();
    }

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| backend.decode(img)))
        .unwrap_or_else(|payload| BackendOutcome::Failed(panic_message(payload.as_ref())));
    outcome.into_candidates(kind)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}

/// Assembles a [`DecodeChain`] from arbitrary backends
#[derive(Default)]
pub struct DecodeChainBuilder {
    primary: Option<Box<dyn DecodeBackend>>,
    secondary: Option<Box<dyn DecodeBackend>>,
    restoring: Option<Box<dyn AsyncDecodeBackend>>,
}

impl DecodeChainBuilder {
    pub fn primary(mut self, backend: impl DecodeBackend + 'static) -> Self {
        self.primary = Some(Box::new(backend));
        self
    }

    pub fn secondary(mut self, backend: impl DecodeBackend + 'static) -> Self {
        self.secondary = Some(Box::new(backend));
        self
    }

    pub fn restoring(mut self, backend: impl AsyncDecodeBackend + 'static) -> Self {
        self.restoring = Some(Box::new(backend));
        self
    }

    pub fn build(self) -> DecodeChain {
        DecodeChain {
            primary: self.primary,
            secondary: self.secondary,
            restoring: self.restoring,
        }
    }
}

fn to_raw(result: &RXingResult) -> RawCode {
    RawCode {
        text: result.getText().to_string(),
        format: format!("{:?}", result.getBarcodeFormat()),
    }
}

fn luma_source(img: &GrayImage) -> Luma8LuminanceSource {
    Luma8LuminanceSource::new(img.as_raw().clone(), img.width(), img.height())
}

fn hybrid_bitmap(img: &GrayImage) -> BinaryBitmap<impl Binarizer> {
    BinaryBitmap::new(HybridBinarizer::new(luma_source(img)))
}

fn global_bitmap(img: &GrayImage) -> BinaryBitmap<impl Binarizer> {
    BinaryBitmap::new(GlobalHistogramBinarizer::new(luma_source(img)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Scripted {
        kind: DecoderKind,
        outcome: BackendOutcome,
        available: bool,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(kind: DecoderKind, outcome: BackendOutcome) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let backend = Self {
                kind,
                outcome,
                available: true,
                calls: calls.clone(),
            };
            (backend, calls)
        }
    }

    impl DecodeBackend for Scripted {
        fn kind(&self) -> DecoderKind {
            self.kind
        }

        fn availability(&self) -> Result<(), DecodeError> {
            if self.available {
                Ok(())
            } else {
                Err(DecodeError::BackendUnavailable("scripted".into()))
            }
        }

        fn decode(&self, _img: &GrayImage) -> BackendOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    /// Asynchronous backend with a fixed answer
    struct ScriptedAsync {
        outcome: BackendOutcome,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedAsync {
        fn new(outcome: BackendOutcome) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let backend = Self {
                outcome,
                calls: calls.clone(),
            };
            (backend, calls)
        }
    }

    impl AsyncDecodeBackend for ScriptedAsync {
        fn kind(&self) -> DecoderKind {
            DecoderKind::Restoration
        }

        fn decode(&self, _img: GrayImage) -> BoxFuture<'static, BackendOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.outcome.clone();
            Box::pin(async move { outcome })
        }
    }

    struct Panicking;

    impl DecodeBackend for Panicking {
        fn kind(&self) -> DecoderKind {
            DecoderKind::Rxing
        }

        fn decode(&self, _img: &GrayImage) -> BackendOutcome {
            panic!("engine blew up");
        }
    }

    fn blank() -> GrayImage {
        GrayImage::new(4, 4)
    }

    #[test]
    fn test_primary_success_short_circuits() {
        let (a, a_calls) = Scripted::new(
            DecoderKind::Rxing,
            BackendOutcome::Success(vec![RawCode::qr("hello")]),
        );
        let (b, b_calls) = Scripted::new(DecoderKind::Rqrr, BackendOutcome::Success(vec![]));
        let chain = DecodeChain::builder().primary(a).secondary(b).build();

        let result = chain.decode(&blank());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].text, "hello");
        assert_eq!(result[0].source_decoder, DecoderKind::Rxing);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_primary_success_skips_b_and_c() {
        let (a, a_calls) = Scripted::new(
            DecoderKind::Rxing,
            BackendOutcome::Success(vec![RawCode::qr("hello")]),
        );
        let (b, b_calls) = Scripted::new(
            DecoderKind::Rqrr,
            BackendOutcome::Success(vec![RawCode::qr("from b")]),
        );
        let (c, c_calls) =
            ScriptedAsync::new(BackendOutcome::Success(vec![RawCode::qr("from c")]));
        let chain = DecodeChain::builder()
            .primary(a)
            .secondary(b)
            .restoring(c)
            .build();

        let result = chain.decode_async(&blank()).await;
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].source_decoder, DecoderKind::Rxing);
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 0);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_secondary_success_skips_c() {
        let (a, _) = Scripted::new(DecoderKind::Rxing, BackendOutcome::Success(vec![]));
        let (b, b_calls) = Scripted::new(
            DecoderKind::Rqrr,
            BackendOutcome::Success(vec![RawCode::qr("from b")]),
        );
        let (c, c_calls) = ScriptedAsync::new(BackendOutcome::Success(vec![RawCode::qr("c")]));
        let chain = DecodeChain::builder()
            .primary(a)
            .secondary(b)
            .restoring(c)
            .build();

        let result = chain.decode_async(&blank()).await;
        assert_eq!(result[0].text, "from b");
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_async_every_backend_failing_yields_empty() {
        let (a, a_calls) = Scripted::new(DecoderKind::Rxing, BackendOutcome::Failed("a".into()));
        let (b, b_calls) = Scripted::new(DecoderKind::Rqrr, BackendOutcome::Unavailable);
        let (c, c_calls) = ScriptedAsync::new(BackendOutcome::Failed("c".into()));
        let chain = DecodeChain::builder()
            .primary(a)
            .secondary(b)
            .restoring(c)
            .build();

        assert!(chain.decode_async(&blank()).await.is_empty());
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
        assert_eq!(c_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_decode_restored_reads_clean_code() {
        let img = crate::generation::QRGenerator::default()
            .generate("restored-direct")
            .unwrap();
        let outcome = decode_restored(&ImageRestorer::default(), &img);
        assert_eq!(outcome, BackendOutcome::Success(vec![RawCode::qr("restored-direct")]));
    }

    #[test]
    fn test_rxing_reads_every_code_in_frame() {
        let generator = crate::generation::QRGenerator::default();
        let left = generator.generate("left-code").unwrap();
        let right = generator.generate("right-code").unwrap();
        let mut frame = GrayImage::from_pixel(
            left.width() + right.width() + 200,
            left.height().max(right.height()),
            image::Luma([255]),
        );
        image::imageops::overlay(&mut frame, &left, 0, 0);
        image::imageops::overlay(&mut frame, &right, (left.width() + 200) as i64, 0);

        let mut texts: Vec<String> = match RxingBackend::new().decode(&frame) {
            BackendOutcome::Success(codes) => codes.into_iter().map(|c| c.text).collect(),
            other => panic!("expected codes, got {:?}", other),
        };
        texts.sort();
        assert_eq!(texts, vec!["left-code", "right-code"]);
    }

    #[test]
    fn test_unavailable_primary_is_not_called() {
        let (mut a, a_calls) = Scripted::new(
            DecoderKind::Rxing,
            BackendOutcome::Success(vec![RawCode::qr("never")]),
        );
        a.available = false;
        let (b, b_calls) = Scripted::new(
            DecoderKind::Rqrr,
            BackendOutcome::Success(vec![RawCode::qr("from b")]),
        );
        let chain = DecodeChain::builder().primary(a).secondary(b).build();

        let result = chain.decode(&blank());
        assert_eq!(result[0].source_decoder, DecoderKind::Rqrr);
        assert_eq!(a_calls.load(Ordering::SeqCst), 0);
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_backend_is_treated_as_empty() {
        let (b, b_calls) = Scripted::new(
            DecoderKind::Rqrr,
            BackendOutcome::Success(vec![RawCode::qr("survivor")]),
        );
        let chain = DecodeChain::builder().primary(Panicking).secondary(b).build();

        let result = chain.decode(&blank());
        assert_eq!(result[0].text, "survivor");
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_results_are_not_merged() {
        let (a, _) = Scripted::new(
            DecoderKind::Rxing,
            BackendOutcome::Success(vec![RawCode::qr("one"), RawCode::qr("two")]),
        );
        let (b, _) = Scripted::new(
            DecoderKind::Rqrr,
            BackendOutcome::Success(vec![RawCode::qr("three")]),
        );
        let chain = DecodeChain::builder().primary(a).secondary(b).build();

        let texts: Vec<String> = chain.decode(&blank()).into_iter().map(|c| c.text).collect();
        assert_eq!(texts, vec!["one", "two"]);
    }

    #[test]
    fn test_all_failing_yields_empty() {
        let (a, _) = Scripted::new(DecoderKind::Rxing, BackendOutcome::Failed("bad".into()));
        let (b, _) = Scripted::new(DecoderKind::Rqrr, BackendOutcome::Unavailable);
        let chain = DecodeChain::builder().primary(a).secondary(b).build();
        assert!(chain.decode(&blank()).is_empty());
    }

    #[test]
    fn test_rqrr_blank_image_finds_nothing() {
        let outcome = RqrrBackend::default().decode(&GrayImage::from_pixel(50, 50, image::Luma([128])));
        assert!(!outcome.has_codes());
    }

    #[test]
    fn test_capability_check_is_memoized() {
        let first = RxingBackend::capability_check();
        let second = RxingBackend::capability_check();
        assert_eq!(first, second);
    }

    #[test]
    fn test_decoder_kind_serializes_lowercase() {
        let json = serde_json::to_string(&DecoderKind::Restoration).unwrap();
        assert_eq!(json, "\"restoration\"");
    }
}
