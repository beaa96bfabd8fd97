//! Scan Core - barcode scanning and code management
//!
//! Library for reading and producing QR and other barcodes:
//! - Decode fallback chain over rxing, rqrr and a restoration pass
//! - Content classification (WiFi, contacts, events, e-mail, geo, SMS, phone, URL)
//! - Payload builders and QR generation, including batches
//! - Link safety checks for decoded URLs
//! - Local history with backup/restore (feature `history`)

pub mod content;
pub mod decoding;
pub mod frames;
pub mod generation;
pub mod payload;
pub mod restoration;
pub mod security;
pub mod settings;

#[cfg(feature = "history")]
pub mod history;

pub use content::{classify, ContentParser, ContentType, ParsedContent};
pub use decoding::{
    BackendOutcome, DecodeBackend, DecodeChain, DecodeError, DecodedCandidate, DecoderKind,
};
pub use frames::{CancelFlag, FrameScanSummary, FrameScanner};
pub use generation::{BatchEntry, ErrorCorrection, GenerateError, GeneratorConfig, QRGenerator};
pub use restoration::{ImageRestorer, RestorationConfig};
pub use security::{LinkInspector, LinkReport, Verdict};
pub use settings::{ScanSettings, SettingsStore};

#[cfg(feature = "history")]
pub use history::{HistoryRecord, HistoryStore, InsertOutcome};

use chrono::{DateTime, Utc};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level errors
#[derive(Error, Debug)]
pub enum QRError {
    #[error("Invalid image format: {0}")]
    InvalidFormat(String),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Generate error: {0}")]
    Generate(#[from] GenerateError),
}

/// Result of scanning one image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResult {
    /// Every code found, in the order the winning backend reported them
    pub codes: Vec<ScanItem>,
    pub processing_time_ms: u64,
}

/// One decoded and classified code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanItem {
    pub content: String,
    pub source: DecoderKind,
    /// Symbology, e.g. `QR_CODE`
    pub format: String,
    pub content_type: ContentType,
    pub parsed: ParsedContent,
    /// Present for URL content when link checking is enabled
    pub link_report: Option<LinkReport>,
}

/// Main scanner
pub struct QRScanner {
    chain: DecodeChain,
    parser: ContentParser,
    inspector: LinkInspector,
    settings: ScanSettings,
}

impl Default for QRScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl QRScanner {
    pub fn new() -> Self {
        Self::with_settings(ScanSettings::default())
    }

    pub fn with_settings(settings: ScanSettings) -> Self {
        let chain = DecodeChain::with_options(settings.try_inverted, settings.restoration.clone());
        Self::with_chain(chain, settings)
    }

    /// Scanner over a custom decode chain
    pub fn with_chain(chain: DecodeChain, settings: ScanSettings) -> Self {
        Self {
            chain,
            parser: ContentParser::new(),
            inspector: LinkInspector::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    /// Scan an encoded image (PNG or JPEG)
    pub fn scan_bytes(&self, image_bytes: &[u8]) -> Result<ScanResult, QRError> {
        let gray = load_gray(image_bytes)?;
        self.scan_image(&gray)
    }

    /// Scan with the synchronous chain (backends A and B)
    pub fn scan_image(&self, gray: &GrayImage) -> Result<ScanResult, QRError> {
        let started = Utc::now();
        let prepared = self.prepare(gray)?;
        let candidates = self.chain.decode(&prepared);
        Ok(self.finish(candidates, started))
    }

    /// Scan with the full chain, including the restoration backend
    #[cfg(feature = "async")]
    pub async fn scan_image_async(&self, gray: GrayImage) -> Result<ScanResult, QRError> {
        let started = Utc::now();
        let prepared = self.prepare(&gray)?;
        let candidates = self.chain.decode_async(&prepared).await;
        Ok(self.finish(candidates, started))
    }

    #[cfg(feature = "async")]
    pub async fn scan_bytes_async(&self, image_bytes: &[u8]) -> Result<ScanResult, QRError> {
        let gray = load_gray(image_bytes)?;
        self.scan_image_async(gray).await
    }

    fn prepare(&self, gray: &GrayImage) -> Result<GrayImage, QRError> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(QRError::InvalidFormat("image has no pixels".to_string()));
        }
        log::info!("Starting scan, size: {}x{}", width, height);

        let prepared = restoration::resize(gray, self.settings.max_dimension);
        if prepared.dimensions() != (width, height) {
            log::debug!("Downscaled to {:?}", prepared.dimensions());
        }
        Ok(prepared)
    }

    fn finish(&self, candidates: Vec<DecodedCandidate>, started: DateTime<Utc>) -> ScanResult {
        let codes: Vec<ScanItem> = candidates.into_iter().map(|c| self.classify(c)).collect();
        let elapsed = (Utc::now() - started).num_milliseconds().max(0) as u64;
        log::info!("Scan complete, found {} codes in {} ms", codes.len(), elapsed);

        ScanResult {
            codes,
            processing_time_ms: elapsed,
        }
    }

    fn classify(&self, candidate: DecodedCandidate) -> ScanItem {
        let parsed = self.parser.parse(&candidate.text);
        let content_type = parsed.content_type();
        let link_report = match &parsed {
            ParsedContent::Url { url } if self.settings.check_links => {
                Some(self.inspector.inspect(url))
            }
            _ => None,
        };

        ScanItem {
            content: candidate.text,
            source: candidate.source_decoder,
            format: candidate.format,
            content_type,
            parsed,
            link_report,
        }
    }
}

fn load_gray(image_bytes: &[u8]) -> Result<GrayImage, QRError> {
    let img = image::load_from_memory(image_bytes)
        .map_err(|e| QRError::InvalidFormat(e.to_string()))?;
    Ok(img.to_luma8())
}
