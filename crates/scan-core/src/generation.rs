//! QR code generation and batch generation

use std::io::Cursor;

use image::{GrayImage, ImageFormat, Luma};
use qrcode::render::unicode;
use qrcode::{Color, EcLevel, QrCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Cannot encode empty content")]
    Empty,

    #[error("Failed to encode content: {0}")]
    Encode(String),

    #[error("Failed to write image: {0}")]
    Image(String),
}

/// Error correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCorrection {
    L, // ~7%
    M, // ~15%
    Q, // ~25%
    H, // ~30%
}

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::L => EcLevel::L,
            ErrorCorrection::M => EcLevel::M,
            ErrorCorrection::Q => EcLevel::Q,
            ErrorCorrection::H => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Pixels per module
    pub module_size: u32,
    /// Quiet zone width in modules
    pub quiet_zone: u32,
    pub error_correction: ErrorCorrection,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            module_size: 10,
            quiet_zone: 4,
            error_correction: ErrorCorrection::M,
        }
    }
}

/// One entry of a batch run
#[derive(Debug)]
pub struct BatchEntry {
    pub index: usize,
    pub content: String,
    pub result: Result<GrayImage, GenerateError>,
}

#[derive(Debug, Clone, Default)]
pub struct QRGenerator {
    config: GeneratorConfig,
}

impl QRGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn encode(&self, content: &str) -> Result<QrCode, GenerateError> {
        if content.is_empty() {
            return Err(GenerateError::Empty);
        }
        QrCode::with_error_correction_level(content.as_bytes(), self.config.error_correction.into())
            .map_err(|e| GenerateError::Encode(e.to_string()))
    }

    /// Render `content` as a grayscale image
    pub fn generate(&self, content: &str) -> Result<GrayImage, GenerateError> {
        let code = self.encode(content)?;
        log::debug!("Generated QR code, {} modules wide", code.width());
        Ok(render_code(&code, &self.config))
    }

    /// Render `content` and encode the image as PNG
    pub fn generate_png(&self, content: &str) -> Result<Vec<u8>, GenerateError> {
        let img = self.generate(content)?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .map_err(|e| GenerateError::Image(e.to_string()))?;
        Ok(bytes)
    }

    /// Half-block rendering for terminals
    pub fn render_terminal(&self, content: &str) -> Result<String, GenerateError> {
        let code = self.encode(content)?;
        Ok(code
            .render::<unicode::Dense1x2>()
            .quiet_zone(self.config.quiet_zone > 0)
            .build())
    }

    /// Generate every entry; a failing entry does not stop the batch
    pub fn generate_batch<S: AsRef<str>>(&self, contents: &[S]) -> Vec<BatchEntry> {
        let entries: Vec<BatchEntry> = contents
            .iter()
            .enumerate()
            .map(|(index, content)| BatchEntry {
                index,
                content: content.as_ref().to_string(),
                result: self.generate(content.as_ref()),
            })
            .collect();

        let failed = entries.iter().filter(|e| e.result.is_err()).count();
        log::info!("Batch generation: {} entries, {} failed", entries.len(), failed);
        entries
    }
}

/// One payload per non-blank line
pub fn parse_batch_input(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Paint modules onto a white canvas
pub(crate) fn render_code(code: &QrCode, config: &GeneratorConfig) -> GrayImage {
    let module_size = config.module_size.max(1);
    let width = code.width() as u32;
    let side = (width + config.quiet_zone * 2) * module_size;
    let mut img = GrayImage::from_pixel(side, side, Luma([255]));

    for y in 0..width {
        for x in 0..width {
            if code[(x as usize, y as usize)] != Color::Dark {
                continue;
            }
            let px = (config.quiet_zone + x) * module_size;
            let py = (config.quiet_zone + y) * module_size;
            for dy in 0..module_size {
                for dx in 0..module_size {
                    img.put_pixel(px + dx, py + dy, Luma([0]));
                }
            }
        }
    }

    img
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_dimensions() {
        let generator = QRGenerator::default();
        let img = generator.generate("hello").unwrap();
        // version 1 is 21 modules, plus 4 modules of quiet zone each side
        assert_eq!(img.dimensions(), (290, 290));
        assert_eq!(img.get_pixel(0, 0).0[0], 255);
        assert_eq!(img.get_pixel(40, 40).0[0], 0);
    }

    #[test]
    fn test_empty_content_rejected() {
        let generator = QRGenerator::default();
        assert!(matches!(generator.generate(""), Err(GenerateError::Empty)));
    }

    #[test]
    fn test_png_signature() {
        let bytes = QRGenerator::default().generate_png("https://example.com").unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_batch_keeps_going_after_failure() {
        let generator = QRGenerator::default();
        let entries = generator.generate_batch(&["first", "", "third"]);
        assert_eq!(entries.len(), 3);
        assert!(entries[0].result.is_ok());
        assert!(entries[1].result.is_err());
        assert!(entries[2].result.is_ok());
        assert_eq!(entries[2].index, 2);
    }

    #[test]
    fn test_parse_batch_input_skips_blank_lines() {
        let lines = parse_batch_input("one\n\n  two  \r\n\t\nthree");
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[test]
    fn test_terminal_rendering_is_not_empty() {
        let rendered = QRGenerator::default().render_terminal("abc").unwrap();
        assert!(rendered.lines().count() > 10);
    }
}
