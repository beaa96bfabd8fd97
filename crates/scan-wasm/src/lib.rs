//! WASM bindings for the barcode scanner
//!
//! JavaScript API for scanning, content classification, link checks and QR generation

use js_sys::{Array, Reflect, Uint8Array};
use scan_core::generation::parse_batch_input;
use scan_core::{
    classify, payload, GeneratorConfig, LinkInspector, ParsedContent, QRGenerator, QRScanner,
    ScanSettings,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;
use web_sys::ImageData;

#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
    log::info!("Scanner WASM module initialized");
}

fn js_error(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// JavaScript-facing scanner
#[wasm_bindgen]
pub struct WasmScanner {
    scanner: QRScanner,
}

#[wasm_bindgen]
impl WasmScanner {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            scanner: QRScanner::new(),
        }
    }

    /// Scanner from a partial settings object, e.g. `{ check_links: false }`
    #[wasm_bindgen(js_name = withSettings)]
    pub fn with_settings(settings: JsValue) -> Result<WasmScanner, JsError> {
        let settings: ScanSettings = if settings.is_undefined() || settings.is_null() {
            ScanSettings::default()
        } else {
            serde_wasm_bindgen::from_value(settings).map_err(js_error)?
        };
        Ok(Self {
            scanner: QRScanner::with_settings(settings),
        })
    }

    /// Scan an encoded image (PNG, JPEG)
    ///
    /// @param image_data - Uint8Array with the file contents
    /// @returns scan result object
    #[wasm_bindgen(js_name = scanImage)]
    pub fn scan_image(&self, image_data: &[u8]) -> Result<JsValue, JsError> {
        let result = self.scanner.scan_bytes(image_data).map_err(js_error)?;
        serde_wasm_bindgen::to_value(&result).map_err(js_error)
    }

    /// Scan raw RGBA pixels, as returned by `canvas.getImageData().data`
    #[wasm_bindgen(js_name = scanRgba)]
    pub fn scan_rgba(&self, data: &[u8], width: u32, height: u32) -> Result<JsValue, JsError> {
        let gray = rgba_to_gray(data, width, height);
        let img = image::GrayImage::from_raw(width, height, gray)
            .ok_or_else(|| JsError::new("Pixel buffer does not match the given size"))?;

        let result = self.scanner.scan_image(&img).map_err(js_error)?;
        serde_wasm_bindgen::to_value(&result).map_err(js_error)
    }

    /// Scan a canvas `ImageData` directly
    #[wasm_bindgen(js_name = scanImageData)]
    pub fn scan_image_data(&self, image: &ImageData) -> Result<JsValue, JsError> {
        let data = image.data();
        self.scan_rgba(&data.0, image.width(), image.height())
    }
}

impl Default for WasmScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// BT.601 luma; a short buffer yields a short image which `from_raw` rejects
fn rgba_to_gray(rgba: &[u8], width: u32, height: u32) -> Vec<u8> {
    let pixel_count = (width as usize) * (height as usize);
    rgba.chunks_exact(4)
        .take(pixel_count)
        .map(|px| {
            let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
            ((299 * r + 587 * g + 114 * b) / 1000) as u8
        })
        .collect()
}

/// Classify decoded text into structured content
#[wasm_bindgen(js_name = classify)]
pub fn classify_text(text: &str) -> Result<JsValue, JsError> {
    serde_wasm_bindgen::to_value(&classify(text)).map_err(js_error)
}

#[wasm_bindgen(js_name = checkLink)]
pub fn check_link(url: &str) -> Result<JsValue, JsError> {
    let report = LinkInspector::new().inspect(url);
    serde_wasm_bindgen::to_value(&report).map_err(js_error)
}

/// Build the payload text for structured content given as JSON,
/// e.g. `{"type":"wifi","ssid":"Home","password":"pw","encryption":"WPA","hidden":false}`
#[wasm_bindgen(js_name = buildPayload)]
pub fn build_payload(json: &str) -> Result<String, JsError> {
    let content: ParsedContent = serde_json::from_str(json).map_err(js_error)?;
    Ok(payload::encode(&content))
}

/// Render a QR code as PNG bytes
#[wasm_bindgen(js_name = generatePng)]
pub fn generate_png(content: &str, config: JsValue) -> Result<Uint8Array, JsError> {
    let bytes = generator(config)?.generate_png(content).map_err(js_error)?;
    Ok(Uint8Array::from(bytes.as_slice()))
}

#[derive(Serialize)]
struct BatchItem<'a> {
    index: usize,
    content: &'a str,
    error: Option<String>,
}

/// One QR per non-blank line. Every element carries `index`, `content` and
/// either `png` (Uint8Array) or `error`.
#[wasm_bindgen(js_name = generateBatch)]
pub fn generate_batch(input: &str, config: JsValue) -> Result<Array, JsError> {
    let generator = generator(config)?;
    let lines = parse_batch_input(input);
    let out = Array::new();

    for (index, line) in lines.iter().enumerate() {
        let png = generator.generate_png(line);
        let item = BatchItem {
            index,
            content: line,
            error: png.as_ref().err().map(|e| e.to_string()),
        };
        let obj = serde_wasm_bindgen::to_value(&item).map_err(js_error)?;
        if let Ok(bytes) = png {
            Reflect::set(&obj, &JsValue::from_str("png"), &Uint8Array::from(bytes.as_slice()))
                .map_err(|_| JsError::new("Failed to attach image to batch item"))?;
        }
        out.push(&obj);
    }

    Ok(out)
}

fn generator(config: JsValue) -> Result<QRGenerator, JsError> {
    let config: GeneratorConfig = if config.is_undefined() || config.is_null() {
        GeneratorConfig::default()
    } else {
        serde_wasm_bindgen::from_value(config).map_err(js_error)?
    };
    Ok(QRGenerator::new(config))
}

#[wasm_bindgen(js_name = version)]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_scanner_creation() {
        let _scanner = WasmScanner::new();
    }

    #[wasm_bindgen_test]
    fn test_version() {
        assert!(!version().is_empty());
    }

    #[wasm_bindgen_test]
    fn test_build_payload() {
        let json = r#"{"type":"phone","number":"+15550100"}"#;
        assert_eq!(build_payload(json).unwrap(), "tel:+15550100");
    }

    #[wasm_bindgen_test]
    fn test_generate_then_scan() {
        let png = generate_png("hello wasm", JsValue::UNDEFINED).unwrap();
        let result = WasmScanner::new().scan_image(&png.to_vec()).unwrap();
        let codes = Reflect::get(&result, &JsValue::from_str("codes")).unwrap();
        assert_eq!(Array::from(&codes).length(), 1);
    }

    #[wasm_bindgen_test]
    fn test_batch_reports_each_line() {
        let items = generate_batch("one\n\ntwo", JsValue::UNDEFINED).unwrap();
        assert_eq!(items.length(), 2);
    }

    #[test]
    fn test_rgba_to_gray() {
        let rgba = [255, 255, 255, 255, 0, 0, 0, 255];
        assert_eq!(rgba_to_gray(&rgba, 2, 1), vec![255, 0]);
    }
}
