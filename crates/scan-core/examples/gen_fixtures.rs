//! Generator of degraded barcode fixtures
//!
//! Usage: cargo run -p scan-core --example gen_fixtures [output_dir]

use image::{GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use rand::Rng;
use scan_core::payload::{self, ContactCard, EventDraft};
use scan_core::restoration::invert;
use scan_core::QRGenerator;
use std::fs;
use std::path::{Path, PathBuf};

fn main() -> anyhow::Result<()> {
    let output_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("generated_fixtures"));
    fs::create_dir_all(&output_dir)?;

    println!("Generating fixtures in {:?}", output_dir);

    let payloads = vec![
        ("wifi", payload::wifi("Office", "correct horse", "WPA", false)),
        (
            "contact",
            payload::vcard(&ContactCard {
                name: "Ada Lovelace",
                phone: "+44 20 7946 0000",
                email: "ada@example.org",
                ..Default::default()
            }),
        ),
        (
            "event",
            payload::event(&EventDraft {
                title: "Standup",
                location: "Room 4",
                start_time_ms: 1_710_493_200_000,
                end_time_ms: 1_710_494_100_000,
                ..Default::default()
            }),
        ),
        ("email", payload::mailto("team@example.com", "Hello", "")),
        ("geo", payload::geo(48.8584, 2.2945, "")),
        ("sms", payload::sms("+15550100", "running late")),
        ("url", "https://example.com/menu?table=12".to_string()),
        ("text", "Plain text fixture for the decode chain".to_string()),
    ];

    let generator = QRGenerator::default();
    let mut rng = rand::thread_rng();
    let mut count = 0;

    for (cat, content) in &payloads {
        let img = generator.generate(content)?;
        save(&img, &output_dir, &format!("{}_clean.png", cat))?;

        let blurred = gaussian_blur_f32(&img, 2.0);
        save(&blurred, &output_dir, &format!("{}_blur.png", cat))?;

        for angle in [15.0f32, 30.0, 45.0] {
            let rotated = rotate_about_center(
                &img,
                angle.to_radians(),
                Interpolation::Bilinear,
                Luma([255]),
            );
            save(&rotated, &output_dir, &format!("{}_rot_{}.png", cat, angle))?;
        }

        // salt & pepper
        let mut noisy = img.clone();
        for p in noisy.pixels_mut() {
            if rng.gen::<f64>() < 0.05 {
                p.0[0] = if rng.gen() { 0 } else { 255 };
            }
        }
        save(&noisy, &output_dir, &format!("{}_noise.png", cat))?;

        // 0..255 squeezed into 100..150
        let mut low_contrast = img.clone();
        for p in low_contrast.pixels_mut() {
            p.0[0] = (100.0 + (p.0[0] as f32 / 255.0) * 50.0) as u8;
        }
        save(&low_contrast, &output_dir, &format!("{}_low_contrast.png", cat))?;

        save(&invert(&img), &output_dir, &format!("{}_inverted.png", cat))?;
        count += 8;
    }

    println!("Generated {} images.", count);
    Ok(())
}

fn save(img: &GrayImage, dir: &Path, name: &str) -> anyhow::Result<()> {
    img.save(dir.join(name))?;
    Ok(())
}
