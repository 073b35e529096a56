//! Captcha solving: capture, binarize, OCR, normalize.
//!
//! The solver never fails. Every problem along the pipeline degrades to a
//! best-effort (possibly empty) answer; whether it was right is only learned
//! from the portal's response to the submit.

use crate::browser::first_present;
use crate::portal::PortalContext;
use crate::portal::model::CaptchaAttempt;
use image::{ImageOutputFormat, ImageResult};
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Command;

/// Opaque text classifier: PNG bytes in, best-effort text out, never raises
pub trait OcrEngine {
    fn recognize(&self, png: &[u8]) -> String;
}

/// OCR through the `tesseract` executable, single text line, whitelisted charset
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: PathBuf,
    whitelist: String,
}

impl TesseractCli {
    pub fn new(program: impl Into<PathBuf>, whitelist: impl Into<String>) -> Self {
        Self { program: program.into(), whitelist: whitelist.into() }
    }

    fn run(&self, png: &[u8]) -> std::io::Result<String> {
        let mut input = tempfile::Builder::new().prefix("captcha").suffix(".png").tempfile()?;
        std::io::Write::write_all(&mut input, png)?;

        let output = Command::new(&self.program)
            .arg(input.path())
            .arg("stdout")
            .args(["--oem", "1", "--psm", "7"])
            .arg("-c")
            .arg(format!("tessedit_char_whitelist={}", self.whitelist))
            .output()?;

        if !output.status.success() {
            return Err(std::io::Error::other(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(&self, png: &[u8]) -> String {
        match self.run(png) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("OCR failed: {}", e);
                String::new()
            }
        }
    }
}

/// Grayscale the image, then map luminance below `cutoff` to black and the rest to white.
///
/// Pure: the same input bytes always give the same PNG.
pub fn binarize(png: &[u8], cutoff: u8) -> ImageResult<Vec<u8>> {
    let gray = image::load_from_memory(png)?.to_luma8();
    let binary = match cutoff.checked_sub(1) {
        // imageproc keeps pixels strictly above the threshold
        Some(threshold) => imageproc::contrast::threshold(&gray, threshold),
        None => image::GrayImage::from_pixel(gray.width(), gray.height(), image::Luma([255])),
    };

    let mut out = Cursor::new(Vec::new());
    binary.write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(out.into_inner())
}

/// Keep ASCII letters and digits only
pub fn normalize(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

/// Solves whichever captcha is currently shown
pub struct CaptchaSolver;

impl CaptchaSolver {
    pub fn solve(&self, ctx: &PortalContext<'_>) -> CaptchaAttempt {
        let Some(image) = first_present(ctx.driver, &ctx.settings.selectors.captcha_images) else {
            log::warn!("No captcha image found");
            return CaptchaAttempt::default();
        };

        let raw = match ctx.driver.capture_element(image) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to capture captcha {}: {}", image, e);
                return CaptchaAttempt::default();
            }
        };
        ctx.diagnostics.save_bytes("captcha.png", &raw);

        let recognized = match binarize(&raw, ctx.settings.captcha.threshold) {
            Ok(enhanced) => {
                ctx.diagnostics.save_bytes("captcha_enhanced.png", &enhanced);
                ctx.ocr.recognize(&enhanced)
            }
            Err(e) => {
                log::warn!("Captcha preprocessing failed, reading raw capture: {}", e);
                ctx.ocr.recognize(&raw)
            }
        };

        let text = normalize(&recognized);
        log::info!("Captcha text detected: '{}'", text);
        CaptchaAttempt { image: raw, text }
    }
}
