//! Character boxes from the `tesseract` command-line tool.

use crate::utils::error::{EtlError, Result};
use crate::vision::geometry::BBox;
use async_trait::async_trait;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One recognised character and its box, top-left origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharBox {
    pub symbol: String,
    pub bbox: BBox,
}

impl CharBox {
    pub fn is_alphanumeric(&self) -> bool {
        !self.symbol.is_empty() && self.symbol.chars().all(char::is_alphanumeric)
    }
}

#[async_trait]
pub trait TextLocator: Send + Sync {
    async fn image_to_boxes(&self, image: &RgbImage) -> Result<Vec<CharBox>>;
}

#[derive(Debug, Clone)]
pub struct Tesseract {
    binary: PathBuf,
    language: String,
}

impl Default for Tesseract {
    fn default() -> Self {
        Self::new("tesseract", "eng")
    }
}

impl Tesseract {
    pub fn new(binary: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            language: language.into(),
        }
    }
}

#[async_trait]
impl TextLocator for Tesseract {
    async fn image_to_boxes(&self, image: &RgbImage) -> Result<Vec<CharBox>> {
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(image.clone()).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", self.language.as_str(), "batch.nochop", "makebox"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EtlError::ocr(format!("Failed to start {}: {}", self.binary.display(), e)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| EtlError::ocr("tesseract stdin unavailable"))?;
        // tesseract may exit without reading stdin; its status and stderr
        // take precedence over a broken pipe.
        let written = stdin.write_all(&png).await;
        drop(stdin);

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(EtlError::ocr(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if let Err(e) = written {
            return Err(EtlError::ocr(format!("Failed to send image to tesseract: {}", e)));
        }

        parse_boxes(&String::from_utf8_lossy(&output.stdout), image.height())
    }
}

/// Parses `makebox` output (`symbol left bottom right top page`, origin at
/// the bottom-left) into top-left boxes for an image `image_height` tall.
pub fn parse_boxes(text: &str, image_height: u32) -> Result<Vec<CharBox>> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let parts: Vec<&str> = line.split(' ').collect();
            if parts.len() < 5 {
                return Err(EtlError::ocr(format!("Malformed box line: {}", line)));
            }
            let coord = |i: usize| -> Result<u32> {
                parts[i]
                    .parse::<u32>()
                    .map_err(|_| EtlError::ocr(format!("Malformed box line: {}", line)))
            };
            let (left, bottom, right, top) = (coord(1)?, coord(2)?, coord(3)?, coord(4)?);
            Ok(CharBox {
                symbol: parts[0].to_string(),
                bbox: BBox::from_corners(
                    left,
                    image_height.saturating_sub(top),
                    right,
                    image_height.saturating_sub(bottom),
                ),
            })
        })
        .collect()
}
