use crate::core::RunSummary;
use crate::utils::error::Result;
use crate::utils::files::{empty_directory, get_basename, get_filenames};
use crate::vision::imaging::{apply_mask, crop, open_image, resize_to_max_dimension};
use crate::vision::ocr::{CharBox, TextLocator};
use crate::vision::segmenter::Segmenter;
use image::RgbImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SegmentTextOptions {
    /// Glob of source images.
    pub input: String,
    pub output_dir: PathBuf,
    pub max_dimension: u32,
    pub clean: bool,
    /// Log the character boxes of the first unprocessed image and stop.
    pub debug: bool,
}

impl Default for SegmentTextOptions {
    fn default() -> Self {
        Self {
            input: "sample/posters/*.jpg".to_string(),
            output_dir: PathBuf::from("output/sample-text-segments"),
            max_dimension: 4000,
            clean: false,
            debug: false,
        }
    }
}

/// Cuts every recognised letter and digit out of each image, one PNG per
/// character under `<out>/<symbol>/<image>-<n>.png`.
pub struct SegmentText<M: Segmenter, T: TextLocator> {
    segmenter: M,
    locator: T,
    options: SegmentTextOptions,
}

impl<M: Segmenter, T: TextLocator> SegmentText<M, T> {
    pub fn new(segmenter: M, locator: T, options: SegmentTextOptions) -> Self {
        Self {
            segmenter,
            locator,
            options,
        }
    }

    fn already_processed(&self, file: &Path) -> Result<bool> {
        let pattern = format!(
            "{}/**/{}-*.png",
            glob::Pattern::escape(&self.options.output_dir.display().to_string()),
            glob::Pattern::escape(&get_basename(file))
        );
        Ok(!get_filenames(&pattern)?.is_empty())
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::new(self.options.output_dir.display().to_string());

        if !self.options.debug {
            std::fs::create_dir_all(&self.options.output_dir)?;
        }
        if self.options.clean {
            let removed = empty_directory(&self.options.output_dir)?;
            tracing::info!("Cleared {} files", removed);
        }

        let files = get_filenames(&self.options.input)?;
        let total = files.len();
        tracing::info!("{} files found.", total);

        for (i, file) in files.iter().enumerate() {
            if self.already_processed(file)? {
                tracing::info!("Already processed {} of {}: {}", i + 1, total, file.display());
                summary.skipped += 1;
                continue;
            }
            tracing::info!("Processing {} of {}: {}", i + 1, total, file.display());

            let (image, boxes) = match self.recognise(file).await {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!("Could not read text from {}: {}", file.display(), e);
                    summary.errors += 1;
                    continue;
                }
            };

            if self.options.debug {
                for char_box in &boxes {
                    let b = &char_box.bbox;
                    tracing::info!("{} ({}, {}) - ({}, {})", char_box.symbol, b.x, b.y, b.x2(), b.y2());
                }
                break;
            }

            match self.segment(file, &image, &boxes) {
                Ok(saved) => {
                    tracing::info!("Saved {} character segments", saved);
                    summary.processed += 1;
                }
                Err(e) => {
                    tracing::warn!("Error with segmentation of {}: {}", file.display(), e);
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }

    async fn recognise(&self, file: &Path) -> Result<(RgbImage, Vec<CharBox>)> {
        let image = resize_to_max_dimension(open_image(file)?, self.options.max_dimension).to_rgb8();
        let boxes = self.locator.image_to_boxes(&image).await?;
        tracing::debug!("{} character boxes in {}", boxes.len(), file.display());
        Ok((image, boxes))
    }

    fn segment(&mut self, file: &Path, image: &RgbImage, boxes: &[CharBox]) -> Result<usize> {
        let basename = get_basename(file);
        // Numbered per output directory so `W` and `w` never overwrite each other.
        let mut counts: HashMap<String, usize> = HashMap::new();
        let mut image_set = false;
        let mut saved = 0;

        for char_box in boxes.iter().filter(|b| b.is_alphanumeric() && !b.bbox.is_empty()) {
            if !image_set {
                self.segmenter.reset_image();
                self.segmenter.set_image(image)?;
                image_set = true;
            }

            let mask = match self.segmenter.predict_box(&char_box.bbox) {
                Ok(mask) => mask,
                Err(e) => {
                    tracing::warn!("Error with segmentation: {}", e);
                    continue;
                }
            };

            let cutout = crop(&apply_mask(image, &mask), &char_box.bbox);
            if cutout.width() == 0 || cutout.height() == 0 {
                continue;
            }

            let symbol_dir = char_box.symbol.to_lowercase();
            let count = counts.entry(symbol_dir.clone()).or_insert(0);
            *count += 1;
            let path = self
                .options
                .output_dir
                .join(symbol_dir)
                .join(format!("{}-{}.png", basename, count));
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            cutout.save(&path)?;
            saved += 1;
        }

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use crate::vision::geometry::{BBox, Mask};
    use async_trait::async_trait;
    use image::Rgb;
    use tempfile::TempDir;

    struct FixedBoxes(Vec<CharBox>);

    #[async_trait]
    impl TextLocator for FixedBoxes {
        async fn image_to_boxes(&self, _image: &RgbImage) -> Result<Vec<CharBox>> {
            Ok(self.0.clone())
        }
    }

    struct BrokenOcr;

    #[async_trait]
    impl TextLocator for BrokenOcr {
        async fn image_to_boxes(&self, _image: &RgbImage) -> Result<Vec<CharBox>> {
            Err(EtlError::ocr("tesseract not installed"))
        }
    }

    /// Predicts exactly the prompted box.
    #[derive(Default)]
    struct BoxSegmenter {
        size: (u32, u32),
        set_calls: usize,
    }

    impl Segmenter for BoxSegmenter {
        fn set_image(&mut self, image: &RgbImage) -> Result<()> {
            self.size = (image.width(), image.height());
            self.set_calls += 1;
            Ok(())
        }

        fn reset_image(&mut self) {}

        fn predict_box(&mut self, bbox: &BBox) -> Result<Mask> {
            let b = *bbox;
            Ok(Mask::from_fn(self.size.0, self.size.1, |x, y| {
                x >= b.x && x < b.x2() && y >= b.y && y < b.y2()
            }))
        }
    }

    fn char_box(symbol: &str, x1: u32, y1: u32, x2: u32, y2: u32) -> CharBox {
        CharBox {
            symbol: symbol.to_string(),
            bbox: BBox::from_corners(x1, y1, x2, y2),
        }
    }

    fn poster(dir: &Path) -> String {
        let input = dir.join("in");
        std::fs::create_dir_all(&input).unwrap();
        RgbImage::from_pixel(30, 20, Rgb([0, 0, 0]))
            .save(input.join("wpa-1.png"))
            .unwrap();
        format!("{}/*.png", input.display())
    }

    #[tokio::test]
    async fn test_writes_one_file_per_alphanumeric_symbol() {
        let dir = TempDir::new().unwrap();
        let options = SegmentTextOptions {
            input: poster(dir.path()),
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        let boxes = FixedBoxes(vec![
            char_box("W", 0, 0, 5, 8),
            char_box("~", 6, 0, 8, 2),
            char_box("P", 10, 0, 14, 8),
            char_box("w", 15, 0, 19, 6),
        ]);
        let mut job = SegmentText::new(BoxSegmenter::default(), boxes, options);

        let summary = job.run().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(job.segmenter.set_calls, 1);

        let out = dir.path().join("out");
        assert!(out.join("w/wpa-1-1.png").is_file());
        assert!(out.join("w/wpa-1-2.png").is_file());
        assert!(out.join("p/wpa-1-1.png").is_file());
        assert!(!out.join("~").exists());
        let first = image::open(out.join("w/wpa-1-1.png")).unwrap();
        assert_eq!((first.width(), first.height()), (5, 8));

        let again = job.run().await.unwrap();
        assert_eq!(again.skipped, 1);
    }

    #[tokio::test]
    async fn test_skip_check_handles_glob_characters_in_output_dir() {
        let dir = TempDir::new().unwrap();
        let options = SegmentTextOptions {
            input: poster(dir.path()),
            output_dir: dir.path().join("out [draft]*"),
            ..Default::default()
        };
        let boxes = FixedBoxes(vec![char_box("A", 0, 0, 5, 8)]);
        let mut job = SegmentText::new(BoxSegmenter::default(), boxes, options);

        assert_eq!(job.run().await.unwrap().processed, 1);
        assert!(dir.path().join("out [draft]*/a/wpa-1-1.png").is_file());

        let again = job.run().await.unwrap();
        assert_eq!(again.skipped, 1);
        assert_eq!(again.processed, 0);
    }

    #[tokio::test]
    async fn test_ocr_failure_counts_error() {
        let dir = TempDir::new().unwrap();
        let options = SegmentTextOptions {
            input: poster(dir.path()),
            output_dir: dir.path().join("out"),
            ..Default::default()
        };
        let mut job = SegmentText::new(BoxSegmenter::default(), BrokenOcr, options);
        let summary = job.run().await.unwrap();
        assert_eq!(summary.errors, 1);
    }

    #[tokio::test]
    async fn test_debug_stops_before_segmenting() {
        let dir = TempDir::new().unwrap();
        let options = SegmentTextOptions {
            input: poster(dir.path()),
            output_dir: dir.path().join("out"),
            debug: true,
            ..Default::default()
        };
        let boxes = FixedBoxes(vec![char_box("A", 0, 0, 5, 5)]);
        let mut job = SegmentText::new(BoxSegmenter::default(), boxes, options);
        let summary = job.run().await.unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(job.segmenter.set_calls, 0);
        assert!(!dir.path().join("out").exists());
    }
}
