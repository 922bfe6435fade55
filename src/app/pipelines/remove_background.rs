use crate::core::RunSummary;
use crate::utils::error::Result;
use crate::utils::files::{empty_directory, get_basename, get_filenames};
use crate::vision::geometry::{get_largest_mask_segment, BBox};
use crate::vision::imaging::{apply_mask, crop, open_image, resize_to_max_dimension};
use crate::vision::segmenter::Segmenter;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RemoveBackgroundOptions {
    /// Glob of source images.
    pub input: String,
    pub output_dir: PathBuf,
    /// Longer sources are scaled down to this before segmenting.
    pub max_dimension: u32,
    pub clean: bool,
    /// List what would be processed and stop.
    pub debug: bool,
}

impl Default for RemoveBackgroundOptions {
    fn default() -> Self {
        Self {
            input: "sample/figures/*.jpg".to_string(),
            output_dir: PathBuf::from("output/figure-segments"),
            max_dimension: 4096,
            clean: false,
            debug: false,
        }
    }
}

/// Cuts the dominant foreground object out of each image onto a
/// transparent background.
///
/// The segmenter is prompted with the whole frame, which it answers with
/// the background; the largest connected region of the inverse is kept.
pub struct RemoveBackground<M: Segmenter> {
    segmenter: M,
    options: RemoveBackgroundOptions,
}

impl<M: Segmenter> RemoveBackground<M> {
    pub fn new(segmenter: M, options: RemoveBackgroundOptions) -> Self {
        Self { segmenter, options }
    }

    pub fn output_for(&self, file: &Path) -> PathBuf {
        self.options
            .output_dir
            .join(format!("{}.png", get_basename(file)))
    }

    pub fn run(&mut self) -> Result<RunSummary> {
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
            let output = self.output_for(file);
            if output.is_file() {
                tracing::info!("Already processed {} of {}: {}", i + 1, total, file.display());
                summary.skipped += 1;
                continue;
            }
            if self.options.debug {
                tracing::info!("Would process {} of {}: {} -> {}", i + 1, total, file.display(), output.display());
                continue;
            }

            tracing::info!("Processing {} of {}: {}", i + 1, total, file.display());
            match self.process(file, &output) {
                Ok(true) => summary.processed += 1,
                Ok(false) => summary.skipped += 1,
                Err(e) => {
                    tracing::warn!("Error with segmentation of {}: {}", file.display(), e);
                    summary.errors += 1;
                }
            }
        }

        Ok(summary)
    }

    fn process(&mut self, file: &Path, output: &Path) -> Result<bool> {
        let image = resize_to_max_dimension(open_image(file)?, self.options.max_dimension);
        let rgb = image.to_rgb8();
        let frame = BBox::new(0, 0, rgb.width(), rgb.height());

        self.segmenter.reset_image();
        self.segmenter.set_image(&rgb)?;
        let background = self.segmenter.predict_box(&frame)?;

        let Some(segment) = get_largest_mask_segment(&background.invert()) else {
            tracing::warn!("No foreground found in {}", file.display());
            return Ok(false);
        };
        tracing::debug!("Largest segment: {:?} ({} px)", segment.bbox, segment.area);

        let cutout = crop(&apply_mask(&rgb, &segment.mask), &segment.bbox);
        cutout.save(output)?;
        Ok(true)
    }
}
