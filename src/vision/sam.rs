//! Segment Anything through ONNX Runtime.
//!
//! Expects the model split into an image encoder (`1x3x1024x1024` normalised
//! RGB in, `1x256x64x64` embeddings out) and the prompt decoder exported by
//! the reference `export_onnx_model` script, whose `masks` output is already
//! scaled back to the original image size.

use crate::utils::error::{EtlError, Result};
use crate::vision::geometry::{BBox, Mask};
use crate::vision::segmenter::Segmenter;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::{Array1, Array2, Array3, Array4, Ix4};
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider as OrtExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;

const INPUT_SIZE: u32 = 1024;
const LOW_RES_MASK_SIZE: usize = 256;
const PIXEL_MEAN: [f32; 3] = [123.675, 116.28, 103.53];
const PIXEL_STD: [f32; 3] = [58.395, 57.12, 57.375];
const MASK_THRESHOLD: f32 = 0.0;

struct ImageState {
    embeddings: Array4<f32>,
    width: u32,
    height: u32,
    scale: f32,
}

pub struct SamSegmenter {
    encoder: Session,
    decoder: Session,
    state: Option<ImageState>,
}

impl std::fmt::Debug for SamSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamSegmenter")
            .field("has_image", &self.state.is_some())
            .finish()
    }
}

impl SamSegmenter {
    pub fn from_files(encoder_path: &Path, decoder_path: &Path) -> Result<Self> {
        let encoder = load_session(encoder_path)?;
        let decoder = load_session(decoder_path)?;
        tracing::info!(
            "Loaded SAM encoder {} and decoder {}",
            encoder_path.display(),
            decoder_path.display()
        );
        Ok(Self {
            encoder,
            decoder,
            state: None,
        })
    }

    fn preprocess(image: &RgbImage) -> (Array4<f32>, f32) {
        let longest = image.width().max(image.height()).max(1);
        let scale = INPUT_SIZE as f32 / longest as f32;
        let new_width = ((image.width() as f32 * scale) + 0.5) as u32;
        let new_height = ((image.height() as f32 * scale) + 0.5) as u32;
        let resized = imageops::resize(
            image,
            new_width.clamp(1, INPUT_SIZE),
            new_height.clamp(1, INPUT_SIZE),
            FilterType::Triangle,
        );

        // Padding stays zero, which is the normalised mean.
        let size = INPUT_SIZE as usize;
        let mut input = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                input[[0, c, y as usize, x as usize]] =
                    (f32::from(pixel.0[c]) - PIXEL_MEAN[c]) / PIXEL_STD[c];
            }
        }
        (input, scale)
    }
}

fn load_session(path: &Path) -> Result<Session> {
    if !path.is_file() {
        return Err(EtlError::segmentation(format!(
            "Model file not found: {}",
            path.display()
        )));
    }

    let mut builder = Session::builder()
        .map_err(|e| EtlError::segmentation(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| EtlError::segmentation(format!("Failed to set optimization level: {e}")))?;

    let cuda_provider = CUDAExecutionProvider::default();
    if OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false) {
        tracing::info!("CUDA is available");
        builder = builder
            .with_execution_providers([cuda_provider.build()])
            .map_err(|e| EtlError::segmentation(format!("Failed to set CUDA execution provider: {e}")))?;
    }

    builder
        .commit_from_file(path)
        .map_err(|e| EtlError::segmentation(format!("Failed to load {}: {e}", path.display())))
}

impl Segmenter for SamSegmenter {
    fn set_image(&mut self, image: &RgbImage) -> Result<()> {
        let (input, scale) = Self::preprocess(image);
        let input = Tensor::from_array(input)
            .map_err(|e| EtlError::segmentation(format!("Failed to convert input tensor: {e}")))?;

        let outputs = self
            .encoder
            .run(ort::inputs![input])
            .map_err(|e| EtlError::segmentation(format!("Encoder inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .map(str::to_string)
            .ok_or_else(|| EtlError::segmentation("Encoder produced no output"))?;
        let embeddings = outputs
            .get(&first_key)
            .ok_or_else(|| EtlError::segmentation("Encoder output missing"))?
            .try_extract_array::<f32>()
            .map_err(|e| EtlError::segmentation(format!("Failed to extract embeddings: {e}")))?
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|e| EtlError::segmentation(format!("Unexpected embedding shape: {e}")))?;

        self.state = Some(ImageState {
            embeddings,
            width: image.width(),
            height: image.height(),
            scale,
        });
        Ok(())
    }

    fn reset_image(&mut self) {
        self.state = None;
    }

    fn predict_box(&mut self, bbox: &BBox) -> Result<Mask> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| EtlError::segmentation("predict_box called before set_image"))?;

        let s = state.scale;
        let coords = Array3::from_shape_vec(
            (1, 2, 2),
            vec![
                bbox.x as f32 * s,
                bbox.y as f32 * s,
                bbox.x2() as f32 * s,
                bbox.y2() as f32 * s,
            ],
        )
        .map_err(|e| EtlError::segmentation(e.to_string()))?;
        // 2 and 3 mark the top-left and bottom-right box corners.
        let labels = Array2::from_shape_vec((1, 2), vec![2.0f32, 3.0])
            .map_err(|e| EtlError::segmentation(e.to_string()))?;
        let mask_input = Array4::<f32>::zeros((1, 1, LOW_RES_MASK_SIZE, LOW_RES_MASK_SIZE));
        let has_mask_input = Array1::<f32>::zeros(1);
        let orig_size = Array1::from_vec(vec![state.height as f32, state.width as f32]);

        let tensor = |e: ort::Error| EtlError::segmentation(format!("Failed to build decoder input: {e}"));
        let inputs = ort::inputs![
            "image_embeddings" => Tensor::from_array(state.embeddings.clone()).map_err(tensor)?,
            "point_coords" => Tensor::from_array(coords).map_err(tensor)?,
            "point_labels" => Tensor::from_array(labels).map_err(tensor)?,
            "mask_input" => Tensor::from_array(mask_input).map_err(tensor)?,
            "has_mask_input" => Tensor::from_array(has_mask_input).map_err(tensor)?,
            "orig_im_size" => Tensor::from_array(orig_size).map_err(tensor)?,
        ];

        let (width, height) = (state.width, state.height);
        let outputs = self
            .decoder
            .run(inputs)
            .map_err(|e| EtlError::segmentation(format!("Decoder inference failed: {e}")))?;
        let masks = outputs
            .get("masks")
            .ok_or_else(|| EtlError::segmentation("Decoder has no 'masks' output"))?
            .try_extract_array::<f32>()
            .map_err(|e| EtlError::segmentation(format!("Failed to extract masks: {e}")))?
            .to_owned()
            .into_dimensionality::<Ix4>()
            .map_err(|e| EtlError::segmentation(format!("Unexpected mask shape: {e}")))?;

        let (_, _, mask_h, mask_w) = masks.dim();
        if mask_h != height as usize || mask_w != width as usize {
            return Err(EtlError::segmentation(format!(
                "Mask is {}x{}, expected {}x{}",
                mask_w, mask_h, width, height
            )));
        }

        Ok(Mask::from_fn(width, height, |x, y| {
            masks[[0, 0, y as usize, x as usize]] > MASK_THRESHOLD
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_scales_longest_side() {
        let image = RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255]));
        let (input, scale) = SamSegmenter::preprocess(&image);
        assert_eq!(input.dim(), (1, 3, 1024, 1024));
        assert!((scale - 5.12).abs() < 1e-6);
        // inside the resized area (1024x512) and in the padding below it
        assert!(input[[0, 0, 10, 10]] > 2.0);
        assert_eq!(input[[0, 0, 600, 10]], 0.0);
    }

    #[test]
    fn test_missing_model_file() {
        let err = SamSegmenter::from_files(Path::new("/nonexistent/enc.onnx"), Path::new("/nonexistent/dec.onnx"))
            .unwrap_err();
        assert!(matches!(err, EtlError::SegmentationError { .. }));
    }
}
