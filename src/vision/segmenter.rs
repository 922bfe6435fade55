use crate::utils::error::Result;
use crate::vision::geometry::{BBox, Mask};
use image::RgbImage;

/// Box-prompted instance segmentation over one image at a time.
///
/// `set_image` computes whatever per-image state the model needs; any number
/// of `predict_box` calls can follow. The returned mask has the size of the
/// image passed to `set_image`.
pub trait Segmenter {
    fn set_image(&mut self, image: &RgbImage) -> Result<()>;

    fn reset_image(&mut self);

    fn predict_box(&mut self, bbox: &BBox) -> Result<Mask>;
}
