use crate::utils::error::{EtlError, Result};
use crate::utils::files::{extension_of, round_int};
use crate::vision::geometry::{BBox, Mask};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, ImageReader, Luma, Rgba, RgbImage, RgbaImage};
use std::io::Cursor;
use std::path::Path;

/// Decodes an in-memory image without the decoder's default size limits;
/// archival scans routinely exceed them.
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    reader.no_limits();
    Ok(reader.decode()?)
}

pub fn open_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let mut reader = ImageReader::open(path)?.with_guessed_format()?;
    reader.no_limits();
    Ok(reader.decode()?)
}

/// Target size so that the longest side is at most `max_dimension`.
pub fn scaled_dimensions(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    let longest = width.max(height);
    if longest <= max_dimension || longest == 0 {
        return (width, height);
    }
    let scale = f64::from(max_dimension) / f64::from(longest);
    (
        round_int(f64::from(width) * scale).max(1) as u32,
        round_int(f64::from(height) * scale).max(1) as u32,
    )
}

pub fn resize_to_max_dimension(image: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (image.width(), image.height());
    let (new_width, new_height) = scaled_dimensions(width, height, max_dimension);
    if (new_width, new_height) == (width, height) {
        return image;
    }
    tracing::debug!(
        "Resizing {}x{} -> {}x{}",
        width,
        height,
        new_width,
        new_height
    );
    image.resize_exact(new_width, new_height, FilterType::Triangle)
}

/// RGBA copy of `image` that is transparent black outside `mask`.
pub fn apply_mask(image: &RgbImage, mask: &Mask) -> RgbaImage {
    RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        if mask.get(x, y) {
            let [r, g, b] = image.get_pixel(x, y).0;
            Rgba([r, g, b, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Crops to `bbox`, clipped to the image bounds.
pub fn crop(image: &RgbaImage, bbox: &BBox) -> RgbaImage {
    let bbox = bbox.clamp_to(image.width(), image.height());
    imageops::crop_imm(image, bbox.x, bbox.y, bbox.width, bbox.height).to_image()
}

/// Stretches a 16-bit grayscale image to the full 8-bit range. A flat image
/// becomes black.
pub fn normalize_16bit(image: &ImageBuffer<Luma<u16>, Vec<u16>>) -> GrayImage {
    let (min, max) = image
        .pixels()
        .fold((u16::MAX, u16::MIN), |(lo, hi), p| (lo.min(p.0[0]), hi.max(p.0[0])));
    let range = f64::from(max.saturating_sub(min));

    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if range == 0.0 {
            return Luma([0]);
        }
        let v = f64::from(image.get_pixel(x, y).0[0] - min);
        Luma([(v * 255.0 / range) as u8])
    })
}

/// Converts to something the target format can store: JPEG has no alpha
/// and no 16-bit depth.
pub fn prepare_for_format(image: DynamicImage, format: ImageFormat) -> DynamicImage {
    let image = match image {
        DynamicImage::ImageLuma16(luma) => DynamicImage::ImageLuma8(normalize_16bit(&luma)),
        other => other,
    };
    match (format, &image) {
        (ImageFormat::Jpeg, DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_)) => image,
        (ImageFormat::Jpeg, DynamicImage::ImageLumaA8(_)) => DynamicImage::ImageLuma8(image.to_luma8()),
        (ImageFormat::Jpeg, _) => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    }
}

/// Saves `image` in the format implied by the extension of `path`.
pub fn save_converted(image: DynamicImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path).map_err(|_| {
        EtlError::processing(format!(
            "Unsupported output extension '{}' for {}",
            extension_of(path),
            path.display()
        ))
    })?;
    prepare_for_format(image, format).save_with_format(path, format)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_scaled_dimensions() {
        assert_eq!(scaled_dimensions(8000, 6000, 4096), (4096, 3072));
        assert_eq!(scaled_dimensions(3000, 9000, 4000), (1333, 4000));
        assert_eq!(scaled_dimensions(100, 50, 4096), (100, 50));
    }

    #[test]
    fn test_resize_keeps_small_images() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 20));
        let resized = resize_to_max_dimension(img, 10);
        assert_eq!((resized.width(), resized.height()), (10, 5));
        let untouched = resize_to_max_dimension(DynamicImage::ImageRgb8(RgbImage::new(4, 2)), 10);
        assert_eq!((untouched.width(), untouched.height()), (4, 2));
    }

    #[test]
    fn test_apply_mask_and_crop() {
        let img = RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30]));
        let mask = Mask::from_fn(4, 4, |x, y| x >= 2 && y >= 1);
        let masked = apply_mask(&img, &mask);
        assert_eq!(masked.get_pixel(0, 0).0, [0, 0, 0, 0]);
        assert_eq!(masked.get_pixel(3, 3).0, [10, 20, 30, 255]);

        let cropped = crop(&masked, &BBox::new(2, 1, 5, 5));
        assert_eq!((cropped.width(), cropped.height()), (2, 3));
        assert_eq!(cropped.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn test_normalize_16bit() {
        let img = ImageBuffer::from_fn(3, 1, |x, _| Luma([1000 + x as u16 * 500]));
        let out = normalize_16bit(&img);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 127);
        assert_eq!(out.get_pixel(2, 0).0[0], 255);

        let flat = ImageBuffer::from_pixel(2, 2, Luma([4000u16]));
        assert_eq!(normalize_16bit(&flat).get_pixel(1, 1).0[0], 0);
    }

    #[test]
    fn test_save_converted_drops_alpha_for_jpeg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.jpg");
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(6, 6, Rgba([1, 2, 3, 4])));
        save_converted(rgba, &path).unwrap();

        let reread = open_image(&path).unwrap();
        assert_eq!((reread.width(), reread.height()), (6, 6));
        assert!(!reread.color().has_alpha());

        assert!(save_converted(DynamicImage::ImageRgb8(RgbImage::new(2, 2)), dir.path().join("x.xyz")).is_err());
    }
}
