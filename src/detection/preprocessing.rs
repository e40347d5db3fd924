use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, RgbImage};

use crate::error::DetectError;
use crate::models::{InputSize, Rect};

/// Restrict a zone to the image bounds. Zones with no area, before or after
/// clipping, are rejected.
pub fn clip_zone(zone: &Rect, img: &DynamicImage) -> Result<Rect, DetectError> {
    let invalid = |r: &Rect| DetectError::InvalidRegion {
        width: r.width,
        height: r.height,
    };

    if zone.is_empty() {
        return Err(invalid(zone));
    }
    let (width, height) = img.dimensions();
    let clipped = zone.clamp_to(width as f64, height as f64);
    if clipped.is_empty() {
        return Err(invalid(&clipped));
    }
    Ok(clipped)
}

/// Crop the zone out of the image, rounding the origin down and the size up
/// to whole pixels
pub fn crop_zone(img: &DynamicImage, zone: &Rect) -> Result<DynamicImage, DetectError> {
    let x = zone.left.floor().max(0.0) as u32;
    let y = zone.top.floor().max(0.0) as u32;
    let width = zone.width.ceil().max(0.0) as u32;
    let height = zone.height.ceil().max(0.0) as u32;

    // crop_imm clips to the image bounds
    let cropped = img.crop_imm(x, y, width, height);
    if cropped.width() == 0 || cropped.height() == 0 {
        return Err(DetectError::InvalidRegion {
            width: zone.width,
            height: zone.height,
        });
    }
    Ok(cropped)
}

/// Resize to the model's input dimensions as 8-bit RGB
pub fn resize_to(img: &DynamicImage, size: InputSize, filter: FilterType) -> RgbImage {
    let rgb = img.to_rgb8();
    if rgb.dimensions() == (size.width, size.height) {
        return rgb;
    }
    image::imageops::resize(&rgb, size.width, size.height, filter)
}
