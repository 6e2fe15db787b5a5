//! Center-crop an image to a target aspect ratio and re-encode it as JPEG.
//!
//! [compute_crop] is the pure geometry; [crop_to_ratio] decodes, crops,
//! flattens transparency onto white and encodes at quality 90.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use tracing::instrument;

use crate::error::GeometryError;
use crate::types::AspectRatio;

/// JPEG quality of every re-encoded image (0.9 on a 0..1 scale).
pub const JPEG_QUALITY: u8 = 90;

/// MIME type of every re-encoded image.
pub const OUTPUT_MIME: &str = "image/jpeg";

/// Region of the source image kept by the crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

/// Computes the centered crop of a `width`×`height` image to `ratio`.
///
/// Too-wide sources keep full height and lose columns on both sides;
/// everything else keeps full width and loses rows top and bottom.
/// Crop extents are rounded to whole pixels and never exceed the source.
#[instrument(level = "trace")]
pub fn compute_crop(width: u32, height: u32, ratio: AspectRatio) -> Result<CropRect, GeometryError> {
  if width == 0 || height == 0 {
    return Err(GeometryError::ZeroDimension { width, height });
  }
  if !ratio.is_valid() {
    return Err(GeometryError::InvalidRatio {
      width: ratio.width,
      height: ratio.height,
    });
  }

  let target = ratio.value();
  let current = f64::from(width) / f64::from(height);

  if current > target {
    let draw_width = clamp_extent(f64::from(height) * target, width);
    Ok(CropRect {
      x: (width - draw_width) / 2,
      y: 0,
      width: draw_width,
      height,
    })
  } else {
    let draw_height = clamp_extent(f64::from(width) / target, height);
    Ok(CropRect {
      x: 0,
      y: (height - draw_height) / 2,
      width,
      height: draw_height,
    })
  }
}

fn clamp_extent(exact: f64, max: u32) -> u32 {
  let rounded = exact.round();
  if rounded < 1.0 {
    1
  } else if rounded >= f64::from(max) {
    max
  } else {
    rounded as u32
  }
}

/// Decodes `source`, crops it to `ratio` and returns JPEG bytes.
#[instrument(level = "trace", skip(source), fields(len = source.len()))]
pub fn crop_to_ratio(source: &[u8], ratio: AspectRatio) -> Result<Bytes, GeometryError> {
  let img = image::load_from_memory(source).map_err(GeometryError::Decode)?;
  let (width, height) = img.dimensions();
  let rect = compute_crop(width, height, ratio)?;
  let cropped = img.crop_imm(rect.x, rect.y, rect.width, rect.height);
  encode_jpeg(&flatten_onto_white(&cropped))
}

/// Drops the alpha channel by compositing over an opaque white background.
fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
  if !img.color().has_alpha() {
    return img.to_rgb8();
  }
  let rgba = img.to_rgba8();
  RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
    let [r, g, b, a] = rgba.get_pixel(x, y).0;
    let blend = |c: u8| -> u8 {
      let c = u16::from(c);
      let a = u16::from(a);
      ((c * a + 255 * (255 - a) + 127) / 255) as u8
    };
    Rgb([blend(r), blend(g), blend(b)])
  })
}

fn encode_jpeg(img: &RgbImage) -> Result<Bytes, GeometryError> {
  let mut buf = Vec::new();
  JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY)
    .encode_image(img)
    .map_err(GeometryError::Encode)?;
  Ok(Bytes::from(buf))
}

/// Output file name: `<basename>_<rw>x<rh>.jpg`, basename being the name up to its last dot.
pub fn output_file_name(original: &str, ratio: AspectRatio) -> String {
  let base = match original.rfind('.') {
    Some(idx) => &original[..idx],
    None => original,
  };
  format!("{}_{}.jpg", base, ratio)
}
