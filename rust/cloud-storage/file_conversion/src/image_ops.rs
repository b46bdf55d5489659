use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat};

use crate::{ConversionError, FileType, Result};

/// Largest width or height accepted for output images
pub const MAX_DIMENSION: u32 = 10_000;

/// Quality used by [compress] when none is given
pub const DEFAULT_QUALITY: u8 = 75;

/// Raster formats images can be converted into
#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum TargetFormat {
    Png,
    #[strum(to_string = "jpeg", serialize = "jpg")]
    Jpeg,
    Webp,
    Gif,
    Bmp,
    Tiff,
}

impl TargetFormat {
    fn image_format(self) -> ImageFormat {
        match self {
            TargetFormat::Png => ImageFormat::Png,
            TargetFormat::Jpeg => ImageFormat::Jpeg,
            TargetFormat::Webp => ImageFormat::WebP,
            TargetFormat::Gif => ImageFormat::Gif,
            TargetFormat::Bmp => ImageFormat::Bmp,
            TargetFormat::Tiff => ImageFormat::Tiff,
        }
    }

    /// The file type of images written in this format
    pub fn file_type(self) -> FileType {
        match self {
            TargetFormat::Png => FileType::Png,
            TargetFormat::Jpeg => FileType::Jpg,
            TargetFormat::Webp => FileType::Webp,
            TargetFormat::Gif => FileType::Gif,
            TargetFormat::Bmp => FileType::Bmp,
            TargetFormat::Tiff => FileType::Tiff,
        }
    }

    fn from_image_format(format: ImageFormat) -> Result<Self> {
        match format {
            ImageFormat::Png => Ok(TargetFormat::Png),
            ImageFormat::Jpeg => Ok(TargetFormat::Jpeg),
            ImageFormat::WebP => Ok(TargetFormat::Webp),
            ImageFormat::Gif => Ok(TargetFormat::Gif),
            ImageFormat::Bmp => Ok(TargetFormat::Bmp),
            ImageFormat::Tiff => Ok(TargetFormat::Tiff),
            other => Err(ConversionError::UnsupportedFormat(format!("{other:?}"))),
        }
    }
}

/// Basic facts about an image
#[derive(serde::Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
}

/// An encoded image produced by one of the operations in this module
#[derive(Debug, Clone)]
pub struct ImageOutput {
    pub bytes: Vec<u8>,
    pub format: TargetFormat,
    pub width: u32,
    pub height: u32,
}

impl ImageOutput {
    /// The mime type of [ImageOutput::bytes]
    pub fn mime_type(&self) -> &'static str {
        self.format.file_type().mime_type()
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Scale to fit inside the box, keeping the aspect ratio
    #[default]
    Fit,
    /// Stretch to exactly the requested size
    Exact,
}

/// Target size for [resize]. A missing dimension is derived from the aspect ratio.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
pub struct ResizeOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(default)]
    pub mode: ResizeMode,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "utoipa", derive(utoipa::ToSchema))]
#[serde(default)]
pub struct CompressOptions {
    /// JPEG quality between 1 and 100
    pub quality: u8,
    /// Images wider than this are scaled down first
    pub max_width: Option<u32>,
    /// Images taller than this are scaled down first
    pub max_height: Option<u32>,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            max_width: None,
            max_height: None,
        }
    }
}

/// Reads the dimensions and format of an image
pub fn info(bytes: &[u8]) -> Result<ImageInfo> {
    let (image, format) = decode(bytes)?;
    Ok(ImageInfo {
        width: image.width(),
        height: image.height(),
        format,
    })
}

/// Resizes an image and re-encodes it in its original format
#[tracing::instrument(skip(bytes))]
pub fn resize(bytes: &[u8], options: &ResizeOptions) -> Result<ImageOutput> {
    let (image, format) = decode(bytes)?;
    let (width, height) = target_size(image.width(), image.height(), options)?;

    let resized = match options.mode {
        ResizeMode::Fit => image.resize(width, height, FilterType::Lanczos3),
        ResizeMode::Exact => image.resize_exact(width, height, FilterType::Lanczos3),
    };

    encode(resized, format)
}

/// Re-encodes an image as JPEG at the requested quality, scaling it down first when it exceeds
/// the configured bounds
#[tracing::instrument(skip(bytes))]
pub fn compress(bytes: &[u8], options: &CompressOptions) -> Result<ImageOutput> {
    if !(1..=100).contains(&options.quality) {
        return Err(ConversionError::invalid("quality must be between 1 and 100"));
    }

    let (image, _) = decode(bytes)?;
    let image = shrink_to_bounds(image, options.max_width, options.max_height)?;
    let (width, height) = (image.width(), image.height());

    let mut buffer = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buffer, options.quality);
    DynamicImage::ImageRgb8(image.to_rgb8()).write_with_encoder(encoder)?;

    Ok(ImageOutput {
        bytes: buffer,
        format: TargetFormat::Jpeg,
        width,
        height,
    })
}

/// Re-encodes an image in another raster format
#[tracing::instrument(skip(bytes))]
pub fn convert(bytes: &[u8], target: TargetFormat) -> Result<ImageOutput> {
    let (image, _) = decode(bytes)?;
    encode(image, target)
}

fn decode(bytes: &[u8]) -> Result<(DynamicImage, TargetFormat)> {
    if bytes.is_empty() {
        return Err(ConversionError::invalid("image is empty"));
    }
    let format = TargetFormat::from_image_format(image::guess_format(bytes)?)?;
    let image = image::load_from_memory_with_format(bytes, format.image_format())?;
    Ok((image, format))
}

fn encode(image: DynamicImage, format: TargetFormat) -> Result<ImageOutput> {
    let (width, height) = (image.width(), image.height());
    // JPEG has no alpha channel, every other target accepts rgba
    let image = match format {
        TargetFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => DynamicImage::ImageRgba8(image.to_rgba8()),
    };

    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, format.image_format())?;

    Ok(ImageOutput {
        bytes: cursor.into_inner(),
        format,
        width,
        height,
    })
}

fn target_size(width: u32, height: u32, options: &ResizeOptions) -> Result<(u32, u32)> {
    let (target_width, target_height) = match (options.width, options.height) {
        (None, None) => {
            return Err(ConversionError::invalid(
                "resize requires a width, a height or both",
            ));
        }
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale(height, w, width)),
        (None, Some(h)) => (scale(width, h, height), h),
    };

    check_dimension(target_width)?;
    check_dimension(target_height)?;
    Ok((target_width, target_height))
}

fn shrink_to_bounds(
    image: DynamicImage,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> Result<DynamicImage> {
    let max_width = max_width.unwrap_or(u32::MAX);
    let max_height = max_height.unwrap_or(u32::MAX);
    check_dimension(max_width.min(MAX_DIMENSION))?;
    check_dimension(max_height.min(MAX_DIMENSION))?;

    if image.width() <= max_width && image.height() <= max_height {
        return Ok(image);
    }
    Ok(image.resize(max_width, max_height, FilterType::Lanczos3))
}

/// `value * numerator / denominator`, never below one pixel
fn scale(value: u32, numerator: u32, denominator: u32) -> u32 {
    let scaled = u64::from(value) * u64::from(numerator) / u64::from(denominator.max(1));
    u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
}

fn check_dimension(value: u32) -> Result<()> {
    if value == 0 || value > MAX_DIMENSION {
        return Err(ConversionError::invalid(format!(
            "dimensions must be between 1 and {MAX_DIMENSION} pixels"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use image::{Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;

    pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
        let image = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 5) as u8, (y * 7) as u8, 128])
        });
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(image)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn reads_info() {
        let info = info(&sample_png(40, 20)).unwrap();
        assert_eq!(
            info,
            ImageInfo {
                width: 40,
                height: 20,
                format: TargetFormat::Png
            }
        );
    }

    #[test]
    fn rejects_non_images() {
        assert!(info(b"").unwrap_err().is_client_error());
        assert!(info(b"plain text, not pixels").is_err());
    }

    #[test]
    fn resize_fit_keeps_aspect_ratio() {
        let output = resize(
            &sample_png(40, 20),
            &ResizeOptions {
                width: Some(20),
                height: None,
                mode: ResizeMode::Fit,
            },
        )
        .unwrap();

        assert_eq!((output.width, output.height), (20, 10));
        assert_eq!(output.format, TargetFormat::Png);
        assert_eq!(info(&output.bytes).unwrap().width, 20);
    }

    #[test]
    fn resize_exact_stretches() {
        let output = resize(
            &sample_png(40, 20),
            &ResizeOptions {
                width: Some(15),
                height: Some(30),
                mode: ResizeMode::Exact,
            },
        )
        .unwrap();

        let resized = info(&output.bytes).unwrap();
        assert_eq!((resized.width, resized.height), (15, 30));
    }

    #[test]
    fn resize_validates_dimensions() {
        let png = sample_png(10, 10);
        assert!(resize(&png, &ResizeOptions::default()).is_err());
        assert!(
            resize(
                &png,
                &ResizeOptions {
                    width: Some(MAX_DIMENSION + 1),
                    height: None,
                    mode: ResizeMode::Fit
                }
            )
            .is_err()
        );
    }

    #[test]
    fn converts_to_jpeg() {
        let output = convert(&sample_png(16, 16), TargetFormat::Jpeg).unwrap();
        assert_eq!(output.mime_type(), "image/jpeg");
        assert_eq!(image::guess_format(&output.bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn converts_transparent_png_to_jpeg() {
        let image = RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 10]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();

        let output = convert(cursor.get_ref(), TargetFormat::Jpeg).unwrap();
        assert_eq!(info(&output.bytes).unwrap().format, TargetFormat::Jpeg);
    }

    #[test]
    fn compress_outputs_jpeg_within_bounds() {
        let output = compress(
            &sample_png(200, 100),
            &CompressOptions {
                quality: 40,
                max_width: Some(100),
                max_height: None,
            },
        )
        .unwrap();

        assert_eq!(output.format, TargetFormat::Jpeg);
        assert_eq!((output.width, output.height), (100, 50));
    }

    #[test]
    fn compress_rejects_bad_quality() {
        let png = sample_png(4, 4);
        for quality in [0, 101] {
            let options = CompressOptions {
                quality,
                ..Default::default()
            };
            assert!(compress(&png, &options).unwrap_err().is_client_error());
        }
    }

    #[test]
    fn parses_target_format() {
        assert_eq!(TargetFormat::from_str("JPG").unwrap(), TargetFormat::Jpeg);
        assert_eq!(TargetFormat::from_str("webp").unwrap(), TargetFormat::Webp);
        assert!(TargetFormat::from_str("svg").is_err());
    }
}
