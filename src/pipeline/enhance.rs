//! Filter engine: decode the upload and apply a per-channel linear gain.
//!
//! Pure image-to-image transform, no I/O.
//!
//! Key rules:
//! - RGB channels are scaled by `gain`; alpha is never touched
//! - Output dimensions always equal input dimensions
//! - Scaled values saturate at 255, rounding half to even (clamped canvas semantics)

use std::io::Cursor;

use dicom_pixeldata::PixelDecoder;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::import::{
    sniff_payload, validate_image_bytes, PayloadKind, UploadedImage, DICOM_MAGIC_OFFSET,
};
use super::AnalysisError;

// ═══════════════════════════════════════════════════════════
// Configuration
// ═══════════════════════════════════════════════════════════

/// Enhancement settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Multiplier applied to the R, G and B channels.
    pub gain: f32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self { gain: 1.2 }
    }
}

// ═══════════════════════════════════════════════════════════
// Types
// ═══════════════════════════════════════════════════════════

/// Decoded upload, RGBA8. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct RawImage {
    pixels: RgbaImage,
}

impl RawImage {
    pub fn from_pixels(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

/// Enhanced image plus its renderable PNG encoding.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// Enhanced pixels (same dimensions as the source).
    pub pixels: RgbaImage,
    /// PNG encoding handed to the presentation layer and the report.
    pub png_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ProcessedImage {
    /// Wrap enhanced pixels, encoding them as PNG.
    pub fn from_pixels(pixels: RgbaImage) -> Result<Self, AnalysisError> {
        let png_bytes = encode_png(&pixels)?;
        Ok(Self {
            width: pixels.width(),
            height: pixels.height(),
            pixels,
            png_bytes,
        })
    }
}

// ═══════════════════════════════════════════════════════════
// Service trait
// ═══════════════════════════════════════════════════════════

/// Transforms a decoded image into its enhanced form.
///
/// Swappable: the processor only depends on this trait.
pub trait ImageEnhancer: Send + Sync {
    fn enhance(&self, image: &RawImage) -> Result<ProcessedImage, AnalysisError>;
}

/// Scales RGB by a fixed gain, leaving alpha untouched.
#[derive(Debug, Clone, Default)]
pub struct LinearGainEnhancer {
    config: EnhanceConfig,
}

impl LinearGainEnhancer {
    pub fn new(config: EnhanceConfig) -> Self {
        Self { config }
    }
}

impl ImageEnhancer for LinearGainEnhancer {
    fn enhance(&self, image: &RawImage) -> Result<ProcessedImage, AnalysisError> {
        let pixels = apply_gain(image.pixels(), self.config.gain);
        let processed = ProcessedImage::from_pixels(pixels)?;

        debug!(
            size = format!("{}x{}", processed.width, processed.height),
            gain = self.config.gain,
            png_size = processed.png_bytes.len(),
            "Image enhanced"
        );

        Ok(processed)
    }
}

// ═══════════════════════════════════════════════════════════
// Pure helper functions
// ═══════════════════════════════════════════════════════════

/// Decode an accepted upload into RGBA pixels.
///
/// Raster payloads go through `image`; payloads with the DICOM preamble are
/// parsed and their first frame rendered to pixels.
pub fn decode_upload(upload: &UploadedImage) -> Result<RawImage, AnalysisError> {
    validate_image_bytes(&upload.bytes)?;

    let img = match sniff_payload(&upload.bytes) {
        PayloadKind::Dicom => decode_dicom(&upload.bytes)?,
        _ => image::load_from_memory(&upload.bytes)
            .map_err(|e| AnalysisError::Decode(format!("Failed to decode image: {e}")))?,
    };

    debug!(
        file = %upload.file_name,
        size = format!("{}x{}", img.width(), img.height()),
        "Upload decoded"
    );

    Ok(RawImage::from_pixels(img.to_rgba8()))
}

/// Parse a DICOM file and render its first frame.
fn decode_dicom(bytes: &[u8]) -> Result<DynamicImage, AnalysisError> {
    // The reader expects the stream to start at the `DICM` magic.
    let obj = dicom_object::from_reader(&bytes[DICOM_MAGIC_OFFSET..])
        .map_err(|e| AnalysisError::Decode(format!("Failed to read DICOM: {e}")))?;
    let pixels = obj
        .decode_pixel_data()
        .map_err(|e| AnalysisError::Decode(format!("Failed to decode DICOM pixel data: {e}")))?;
    pixels
        .to_dynamic_image(0)
        .map_err(|e| AnalysisError::Decode(format!("Failed to render DICOM frame: {e}")))
}

/// Multiply the RGB channels of every pixel by `gain`.
pub fn apply_gain(pixels: &RgbaImage, gain: f32) -> RgbaImage {
    let mut out = pixels.clone();
    for px in out.pixels_mut() {
        for channel in &mut px.0[..3] {
            *channel = scale_channel(*channel, gain);
        }
    }
    out
}

/// Scale one channel value, saturating to `0..=255`.
pub fn scale_channel(value: u8, gain: f32) -> u8 {
    (value as f32 * gain).round_ties_even().clamp(0.0, 255.0) as u8
}

/// Encode an RGBA image as PNG bytes.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, AnalysisError> {
    let dynamic = DynamicImage::ImageRgba8(img.clone());
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| AnalysisError::Encode(format!("PNG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn make_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(width, height, Rgba(color))).unwrap()
    }

    fn raw(width: u32, height: u32, color: [u8; 4]) -> RawImage {
        RawImage::from_pixels(RgbaImage::from_pixel(width, height, Rgba(color)))
    }

    #[test]
    fn scales_rgb_channels_by_gain() {
        let out = LinearGainEnhancer::default()
            .enhance(&raw(4, 3, [100, 50, 10, 200]))
            .unwrap();
        assert_eq!(out.pixels.get_pixel(0, 0).0, [120, 60, 12, 200]);
    }

    #[test]
    fn alpha_is_untouched() {
        let out = apply_gain(&RgbaImage::from_pixel(2, 2, Rgba([10, 10, 10, 7])), 1.2);
        assert!(out.pixels().all(|p| p.0[3] == 7));
    }

    #[test]
    fn dimensions_preserved() {
        let out = LinearGainEnhancer::default()
            .enhance(&raw(37, 11, [1, 2, 3, 255]))
            .unwrap();
        assert_eq!((out.width, out.height), (37, 11));
        assert_eq!(out.pixels.dimensions(), (37, 11));
    }

    #[test]
    fn bright_channels_saturate() {
        assert_eq!(scale_channel(250, 1.2), 255);
        assert_eq!(scale_channel(213, 1.2), 255);
        assert_eq!(scale_channel(212, 1.2), 254);
    }

    #[test]
    fn rounding_is_half_to_even() {
        assert_eq!(scale_channel(3, 1.5), 4); // 4.5
        assert_eq!(scale_channel(5, 1.5), 8); // 7.5
    }

    #[test]
    fn reapplying_enhancement_changes_the_image() {
        let enhancer = LinearGainEnhancer::default();
        let once = enhancer.enhance(&raw(2, 2, [100, 80, 60, 255])).unwrap();
        let twice = enhancer
            .enhance(&RawImage::from_pixels(once.pixels.clone()))
            .unwrap();
        assert_ne!(once.pixels, twice.pixels);
        assert_eq!(twice.pixels.get_pixel(0, 0).0, [144, 115, 86, 255]);
    }

    #[test]
    fn processed_png_decodes_to_same_pixels() {
        let out = LinearGainEnhancer::default()
            .enhance(&raw(5, 5, [10, 20, 30, 255]))
            .unwrap();
        let decoded = image::load_from_memory(&out.png_bytes).unwrap().to_rgba8();
        assert_eq!(decoded, out.pixels);
    }

    #[test]
    fn decode_valid_png() {
        let upload = UploadedImage::new("scan.png", make_png(64, 48, [1, 2, 3, 255])).unwrap();
        let img = decode_upload(&upload).unwrap();
        assert_eq!((img.width(), img.height()), (64, 48));
    }

    #[test]
    fn decode_error_on_invalid_bytes() {
        let upload = UploadedImage::new("scan.png", vec![0xAB; 512]).unwrap();
        let err = decode_upload(&upload).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    /// Minimal 8-bit MONOCHROME2 DICOM file, `width`x`height`.
    fn make_dicom(width: u16, height: u16) -> Vec<u8> {
        use dicom_core::{DataElement, PrimitiveValue, VR};
        use dicom_dictionary_std::tags;
        use dicom_object::{FileMetaTableBuilder, InMemDicomObject};

        let pixels: Vec<u8> = (0..width as usize * height as usize)
            .map(|i| (i * 7 % 256) as u8)
            .collect();

        let mut obj = InMemDicomObject::new_empty();
        obj.put(DataElement::new(tags::SAMPLES_PER_PIXEL, VR::US, PrimitiveValue::from(1_u16)));
        obj.put(DataElement::new(
            tags::PHOTOMETRIC_INTERPRETATION,
            VR::CS,
            PrimitiveValue::from("MONOCHROME2"),
        ));
        obj.put(DataElement::new(tags::ROWS, VR::US, PrimitiveValue::from(height)));
        obj.put(DataElement::new(tags::COLUMNS, VR::US, PrimitiveValue::from(width)));
        obj.put(DataElement::new(tags::BITS_ALLOCATED, VR::US, PrimitiveValue::from(8_u16)));
        obj.put(DataElement::new(tags::BITS_STORED, VR::US, PrimitiveValue::from(8_u16)));
        obj.put(DataElement::new(tags::HIGH_BIT, VR::US, PrimitiveValue::from(7_u16)));
        obj.put(DataElement::new(tags::PIXEL_REPRESENTATION, VR::US, PrimitiveValue::from(0_u16)));
        obj.put(DataElement::new(tags::PIXEL_DATA, VR::OB, PrimitiveValue::from(pixels)));

        let file = obj
            .with_meta(
                FileMetaTableBuilder::new()
                    // Explicit VR Little Endian
                    .transfer_syntax("1.2.840.10008.1.2.1")
                    // Secondary Capture Image Storage
                    .media_storage_sop_class_uid("1.2.840.10008.5.1.4.1.1.7")
                    .media_storage_sop_instance_uid("1.2.826.0.1.3680043.2.1125.1"),
            )
            .unwrap();
        let mut out = Vec::new();
        file.write_all(&mut out).unwrap();
        out
    }

    #[test]
    fn decode_dicom_payload() {
        let bytes = make_dicom(6, 4);
        assert_eq!(sniff_payload(&bytes), PayloadKind::Dicom);
        let upload = UploadedImage::new("chest.dcm", bytes).unwrap();
        let img = decode_upload(&upload).unwrap();
        assert_eq!((img.width(), img.height()), (6, 4));
        assert!(img.pixels().pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn dicom_run_feeds_the_enhancer() {
        let upload = UploadedImage::new("knee.dcm", make_dicom(16, 8)).unwrap();
        let raw = decode_upload(&upload).unwrap();
        let out = LinearGainEnhancer::default().enhance(&raw).unwrap();
        assert_eq!((out.width, out.height), (16, 8));
    }

    #[test]
    fn decode_error_on_corrupt_dicom() {
        let mut bytes = vec![0u8; 512];
        bytes[128..132].copy_from_slice(b"DICM");
        let upload = UploadedImage::new("chest.dcm", bytes).unwrap();
        let err = decode_upload(&upload).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(msg) if msg.contains("DICOM")));
    }

    #[test]
    fn dcm_extension_with_raster_payload_decodes() {
        let upload = UploadedImage::new("chest.dcm", make_png(32, 32, [9, 9, 9, 255])).unwrap();
        assert!(decode_upload(&upload).is_ok());
    }
}
