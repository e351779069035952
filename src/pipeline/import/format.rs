use serde::{Deserialize, Serialize};

use crate::pipeline::AnalysisError;

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial files.
pub const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
pub const MIN_IMAGE_BYTES: usize = 67;

/// Offset of the `DICM` marker, i.e. the length of the DICOM preamble.
pub const DICOM_MAGIC_OFFSET: usize = 128;

/// What the payload looks like, from magic bytes (NOT the file extension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    Png,
    Jpeg,
    Dicom,
    Unknown,
}

impl PayloadKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Dicom => "application/dicom",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Whether the raster decoder can handle this payload.
    pub fn is_raster(&self) -> bool {
        matches!(self, Self::Png | Self::Jpeg)
    }
}

/// Classify a payload by its leading bytes.
pub fn sniff_payload(bytes: &[u8]) -> PayloadKind {
    match bytes {
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => PayloadKind::Png,
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => PayloadKind::Jpeg,
        _ if bytes.get(DICOM_MAGIC_OFFSET..DICOM_MAGIC_OFFSET + 4) == Some(&b"DICM"[..]) => {
            PayloadKind::Dicom
        }
        _ => PayloadKind::Unknown,
    }
}

/// Size check run before decoding. Rejects clearly invalid input early.
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), AnalysisError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(AnalysisError::Decode(
            "Image data too small to be valid".into(),
        ));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AnalysisError::Decode(format!(
            "Image data exceeds {}MB limit",
            MAX_IMAGE_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_png() {
        let bytes = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(sniff_payload(&bytes), PayloadKind::Png);
        assert_eq!(PayloadKind::Png.mime_type(), "image/png");
    }

    #[test]
    fn sniff_jpeg() {
        assert_eq!(sniff_payload(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]), PayloadKind::Jpeg);
    }

    #[test]
    fn sniff_dicom_preamble() {
        let mut bytes = vec![0u8; 132];
        bytes[128..132].copy_from_slice(b"DICM");
        assert_eq!(sniff_payload(&bytes), PayloadKind::Dicom);
        assert!(!PayloadKind::Dicom.is_raster());
    }

    #[test]
    fn sniff_short_or_unknown() {
        assert_eq!(sniff_payload(&[]), PayloadKind::Unknown);
        assert_eq!(sniff_payload(&[0x4D, 0x5A, 0x90, 0x00]), PayloadKind::Unknown);
    }

    #[test]
    fn validate_rejects_tiny_input() {
        let err = validate_image_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, AnalysisError::Decode(_)));
    }

    #[test]
    fn validate_accepts_reasonable_size() {
        assert!(validate_image_bytes(&[0u8; 1024]).is_ok());
    }
}
