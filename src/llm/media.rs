use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Sniffs a mime type from raw bytes. `infer` does not recognize every HEIC
/// brand, so the ftyp box is checked first.
pub fn detect_mime_type(data: &[u8]) -> Option<String> {
    if data.len() > 12 {
        let ftyp = &data[4..12];
        if ftyp.starts_with(b"ftyp") {
            let brand = &ftyp[4..8];
            if brand == b"heic" || brand == b"heif" || brand == b"hevc" {
                return Some("image/heic".to_string());
            }
        }
    }

    infer::get(data).map(|kind| kind.mime_type().to_string())
}

/// Opaque encoded-image payload: a mime type plus base64 data with no
/// `data:` prefix. The core never inspects the pixels; the mime type is
/// detected once at construction and carried along.
///
/// Serializes as a `data:<mime>;base64,<payload>` URL so persisted history
/// matches what the host uploader and renderer exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EncodedImage {
    mime_type: String,
    data: String,
}

impl EncodedImage {
    pub fn new(mime_type: String, data: String) -> Self {
        EncodedImage { mime_type, data }
    }

    /// Builds a payload from raw bytes, sniffing the mime type and falling
    /// back to JPEG when the bytes are unrecognized.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        use base64::{engine::general_purpose, Engine as _};

        let mime_type = detect_mime_type(bytes).unwrap_or_else(|| "image/jpeg".to_string());
        EncodedImage {
            mime_type,
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Raw base64 with no prefix is assumed to be JPEG, as the upstream
    /// service assumed.
    pub fn from_base64(data: String) -> Self {
        EncodedImage {
            mime_type: "image/jpeg".to_string(),
            data,
        }
    }

    /// Parses a `data:<mime>;base64,<payload>` URL, the shape host
    /// uploaders produce.
    pub fn from_data_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("data:")
            .ok_or_else(|| anyhow!("not a data URL"))?;
        let (mime_type, data) = rest
            .split_once(";base64,")
            .ok_or_else(|| anyhow!("data URL is not base64-encoded"))?;
        if mime_type.is_empty() {
            return Err(anyhow!("data URL has no mime type"));
        }
        Ok(EncodedImage {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn base64_data(&self) -> &str {
        &self.data
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

impl From<EncodedImage> for String {
    fn from(image: EncodedImage) -> String {
        image.to_data_url()
    }
}

impl TryFrom<String> for EncodedImage {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self> {
        if value.starts_with("data:") {
            EncodedImage::from_data_url(&value)
        } else {
            Ok(EncodedImage::from_base64(value))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_jpeg_and_png_magic_bytes() {
        let jpeg: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01, 0x01];
        assert_eq!(detect_mime_type(jpeg).as_deref(), Some("image/jpeg"));

        let png: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0, 0];
        assert_eq!(detect_mime_type(png).as_deref(), Some("image/png"));
    }

    #[test]
    fn detects_heic_brand() {
        let mut data = vec![0u8; 4];
        data.extend_from_slice(b"ftypheic");
        data.extend_from_slice(&[0u8; 8]);
        assert_eq!(detect_mime_type(&data).as_deref(), Some("image/heic"));
    }

    #[test]
    fn data_url_round_trip() {
        let image = EncodedImage::from_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.base64_data(), "aGVsbG8=");
        assert_eq!(image.to_data_url(), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn rejects_malformed_data_urls() {
        assert!(EncodedImage::from_data_url("http://example.com/a.png").is_err());
        assert!(EncodedImage::from_data_url("data:image/png,plain").is_err());
        assert!(EncodedImage::from_data_url("data:;base64,aGVsbG8=").is_err());
    }

    #[test]
    fn bare_base64_is_assumed_jpeg() {
        let image = EncodedImage::from_base64("aGVsbG8=".to_string());
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[test]
    fn serializes_as_data_url_string() {
        let image = EncodedImage::new("image/webp".to_string(), "Zm9v".to_string());
        let json = serde_json::to_string(&image).unwrap();
        assert_eq!(json, "\"data:image/webp;base64,Zm9v\"");

        let back: EncodedImage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, image);
    }

    #[test]
    fn from_bytes_falls_back_to_jpeg() {
        let image = EncodedImage::from_bytes(b"not an image at all");
        assert_eq!(image.mime_type(), "image/jpeg");
    }
}
