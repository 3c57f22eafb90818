//! Image attachments for multimodal turns
//!
//! An [`ImageAttachment`] is an opaque handle: the raw encoded bytes plus the
//! MIME type sniffed from them. The session never decodes pixels; backends
//! forward the bytes (base64-encoded) to the model.

use crate::error::{GemmaChatError, Result};
use base64::Engine as _;
use bytes::Bytes;
use image::ImageFormat;
use std::path::Path;
use std::time::Duration;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Encoded image attached to a user turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    mime_type: String,
    data: Bytes,
}

impl ImageAttachment {
    /// Create an attachment from encoded image bytes
    ///
    /// The format is detected from the magic bytes; only formats the model
    /// backends accept are allowed.
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Image` if the bytes are empty or not a
    /// supported image format
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::attachments::ImageAttachment;
    ///
    /// let png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    /// let image = ImageAttachment::from_bytes(png).unwrap();
    /// assert_eq!(image.mime_type(), "image/png");
    /// ```
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.is_empty() {
            return Err(GemmaChatError::Image("image data is empty".to_string()).into());
        }

        let format = image::guess_format(&data)
            .map_err(|e| GemmaChatError::Image(format!("Unrecognized image data: {}", e)))?;
        let mime_type = mime_type_for(format).ok_or_else(|| {
            GemmaChatError::Image(format!("Unsupported image format: {:?}", format))
        })?;

        Ok(Self {
            mime_type: mime_type.to_string(),
            data,
        })
    }

    /// Load an attachment from an image file on disk
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Image` if the file cannot be read or is not a
    /// supported image
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            GemmaChatError::Image(format!("Failed to read image {}: {}", path.display(), e))
        })?;
        tracing::debug!("Loaded image {} ({} bytes)", path.display(), data.len());
        Self::from_bytes(data)
    }

    /// Download an attachment from an `http` or `https` URL
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Image` if the request fails, the server answers
    /// with a non-success status, or the body is not a supported image
    pub async fn from_url(url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .user_agent(concat!("gemma-chat/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| GemmaChatError::Image(format!("Failed to create HTTP client: {}", e)))?;

        let response = client
            .get(url)
            .send()
            .await
            .map_err(|e| GemmaChatError::Image(format!("Failed to download image {}: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(GemmaChatError::Image(format!(
                "Failed to download image {}: HTTP {}",
                url, status
            ))
            .into());
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| GemmaChatError::Image(format!("Failed to download image {}: {}", url, e)))?;
        tracing::debug!("Downloaded image {} ({} bytes)", url, data.len());
        Self::from_bytes(data)
    }

    /// Load an attachment from a URL or a file path
    ///
    /// Sources starting with `http://` or `https://` are downloaded; anything
    /// else is read from disk.
    ///
    /// # Errors
    ///
    /// Returns `GemmaChatError::Image` as [`Self::from_url`] or
    /// [`Self::from_path`] do
    pub async fn load(source: &str) -> Result<Self> {
        let lower = source.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Self::from_url(source).await
        } else {
            Self::from_path(source)
        }
    }

    /// Decode an attachment from base64, accepting `data:image/...;base64,` URLs
    ///
    /// # Examples
    ///
    /// ```
    /// use gemma_chat::attachments::ImageAttachment;
    ///
    /// let gif = "data:image/gif;base64,R0lGODlhAQABAAAAACw=";
    /// let image = ImageAttachment::from_base64(gif).unwrap();
    /// assert_eq!(image.mime_type(), "image/gif");
    /// ```
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        let payload = match encoded.strip_prefix("data:") {
            Some(rest) => rest
                .split_once(',')
                .map(|(_, data)| data)
                .ok_or_else(|| GemmaChatError::Image("Malformed data URL".to_string()))?,
            None => encoded,
        };

        let data = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .map_err(|e| GemmaChatError::Image(format!("Invalid base64 image data: {}", e)))?;
        Self::from_bytes(data)
    }

    /// MIME type of the encoded image (e.g. `image/png`)
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Raw encoded bytes
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Size of the encoded image in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false for a constructed attachment
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Standard base64 encoding of the raw bytes
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

fn mime_type_for(format: ImageFormat) -> Option<&'static str> {
    match format {
        ImageFormat::Png => Some("image/png"),
        ImageFormat::Jpeg => Some("image/jpeg"),
        ImageFormat::WebP => Some("image/webp"),
        ImageFormat::Gif => Some("image/gif"),
        ImageFormat::Bmp => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_HEADER: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_HEADER: &[u8] = b"\xff\xd8\xff\xe0\0\x10JFIF\0";

    #[test]
    fn test_from_bytes_png() {
        let image = ImageAttachment::from_bytes(PNG_HEADER.to_vec()).unwrap();
        assert_eq!(image.mime_type(), "image/png");
        assert_eq!(image.len(), PNG_HEADER.len());
    }

    #[test]
    fn test_from_bytes_jpeg() {
        let image = ImageAttachment::from_bytes(JPEG_HEADER.to_vec()).unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_from_bytes_rejects_empty() {
        let result = ImageAttachment::from_bytes(Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_from_bytes_rejects_text() {
        let result = ImageAttachment::from_bytes(b"just some text".to_vec());
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GemmaChatError>(),
            Some(GemmaChatError::Image(_))
        ));
    }

    #[test]
    fn test_from_base64_plain_and_data_url() {
        let encoded = base64::engine::general_purpose::STANDARD.encode(PNG_HEADER);
        let plain = ImageAttachment::from_base64(&encoded).unwrap();
        let url = ImageAttachment::from_base64(&format!("data:image/png;base64,{}", encoded))
            .unwrap();
        assert_eq!(plain, url);
        assert_eq!(plain.to_base64(), encoded);
    }

    #[test]
    fn test_from_base64_rejects_garbage() {
        assert!(ImageAttachment::from_base64("not base64 !!").is_err());
        assert!(ImageAttachment::from_base64("data:image/png;base64").is_err());
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(PNG_HEADER).unwrap();
        let image = ImageAttachment::from_path(file.path()).unwrap();
        assert_eq!(image.mime_type(), "image/png");
    }

    #[test]
    fn test_from_path_missing_file() {
        let result = ImageAttachment::from_path("/definitely/not/here.png");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_reads_local_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(JPEG_HEADER).unwrap();
        let image = ImageAttachment::load(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[tokio::test]
    async fn test_from_url_unreachable_host() {
        let err = ImageAttachment::from_url("http://127.0.0.1:9/cat.png")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GemmaChatError>(),
            Some(GemmaChatError::Image(_))
        ));
    }
}
