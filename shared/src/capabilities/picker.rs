use bytes::Bytes;
use crux_core::capability::{Capability, CapabilityContext, Operation};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::MAX_IMAGE_BYTES;

pub const DEFAULT_ACCEPT: &str = "image/*";
const FALLBACK_MIME: &str = "application/octet-stream";

pub struct Picker<Ev> {
    context: CapabilityContext<PickerOperation, Ev>,
}

impl<Ev> Clone for Picker<Ev> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<Ev> Capability<Ev> for Picker<Ev> {
    type Operation = PickerOperation;
    type MappedSelf<MappedEv> = Picker<MappedEv>;

    fn map_event<F, NewEv>(&self, f: F) -> Self::MappedSelf<NewEv>
    where
        F: Fn(NewEv) -> Ev + Send + Sync + 'static,
        Ev: 'static,
        NewEv: 'static + Send,
    {
        Picker::new(self.context.map_event(f))
    }
}

impl<Ev> Picker<Ev>
where
    Ev: 'static,
{
    pub fn new(context: CapabilityContext<PickerOperation, Ev>) -> Self {
        Self { context }
    }

    pub fn pick_image<F>(&self, config: PickConfig, callback: F)
    where
        F: FnOnce(PickerResult) -> Ev + Send + 'static,
    {
        self.request(
            PickerOperation::PickImage {
                config: config.validated(),
            },
            callback,
        );
    }

    pub fn capture_photo<F>(&self, config: PickConfig, callback: F)
    where
        F: FnOnce(PickerResult) -> Ev + Send + 'static,
    {
        self.request(
            PickerOperation::CapturePhoto {
                config: config.validated(),
            },
            callback,
        );
    }

    fn request<F>(&self, operation: PickerOperation, callback: F)
    where
        F: FnOnce(PickerResult) -> Ev + Send + 'static,
    {
        let ctx = self.context.clone();
        self.context.spawn(async move {
            let result = ctx.request_from_shell(operation).await;
            ctx.update_app(callback(result));
        });
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PickerOperation {
    PickImage { config: PickConfig },
    CapturePhoto { config: PickConfig },
}

impl PickerOperation {
    #[must_use]
    pub fn config(&self) -> &PickConfig {
        match self {
            PickerOperation::PickImage { config } | PickerOperation::CapturePhoto { config } => {
                config
            }
        }
    }
}

impl Operation for PickerOperation {
    type Output = PickerResult;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PickConfig {
    pub accept: String,
    pub max_file_size: usize,
}

impl Default for PickConfig {
    fn default() -> Self {
        Self {
            accept: DEFAULT_ACCEPT.to_string(),
            max_file_size: MAX_IMAGE_BYTES,
        }
    }
}

impl PickConfig {
    #[must_use]
    pub fn with_max_file_size(mut self, max_bytes: usize) -> Self {
        self.max_file_size = max_bytes;
        self
    }

    #[must_use]
    pub fn validated(mut self) -> Self {
        self.max_file_size = self.max_file_size.clamp(1, MAX_IMAGE_BYTES);
        if self.accept.trim().is_empty() {
            self.accept = DEFAULT_ACCEPT.to_string();
        }
        self
    }
}

/// An image handed over by the platform: picker, camera or drag-and-drop.
/// Deserializing re-runs the same validation as [`PickedImage::new`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawImage")]
pub struct PickedImage {
    file_name: String,
    mime_type: String,
    data: Bytes,
}

impl PickedImage {
    /// Validate and wrap raw image bytes. The MIME type is sniffed from the
    /// content; the file extension is only consulted when sniffing fails.
    pub fn new(file_name: impl Into<String>, data: impl Into<Bytes>) -> Result<Self, PickerError> {
        Self::with_limit(file_name, data, MAX_IMAGE_BYTES)
    }

    pub fn with_limit(
        file_name: impl Into<String>,
        data: impl Into<Bytes>,
        max_bytes: usize,
    ) -> Result<Self, PickerError> {
        let file_name = file_name.into();
        let data = data.into();

        if data.is_empty() {
            return Err(PickerError::InvalidImage {
                reason: "image data is empty".to_string(),
            });
        }

        if data.len() > max_bytes {
            return Err(PickerError::ImageTooLarge {
                size: data.len(),
                max: max_bytes,
            });
        }

        let mime_type = sniff_mime(&data)
            .or_else(|| mime_from_extension(&file_name))
            .unwrap_or(FALLBACK_MIME)
            .to_string();

        let file_name = if file_name.trim().is_empty() {
            "upload".to_string()
        } else {
            file_name
        };

        Ok(Self {
            file_name,
            mime_type,
            data,
        })
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Deserialize)]
struct RawImage {
    file_name: String,
    data: Bytes,
}

impl TryFrom<RawImage> for PickedImage {
    type Error = PickerError;

    fn try_from(raw: RawImage) -> Result<Self, Self::Error> {
        Self::new(raw.file_name, raw.data)
    }
}

// Never dump image bytes into logs.
impl fmt::Debug for PickedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PickedImage")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data)
        .ok()
        .map(|format| format.to_mime_type())
}

fn mime_from_extension(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "heic" | "heif" => Some("image/heic"),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickerOutput {
    Picked(PickedImage),
    Cancelled,
}

#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
pub enum PickerError {
    #[error("photo access permission denied")]
    PermissionDenied,

    #[error("picker unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("image too large: {size} bytes exceeds maximum of {max} bytes")]
    ImageTooLarge { size: usize, max: usize },

    #[error("invalid image: {reason}")]
    InvalidImage { reason: String },
}

impl From<&PickerError> for crate::AppError {
    fn from(err: &PickerError) -> Self {
        use crate::{AppError, ErrorKind};
        let kind = match err {
            PickerError::PermissionDenied => ErrorKind::PermissionDenied,
            PickerError::Unavailable { .. } => ErrorKind::PickerUnavailable,
            PickerError::ImageTooLarge { .. } => ErrorKind::ImageTooLarge,
            PickerError::InvalidImage { .. } => ErrorKind::InvalidImage,
        };
        AppError::new(kind, err.to_string())
    }
}

pub type PickerResult = Result<PickerOutput, PickerError>;

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG_HEADER: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46, 0x00, 0x01];
    const PNG_HEADER: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D];

    #[test]
    fn sniffs_jpeg_regardless_of_extension() {
        let image = PickedImage::new("photo.png", JPEG_HEADER.to_vec()).unwrap();
        assert_eq!(image.mime_type(), "image/jpeg");
    }

    #[test]
    fn sniffs_png() {
        let image = PickedImage::new("scan", PNG_HEADER.to_vec()).unwrap();
        assert_eq!(image.mime_type(), "image/png");
    }

    #[test]
    fn falls_back_to_extension_then_octet_stream() {
        let heic = PickedImage::new("IMG_0001.HEIC", vec![0u8; 16]).unwrap();
        assert_eq!(heic.mime_type(), "image/heic");

        let unknown = PickedImage::new("notes.txt", vec![1u8; 16]).unwrap();
        assert_eq!(unknown.mime_type(), FALLBACK_MIME);
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(matches!(
            PickedImage::new("a.jpg", Vec::new()),
            Err(PickerError::InvalidImage { .. })
        ));
        assert!(matches!(
            PickedImage::with_limit("a.jpg", vec![0u8; 11], 10),
            Err(PickerError::ImageTooLarge { size: 11, max: 10 })
        ));
    }

    #[test]
    fn blank_file_name_gets_a_placeholder() {
        let image = PickedImage::new("  ", JPEG_HEADER.to_vec()).unwrap();
        assert_eq!(image.file_name(), "upload");
    }

    #[test]
    fn debug_omits_bytes() {
        let image = PickedImage::new("rash.jpg", JPEG_HEADER.to_vec()).unwrap();
        let rendered = format!("{image:?}");
        assert!(rendered.contains("len: 12"));
        assert!(!rendered.contains("255"));
    }

    #[test]
    fn mime_is_sniffed_for_every_supported_format() {
        let webp = [
            b'R', b'I', b'F', b'F', 0, 0, 0, 0, b'W', b'E', b'B', b'P', b'V', b'P', b'8', b' ',
        ];
        let image = PickedImage::new("lesion", webp.to_vec()).unwrap();
        assert_eq!(image.mime_type(), "image/webp");
        assert_eq!(sniff_mime(&JPEG_HEADER), Some("image/jpeg"));
        assert_eq!(sniff_mime(b"plain text"), None);
    }

    #[test]
    fn deserializing_revalidates_the_image() {
        let image = PickedImage::new("rash.bin", JPEG_HEADER.to_vec()).unwrap();
        let json = serde_json::to_string(&image).unwrap();
        let back: PickedImage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, image);

        let empty = r#"{"file_name":"rash.jpg","mime_type":"image/jpeg","data":[]}"#;
        assert!(serde_json::from_str::<PickedImage>(empty).is_err());
    }

    #[test]
    fn config_is_clamped() {
        let config = PickConfig::default()
            .with_max_file_size(usize::MAX)
            .validated();
        assert_eq!(config.max_file_size, MAX_IMAGE_BYTES);
        assert_eq!(config.accept, DEFAULT_ACCEPT);
    }
}
