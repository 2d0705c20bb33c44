//! Multipart image upload extraction and validation.
//!
//! [`ImageUpload`] reads the first multipart field named `image` (or `file`),
//! enforces the size limit while streaming, and checks that the bytes really
//! are a JPEG, PNG or WebP image matching the declared content type.
//! The bytes live only for the duration of the request.

use std::io::Cursor;

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRef, FromRequest, Multipart, Request};
use http::StatusCode;
use image::{ImageFormat, ImageReader};
use medlens_core::{AppError, StrExt};
use medlens_upstream::ImagePayload;
use tracing::debug;

/// Multipart field names accepted for the image.
const IMAGE_FIELDS: &[&str] = &["image", "file"];

/// Content types accepted for upload.
const ALLOWED_CONTENT_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

/// Largest accepted width or height in pixels.
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// Maximum stored filename length (characters).
const MAX_FILENAME_LENGTH: usize = 255;

/// Slack on top of the image limit for multipart boundaries and headers.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Upload limits, taken from application state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    pub max_bytes: usize,
}

impl UploadPolicy {
    /// Request body limit for routes that accept an upload.
    #[must_use]
    pub const fn body_limit(&self) -> usize {
        self.max_bytes + MULTIPART_OVERHEAD_BYTES
    }
}

/// Validated image upload.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub bytes: Vec<u8>,
    /// Sanitized client filename, if one was sent.
    pub filename: Option<String>,
    /// Canonical MIME type matching the sniffed format.
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
}

impl ImageUpload {
    /// View suitable for forwarding to the prediction service.
    #[must_use]
    pub fn payload(&self) -> ImagePayload<'_> {
        ImagePayload {
            bytes: &self.bytes,
            filename: self.filename.as_deref().unwrap_or("upload"),
            content_type: self.content_type,
        }
    }

    /// Size in bytes, saturated for storage.
    #[must_use]
    pub fn size(&self) -> i32 {
        i32::try_from(self.bytes.len()).unwrap_or(i32::MAX)
    }
}

impl<S> FromRequest<S> for ImageUpload
where
    S: Send + Sync,
    UploadPolicy: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let policy = UploadPolicy::from_ref(state);
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::InvalidArgument(e.body_text()))?;

        while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if !IMAGE_FIELDS.contains(&name.as_str()) {
                debug!(field = %name, "Skipping multipart field");
                continue;
            }

            let declared = field
                .content_type()
                .map(canonical_content_type)
                .ok_or_else(|| {
                    AppError::UnsupportedMediaType("Image content type is required".to_string())
                })?;
            if !ALLOWED_CONTENT_TYPES.contains(&declared.as_str()) {
                return Err(AppError::UnsupportedMediaType(format!(
                    "Unsupported image type: {declared}. Allowed: JPEG, PNG, WebP"
                )));
            }

            let filename = field.file_name().and_then(sanitize_filename);

            let mut bytes = Vec::new();
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                if bytes.len() + chunk.len() > policy.max_bytes {
                    return Err(too_large(policy.max_bytes));
                }
                bytes.extend_from_slice(&chunk);
            }

            return Self::validate(bytes, &declared, filename);
        }

        Err(AppError::InvalidArgument(
            "Missing image file (multipart field \"image\")".to_string(),
        ))
    }
}

impl ImageUpload {
    /// Check the received bytes against the declared content type.
    fn validate(
        bytes: Vec<u8>,
        declared: &str,
        filename: Option<String>,
    ) -> Result<Self, AppError> {
        if bytes.is_empty() {
            return Err(AppError::InvalidArgument("Uploaded file is empty".to_string()));
        }

        let format = image::guess_format(&bytes).map_err(|_| {
            AppError::UnsupportedMediaType("File content is not a recognized image".to_string())
        })?;
        let content_type = match format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::WebP => "image/webp",
            other => {
                return Err(AppError::UnsupportedMediaType(format!(
                    "Unsupported image format: {other:?}"
                )));
            }
        };
        if content_type != declared {
            return Err(AppError::UnsupportedMediaType(format!(
                "File content ({content_type}) does not match declared type ({declared})"
            )));
        }

        let (width, height) = ImageReader::with_format(Cursor::new(&bytes), format)
            .into_dimensions()
            .map_err(|e| AppError::Unprocessable(format!("Image could not be decoded: {e}")))?;
        if width == 0 || height == 0 {
            return Err(AppError::Unprocessable("Image has no pixels".to_string()));
        }
        if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
            return Err(AppError::Unprocessable(format!(
                "Image is {width}x{height}; the maximum is {MAX_IMAGE_DIMENSION} pixels per side"
            )));
        }

        debug!(content_type, width, height, size = bytes.len(), "Image upload accepted");
        Ok(Self {
            bytes,
            filename,
            content_type,
            width,
            height,
        })
    }
}

fn too_large(max_bytes: usize) -> AppError {
    AppError::PayloadTooLarge(format!("Image exceeds the {max_bytes} byte limit"))
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the request size limit".to_string())
    } else {
        AppError::InvalidArgument(e.body_text())
    }
}

/// Lowercase, drop parameters, and fold `image/jpg` into `image/jpeg`.
fn canonical_content_type(raw: &str) -> String {
    let essence = raw.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpg" | "image/pjpeg" => "image/jpeg".to_string(),
        _ => essence,
    }
}

/// Keep only the final path component, without control characters.
fn sanitize_filename(raw: &str) -> Option<String> {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.to_opt()?;
    if cleaned == "." || cleaned == ".." {
        return None;
    }
    Some(cleaned.truncate_chars(MAX_FILENAME_LENGTH).to_string())
}

#[cfg(test)]
pub(crate) mod tests {
    use std::io::Cursor;

    use axum::Router;
    use axum::body::Body;
    use axum::routing::post;
    use http_body_util::BodyExt;
    use image::{ImageBuffer, Rgb};
    use tower::ServiceExt;

    use super::*;

    pub fn png(width: u32, height: u32) -> Vec<u8> {
        let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    pub fn multipart_body(field: &str, content_type: &str, bytes: &[u8]) -> (String, Vec<u8>) {
        let boundary = "medlens-test-boundary";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"../lesion.png\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }

    fn app(max_bytes: usize) -> Router {
        Router::new()
            .route(
                "/upload",
                post(|upload: ImageUpload| async move {
                    format!(
                        "{} {}x{} {}",
                        upload.content_type,
                        upload.width,
                        upload.height,
                        upload.filename.unwrap_or_default()
                    )
                }),
            )
            .with_state(UploadPolicy { max_bytes })
    }

    async fn send(
        max_bytes: usize,
        field: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> (StatusCode, String) {
        let (ct, body) = multipart_body(field, content_type, bytes);
        let request = http::Request::post("/upload")
            .header(http::header::CONTENT_TYPE, ct)
            .body(Body::from(body))
            .unwrap();
        let response = app(max_bytes).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn accepts_valid_png() {
        let (status, body) = send(1 << 20, "image", "image/png", &png(4, 3)).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body, "image/png 4x3 lesion.png");
    }

    #[tokio::test]
    async fn accepts_file_field_alias() {
        let (status, _) = send(1 << 20, "file", "image/png", &png(2, 2)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_field_is_bad_request() {
        let (status, _) = send(1 << 20, "avatar", "image/png", &png(2, 2)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_file_is_bad_request() {
        let (status, _) = send(1 << 20, "image", "image/png", &[]).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn disallowed_content_type_is_unsupported() {
        let (status, _) = send(1 << 20, "image", "image/gif", b"GIF89a").await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn mismatched_magic_bytes_are_unsupported() {
        let (status, _) = send(1 << 20, "image", "image/jpeg", &png(2, 2)).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let (status, _) = send(1 << 20, "image", "image/png", b"definitely not an image").await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn oversized_file_is_too_large() {
        let image = png(64, 64);
        let (status, _) = send(image.len() - 1, "image", "image/png", &image).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn truncated_header_is_unprocessable() {
        let image = png(8, 8);
        let (status, _) = send(1 << 20, "image", "image/png", &image[..12]).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn content_types_are_canonicalized() {
        assert_eq!(canonical_content_type("IMAGE/JPG"), "image/jpeg");
        assert_eq!(canonical_content_type("image/png; charset=binary"), "image/png");
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("C:\\Users\\me\\rash.jpg").as_deref(), Some("rash.jpg"));
        assert_eq!(sanitize_filename("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(sanitize_filename("dir/"), None);
        assert_eq!(sanitize_filename(".."), None);
        assert_eq!(sanitize_filename(&"a".repeat(300)).unwrap().chars().count(), 255);
    }
}
