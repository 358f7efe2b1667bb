//! Content adapter between UI message shapes and model content parts
//!
//! The UI side speaks in a small closed set of shapes (plain text, text plus
//! file attachments, an image); the model side speaks in ordered content
//! parts (text spans, inline binary payloads with a MIME type). This module
//! converts both directions.

use crate::llm::{Content, ContentPart};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{DynamicImage, ImageFormat};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// A user turn as the UI produces it.
///
/// Closed set by design: anything the UI sends must be one of these shapes,
/// checked exhaustively. There is no fallback branch that guesses
/// path-vs-text from string prefixes.
#[derive(Debug, Clone)]
pub enum UiMessage {
    /// Plain text
    Text(String),
    /// Text plus uploaded file attachments (paths to transient files)
    Composite { text: String, files: Vec<PathBuf> },
    /// An image, either already decoded or referenced by path
    Image(ImageSource),
}

#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Decoded pixel data with the format to encode it in
    Decoded {
        image: DynamicImage,
        format: ImageFormat,
    },
    /// Path to an image file on disk
    File(PathBuf),
}

impl UiMessage {
    /// A blank turn is never dispatched to the model.
    pub fn is_blank(&self) -> bool {
        match self {
            UiMessage::Text(text) => text.trim().is_empty(),
            UiMessage::Composite { text, files } => text.trim().is_empty() && files.is_empty(),
            UiMessage::Image(_) => false,
        }
    }
}

/// A reply element as the UI renders it.
#[derive(Debug)]
pub enum UiValue {
    Text(String),
    Image(DynamicImage),
}

/// Convert a UI message into the ordered content parts for one model turn.
///
/// Guarantees at least one part: if no branch produced anything, a single
/// text part containing one space is emitted so the transport never receives
/// a zero-part message.
pub fn to_content_parts(message: &UiMessage) -> Result<Vec<ContentPart>> {
    let mut parts = Vec::new();

    match message {
        UiMessage::Text(text) => {
            if !text.is_empty() {
                parts.push(ContentPart::text(text.clone()));
            }
        }
        UiMessage::Composite { text, files } => {
            if !text.is_empty() {
                parts.push(ContentPart::text(text.clone()));
            }
            for file in files {
                parts.push(part_from_file(file)?);
            }
        }
        UiMessage::Image(source) => match source {
            ImageSource::Decoded { image, format } => {
                let data = encode_image(image, *format)?;
                parts.push(ContentPart::inline_data(format.to_mime_type(), data));
            }
            ImageSource::File(path) => {
                parts.push(part_from_file(path)?);
            }
        },
    }

    if parts.is_empty() {
        parts.push(ContentPart::text(" "));
    }

    Ok(parts)
}

/// Read a file into an inline-data part, inferring the MIME type from the
/// file name (fallback: application/octet-stream).
pub fn part_from_file(path: &Path) -> Result<ContentPart> {
    let data =
        fs::read(path).with_context(|| format!("Failed to read attachment {}", path.display()))?;
    Ok(ContentPart::inline_data(guess_mime(path), data))
}

/// Infer a MIME type from the file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Encode decoded pixel data to bytes in the stated format.
pub fn encode_image(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, format)
        .with_context(|| format!("Failed to encode image as {format:?}"))?;
    Ok(buf.into_inner())
}

/// Convert model content into UI-renderable values.
///
/// Text parts yield their text; inline-data parts yield a decoded image, or
/// with `use_markdown` a base64 data-URI image tag. A part that yields
/// neither is dropped, not an error. Absent or empty content yields an empty
/// sequence.
pub fn to_ui_values(content: Option<&Content>, use_markdown: bool) -> Vec<UiValue> {
    let Some(content) = content else {
        return Vec::new();
    };

    content
        .parts
        .iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } if !text.is_empty() => Some(UiValue::Text(text.clone())),
            ContentPart::Text { .. } => None,
            ContentPart::InlineData { mime_type, data } => {
                if use_markdown {
                    Some(UiValue::Text(markdown_image(mime_type, data)))
                } else {
                    match image::load_from_memory(data) {
                        Ok(image) => Some(UiValue::Image(image)),
                        Err(e) => {
                            tracing::warn!("Dropping undecodable {mime_type} reply part: {e}");
                            None
                        }
                    }
                }
            }
        })
        .collect()
}

/// Base64 data-URI wrapped in an image tag, for markdown-capable renderers.
pub fn markdown_image(mime_type: &str, data: &[u8]) -> String {
    format!(
        "<img src=\"data:{};base64,{}\">",
        mime_type,
        BASE64.encode(data)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_blank_composite_yields_single_space_part() {
        let msg = UiMessage::Composite {
            text: String::new(),
            files: Vec::new(),
        };
        let parts = to_content_parts(&msg).unwrap();
        assert_eq!(parts, vec![ContentPart::text(" ")]);
    }

    #[test]
    fn test_empty_text_yields_single_space_part() {
        let parts = to_content_parts(&UiMessage::Text(String::new())).unwrap();
        assert_eq!(parts, vec![ContentPart::text(" ")]);
    }

    #[test]
    fn test_one_inline_part_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut files = Vec::new();
        for name in ["recibo.pdf", "foto.png", "datos"] {
            let path = dir.path().join(name);
            let mut f = fs::File::create(&path).unwrap();
            f.write_all(b"payload").unwrap();
            files.push(path);
        }

        let msg = UiMessage::Composite {
            text: "mira esto".to_string(),
            files,
        };
        let parts = to_content_parts(&msg).unwrap();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], ContentPart::text("mira esto"));

        let mimes: Vec<&str> = parts[1..]
            .iter()
            .map(|p| match p {
                ContentPart::InlineData { mime_type, .. } => mime_type.as_str(),
                other => panic!("Expected inline data, got {other:?}"),
            })
            .collect();
        assert_eq!(
            mimes,
            vec!["application/pdf", "image/png", "application/octet-stream"]
        );
    }

    #[test]
    fn test_mime_inference() {
        assert_eq!(guess_mime(Path::new("a/b/c.JPG")), "image/jpeg");
        assert_eq!(guess_mime(Path::new("policy.md")), "text/markdown");
        assert_eq!(guess_mime(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_decoded_image_becomes_inline_part() {
        let image = DynamicImage::new_rgb8(2, 2);
        let msg = UiMessage::Image(ImageSource::Decoded {
            image,
            format: ImageFormat::Png,
        });
        let parts = to_content_parts(&msg).unwrap();
        assert_eq!(parts.len(), 1);
        match &parts[0] {
            ContentPart::InlineData { mime_type, data } => {
                assert_eq!(mime_type, "image/png");
                // PNG magic bytes
                assert_eq!(&data[..4], &[0x89, b'P', b'N', b'G']);
            }
            other => panic!("Expected inline data, got {other:?}"),
        }
    }

    #[test]
    fn test_round_trip_text_and_inline() {
        let png = encode_image(&DynamicImage::new_rgb8(1, 1), ImageFormat::Png).unwrap();
        let content = Content::new(vec![
            ContentPart::text("hola"),
            ContentPart::inline_data("image/png", png),
        ]);

        let values = to_ui_values(Some(&content), false);
        assert_eq!(values.len(), 2);
        match &values[0] {
            UiValue::Text(text) => assert_eq!(text, "hola"),
            other => panic!("Expected text, got {other:?}"),
        }
        assert!(matches!(values[1], UiValue::Image(_)));
    }

    #[test]
    fn test_markdown_mode_yields_data_uri() {
        let content = Content::new(vec![ContentPart::inline_data("image/png", vec![1, 2, 3])]);
        let values = to_ui_values(Some(&content), true);
        assert_eq!(values.len(), 1);
        match &values[0] {
            UiValue::Text(text) => {
                assert!(text.starts_with("<img src=\"data:image/png;base64,"));
            }
            other => panic!("Expected markdown text, got {other:?}"),
        }
    }

    #[test]
    fn test_absent_content_yields_empty() {
        assert!(to_ui_values(None, true).is_empty());
        let empty = Content::default();
        assert!(to_ui_values(Some(&empty), false).is_empty());
    }

    #[test]
    fn test_empty_text_part_is_dropped() {
        let content = Content::new(vec![ContentPart::text("")]);
        assert!(to_ui_values(Some(&content), false).is_empty());
    }

    #[test]
    fn test_blank_detection() {
        assert!(UiMessage::Text("   \n".to_string()).is_blank());
        assert!(!UiMessage::Text("hola".to_string()).is_blank());
        assert!(!UiMessage::Composite {
            text: String::new(),
            files: vec![PathBuf::from("/tmp/x.png")],
        }
        .is_blank());
    }
}
