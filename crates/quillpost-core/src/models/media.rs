use anyhow::{anyhow, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Media kind enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "image" | "images" => Ok(MediaKind::Image),
            "video" | "videos" => Ok(MediaKind::Video),
            _ => Err(anyhow!("Invalid media kind: {}", s)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    /// Logical folder the backend files this kind under.
    pub fn folder(self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }

    pub fn allowed_mime_types(self) -> &'static [&'static str] {
        match self {
            MediaKind::Image => &["image/jpeg", "image/png", "image/gif", "image/webp"],
            MediaKind::Video => &["video/mp4", "video/mpeg", "video/webm"],
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guess a MIME type from a file name's extension.
pub fn guess_mime_type(filename: &str) -> Option<&'static str> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())?;

    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "mpeg" | "mpg" => "video/mpeg",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => return None,
    };
    Some(mime)
}

/// Replace the last extension of `name`, or append one when there is none.
pub fn replace_extension(name: &str, extension: &str) -> String {
    let stem = match name.rfind('.') {
        Some(idx) if idx > 0 && !name[idx + 1..].contains('/') && idx + 1 < name.len() => {
            &name[..idx]
        }
        _ => name,
    };
    format!("{}.{}", stem, extension)
}

/// A user-selected file, exactly as picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaAsset {
    pub name: String,
    pub mime_type: String,
    pub data: Bytes,
}

impl MediaAsset {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Format of a prepared asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedFormat {
    WebP,
    /// Fixed-quality fallback when no WebP encoding met the size target.
    Jpeg,
    /// Passed through untouched (videos); carries the original MIME type.
    Original(String),
}

impl PreparedFormat {
    pub fn mime_type(&self) -> &str {
        match self {
            PreparedFormat::WebP => "image/webp",
            PreparedFormat::Jpeg => "image/jpeg",
            PreparedFormat::Original(mime) => mime,
        }
    }

    pub fn extension(&self) -> Option<&'static str> {
        match self {
            PreparedFormat::WebP => Some("webp"),
            PreparedFormat::Jpeg => Some("jpg"),
            PreparedFormat::Original(_) => None,
        }
    }
}

/// A media file after validation and, for images, size-targeted re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedAsset {
    pub name: String,
    pub format: PreparedFormat,
    pub data: Bytes,
}

impl PreparedAsset {
    /// Pass a validated asset through unchanged.
    pub fn original(asset: MediaAsset) -> Self {
        Self {
            name: asset.name,
            format: PreparedFormat::Original(asset.mime_type),
            data: asset.data,
        }
    }

    /// Wrap re-encoded bytes, renaming the file to match the produced format.
    pub fn encoded(original_name: &str, format: PreparedFormat, data: impl Into<Bytes>) -> Self {
        let name = match format.extension() {
            Some(ext) => replace_extension(original_name, ext),
            None => original_name.to_string(),
        };
        Self {
            name,
            format,
            data: data.into(),
        }
    }

    pub fn mime_type(&self) -> &str {
        self.format.mime_type()
    }

    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}
