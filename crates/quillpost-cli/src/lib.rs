//! Helpers shared by the `quillpost` binary.

use anyhow::{Context, Result};
use quillpost_core::models::{guess_mime_type, MediaAsset, PreparedAsset};
use quillpost_core::{ContentHash, PostDraft};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Initialize tracing for CLI binaries. Logs go to stderr so stdout stays
/// clean JSON.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Read a file from disk as a selected asset; the MIME type comes from the
/// extension.
pub async fn load_asset(path: &Path) -> Result<MediaAsset> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("Not a file path: {}", path.display()))?;
    let mime_type = guess_mime_type(&name).unwrap_or("application/octet-stream");
    Ok(MediaAsset::new(name, mime_type, data))
}

/// Where `prepare` writes its output when no `--out` is given: next to the
/// input, under the prepared name. Never the input itself.
pub fn default_output_path(input: &Path, prepared_name: &str) -> PathBuf {
    let candidate = input.with_file_name(prepared_name);
    if candidate != input {
        return candidate;
    }
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{}.prepared.{}", stem, ext.to_string_lossy()),
        None => format!("{}.prepared", stem),
    };
    input.with_file_name(name)
}

pub async fn read_draft(path: &Path) -> Result<PostDraft> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read draft: {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid draft JSON: {}", path.display()))
}

/// Summary printed after preparing a file.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedReport {
    pub name: String,
    pub mime_type: String,
    pub original_bytes: usize,
    pub size_bytes: usize,
    pub content_hash: ContentHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl PreparedReport {
    pub fn new(original: &MediaAsset, prepared: &PreparedAsset, output: Option<PathBuf>) -> Self {
        Self {
            name: prepared.name.clone(),
            mime_type: prepared.mime_type().to_string(),
            original_bytes: original.size_bytes(),
            size_bytes: prepared.size_bytes(),
            content_hash: ContentHash::of(&prepared.data),
            output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quillpost_core::models::PreparedFormat;

    #[tokio::test]
    async fn load_asset_guesses_mime_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.webm");
        std::fs::write(&path, b"webm bytes").unwrap();

        let asset = load_asset(&path).await.unwrap();
        assert_eq!(asset.name, "clip.webm");
        assert_eq!(asset.mime_type, "video/webm");
        assert_eq!(asset.size_bytes(), 10);

        let unknown = dir.path().join("notes.txt");
        std::fs::write(&unknown, b"hi").unwrap();
        assert_eq!(
            load_asset(&unknown).await.unwrap().mime_type,
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn load_asset_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_asset(&dir.path().join("missing.png"))
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Failed to read file"));
    }

    #[test]
    fn default_output_never_overwrites_input() {
        let input = Path::new("/tmp/media/photo.png");
        assert_eq!(
            default_output_path(input, "photo.webp"),
            PathBuf::from("/tmp/media/photo.webp")
        );

        let video = Path::new("/tmp/media/clip.mp4");
        assert_eq!(
            default_output_path(video, "clip.mp4"),
            PathBuf::from("/tmp/media/clip.prepared.mp4")
        );
    }

    #[tokio::test]
    async fn read_draft_accepts_partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("draft.json");
        std::fs::write(&path, r#"{"title":"Grid","category":"CSS"}"#).unwrap();

        let draft = read_draft(&path).await.unwrap();
        assert_eq!(draft.title, "Grid");
        assert_eq!(draft.subtitles.len(), 1);

        std::fs::write(&path, "{ nope").unwrap();
        assert!(read_draft(&path).await.is_err());
    }

    #[test]
    fn report_serializes_camel_case() {
        let original = MediaAsset::new("a.png", "image/png", vec![0u8; 100]);
        let prepared = PreparedAsset::encoded("a.png", PreparedFormat::WebP, vec![1u8; 10]);
        let report = PreparedReport::new(&original, &prepared, None);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["name"], "a.webp");
        assert_eq!(json["mimeType"], "image/webp");
        assert_eq!(json["originalBytes"], 100);
        assert_eq!(json["sizeBytes"], 10);
        assert!(json.get("output").is_none());
    }
}
