use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::media::MediaKind;
use super::upload::UploadResult;
use crate::hash::ContentHash;
use crate::sanitize::sanitize_code_snippet;

/// Reasons a draft cannot be turned into a submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("User not found")]
    UserNotFound,

    #[error("Please select a category")]
    MissingCategory,

    #[error("Media file {} has not been uploaded", .path.display())]
    UnresolvedMedia { path: PathBuf },

    #[error("No such section: {0}")]
    NoSuchSection(String),
}

/// An uploaded asset as referenced from a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    #[serde(default)]
    pub hash: Option<ContentHash>,
}

impl From<UploadResult> for MediaRef {
    fn from(result: UploadResult) -> Self {
        Self {
            url: result.public_url,
            hash: Some(result.content_hash),
        }
    }
}

/// Media attached to a draft: either already uploaded, or a local file
/// still waiting for the upload pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MediaSource {
    Uploaded(MediaRef),
    Local { path: PathBuf },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BulletPoint {
    pub text: String,
    pub image: Option<MediaSource>,
    pub video: Option<MediaSource>,
    pub code_snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Subtitle {
    pub title: String,
    pub image: Option<MediaSource>,
    #[serde(rename = "isFAQ")]
    pub is_faq: bool,
    pub bullet_points: Vec<BulletPoint>,
}

impl Default for Subtitle {
    fn default() -> Self {
        Self {
            title: String::new(),
            image: None,
            is_faq: false,
            bullet_points: vec![BulletPoint::default()],
        }
    }
}

/// One row of a comparison table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ComparisonItem {
    pub title: String,
    pub bullet_points: Vec<String>,
}

impl Default for ComparisonItem {
    fn default() -> Self {
        Self {
            title: String::new(),
            bullet_points: vec![String::new()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Attribute {
    pub attribute: String,
    pub items: Vec<ComparisonItem>,
}

impl Default for Attribute {
    fn default() -> Self {
        Self {
            attribute: String::new(),
            items: vec![ComparisonItem::default()],
        }
    }
}

/// Comparison section: a heading with attributes, each listing items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuperTitle {
    pub super_title: String,
    pub attributes: Vec<Attribute>,
}

impl Default for SuperTitle {
    fn default() -> Self {
        Self {
            super_title: String::new(),
            attributes: vec![Attribute::default()],
        }
    }
}

/// The post an author is composing.
///
/// A fresh draft starts with one empty subtitle (holding one empty bullet
/// point) and one empty comparison section, mirroring a blank form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub category: String,
    pub summary: String,
    pub title_image: Option<MediaSource>,
    pub video: Option<MediaSource>,
    pub subtitles: Vec<Subtitle>,
    pub super_titles: Vec<SuperTitle>,
}

impl Default for PostDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            content: String::new(),
            category: String::new(),
            summary: String::new(),
            title_image: None,
            video: None,
            subtitles: vec![Subtitle::default()],
            super_titles: vec![SuperTitle::default()],
        }
    }
}

impl PostDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subtitle(&mut self) {
        self.subtitles.push(Subtitle::default());
    }

    pub fn add_bullet_point(&mut self, subtitle: usize) -> Result<(), DraftError> {
        self.subtitles
            .get_mut(subtitle)
            .ok_or_else(|| DraftError::NoSuchSection(format!("subtitle {}", subtitle)))?
            .bullet_points
            .push(BulletPoint::default());
        Ok(())
    }

    pub fn add_super_title(&mut self) {
        self.super_titles.push(SuperTitle::default());
    }

    pub fn add_attribute(&mut self, super_title: usize) -> Result<(), DraftError> {
        self.super_titles
            .get_mut(super_title)
            .ok_or_else(|| DraftError::NoSuchSection(format!("super title {}", super_title)))?
            .attributes
            .push(Attribute::default());
        Ok(())
    }

    pub fn add_item(&mut self, super_title: usize, attribute: usize) -> Result<(), DraftError> {
        self.super_titles
            .get_mut(super_title)
            .and_then(|s| s.attributes.get_mut(attribute))
            .ok_or_else(|| {
                DraftError::NoSuchSection(format!("attribute {}/{}", super_title, attribute))
            })?
            .items
            .push(ComparisonItem::default());
        Ok(())
    }

    /// Every media field of the draft with the kind it accepts.
    pub fn media_fields_mut(&mut self) -> Vec<(MediaKind, &mut Option<MediaSource>)> {
        let mut fields = vec![
            (MediaKind::Image, &mut self.title_image),
            (MediaKind::Video, &mut self.video),
        ];
        for subtitle in &mut self.subtitles {
            fields.push((MediaKind::Image, &mut subtitle.image));
            for point in &mut subtitle.bullet_points {
                fields.push((MediaKind::Image, &mut point.image));
                fields.push((MediaKind::Video, &mut point.video));
            }
        }
        fields
    }

    /// Checks run before anything is dispatched.
    pub fn validate_for_submit(&self, user_id: Option<&str>) -> Result<(), DraftError> {
        if user_id.map(str::trim).filter(|u| !u.is_empty()).is_none() {
            return Err(DraftError::UserNotFound);
        }
        if self.category.trim().is_empty() {
            return Err(DraftError::MissingCategory);
        }
        Ok(())
    }

    /// Build the submission payload: code snippets are sanitized and media
    /// is flattened to URL/hash pairs.
    pub fn into_payload(self) -> Result<PostPayload, DraftError> {
        let (title_image, title_image_hash) = flatten_media(self.title_image)?;
        let (video, video_hash) = flatten_media(self.video)?;

        let subtitles = self
            .subtitles
            .into_iter()
            .map(|subtitle| {
                let (image, image_hash) = flatten_media(subtitle.image)?;
                let bullet_points = subtitle
                    .bullet_points
                    .into_iter()
                    .map(|point| {
                        let (image, image_hash) = flatten_media(point.image)?;
                        let (video, video_hash) = flatten_media(point.video)?;
                        Ok(BulletPointPayload {
                            text: point.text,
                            image,
                            image_hash,
                            video,
                            video_hash,
                            code_snippet: sanitize_code_snippet(&point.code_snippet),
                        })
                    })
                    .collect::<Result<Vec<_>, DraftError>>()?;
                Ok(SubtitlePayload {
                    title: subtitle.title,
                    image,
                    image_hash,
                    is_faq: subtitle.is_faq,
                    bullet_points,
                })
            })
            .collect::<Result<Vec<_>, DraftError>>()?;

        Ok(PostPayload {
            title: self.title,
            content: self.content,
            category: self.category,
            subtitles,
            summary: self.summary,
            title_image,
            super_titles: self.super_titles,
            video,
            title_image_hash,
            video_hash,
        })
    }
}

fn flatten_media(
    source: Option<MediaSource>,
) -> Result<(Option<String>, Option<ContentHash>), DraftError> {
    match source {
        None => Ok((None, None)),
        Some(MediaSource::Uploaded(media)) => Ok((Some(media.url), media.hash)),
        Some(MediaSource::Local { path }) => Err(DraftError::UnresolvedMedia { path }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletPointPayload {
    pub text: String,
    pub image: Option<String>,
    pub image_hash: Option<ContentHash>,
    pub video: Option<String>,
    pub video_hash: Option<ContentHash>,
    pub code_snippet: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitlePayload {
    pub title: String,
    pub image: Option<String>,
    pub image_hash: Option<ContentHash>,
    #[serde(rename = "isFAQ")]
    pub is_faq: bool,
    pub bullet_points: Vec<BulletPointPayload>,
}

/// Submission record handed to the post dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    pub category: String,
    pub subtitles: Vec<SubtitlePayload>,
    pub summary: String,
    pub title_image: Option<String>,
    pub super_titles: Vec<SuperTitle>,
    pub video: Option<String>,
    pub title_image_hash: Option<ContentHash>,
    pub video_hash: Option<ContentHash>,
}
