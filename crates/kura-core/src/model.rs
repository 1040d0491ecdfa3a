//! Domain objects decoded from extension calls.

use serde::{Deserialize, Serialize};

/// Publication status of a manga, as reported by the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum MangaStatus {
    /// Status not reported, or a code this version does not know.
    #[default]
    Unknown,
    /// Still being serialized.
    Ongoing,
    /// Finished.
    Completed,
    /// Licensed, usually removed from the source.
    Licensed,
    /// Serialization finished, scanlation may be ongoing.
    PublishingFinished,
    /// Dropped by the publisher.
    Cancelled,
    /// Paused.
    OnHiatus,
}

impl From<i64> for MangaStatus {
    fn from(code: i64) -> Self {
        match code {
            1 => Self::Ongoing,
            2 => Self::Completed,
            3 => Self::Licensed,
            4 => Self::PublishingFinished,
            5 => Self::Cancelled,
            6 => Self::OnHiatus,
            _ => Self::Unknown,
        }
    }
}

impl From<MangaStatus> for i64 {
    fn from(status: MangaStatus) -> Self {
        match status {
            MangaStatus::Unknown => 0,
            MangaStatus::Ongoing => 1,
            MangaStatus::Completed => 2,
            MangaStatus::Licensed => 3,
            MangaStatus::PublishingFinished => 4,
            MangaStatus::Cancelled => 5,
            MangaStatus::OnHiatus => 6,
        }
    }
}

/// A manga entry. Listing calls return partially populated entries; the
/// details call returns a fully populated one with `initialized` set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manga {
    /// Source-relative URL, the entry's identity within its source.
    pub url: String,
    /// Title.
    pub title: String,
    /// Artist names.
    #[serde(default)]
    pub artist: Option<String>,
    /// Author names.
    #[serde(default)]
    pub author: Option<String>,
    /// Synopsis.
    #[serde(default)]
    pub description: Option<String>,
    /// Comma separated genre list.
    #[serde(default)]
    pub genre: Option<String>,
    /// Publication status.
    #[serde(default)]
    pub status: MangaStatus,
    /// Cover image URL.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    /// Whether the details have been fetched.
    #[serde(default)]
    pub initialized: bool,
}

impl Manga {
    /// Genres split out of the comma separated `genre` field.
    #[must_use]
    pub fn genres(&self) -> Vec<&str> {
        self.genre
            .as_deref()
            .map(|g| {
                g.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// One page of a listing (popular, latest or search).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangasPage {
    /// Entries on this page.
    pub mangas: Vec<Manga>,
    /// Whether another page can be requested.
    #[serde(default)]
    pub has_next_page: bool,
}

fn default_chapter_number() -> f32 {
    -1.0
}

/// A chapter of a manga.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    /// Source-relative URL.
    pub url: String,
    /// Display name.
    pub name: String,
    /// Upload time in milliseconds since the Unix epoch, 0 when unknown.
    #[serde(default)]
    pub date_upload: i64,
    /// Chapter number, -1 when unknown.
    #[serde(default = "default_chapter_number")]
    pub chapter_number: f32,
    /// Scanlation group.
    #[serde(default)]
    pub scanlator: Option<String>,
}

/// A page of a chapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Zero-based position in the chapter.
    pub index: u32,
    /// URL of the HTML page holding the image, empty when not needed.
    #[serde(default)]
    pub url: String,
    /// Direct image URL, when already known.
    #[serde(default)]
    pub image_url: Option<String>,
}
