//! Call descriptors for the compiled module's generated functions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::manifest::SourceId;

/// One function of the generated export surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    /// `getManifest()`
    Manifest,
    /// `getPopularManga(sourceId, page)`
    PopularManga,
    /// `getLatestUpdates(sourceId, page)`
    LatestUpdates,
    /// `searchManga(sourceId, page, query[, filtersJson])`
    SearchManga,
    /// `getMangaDetails(sourceId, url)`
    MangaDetails,
    /// `getChapterList(sourceId, url)`
    ChapterList,
    /// `getPageList(sourceId, url)`
    PageList,
    /// `getFilterList(sourceId)`
    FilterList,
    /// `fetchImage(sourceId, pageUrl, imageUrl)`
    FetchImage,
    /// `getHeaders(sourceId)`
    Headers,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Manifest,
        Self::PopularManga,
        Self::LatestUpdates,
        Self::SearchManga,
        Self::MangaDetails,
        Self::ChapterList,
        Self::PageList,
        Self::FilterList,
        Self::FetchImage,
        Self::Headers,
    ];

    /// Name of the generated function implementing this capability.
    #[must_use]
    pub fn method_name(self) -> &'static str {
        match self {
            Self::Manifest => "getManifest",
            Self::PopularManga => "getPopularManga",
            Self::LatestUpdates => "getLatestUpdates",
            Self::SearchManga => "searchManga",
            Self::MangaDetails => "getMangaDetails",
            Self::ChapterList => "getChapterList",
            Self::PageList => "getPageList",
            Self::FilterList => "getFilterList",
            Self::FetchImage => "fetchImage",
            Self::Headers => "getHeaders",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.method_name())
    }
}

/// An argument passed to a generated function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    /// A string argument.
    Text(String),
    /// An integer argument.
    Integer(i32),
}

/// A fully described call into an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionCall {
    /// List the extension's sources.
    Manifest,
    /// Popular listing.
    PopularManga {
        /// Target source.
        source_id: SourceId,
        /// One-based page number.
        page: u32,
    },
    /// Latest updates listing.
    LatestUpdates {
        /// Target source.
        source_id: SourceId,
        /// One-based page number.
        page: u32,
    },
    /// Search, optionally with filters (serialized filter list).
    SearchManga {
        /// Target source.
        source_id: SourceId,
        /// One-based page number.
        page: u32,
        /// Query text.
        query: String,
        /// JSON encoded filter list, when filters are applied.
        filters: Option<String>,
    },
    /// Full details of one entry.
    MangaDetails {
        /// Target source.
        source_id: SourceId,
        /// Entry URL.
        url: String,
    },
    /// Chapters of one entry.
    ChapterList {
        /// Target source.
        source_id: SourceId,
        /// Entry URL.
        url: String,
    },
    /// Pages of one chapter.
    PageList {
        /// Target source.
        source_id: SourceId,
        /// Chapter URL.
        url: String,
    },
    /// Filters supported by a source.
    FilterList {
        /// Target source.
        source_id: SourceId,
    },
    /// Image bytes of one page.
    FetchImage {
        /// Target source.
        source_id: SourceId,
        /// URL of the page holding the image.
        page_url: String,
        /// Direct image URL.
        image_url: String,
    },
    /// Request headers the source expects callers to send.
    Headers {
        /// Target source.
        source_id: SourceId,
    },
}

impl ExtensionCall {
    /// The capability this call invokes.
    #[must_use]
    pub fn capability(&self) -> Capability {
        match self {
            Self::Manifest => Capability::Manifest,
            Self::PopularManga { .. } => Capability::PopularManga,
            Self::LatestUpdates { .. } => Capability::LatestUpdates,
            Self::SearchManga { .. } => Capability::SearchManga,
            Self::MangaDetails { .. } => Capability::MangaDetails,
            Self::ChapterList { .. } => Capability::ChapterList,
            Self::PageList { .. } => Capability::PageList,
            Self::FilterList { .. } => Capability::FilterList,
            Self::FetchImage { .. } => Capability::FetchImage,
            Self::Headers { .. } => Capability::Headers,
        }
    }

    /// The source the call targets, if any.
    #[must_use]
    pub fn source_id(&self) -> Option<&SourceId> {
        match self {
            Self::Manifest => None,
            Self::PopularManga { source_id, .. }
            | Self::LatestUpdates { source_id, .. }
            | Self::SearchManga { source_id, .. }
            | Self::MangaDetails { source_id, .. }
            | Self::ChapterList { source_id, .. }
            | Self::PageList { source_id, .. }
            | Self::FilterList { source_id }
            | Self::FetchImage { source_id, .. }
            | Self::Headers { source_id } => Some(source_id),
        }
    }

    /// Positional arguments for the generated function.
    #[must_use]
    pub fn arguments(&self) -> Vec<CallArg> {
        let source = |id: &SourceId| CallArg::Text(id.as_str().to_owned());
        let page = |p: u32| CallArg::Integer(i32::try_from(p).unwrap_or(i32::MAX));

        match self {
            Self::Manifest => Vec::new(),
            Self::PopularManga { source_id, page: p }
            | Self::LatestUpdates { source_id, page: p } => vec![source(source_id), page(*p)],
            Self::SearchManga {
                source_id,
                page: p,
                query,
                filters,
            } => {
                let mut args = vec![source(source_id), page(*p), CallArg::Text(query.clone())];
                if let Some(filters) = filters {
                    args.push(CallArg::Text(filters.clone()));
                }
                args
            },
            Self::MangaDetails { source_id, url }
            | Self::ChapterList { source_id, url }
            | Self::PageList { source_id, url } => {
                vec![source(source_id), CallArg::Text(url.clone())]
            },
            Self::FilterList { source_id } | Self::Headers { source_id } => {
                vec![source(source_id)]
            },
            Self::FetchImage {
                source_id,
                page_url,
                image_url,
            } => vec![
                source(source_id),
                CallArg::Text(page_url.clone()),
                CallArg::Text(image_url.clone()),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_names_are_unique() {
        let mut names: Vec<_> = Capability::ALL.iter().map(|c| c.method_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Capability::ALL.len());
    }

    #[test]
    fn test_search_arguments_include_filters_only_when_set() {
        let mut call = ExtensionCall::SearchManga {
            source_id: "7".into(),
            page: 2,
            query: "frieren".into(),
            filters: None,
        };
        assert_eq!(
            call.arguments(),
            vec![
                CallArg::Text("7".into()),
                CallArg::Integer(2),
                CallArg::Text("frieren".into()),
            ]
        );

        if let ExtensionCall::SearchManga { filters, .. } = &mut call {
            *filters = Some("[]".into());
        }
        assert_eq!(call.arguments().len(), 4);
        assert_eq!(call.capability(), Capability::SearchManga);
    }

    #[test]
    fn test_manifest_call_has_no_source() {
        assert!(ExtensionCall::Manifest.source_id().is_none());
        assert!(ExtensionCall::Manifest.arguments().is_empty());
        let headers = ExtensionCall::Headers {
            source_id: "9".into(),
        };
        assert_eq!(headers.source_id().map(SourceId::as_str), Some("9"));
    }
}
