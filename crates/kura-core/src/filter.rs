//! Search filters exposed by a source.
//!
//! A source describes its filters through `getFilterList`. The caller edits
//! the `state` fields and passes the list back to `searchManga`.

use serde::{Deserialize, Serialize};

/// Tri-state checkbox value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum TriState {
    /// Not applied.
    #[default]
    Ignore,
    /// Results must match.
    Include,
    /// Results must not match.
    Exclude,
}

impl From<u8> for TriState {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Include,
            2 => Self::Exclude,
            _ => Self::Ignore,
        }
    }
}

impl From<TriState> for u8 {
    fn from(state: TriState) -> Self {
        match state {
            TriState::Ignore => 0,
            TriState::Include => 1,
            TriState::Exclude => 2,
        }
    }
}

/// Selected column and direction of a sort filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSelection {
    /// Index into the sort filter's `values`.
    pub index: u32,
    /// Ascending when true.
    pub ascending: bool,
}

/// One search filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Filter {
    /// Non-interactive heading.
    Header {
        /// Text shown.
        name: String,
    },
    /// Visual separator.
    Separator {
        /// Optional label.
        #[serde(default)]
        name: String,
    },
    /// Free text input.
    Text {
        /// Label.
        name: String,
        /// Current text.
        #[serde(default)]
        state: String,
    },
    /// Boolean checkbox.
    CheckBox {
        /// Label.
        name: String,
        /// Whether checked.
        #[serde(default)]
        state: bool,
    },
    /// Include/exclude checkbox.
    TriState {
        /// Label.
        name: String,
        /// Current value.
        #[serde(default)]
        state: TriState,
    },
    /// Single choice out of `values`.
    Select {
        /// Label.
        name: String,
        /// Choices.
        values: Vec<String>,
        /// Index of the selected choice.
        #[serde(default)]
        state: u32,
    },
    /// Sort order selection.
    Sort {
        /// Label.
        name: String,
        /// Sortable columns.
        values: Vec<String>,
        /// Current selection, if any.
        #[serde(default)]
        state: Option<SortSelection>,
    },
    /// Nested filters.
    Group {
        /// Label.
        name: String,
        /// Child filters.
        #[serde(default)]
        state: Vec<Filter>,
    },
}

impl Filter {
    /// The filter's label.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Header { name }
            | Self::Separator { name }
            | Self::Text { name, .. }
            | Self::CheckBox { name, .. }
            | Self::TriState { name, .. }
            | Self::Select { name, .. }
            | Self::Sort { name, .. }
            | Self::Group { name, .. } => name,
        }
    }
}
