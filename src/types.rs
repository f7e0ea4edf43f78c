//! Public types for the classification pipeline: categories, records and run results.

use std::fmt;

use serde::Deserialize;

/// Outcome of classifying one query. Only [`Category::PERSISTED`] get output files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Preset,
    ExtendSearch,
    Merger,
    Unknown,
}

impl Category {
    /// Categories with an output directory, in the order they are created and flushed.
    pub const PERSISTED: [Category; 3] = [Category::Preset, Category::ExtendSearch, Category::Merger];

    /// Truth table over the two structural features of a catalog value.
    pub const fn from_features(has_preset: bool, has_token: bool) -> Self {
        match (has_preset, has_token) {
            (true, true) => Category::ExtendSearch,
            (true, false) => Category::Preset,
            (false, true) => Category::Merger,
            (false, false) => Category::Unknown,
        }
    }

    /// Directory name under the output root.
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Preset => "Preset",
            Category::ExtendSearch => "ExtendSearch",
            Category::Merger => "Merger",
            Category::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classified answer of the matching service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassificationRecord {
    /// Normalized query text (`metadata.name`).
    pub text: String,
    pub category: Category,
    /// Raw, undecoded `metadata.catalog_value`.
    pub filter_value: String,
    /// Every value of the `preset` parameter, in order of appearance.
    pub preset_ids: Vec<String>,
}

/// What the sink does with a record classified as [`Category::Unknown`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownPolicy {
    /// Log the query and keep going.
    #[default]
    Skip,
    /// Stop the run with [`crate::PipelineError::UnknownCategory`].
    Fail,
}

/// Counters for a completed run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows written per persisted category, in [`Category::PERSISTED`] order.
    pub written: Vec<(Category, usize)>,
    pub skipped_unknown: usize,
    pub skipped_benign: usize,
}

impl RunSummary {
    pub fn written_for(&self, category: Category) -> usize {
        self.written
            .iter()
            .find(|(c, _)| *c == category)
            .map_or(0, |(_, n)| *n)
    }

    pub fn total_written(&self) -> usize {
        self.written.iter().map(|(_, n)| n).sum()
    }
}
