use serde::{Deserialize, Serialize};

// ── Catalogue entry ───────────────────────────────────────────────────────────

/// One title discovered on the catalogue site. Built by the extractor and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CatalogEntry {
    pub title: String,
    /// Site-supplied, not guaranteed to be numeric.
    pub year: String,
    /// Absolute URL of the detail page.
    pub source_url: String,
    /// Absolute poster URL; empty when the site omitted it.
    pub image_url: String,
    pub media_type: String,
}

impl CatalogEntry {
    /// Human-readable label shown in the picker: `Title (Year)`.
    ///
    /// Tabs and line breaks are flattened so the label never contains the
    /// record delimiter.
    pub fn label(&self) -> String {
        let title = flatten(&self.title);
        let year = flatten(&self.year);
        if year.is_empty() {
            title
        } else {
            format!("{title} ({year})")
        }
    }

    pub fn has_image(&self) -> bool {
        !self.image_url.is_empty()
    }
}

fn flatten(s: &str) -> String {
    s.split(|c: char| c == '\t' || c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Selector outcome ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Chosen(CatalogEntry),
    /// The user aborted the picker. Not an error.
    None,
}

// ── Download batch summary ────────────────────────────────────────────────────

/// Outcome counts for one download batch. `fetched + cached + skipped +
/// failed + duplicates == total` once the batch has returned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    /// Downloaded and written during this batch.
    pub fetched: usize,
    /// Already on disk before the batch started.
    pub cached: usize,
    /// No image URL, or never dispatched because the batch was cancelled.
    pub skipped: usize,
    pub failed: usize,
    /// Repeats of an image URL handled earlier in the batch. They share the
    /// first entry's outcome, so they are counted in neither column above.
    pub duplicates: usize,
}
