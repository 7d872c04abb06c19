//! Video subject (the themed topic a production run is about).

use std::fmt;

use serde::{Deserialize, Serialize};

/// The themed topic of a video, e.g. "lion" or "snow leopard".
///
/// The display name is kept verbatim; derived forms (working-directory
/// slug, thumbnail title text) are computed on demand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Subject(String);

impl Subject {
    /// Create a subject from a display name. Surrounding whitespace is trimmed.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    /// The display name as provided.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe identifier used for the per-subject working directory.
    pub fn slug(&self) -> String {
        self.0
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Uppercased form rendered onto the thumbnail.
    pub fn title_text(&self) -> String {
        self.0.to_uppercase()
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Subject {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slug_lowercases_and_joins() {
        let subject = Subject::new("Snow Leopard");
        assert_eq!(subject.slug(), "snow-leopard");
    }

    #[test]
    fn test_slug_collapses_inner_whitespace() {
        let subject = Subject::new("  red   panda ");
        assert_eq!(subject.name(), "red   panda");
        assert_eq!(subject.slug(), "red-panda");
    }

    #[test]
    fn test_title_text_uppercases() {
        let subject = Subject::new("lion");
        assert_eq!(subject.title_text(), "LION");
    }
}
