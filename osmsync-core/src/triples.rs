//! Converter output as an opaque, line-oriented block of triples.

use std::fmt;

/// Serialised triples produced by a converter.
///
/// The content is never parsed; only whole lines are filtered.
///
/// # Examples
/// ```
/// use osmsync_core::Triples;
///
/// let triples = Triples::new("@prefix osm: <x> .\nosmnode:1 osmkey:a \"b\" .\n").strip_headers();
/// assert_eq!(triples.as_str(), "osmnode:1 osmkey:a \"b\" .\n");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Triples(String);

impl Triples {
    /// Wrap converter output.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// Text of the block.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Drop prefix and base declarations (lines starting with `@`).
    #[must_use]
    pub fn strip_headers(self) -> Self {
        self.retain_lines(|line| !line.starts_with('@'))
    }

    /// Drop every line containing `needle`.
    #[must_use]
    pub fn without_lines_containing(self, needle: &str) -> Self {
        self.retain_lines(|line| !line.contains(needle))
    }

    /// Whether the block carries no statements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn retain_lines(self, keep: impl Fn(&str) -> bool) -> Self {
        let kept: String = self
            .0
            .lines()
            .filter(|line| keep(line))
            .flat_map(|line| [line, "\n"])
            .collect();
        Self(kept)
    }
}

impl AsRef<str> for Triples {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Triples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
