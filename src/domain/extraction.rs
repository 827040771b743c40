//! Extraction results produced by one streaming scan

use serde::{Deserialize, Serialize};

/// Ordered text fragments collected from matched elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Trimmed, non-empty text fragments in document order
    pub fragments: Vec<String>,

    /// Whether any element entered a matched scope
    pub matched: bool,
}

impl ExtractionResult {
    pub fn new(fragments: Vec<String>, matched: bool) -> Self {
        Self { fragments, matched }
    }

    /// Existence check: an element matched and it carried non-whitespace text.
    ///
    /// A matched element without text (`<h1></h1>`) is not found.
    pub fn found(&self) -> bool {
        self.matched && !self.fragments.is_empty()
    }

    /// First fragment, in document order, containing `expected` (case-insensitive)
    pub fn first_containing(&self, expected: &str) -> Option<&str> {
        let needle = expected.to_lowercase();
        self.fragments
            .iter()
            .find(|fragment| fragment_contains(fragment, &needle))
            .map(String::as_str)
    }
}

/// Case-insensitive containment; `lowercase_needle` must already be lowercased
pub fn fragment_contains(fragment: &str, lowercase_needle: &str) -> bool {
    fragment.to_lowercase().contains(lowercase_needle)
}

/// Outcome of a scan in one of the two operating modes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Existence check succeeded with the collected fragments
    Found { contents: Vec<String> },
    /// Comparison found a fragment containing the expected text
    Matched { matched_content: String },
    /// Scan finished cleanly without satisfying the condition
    NoMatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_found_requires_match_and_text() {
        assert!(ExtractionResult::new(vec!["Title".into()], true).found());
        assert!(!ExtractionResult::new(vec![], true).found());
        assert!(!ExtractionResult::new(vec!["stray".into()], false).found());
    }

    #[test]
    fn test_first_containing_is_case_insensitive() {
        let result = ExtractionResult::new(vec!["Hello World".into(), "hello again".into()], true);
        assert_eq!(result.first_containing("hello"), Some("Hello World"));
        assert_eq!(result.first_containing("AGAIN"), Some("hello again"));
        assert_eq!(result.first_containing("absent"), None);
    }

    #[test]
    fn test_empty_needle_selects_first_fragment() {
        let result = ExtractionResult::new(vec!["first".into(), "second".into()], true);
        assert_eq!(result.first_containing(""), Some("first"));
        assert_eq!(ExtractionResult::default().first_containing(""), None);
    }
}
