//! Text collection for matched scopes

use crate::domain::ExtractionResult;

#[derive(Debug, Default)]
pub struct ExtractionCollector {
    fragments: Vec<String>,
    matched: bool,
}

impl ExtractionCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_element_matched(&mut self) {
        self.matched = true;
    }

    /// Trim one raw text run and keep it if anything is left.
    ///
    /// Each run is trimmed on its own; adjacent runs are never merged.
    /// Returns the stored fragment.
    pub fn on_text(&mut self, raw: &[u8]) -> Option<&str> {
        let decoded = String::from_utf8_lossy(raw);
        let trimmed = decoded.trim();
        if trimmed.is_empty() {
            return None;
        }
        self.fragments.push(trimmed.to_string());
        self.fragments.last().map(String::as_str)
    }

    pub fn matched(&self) -> bool {
        self.matched
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments.len()
    }

    pub fn into_result(self) -> ExtractionResult {
        ExtractionResult::new(self.fragments, self.matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_drops_whitespace() {
        let mut collector = ExtractionCollector::new();
        assert_eq!(collector.on_text(b"  Title \n"), Some("Title"));
        assert_eq!(collector.on_text(b" \t\r\n "), None);
        assert_eq!(collector.on_text(b"next"), Some("next"));

        let result = collector.into_result();
        assert_eq!(result.fragments, vec!["Title", "next"]);
        assert!(!result.matched);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut collector = ExtractionCollector::new();
        collector.on_element_matched();
        assert_eq!(collector.on_text(b"caf\xff"), Some("caf\u{fffd}"));
        assert!(collector.into_result().found());
    }
}
