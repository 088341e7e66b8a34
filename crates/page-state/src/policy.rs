use serde::{Deserialize, Serialize};

/// Tuning for generated text assertions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintPolicy {
    /// Whitespace-only text nodes produce no candidates.
    pub skip_blank_text: bool,
    /// Text longer than this (in chars) is only asserted through `string(..)`, never quoted in a
    /// query.
    pub max_text_length: usize,
}

impl Default for FingerprintPolicy {
    fn default() -> Self {
        Self {
            skip_blank_text: true,
            max_text_length: 200,
        }
    }
}

impl FingerprintPolicy {
    pub fn is_assertable(&self, text: &str) -> bool {
        !(self.skip_blank_text && text.trim().is_empty())
    }

    pub fn is_quotable(&self, text: &str) -> bool {
        self.is_assertable(text) && text.chars().count() <= self.max_text_length
    }
}
