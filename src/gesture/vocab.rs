//! Symbol vocabulary: accepted letters and the two control tokens

use std::collections::BTreeSet;

/// Label the classifier uses for the space gesture
const SEPARATOR_TOKEN: &str = "SPACE";

/// Label the classifier uses for the commit gesture
const COMMIT_TOKEN: &str = "SEND";

/// The set of symbols the engine will act on.
///
/// Letters append themselves to the buffer, the separator appends a space,
/// and the commit token arms the long hold. Anything else is ignored.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    letters: BTreeSet<String>,
}

impl Vocabulary {
    /// Build a vocabulary from the labels the server advertises.
    ///
    /// Entries matching the control tokens are recognized by name; single
    /// uppercase characters become letters; other entries are dropped.
    pub fn from_labels(labels: impl IntoIterator<Item = String>) -> Self {
        let letters = labels
            .into_iter()
            .filter(|label| label != SEPARATOR_TOKEN && label != COMMIT_TOKEN)
            .filter(|label| {
                let mut chars = label.chars();
                matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
            })
            .collect();

        Self { letters }
    }

    /// Whether the symbol is an accepted single letter
    pub fn is_letter(&self, symbol: &str) -> bool {
        self.letters.contains(symbol)
    }

    /// Whether the symbol is the separator gesture
    pub fn is_separator(&self, symbol: &str) -> bool {
        symbol == SEPARATOR_TOKEN
    }

    /// Whether the symbol is the commit gesture
    pub fn is_commit(&self, symbol: &str) -> bool {
        symbol == COMMIT_TOKEN
    }

    /// The commit gesture's label
    pub fn commit_symbol(&self) -> &'static str {
        COMMIT_TOKEN
    }

    /// Number of accepted letters
    pub fn letter_count(&self) -> usize {
        self.letters.len()
    }
}

impl Default for Vocabulary {
    /// Built-in A-Z vocabulary, used when the server's labels are
    /// unavailable
    fn default() -> Self {
        Self {
            letters: ('A'..='Z').map(String::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_covers_alphabet() {
        let vocab = Vocabulary::default();
        assert_eq!(vocab.letter_count(), 26);
        assert!(vocab.is_letter("A"));
        assert!(vocab.is_letter("Z"));
        assert!(!vocab.is_letter("a"));
    }

    #[test]
    fn test_control_tokens() {
        let vocab = Vocabulary::default();
        assert!(vocab.is_separator("SPACE"));
        assert!(vocab.is_commit("SEND"));
        assert_eq!(vocab.commit_symbol(), "SEND");
        assert!(!vocab.is_letter("SPACE"));
        assert!(!vocab.is_letter("SEND"));
    }

    #[test]
    fn test_from_labels_partitions() {
        let labels = ["A", "B", "SPACE", "SEND", "unknown", "AB"]
            .into_iter()
            .map(String::from);
        let vocab = Vocabulary::from_labels(labels);
        assert_eq!(vocab.letter_count(), 2);
        assert!(vocab.is_letter("A"));
        assert!(!vocab.is_letter("AB"));
        assert!(!vocab.is_letter("unknown"));
    }
}
