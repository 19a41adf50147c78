//! Accumulation of confirmed symbols into a phrase buffer

use tracing::debug;

use super::Vocabulary;

/// Owns the accumulated text buffer.
///
/// Confirmed letters append themselves, the separator appends a space, and
/// the commit token leaves the buffer alone until the hold completes. The
/// buffer survives detection stop/start and is cleared only by a finished
/// commit or a manual clear.
#[derive(Debug)]
pub struct GestureAccumulator {
    vocab: Vocabulary,
    buffer: String,
}

impl GestureAccumulator {
    pub fn new(vocab: Vocabulary) -> Self {
        Self {
            vocab,
            buffer: String::new(),
        }
    }

    /// Apply a confirmed symbol. Returns `true` if the buffer changed.
    pub fn on_confirmed(&mut self, symbol: &str) -> bool {
        if self.vocab.is_separator(symbol) {
            self.buffer.push(' ');
            true
        } else if self.vocab.is_letter(symbol) {
            self.buffer.push_str(symbol);
            true
        } else {
            // The commit token mutates nothing here; unknown labels are
            // dropped.
            if !self.vocab.is_commit(symbol) {
                debug!(symbol, "ignoring symbol outside the vocabulary");
            }
            false
        }
    }

    /// Take the finished phrase, clearing the buffer.
    ///
    /// Returns `None` when the buffer holds nothing but whitespace; the
    /// buffer is cleared either way.
    pub fn take_phrase(&mut self) -> Option<String> {
        let phrase = self.buffer.trim().to_string();
        self.buffer.clear();
        if phrase.is_empty() {
            None
        } else {
            Some(phrase)
        }
    }

    /// Clear the buffer. Safe to call at any time, including when empty.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Current buffer contents
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Whether a commit would have anything to send
    pub fn is_empty(&self) -> bool {
        self.buffer.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator() -> GestureAccumulator {
        GestureAccumulator::new(Vocabulary::default())
    }

    #[test]
    fn test_letters_append() {
        let mut acc = accumulator();
        assert!(acc.on_confirmed("H"));
        assert!(acc.on_confirmed("I"));
        assert_eq!(acc.text(), "HI");
    }

    #[test]
    fn test_separator_appends_space() {
        let mut acc = accumulator();
        acc.on_confirmed("A");
        assert!(acc.on_confirmed("SPACE"));
        acc.on_confirmed("B");
        assert_eq!(acc.text(), "A B");
    }

    #[test]
    fn test_commit_token_does_not_mutate() {
        let mut acc = accumulator();
        acc.on_confirmed("A");
        assert!(!acc.on_confirmed("SEND"));
        assert_eq!(acc.text(), "A");
    }

    #[test]
    fn test_unknown_symbol_ignored() {
        let mut acc = accumulator();
        assert!(!acc.on_confirmed("No hand found"));
        assert!(acc.text().is_empty());
    }

    #[test]
    fn test_take_phrase_clears() {
        let mut acc = accumulator();
        acc.on_confirmed("H");
        acc.on_confirmed("I");
        assert_eq!(acc.take_phrase(), Some("HI".to_string()));
        assert!(acc.text().is_empty());
        assert_eq!(acc.take_phrase(), None);
    }

    #[test]
    fn test_whitespace_only_buffer_has_nothing_to_send() {
        let mut acc = accumulator();
        acc.on_confirmed("SPACE");
        acc.on_confirmed("SPACE");
        assert!(acc.is_empty());
        assert_eq!(acc.take_phrase(), None);
        assert!(acc.text().is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let mut acc = accumulator();
        acc.on_confirmed("A");
        acc.clear();
        acc.clear();
        assert!(acc.text().is_empty());
    }
}
