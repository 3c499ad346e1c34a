//! Whitespace-preserving tokenizer for streamed replies.
//!
//! A reply is split into alternating runs of non-whitespace and whitespace, so concatenating
//! the tokens in order reproduces the input exactly. Empty segments are never produced.

/// Iterator over whitespace-preserving segments of a string.
#[derive(Debug, Clone)]
pub struct Segments<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.rest.chars().next()?;
        let ws = first.is_whitespace();
        let end = self
            .rest
            .char_indices()
            .find(|(_, c)| c.is_whitespace() != ws)
            .map(|(i, _)| i)
            .unwrap_or(self.rest.len());
        let (head, tail) = self.rest.split_at(end);
        self.rest = tail;
        Some(head)
    }
}

/// Split `s` into words and the whitespace runs between them.
pub fn segments(s: &str) -> Segments<'_> {
    Segments { rest: s }
}

/// Owned variant of [`segments`].
pub fn split_preserving_whitespace(s: &str) -> Vec<String> {
    segments(s).map(str::to_owned).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_and_gaps_alternate() {
        let t = split_preserving_whitespace("Echo (client123): hi");
        assert_eq!(t, vec!["Echo", " ", "(client123):", " ", "hi"]);
    }

    #[test]
    fn concatenation_reproduces_input() {
        for s in ["", " ", "a", "  lead", "trail \t\n", "multi   space\u{3000}ideographic", "é ü"] {
            let joined: String = segments(s).collect();
            assert_eq!(joined, s);
            assert!(segments(s).all(|seg| !seg.is_empty()));
        }
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert_eq!(segments("").count(), 0);
    }
}
