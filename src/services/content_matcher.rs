//! Exact, unambiguous span location.
//!
//! A text-level edit is only safe when the span it replaces occurs exactly
//! once. Matching is byte-exact: no whitespace normalisation, no fuzzy
//! fallback.

/// Result of locating a span in file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Zero,
    /// Exactly one occurrence, at this byte offset.
    One { offset: usize },
    Many { count: usize },
}

/// Count non-overlapping occurrences of `span` in `content`.
///
/// An empty span never matches: it would anchor an edit nowhere in particular.
pub fn match_span(content: &str, span: &str) -> MatchOutcome {
    if span.is_empty() {
        return MatchOutcome::Zero;
    }

    let mut offsets = content.match_indices(span).map(|(offset, _)| offset);
    match (offsets.next(), offsets.next()) {
        (None, _) => MatchOutcome::Zero,
        (Some(offset), None) => MatchOutcome::One { offset },
        (Some(_), Some(_)) => MatchOutcome::Many {
            count: 2 + offsets.count(),
        },
    }
}

/// Replace the single occurrence at `offset`.
pub fn splice(content: &str, offset: usize, original: &str, replacement: &str) -> String {
    let mut patched = String::with_capacity(content.len() - original.len() + replacement.len());
    patched.push_str(&content[..offset]);
    patched.push_str(replacement);
    patched.push_str(&content[offset + original.len()..]);
    patched
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_occurrence_reports_offset() {
        let content = "a = 1\nif x == None:\n    pass\n";
        assert_eq!(
            match_span(content, "if x == None:"),
            MatchOutcome::One { offset: 6 }
        );
    }

    #[test]
    fn test_absent_span() {
        assert_eq!(match_span("abc", "xyz"), MatchOutcome::Zero);
    }

    #[test]
    fn test_whitespace_difference_is_no_match() {
        assert_eq!(match_span("if x == None:", "if x ==  None:"), MatchOutcome::Zero);
        assert_eq!(match_span("if x == None:", "if x == None: "), MatchOutcome::Zero);
    }

    #[test]
    fn test_repeated_span_is_ambiguous() {
        let content = "x == None\ny = 2\nx == None\nx == None\n";
        assert_eq!(
            match_span(content, "x == None"),
            MatchOutcome::Many { count: 3 }
        );
    }

    #[test]
    fn test_overlapping_occurrences_counted_once() {
        // "aa" occurs at 0, 1, 2 in "aaaa" but only twice without overlap
        assert_eq!(match_span("aaaa", "aa"), MatchOutcome::Many { count: 2 });
        assert_eq!(match_span("aaa", "aa"), MatchOutcome::One { offset: 0 });
    }

    #[test]
    fn test_empty_span_never_matches() {
        assert_eq!(match_span("anything", ""), MatchOutcome::Zero);
    }

    #[test]
    fn test_splice_replaces_only_located_span() {
        let content = "head\nif x == None:\ntail\n";
        let patched = splice(content, 5, "if x == None:", "if x is None:");
        assert_eq!(patched, "head\nif x is None:\ntail\n");
    }
}
