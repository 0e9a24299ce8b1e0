use std::collections::HashSet;

use regex::{Regex, RegexBuilder};

/// Case-insensitive alternation over the active filter terms, longest first
/// so overlapping terms mark the widest match.
pub fn build_highlight_regex(terms: &[String]) -> Option<Regex> {
    let mut seen = HashSet::new();
    let mut unique: Vec<&str> = terms
        .iter()
        .map(|term| term.trim())
        .filter(|term| !term.is_empty() && seen.insert(term.to_lowercase()))
        .collect();
    if unique.is_empty() {
        return None;
    }
    unique.sort_by_key(|term| std::cmp::Reverse(term.chars().count()));
    let pattern = unique
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");
    match RegexBuilder::new(&pattern).case_insensitive(true).build() {
        Ok(regex) => Some(regex),
        Err(err) => {
            tracing::warn!(?err, "could not build highlight pattern");
            None
        }
    }
}

/// Splits `text` into `(segment, matched)` pieces in order.
pub fn split_matches<'t>(text: &'t str, regex: Option<&Regex>) -> Vec<(&'t str, bool)> {
    let Some(regex) = regex else {
        return vec![(text, false)];
    };
    let mut pieces = Vec::new();
    let mut last = 0;
    for found in regex.find_iter(text) {
        if found.start() > last {
            pieces.push((&text[last..found.start()], false));
        }
        pieces.push((found.as_str(), true));
        last = found.end();
    }
    if last < text.len() || pieces.is_empty() {
        pieces.push((&text[last..], false));
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_terms_win_over_their_prefixes() {
        let regex = build_highlight_regex(&["opd".into(), "opd-12".into()]).expect("regex");
        let found: Vec<_> = regex.find_iter("OPD-123").map(|m| m.as_str()).collect();
        assert_eq!(found, vec!["OPD-12"]);
    }

    #[test]
    fn blank_and_duplicate_terms_are_ignored() {
        assert!(build_highlight_regex(&["  ".into(), String::new()]).is_none());
        let regex = build_highlight_regex(&["Doe".into(), " doe ".into()]).expect("regex");
        assert_eq!(regex.as_str(), "Doe");
    }

    #[test]
    fn terms_are_matched_literally() {
        let regex = build_highlight_regex(&["a.b".into()]).expect("regex");
        assert!(!regex.is_match("axb"));
        assert!(regex.is_match("A.B"));
    }

    #[test]
    fn split_marks_matched_segments() {
        let regex = build_highlight_regex(&["doe".into()]);
        assert_eq!(
            split_matches("Jane Doe Jr", regex.as_ref()),
            vec![("Jane ", false), ("Doe", true), (" Jr", false)]
        );
        assert_eq!(split_matches("", regex.as_ref()), vec![("", false)]);
        assert_eq!(split_matches("Mary", None), vec![("Mary", false)]);
    }
}
