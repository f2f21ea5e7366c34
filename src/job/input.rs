//! Text-blob ingestion for a job's scored term list (spec §4.7 "Input", §6
//! "Input format"): one record per line, a GO ID in any of its three
//! accepted spellings, an optional numeric value, and up to nine further
//! numeric "user" columns.
//!
//! There is no TaxaGO precedent for this specific grammar (its own input is
//! a pre-built background population, not a free-text scored list), so this
//! is built directly from spec §6's field-by-field description, using the
//! same "split on whitespace/pipe, skip comment lines" shape TaxaGO's own
//! `parsers` module uses for its tab-separated inputs. The GO ID token itself
//! is matched with the same `lazy_static!`-wrapped `Regex` TaxaGO's
//! `parsers::obo_parser::GO_ID_REGEX` uses to pull `GO:NNNNNNN` out of a
//! `.obo` stanza, generalized to also accept the `GONNNNNNN` and bare
//! `NNNNNNN` spellings spec §6 allows.

use lazy_static::lazy_static;
use regex::Regex;

use super::{InputTerm, Warning};
use crate::ontology::TermId;

/// Up to this many numeric columns beyond the primary value become
/// `user_values` (spec §3 "RevigoTerm": "user_values (≤9 extra numbers)").
const MAX_USER_VALUES: usize = 9;

lazy_static! {
    /// Matches a GO ID token in any of its three accepted spellings, with
    /// the `GO:`/`GO` prefix optional and captured digits in group 1.
    static ref GO_ID_TOKEN: Regex = Regex::new(r"^(?:GO:?)?(\d+)$").unwrap();
}

fn is_comment_or_blank(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.is_empty()
        || trimmed.starts_with('%')
        || trimmed.starts_with('#')
        || trimmed.starts_with('!')
}

/// Split a record on the delimiter class `[ \t|\v]` (spec §6), dropping
/// empty fields produced by runs of consecutive delimiters.
fn split_fields(line: &str) -> Vec<&str> {
    line.split(|c: char| c == ' ' || c == '\t' || c == '|' || c == '\u{000B}')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a GO ID token in any of its three accepted forms: `GO:NNNNNNN`,
/// `GONNNNNNN`, or a bare `NNNNNNN`.
fn parse_go_id(token: &str) -> Option<TermId> {
    let digits = GO_ID_TOKEN.captures(token)?.get(1)?.as_str();
    digits.parse::<TermId>().ok()
}

/// Parse a newline-delimited scored term list into [`InputTerm`]s, skipping
/// blank/comment lines and collecting a [`Warning::UnparseableLine`] for
/// every line whose first field isn't a recognizable GO ID (spec §4.7
/// "Warnings": "unparseable GO ID lines").
///
/// A record with no second field (or an unparseable one) gets `raw_value =
/// 0.0`: the spec marks the value token "optional", and a job-level
/// value-type transform downstream decides whether that default is
/// meaningful for the chosen `ValueType`.
pub fn parse_input(text: &str) -> (Vec<InputTerm>, Vec<Warning>) {
    let mut terms = Vec::new();
    let mut warnings = Vec::new();

    for line in text.lines() {
        if is_comment_or_blank(line) {
            continue;
        }
        let fields = split_fields(line);
        let Some(first) = fields.first() else {
            continue;
        };
        let Some(id) = parse_go_id(first) else {
            warnings.push(Warning::UnparseableLine(line.to_string()));
            continue;
        };

        let raw_value = fields
            .get(1)
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        let user_values: Vec<f64> = fields
            .iter()
            .skip(2)
            .take(MAX_USER_VALUES)
            .map(|s| s.parse::<f64>().unwrap_or(f64::NAN))
            .collect();

        terms.push(InputTerm {
            id,
            raw_value,
            user_values,
        });
    }

    (terms, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_all_three_go_id_spellings() {
        assert_eq!(parse_go_id("GO:0008150"), Some(8150));
        assert_eq!(parse_go_id("GO0008150"), Some(8150));
        assert_eq!(parse_go_id("0008150"), Some(8150));
    }

    #[test]
    fn comment_and_blank_lines_are_skipped() {
        let (terms, warnings) = parse_input("% a comment\n\n#also a comment\n!and this\nGO:0008150 0.01\n");
        assert_eq!(terms.len(), 1);
        assert!(warnings.is_empty());
    }

    #[test]
    fn unparseable_first_field_is_a_warning_not_a_panic() {
        let (terms, warnings) = parse_input("not-a-go-id 0.5\n");
        assert!(terms.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(warnings[0], Warning::UnparseableLine(_)));
    }

    #[test]
    fn extra_columns_become_user_values_capped_at_nine() {
        let line = format!("GO:0008150 0.01 {}", (1..=12).map(|i| i.to_string()).collect::<Vec<_>>().join(" "));
        let (terms, _) = parse_input(&line);
        assert_eq!(terms[0].user_values.len(), 9);
        assert_eq!(terms[0].user_values[0], 1.0);
    }

    #[test]
    fn unparseable_user_value_becomes_nan() {
        let (terms, _) = parse_input("GO:0008150 0.01 oops 2.0\n");
        assert!(terms[0].user_values[0].is_nan());
        assert_eq!(terms[0].user_values[1], 2.0);
    }

    #[test]
    fn pipe_and_tab_delimiters_are_honored() {
        let (terms, _) = parse_input("GO:0008150|0.01\tGO:0009987|0.02\n");
        // Both records land on one line since there's no newline between
        // them; the parser only recognizes the first GO ID + value pair per
        // line, matching "one record per line" in spec §4.7.
        assert_eq!(terms.len(), 1);
        assert_eq!(terms[0].id, 8150);
    }
}
