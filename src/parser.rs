//! Extraction of aligned sentence pairs from free-text service replies.
//!
//! The service is asked to answer with JSON-like fragments such as
//! `{"english": "Introduction", "khmer": "សេចក្ដីផ្ដើម"}`, but replies are
//! natural language and frequently malformed. Extraction is best-effort: any
//! text that doesn't match the fragment shape is ignored.

use crate::language::LanguagePair;
use anyhow::{Context, Result};
use regex::Regex;
use tracing::debug;

/// One validated (source, target) pair extracted from a response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AlignedPair {
    pub source: String,
    pub target: String,
}

impl AlignedPair {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Anything that turns a raw response into aligned pairs.
///
/// Implementations must never fail: unusable input yields an empty vector.
pub trait PairExtractor: Send + Sync {
    fn extract(&self, response: &str) -> Vec<AlignedPair>;
}

/// Value body: anything but braces and backslashes, or an escaped character
const VALUE: &str = r#"(?:[^{}\\]|\\.)*?"#;

/// `", "key":` as it appears inside a value that swallowed another field
const FIELD_SEPARATOR: &str = r#""\s*,\s*"[^"{}]*"\s*:"#;

/// Regex-based extractor for two-field fragments keyed by language name.
///
/// A value may contain unescaped quotes but never an unescaped brace, so a
/// match can't run across into a neighbouring fragment. A value that carries a
/// `", "key":` run means the fragment has extra fields; it is rejected.
#[derive(Debug, Clone)]
pub struct ResponseParser {
    pattern: Regex,
    field_separator: Regex,
    source_key: String,
    target_key: String,
}

impl ResponseParser {
    /// Build a parser for fragments keyed by the pair's lowercased names.
    pub fn new(languages: &LanguagePair) -> Result<Self> {
        let source_key = languages.source.field_key();
        let target_key = languages.target.field_key();

        let keys = format!(
            "{}|{}",
            regex::escape(&source_key),
            regex::escape(&target_key)
        );
        let pattern = format!(
            r#"(?is)\{{\s*"({keys})"\s*:\s*"({VALUE})"\s*,\s*"({keys})"\s*:\s*"({VALUE})"\s*\}}"#
        );
        let pattern = Regex::new(&pattern).with_context(|| {
            format!(
                "Failed to build fragment pattern for '{}' / '{}'",
                source_key, target_key
            )
        })?;

        let field_separator =
            Regex::new(FIELD_SEPARATOR).context("Failed to build field separator pattern")?;

        Ok(Self {
            pattern,
            field_separator,
            source_key,
            target_key,
        })
    }

    /// Extract every fragment in textual order.
    pub fn parse(&self, response: &str) -> Vec<AlignedPair> {
        let mut pairs = Vec::new();

        for caps in self.pattern.captures_iter(response) {
            let first_key = caps[1].to_lowercase();
            let second_key = caps[3].to_lowercase();

            let (source, target) = if first_key == self.source_key && second_key == self.target_key
            {
                (&caps[2], &caps[4])
            } else if first_key == self.target_key && second_key == self.source_key {
                (&caps[4], &caps[2])
            } else {
                // Same key twice
                continue;
            };

            if self.field_separator.is_match(source) || self.field_separator.is_match(target) {
                debug!("Skipping fragment with more than two fields");
                continue;
            }

            let source = unescape(source);
            let target = unescape(target);
            let source = source.trim();
            let target = target.trim();

            if source.is_empty() || target.is_empty() {
                continue;
            }

            pairs.push(AlignedPair::new(source, target));
        }

        debug!("Extracted {} aligned pairs from response", pairs.len());
        pairs
    }
}

impl PairExtractor for ResponseParser {
    fn extract(&self, response: &str) -> Vec<AlignedPair> {
        self.parse(response)
    }
}

/// Decode the JSON escapes a model is likely to emit inside a string value.
/// Unknown escapes are kept verbatim.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::LanguageSpec;
    use proptest::prelude::*;

    fn english_khmer() -> LanguagePair {
        LanguagePair::new(
            LanguageSpec::new("English", "EN").unwrap(),
            LanguageSpec::new("Khmer", "KM").unwrap(),
        )
        .unwrap()
    }

    fn parser() -> ResponseParser {
        ResponseParser::new(&english_khmer()).unwrap()
    }

    // ==================== Basic Extraction ====================

    #[test]
    fn test_single_fragment() {
        let response = r#"{"english": "Introduction", "khmer": "សេចក្ដីផ្ដើម"}"#;
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("Introduction", "សេចក្ដីផ្ដើម")]);
    }

    #[test]
    fn test_multiple_fragments_keep_textual_order() {
        let response = r#"Here are the aligned sentences:
{"english": "First sentence.", "khmer": "ប្រយោគទីមួយ។"}
Then:
{"english": "Second sentence.", "khmer": "ប្រយោគទីពីរ។"}
{"english": "Third.", "khmer": "ទីបី។"}
Hope this helps!"#;

        let pairs = parser().parse(response);
        assert_eq!(
            pairs,
            vec![
                AlignedPair::new("First sentence.", "ប្រយោគទីមួយ។"),
                AlignedPair::new("Second sentence.", "ប្រយោគទីពីរ។"),
                AlignedPair::new("Third.", "ទីបី។"),
            ]
        );
    }

    #[test]
    fn test_fields_are_trimmed() {
        let response = "{\"english\": \"  padded \\n\", \"khmer\": \"\n\tសួស្តី  \"}";
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("padded", "សួស្តី")]);
    }

    #[test]
    fn test_fragment_inside_json_array() {
        let response = r#"```json
[
  {"english": "Hello", "khmer": "សួស្តី"},
  {"english": "Goodbye", "khmer": "លាហើយ"}
]
```"#;
        let pairs = parser().parse(response);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], AlignedPair::new("Goodbye", "លាហើយ"));
    }

    #[test]
    fn test_reversed_field_order() {
        let response = r#"{"khmer": "សួស្តី", "english": "Hello"}"#;
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("Hello", "សួស្តី")]);
    }

    #[test]
    fn test_keys_match_case_insensitively() {
        let response = r#"{"English": "Hello", "KHMER": "សួស្តី"}"#;
        let pairs = parser().parse(response);
        assert_eq!(pairs.len(), 1);
    }

    #[test]
    fn test_multiline_values() {
        let response = "{\"english\": \"Line one\nline two\", \"khmer\": \"មួយ\nពីរ\"}";
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("Line one\nline two", "មួយ\nពីរ")]);
    }

    // ==================== Quotes and Escapes ====================

    #[test]
    fn test_escaped_quotes_inside_value() {
        let response = r#"{"english": "He said \"hi\"", "khmer": "គាត់និយាយថា \"សួស្តី\""}"#;
        let pairs = parser().parse(response);
        assert_eq!(
            pairs,
            vec![AlignedPair::new("He said \"hi\"", "គាត់និយាយថា \"សួស្តី\"")]
        );
    }

    #[test]
    fn test_unescaped_quotes_inside_value() {
        let response = r#"{"english": "The "best" option", "khmer": "ជម្រើស "ល្អបំផុត""}"#;
        let pairs = parser().parse(response);
        assert_eq!(
            pairs,
            vec![AlignedPair::new("The \"best\" option", "ជម្រើស \"ល្អបំផុត\"")]
        );
    }

    #[test]
    fn test_unescape_keeps_unknown_escapes() {
        assert_eq!(unescape(r"a\qb"), r"a\qb");
        assert_eq!(unescape(r"path\/to"), "path/to");
        assert_eq!(unescape(r"back\\slash"), r"back\slash");
        assert_eq!(unescape("trailing\\"), "trailing\\");
    }

    // ==================== Degraded Input ====================

    #[test]
    fn test_refusal_yields_no_pairs() {
        assert!(parser().parse("Sorry, I cannot do that.").is_empty());
    }

    #[test]
    fn test_empty_response_yields_no_pairs() {
        assert!(parser().parse("").is_empty());
    }

    #[test]
    fn test_wrong_language_keys_yield_no_pairs() {
        let response = r#"{"french": "Bonjour", "khmer": "សួស្តី"}"#;
        assert!(parser().parse(response).is_empty());
    }

    #[test]
    fn test_duplicate_key_fragment_is_skipped() {
        let response = r#"{"english": "Hello", "english": "Hi"}
{"english": "Yes", "khmer": "បាទ"}"#;
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("Yes", "បាទ")]);
    }

    #[test]
    fn test_blank_field_is_skipped() {
        let response = r#"{"english": "   ", "khmer": "សួស្តី"}"#;
        assert!(parser().parse(response).is_empty());
    }

    #[test]
    fn test_unterminated_fragment_yields_no_pairs() {
        let response = r#"{"english": "Hello", "khmer": "សួស្តី""#;
        assert!(parser().parse(response).is_empty());
    }

    #[test]
    fn test_unclosed_fragment_does_not_swallow_the_next() {
        let response = "{\"english\": \"A\", \"khmer\": \"B\"\n{\"english\": \"C\", \"khmer\": \"D\"}";
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("C", "D")]);
    }

    #[test]
    fn test_fragment_with_extra_field_is_rejected() {
        let response = r#"{"english": "A", "khmer": "B", "note": "literal"}
{"english": "C", "note": "x", "khmer": "D"}
{"english": "E", "khmer": "F"}"#;
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("E", "F")]);
    }

    #[test]
    fn test_single_field_fragment_does_not_join_the_next() {
        let response = r#"{"english": "Hi"}
{"english": "Yes", "khmer": "Y"}"#;
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("Yes", "Y")]);
    }

    #[test]
    fn test_escaped_brace_inside_value() {
        let response = r#"{"english": "Use \{name\} here", "khmer": "ប្រើ"}"#;
        let pairs = parser().parse(response);
        assert_eq!(pairs, vec![AlignedPair::new(r"Use \{name\} here", "ប្រើ")]);
    }

    // ==================== Configured Languages ====================

    #[test]
    fn test_keys_follow_configured_languages() {
        let languages = LanguagePair::new(
            LanguageSpec::new("German", "DE").unwrap(),
            LanguageSpec::new("Japanese", "JA").unwrap(),
        )
        .unwrap();
        let parser = ResponseParser::new(&languages).unwrap();

        let response = r#"{"german": "Guten Morgen", "japanese": "おはよう"}
{"english": "Good morning", "khmer": "អរុណសួស្តី"}"#;
        let pairs = parser.parse(response);
        assert_eq!(pairs, vec![AlignedPair::new("Guten Morgen", "おはよう")]);
    }

    #[test]
    fn test_language_names_with_regex_metacharacters() {
        let languages = LanguagePair::new(
            LanguageSpec::new("C++ (en)", "EN").unwrap(),
            LanguageSpec::new("Khmer", "KM").unwrap(),
        )
        .unwrap();
        let parser = ResponseParser::new(&languages).unwrap();

        let pairs = parser.parse(r#"{"c++ (en)": "Hi", "khmer": "សួស្តី"}"#);
        assert_eq!(pairs, vec![AlignedPair::new("Hi", "សួស្តី")]);
    }

    #[test]
    fn test_extractor_trait_delegates_to_parse() {
        let extractor: &dyn PairExtractor = &parser();
        let pairs = extractor.extract(r#"{"english": "A", "khmer": "ក"}"#);
        assert_eq!(pairs, vec![AlignedPair::new("A", "ក")]);
    }

    proptest! {
        #[test]
        fn prop_n_fragments_yield_n_pairs_in_order(
            values in proptest::collection::vec(
                ("[a-zA-Z0-9][a-zA-Z0-9 .,]{0,20}", "[a-zA-Z0-9][a-zA-Z0-9 .,]{0,20}"),
                0..8,
            )
        ) {
            let response = values
                .iter()
                .map(|(s, t)| format!("Pair: {{\"english\": \" {} \", \"khmer\": \"{}\"}}", s, t))
                .collect::<Vec<_>>()
                .join("\nand then\n");

            let pairs = parser().parse(&response);
            prop_assert_eq!(pairs.len(), values.len());
            for (pair, (s, t)) in pairs.iter().zip(values.iter()) {
                prop_assert_eq!(&pair.source, s.trim());
                prop_assert_eq!(&pair.target, t.trim());
            }
        }

        #[test]
        fn prop_prose_without_braces_never_yields_pairs(text in "[^{}]*") {
            prop_assert!(parser().parse(&text).is_empty());
        }
    }
}
