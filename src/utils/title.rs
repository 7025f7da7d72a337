//! Title normalization used as the deduplication key for papers and publications.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a title into its matching key.
///
/// Diacritics are stripped, the text is lower-cased, punctuation is dropped and
/// whitespace runs collapse to a single space. Two titles name the same entity
/// iff their keys are equal; an empty key means the title is unusable.
pub fn normalize_title(title: &str) -> String {
    let folded: String = title
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace runs in free text (abstracts, author names) without
/// touching case or punctuation.
pub fn clean_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("Hello, World!"), "hello world");
        assert_eq!(normalize_title("Test   Title"), "test title");
        assert_eq!(normalize_title("Test: A-B/C"), "test abc");
        assert_eq!(normalize_title(""), "");
        assert_eq!(normalize_title("   "), "");
    }

    #[test]
    fn test_punctuation_and_case_are_ignored() {
        assert_eq!(normalize_title("Foo: A Study"), normalize_title("foo a study"));
        assert_ne!(normalize_title("Foo"), normalize_title("Foobar"));
    }

    #[test]
    fn test_diacritics_are_stripped() {
        assert_eq!(
            normalize_title("Análise de Séries Temporais"),
            "analise de series temporais"
        );
        assert_eq!(normalize_title("Über Ähnlichkeit"), "uber ahnlichkeit");
        assert_eq!(
            normalize_title("Naïve Bayes revisited"),
            normalize_title("NAIVE BAYES  REVISITED.")
        );
    }

    #[test]
    fn test_whitespace_is_collapsed() {
        assert_eq!(normalize_title("\n  deep\tlearning \r\n for  graphs "), "deep learning for graphs");
    }

    #[test]
    fn test_punctuation_only_title_is_unusable() {
        assert_eq!(normalize_title(" -- : ?! "), "");
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  A  long\n abstract "), "A long abstract");
    }
}
