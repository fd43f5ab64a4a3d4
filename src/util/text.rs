use rapidfuzz::fuzz;
use std::borrow::Cow;

/// English stop words dropped by [`clean_title`].
///
/// Contractions are listed without their apostrophe form because punctuation
/// is replaced by spaces before words are compared.
const STOP_WORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "should", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain", "aren", "couldn", "didn",
    "doesn", "hadn", "hasn", "haven", "isn", "ma", "mightn", "mustn", "needn", "shan",
    "shouldn", "wasn", "weren", "won", "wouldn",
];

/// Word characters match the `\w` class: Unicode alphanumerics plus underscore.
fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Normalises an entry title for exact duplicate grouping.
///
/// Lowercases, drops anything that is neither a word character nor
/// whitespace, collapses whitespace runs and trims.
///
/// ```
/// use miniflux_janitor::util::normalise_title;
///
/// assert_eq!(normalise_title("  Arsenal 2-1   Spurs! "), "arsenal 21 spurs");
/// ```
pub fn normalise_title(title: &str) -> String {
    let kept: String = title
        .to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reduces a title to its sorted content words for fuzzy comparison.
///
/// Punctuation becomes a word break, stop words are removed and the
/// remaining lowercase words are sorted, so word order stops mattering.
pub fn clean_title(title: &str) -> String {
    let spaced: String = title
        .chars()
        .map(|c| if is_word_char(c) || c.is_whitespace() { c } else { ' ' })
        .collect();

    let mut words: Vec<String> = spaced
        .split_whitespace()
        .map(str::to_lowercase)
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
        .collect();
    words.sort();
    words.join(" ")
}

/// Similarity of two strings on a 0-100 scale after sorting their words.
///
/// The score is rapidfuzz's indel ratio over the word-sorted strings:
/// `100 * (1 - indel_distance / (len_a + len_b))`. Two empty strings are
/// identical (100).
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    let a = sort_tokens(a);
    let b = sort_tokens(b);
    if a.is_empty() && b.is_empty() {
        return 100.0;
    }

    fuzz::ratio(a.chars(), b.chars()) * 100.0
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

/// Removes control characters and ANSI CSI sequences from feed-supplied text
/// before it reaches the terminal or the log.
///
/// Tabs are kept. Returns `Cow::Borrowed` when nothing needed stripping.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if !s.chars().any(|c| c.is_control() && c != '\t') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                // Parameter bytes run until the final byte in '@'..='~'
                for next in chars.by_ref() {
                    if ('@'..='~').contains(&next) {
                        break;
                    }
                }
            }
            continue;
        }
        if c.is_control() && c != '\t' {
            continue;
        }
        out.push(c);
    }
    Cow::Owned(out)
}
