//! Sentence boundary detection for normalized text.

/// Tokens that end with a period without ending a sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "vs", "etc", "inc", "ltd", "co",
    "corp", "no", "nos", "fig", "figs", "approx", "dept", "est", "gov", "gen", "col", "lt",
    "sgt", "capt", "rev", "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct",
    "nov", "dec", "e.g", "i.e", "u.s", "u.k", "a.m", "p.m", "ph.d", "al",
];

fn is_terminator(ch: char) -> bool {
    matches!(ch, '.' | '!' | '?')
}

fn is_closer(ch: char) -> bool {
    matches!(ch, '"' | '\'' | ')' | ']' | '\u{201d}' | '\u{2019}')
}

fn is_opener(ch: char) -> bool {
    matches!(ch, '"' | '\'' | '(' | '[' | '\u{201c}' | '\u{2018}')
}

/// Whether the word right before a period is an abbreviation or an initial.
fn is_abbreviation(before: &str) -> bool {
    let token = before
        .rsplit(char::is_whitespace)
        .next()
        .unwrap_or_default()
        .trim_start_matches(is_opener);
    if token.is_empty() {
        return false;
    }
    let lower = token.to_lowercase();
    if ABBREVIATIONS.contains(&lower.as_str()) {
        return true;
    }
    let mut chars = token.chars();
    if let (Some(first), None) = (chars.next(), chars.next()) {
        // Single-letter initials such as "J." in "J. Smith".
        return first.is_alphabetic();
    }
    // Dotted forms like "U.S.A" where every segment is one or two letters.
    token.contains('.')
        && token
            .split('.')
            .all(|seg| !seg.is_empty() && seg.chars().count() <= 2 && seg.chars().all(char::is_alphabetic))
}

/// Whether the text after index `from` starts a new sentence.
fn starts_new_sentence(chars: &[(usize, char)], from: usize) -> bool {
    match chars[from..].iter().map(|(_, c)| *c).find(|c| !c.is_whitespace()) {
        Some(c) => c.is_uppercase() || c.is_ascii_digit() || is_opener(c),
        None => true,
    }
}

/// Splits text into sentences.
///
/// A boundary follows `.`, `!` or `?` (plus any closing quotes or brackets)
/// when whitespace follows and the next word starts with an uppercase
/// letter, a digit or an opening quote. Abbreviations and initials do not
/// end a sentence. Returned slices are trimmed and borrow from `text`.
#[must_use]
pub fn split_sentences(text: &str) -> Vec<&str> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < chars.len() {
        let (pos, ch) = chars[i];
        if !is_terminator(ch) {
            i += 1;
            continue;
        }

        let mut j = i + 1;
        while j < chars.len() && (is_terminator(chars[j].1) || is_closer(chars[j].1)) {
            j += 1;
        }
        let end = chars.get(j).map_or(text.len(), |(b, _)| *b);
        let at_end = j >= chars.len();
        let boundary = at_end
            || (chars[j].1.is_whitespace()
                && starts_new_sentence(&chars, j)
                && !(ch == '.' && is_abbreviation(&text[start..pos])));

        if boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
        i = j;
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}
