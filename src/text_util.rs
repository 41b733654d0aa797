/// Marker appended to text cut short to fit a length budget.
pub const ELLIPSIS: &str = "...";

/// Maximum number of characters in a result preview before truncation.
pub const DEFAULT_SNIPPET_MAX_CHARS: usize = 240;

/// Lowercase `text` and strip the French diacritics that show up in
/// maintenance documents, so "Économiseur" and "economiseur" compare equal.
pub fn fold(text: &str) -> String {
    text.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'â' | 'ä' | 'á' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' | 'í' => 'i',
            'ô' | 'ö' | 'ó' => 'o',
            'ù' | 'û' | 'ü' | 'ú' => 'u',
            'ç' => 'c',
            'ÿ' => 'y',
            '’' => '\'',
            other => other,
        })
        .collect()
}

/// Fold text and reduce punctuation to single spaces, padded on both ends
/// so that `" eco bt "` only matches whole words.
pub fn normalize_words(text: &str) -> String {
    let folded: String = fold(text)
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let mut out = String::with_capacity(folded.len() + 2);
    out.push(' ');
    for word in folded.split_whitespace() {
        out.push_str(word);
        out.push(' ');
    }
    out
}

/// Substring test on [`normalize_words`] forms: case, accents and
/// punctuation are ignored, so "eco bt" is found in "l'éco-BT".
pub fn contains_words(haystack: &str, needle: &str) -> bool {
    let needle = normalize_words(needle);
    let needle = needle.trim();
    !needle.is_empty() && normalize_words(haystack).contains(needle)
}

/// Case- and accent-insensitive substring test.
pub fn contains_folded(haystack: &str, needle: &str) -> bool {
    let needle = fold(needle);
    !needle.is_empty() && fold(haystack).contains(&needle)
}

/// Return the first `max_chars` characters of `text`, never splitting a
/// multi-byte character.
pub fn take_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

/// Number of characters (not bytes) in `text`.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Short text written entirely in capitals reads as a heading in scanned
/// reports and exported word-processor files.
pub fn looks_like_heading(text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() || char_len(text) >= 100 {
        return false;
    }
    let mut has_letter = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_alphabetic() {
            has_letter = true;
        }
    }
    has_letter
}

/// Split text into paragraphs on blank lines, trimming each one.
pub fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim());
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join("\n"));
    }
    paragraphs
}

/// Extract a one-line preview around the first occurrence of `query` in
/// `text`, falling back to the start of the text when it does not occur.
/// Returns `None` if the text is empty.
pub fn extract_snippet(text: &str, query: &str) -> Option<String> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    let start = query
        .split_whitespace()
        .find_map(|word| {
            lines.iter().position(|line| contains_folded(line, word))
        })
        .unwrap_or(0);

    let joined = lines[start..].join(" ");
    if char_len(&joined) > DEFAULT_SNIPPET_MAX_CHARS {
        let mut snippet =
            take_chars(&joined, DEFAULT_SNIPPET_MAX_CHARS).to_string();
        snippet.push_str(ELLIPSIS);
        Some(snippet)
    } else {
        Some(joined)
    }
}
