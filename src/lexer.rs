//! Lexical utilities: comment truncation, backslash-continuation joining, and a quote/bracket-aware
//! scanner used by the classifier, directive recognizer, and expression evaluator to find
//! top-level delimiters without being fooled by nested `[...]` or `"..."` regions.

const COMMENT_INDICATOR: char = '#';

/// Truncate a line at the first unquoted `#`.
pub fn truncate_comments(line: &str) -> &str {
    let mut in_quotes = false;
    let mut prev_escape = false;

    for (i, c) in line.char_indices() {
        match c {
            '"' if !prev_escape => in_quotes = !in_quotes,
            COMMENT_INDICATOR if !in_quotes => return &line[..i],
            _ => {}
        }
        prev_escape = c == '\\' && !prev_escape;
    }

    line
}

/// If `next` ends with a backslash, strip it (and any whitespace immediately preceding it) and
/// append to `accumulator` with exactly one interposed space if the accumulator is non-empty.
/// Returns `(joined, still_continuing)`.
pub fn join_line(accumulator: &str, next: &str) -> (String, bool) {
    if let Some(stripped) = next.strip_suffix('\\') {
        let stripped = stripped.trim_end();
        let joined = if accumulator.is_empty() {
            stripped.to_string()
        } else {
            format!("{} {}", accumulator, stripped)
        };
        (joined, true)
    } else {
        let joined = if accumulator.is_empty() {
            next.to_string()
        } else {
            format!("{} {}", accumulator, next)
        };
        (joined, false)
    }
}

/// Scan `s` for the first top-level (bracket-depth `0`, outside `"..."`) occurrence of any
/// character in `needles`, tracking `[`/`]` depth. Returns the byte offset and the matched
/// character.
pub fn find_top_level(s: &str, needles: &[char]) -> Option<(usize, char)> {
    let mut depth: i32 = 0;
    let mut in_quotes = false;

    for (i, c) in s.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            '[' if !in_quotes => depth += 1,
            ']' if !in_quotes => depth -= 1,
            _ if !in_quotes && depth <= 0 && needles.contains(&c) => return Some((i, c)),
            _ => {}
        }
    }

    None
}

/// Split `s` at the leftmost top-level occurrence of `needle`, tracking `[`/`]` depth and
/// `"..."` quoting. Returns `(before, after)` with `needle` itself excluded from both halves.
pub fn split_top_level(s: &str, needle: char) -> Option<(&str, &str)> {
    let (i, _) = find_top_level(s, &[needle])?;
    Some((&s[..i], &s[i + needle.len_utf8()..]))
}

/// Split `s` on whitespace, honoring `"..."` quoting so quoted text containing spaces stays
/// together. Surrounding quotes are stripped from each returned token. Delegates to `shlex` for
/// the quote-aware splitting itself.
pub fn split_whitespace_quoted(s: &str) -> Vec<String> {
    shlex::Shlex::new(s).collect()
}
