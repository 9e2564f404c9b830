use std::borrow::Cow;
use std::ops::Range;

/// Invisible / zero-width code points that upstream editors interleave into
/// template text without changing what the author sees.
///
/// Stripped (or skipped) when deciding whether a token matches; never
/// stripped from replacement values.
pub const INVISIBLE_CHARS: [char; 11] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM / zero-width no-break space
    '\u{00A0}', // no-break space
    '\u{202F}', // narrow no-break space
    '\u{200A}', // hair space
    '\u{2009}', // thin space
    '\u{2028}', // line separator
    '\u{2029}', // paragraph separator
];

pub fn is_invisible(c: char) -> bool {
    INVISIBLE_CHARS.contains(&c)
}

/// Remove every invisible code point. Borrows when the input is already
/// clean, which is the overwhelmingly common case.
pub fn strip_invisible(s: &str) -> Cow<'_, str> {
    if !s.chars().any(is_invisible) {
        return Cow::Borrowed(s);
    }
    Cow::Owned(s.chars().filter(|c| !is_invisible(*c)).collect())
}

/// Find `needle` in `haystack`, tolerating any number of invisible code
/// points *between* the needle's characters. Returns the byte range of the
/// raw occurrence (invisibles included) so the caller can splice a
/// replacement into the original string.
///
/// With no invisibles present this degrades to a plain substring search, so
/// it is the single lookup primitive for the block-reconstruction pass.
pub fn find_ignoring_invisible(haystack: &str, needle: &str) -> Option<Range<usize>> {
    if needle.is_empty() {
        return None;
    }
    let chars: Vec<(usize, char)> = haystack.char_indices().collect();
    let needle_chars: Vec<char> = needle.chars().collect();

    'starts: for start in 0..chars.len() {
        if chars[start].1 != needle_chars[0] {
            continue;
        }
        let mut pos = start + 1;
        let mut end = chars[start].0 + chars[start].1.len_utf8();
        for &expected in &needle_chars[1..] {
            // Skip invisibles sitting between the token's characters.
            while pos < chars.len() && is_invisible(chars[pos].1) {
                pos += 1;
            }
            match chars.get(pos) {
                Some(&(idx, c)) if c == expected => {
                    end = idx + c.len_utf8();
                    pos += 1;
                }
                _ => continue 'starts,
            }
        }
        return Some(chars[start].0..end);
    }
    None
}
