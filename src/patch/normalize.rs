//! Text normalization with a reversible offset map.
//!
//! Decodes character references, folds typographic variants to ASCII,
//! drops zero-width characters and collapses whitespace runs. For every byte
//! of the normalized output the view records the raw byte range it came
//! from, so a match found in normalized text can be mapped back onto the
//! raw string and rewritten there.

/// Named references decoded by the normalizer. Anything else is left as is.
const NAMED_ENTITIES: &[(&str, char)] = &[
    ("nbsp", '\u{00A0}'),
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("sbquo", '\u{201A}'),
    ("ldquo", '\u{201C}'),
    ("rdquo", '\u{201D}'),
    ("bdquo", '\u{201E}'),
    ("ndash", '\u{2013}'),
    ("mdash", '\u{2014}'),
    ("hellip", '\u{2026}'),
    ("thinsp", '\u{2009}'),
    ("ensp", '\u{2002}'),
    ("emsp", '\u{2003}'),
];

/// Longest reference we bother scanning for, `&#x10FFFF;` included.
const MAX_ENTITY_LEN: usize = 10;

/// Normalized text plus the raw span behind each of its bytes.
///
/// `map_start[i]..map_end[i]` is the raw range that produced normalized
/// byte `i`. Both vectors are non-decreasing and have `text.len()` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedView {
    pub text: String,
    pub map_start: Vec<usize>,
    pub map_end: Vec<usize>,
}

impl NormalizedView {
    fn push(&mut self, ch: char, raw_start: usize, raw_end: usize) {
        for _ in 0..ch.len_utf8() {
            self.map_start.push(raw_start);
            self.map_end.push(raw_end);
        }
        self.text.push(ch);
    }

    /// Map a normalized byte span back to the raw span that produced it.
    ///
    /// A span that covers only part of what one raw unit produced (one dot
    /// of an expanded `…`) has no raw counterpart and yields `None`.
    #[must_use]
    pub fn to_raw_span(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        if start >= end
            || end > self.text.len()
            || !self.text.is_char_boundary(start)
            || !self.text.is_char_boundary(end)
        {
            return None;
        }
        let cuts_start = start > 0 && self.same_unit(start - 1, start);
        let cuts_end = end < self.text.len() && self.same_unit(end - 1, end);
        if cuts_start || cuts_end {
            return None;
        }
        Some((self.map_start[start], self.map_end[end - 1]))
    }

    /// Whether normalized bytes `a` and `b` come from the same raw unit.
    fn same_unit(&self, a: usize, b: usize) -> bool {
        self.map_start[a] == self.map_start[b] && self.map_end[a] == self.map_end[b]
    }
}

/// Normalize `raw` and keep the offset map.
#[must_use]
pub fn normalize_and_map(raw: &str) -> NormalizedView {
    let mut view = NormalizedView::default();
    let mut pending_space: Option<(usize, usize)> = None;

    for (start, end, ch) in decode_units(raw) {
        if is_zero_width(ch) {
            continue;
        }
        if ch.is_whitespace() {
            pending_space = Some(pending_space.map_or((start, end), |(s, _)| (s, end)));
            continue;
        }
        if let Some((s, e)) = pending_space.take() {
            view.push(' ', s, e);
        }
        if ch == '\u{2026}' {
            for _ in 0..3 {
                view.push('.', start, end);
            }
        } else {
            view.push(fold_typographic(ch), start, end);
        }
    }

    if let Some((s, e)) = pending_space {
        view.push(' ', s, e);
    }

    view
}

/// Normalized text only, for comparisons and counting.
#[must_use]
pub fn normalize_only(s: &str) -> String {
    normalize_and_map(s).text
}

/// Map a normalized span of `view` back to raw coordinates.
#[must_use]
pub fn map_norm_span_to_raw_span(view: &NormalizedView, start: usize, end: usize) -> Option<(usize, usize)> {
    view.to_raw_span(start, end)
}

/// Decode character references without any further folding.
#[must_use]
pub fn decode_entities(raw: &str) -> String {
    decode_units(raw).map(|(_, _, ch)| ch).collect()
}

/// Whether byte offset `pos` falls strictly inside a character reference.
#[must_use]
pub fn inside_entity(raw: &str, pos: usize) -> bool {
    decode_units(raw)
        .take_while(|(start, _, _)| *start < pos)
        .any(|(start, end, _)| end - start > 1 && start < pos && pos < end)
}

/// Non-overlapping occurrences of `needle` in `haystack`.
#[must_use]
pub fn count_occurrences(haystack: &str, needle: &str) -> usize {
    if needle.is_empty() {
        return 0;
    }
    haystack.matches(needle).count()
}

/// Iterate `(raw_start, raw_end, decoded_char)` over `raw`.
fn decode_units(raw: &str) -> impl Iterator<Item = (usize, usize, char)> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        let ch = raw[pos..].chars().next()?;
        let start = pos;
        if ch == '&' {
            if let Some((decoded, len)) = decode_reference(&raw[pos..]) {
                pos += len;
                return Some((start, pos, decoded));
            }
        }
        pos += ch.len_utf8();
        Some((start, pos, ch))
    })
}

/// Decode the reference at the start of `s` (which begins with `&`).
fn decode_reference(s: &str) -> Option<(char, usize)> {
    let semi = s
        .bytes()
        .take(MAX_ENTITY_LEN + 1)
        .position(|b| b == b';')?;
    let body = &s[1..semi];

    let decoded = if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        char::from_u32(code)?
    } else {
        NAMED_ENTITIES
            .iter()
            .find(|(name, _)| *name == body)
            .map(|(_, ch)| *ch)?
    };

    Some((decoded, semi + 1))
}

fn is_zero_width(ch: char) -> bool {
    matches!(
        ch,
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}'
    )
}

fn fold_typographic(ch: char) -> char {
    match ch {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{2033}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}' | '\u{2212}' => {
            '-'
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entities_and_quotes() {
        assert_eq!(normalize_only("It&rsquo;s &ldquo;ok&rdquo;"), "It's \"ok\"");
        assert_eq!(normalize_only("a&#8212;b&#x2013;c"), "a-b-c");
        assert_eq!(normalize_only("Tom &amp; Jerry"), "Tom & Jerry");
    }

    #[test]
    fn test_unknown_entity_passes_through() {
        assert_eq!(normalize_only("&bogus; &amp"), "&bogus; &amp");
    }

    #[test]
    fn test_whitespace_collapse() {
        assert_eq!(normalize_only("a \n\t b&nbsp;&nbsp;c"), "a b c");
        assert_eq!(normalize_only("x\u{200B}y"), "xy");
        assert_eq!(normalize_only("wait\u{2026}"), "wait...");
    }

    #[test]
    fn test_offset_map_round_trip() {
        let raw = "It&rsquo;s  great";
        let view = normalize_and_map(raw);
        assert_eq!(view.text, "It's great");
        assert_eq!(view.map_start.len(), view.text.len());

        let start = view.text.find("'s g").expect("present");
        let (rs, re) = view.to_raw_span(start, start + 4).expect("mappable");
        assert_eq!(&raw[rs..re], "&rsquo;s  g");
    }

    #[test]
    fn test_map_is_monotonic() {
        let view = normalize_and_map("a&amp;b \u{2026} c\u{200D}d");
        assert!(view.map_start.windows(2).all(|w| w[0] <= w[1]));
        assert!(view.map_end.windows(2).all(|w| w[0] <= w[1]));
        assert!(view.map_start.iter().zip(&view.map_end).all(|(s, e)| e >= s));
    }

    #[test]
    fn test_inside_entity() {
        let raw = "R&amp;D";
        assert!(inside_entity(raw, 3));
        assert!(!inside_entity(raw, 1));
        assert!(!inside_entity(raw, 6));
    }

    #[test]
    fn test_empty_span_is_unmappable() {
        let view = normalize_and_map("abc");
        assert_eq!(view.to_raw_span(1, 1), None);
        assert_eq!(view.to_raw_span(0, 9), None);
    }

    #[test]
    fn test_partial_ellipsis_is_unmappable() {
        let raw = "Wait\u{2026} more";
        let view = normalize_and_map(raw);
        assert_eq!(view.text, "Wait... more");

        assert_eq!(view.to_raw_span(0, 5), None);
        assert_eq!(view.to_raw_span(5, 7), None);
        let (rs, re) = view.to_raw_span(0, 7).expect("whole glyph");
        assert_eq!(&raw[rs..re], "Wait\u{2026}");
    }
}
