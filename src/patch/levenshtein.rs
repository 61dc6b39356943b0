//! Levenshtein edit distance.
//!
//! Used only by diagnostics, to score how close a candidate location's
//! surrounding text is to the context the collaborator supplied. Matching
//! itself is exact and never consults this module.

/// Maximum character count for Levenshtein inputs.
///
/// Context strings are short; anything longer gets a pessimistic estimate
/// instead of an O(m*n) table.
const MAX_LEVENSHTEIN_INPUT: usize = 2_000;

/// Minimum number of single-character insertions, deletions and
/// substitutions turning `a` into `b`.
///
/// Oversized inputs and pairs whose lengths differ by more than a third
/// return `max(m, n)` without computing the table.
#[must_use]
pub fn distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let m = a_chars.len();
    let n = b_chars.len();

    if m == 0 {
        return n;
    }
    if n == 0 {
        return m;
    }

    let max_len = m.max(n);
    if m > MAX_LEVENSHTEIN_INPUT || n > MAX_LEVENSHTEIN_INPUT {
        return max_len;
    }
    if m.abs_diff(n) > max_len / 3 {
        return max_len;
    }

    let mut prev: Vec<usize> = (0..=n).collect();
    let mut curr = vec![0usize; n + 1];

    for i in 1..=m {
        curr[0] = i;
        for j in 1..=n {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[n]
}

/// Similarity ratio in `0.0..=1.0`, by character count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - (distance(a, b) as f64 / max_len as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical() {
        assert_eq!(distance("Click here", "Click here"), 0);
        assert!((similarity("Save now", "Save now") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty() {
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("abc", ""), 3);
        assert_eq!(distance("", ""), 0);
    }

    #[test]
    fn test_classic() {
        assert_eq!(distance("kitten", "sitting"), 3);
    }

    #[test]
    fn test_multibyte_counts_chars() {
        assert_eq!(distance("it\u{2019}s", "it's"), 1);
        assert!((similarity("it\u{2019}s", "it's") - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_similarity_range() {
        let s = similarity("before this", "after that");
        assert!((0.0..=1.0).contains(&s));
    }
}
