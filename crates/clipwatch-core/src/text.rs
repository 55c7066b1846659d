//! Text canonicalization and edit-distance similarity for fuzzy keyword
//! matching. Chat spam leans on elongation ("Pogggg") and decoration
//! ("!!!"), so comparison happens on a collapsed ASCII-alphanumeric form.

/// Canonical comparison form: ASCII alphanumerics only, lowercased, with
/// runs of the same character collapsed ("WWWW" -> "w", "haaaa" -> "ha").
/// Idempotent; empty input stays empty.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut prev = '\0';
    for ch in text.chars() {
        if !ch.is_ascii_alphanumeric() {
            continue;
        }
        let ch = ch.to_ascii_lowercase();
        if ch != prev {
            out.push(ch);
            prev = ch;
        }
    }
    out
}

/// Levenshtein similarity in [0, 1]: `1 - distance / max_len`.
///
/// Operates on the strings as given; callers normalize first. Both empty
/// compares as identical, one empty as entirely dissimilar.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    1.0 - levenshtein(&a, &b) as f64 / max_len as f64
}

/// Classic unit-cost edit distance, two-row rolling table. The row is the
/// shorter string, so space is O(min(|a|, |b|)).
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };

    let mut prev: Vec<usize> = (0..=short.len()).collect();
    let mut curr = vec![0usize; short.len() + 1];

    for (i, lc) in long.iter().enumerate() {
        curr[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let substitution = prev[j] + usize::from(lc != sc);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}
