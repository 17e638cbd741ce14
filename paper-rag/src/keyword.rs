//! Lexical scoring: token-set Jaccard blended with query-token precision.

use std::collections::HashSet;

/// Lowercased word tokens longer than two characters.
///
/// Punctuation separates tokens, so `self-attention` yields `self` and `attention`.
pub fn tokens(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() > 2)
        .map(str::to_owned)
        .collect()
}

/// Keyword score in `[0, 1]`.
///
/// `jaccard_share * |Q ∩ D| / |Q ∪ D| + (1 - jaccard_share) * |Q ∩ D| / |Q|`.
/// An empty query token set scores 0.
pub fn keyword_score(query: &HashSet<String>, text: &str, jaccard_share: f32) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let doc = tokens(text);
    let inter = query.intersection(&doc).count() as f32;
    let union = query.union(&doc).count() as f32;

    let jaccard = if union > 0.0 { inter / union } else { 0.0 };
    let precision = inter / query.len() as f32;
    let share = jaccard_share.clamp(0.0, 1.0);

    (share * jaccard + (1.0 - share) * precision).clamp(0.0, 1.0)
}

/// Fraction of query tokens that appear in `title`.
pub fn title_match(query: &HashSet<String>, title: &str) -> f32 {
    if query.is_empty() {
        return 0.0;
    }
    let title = tokens(title);
    query.iter().filter(|t| title.contains(*t)).count() as f32 / query.len() as f32
}
