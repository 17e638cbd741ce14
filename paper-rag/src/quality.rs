//! Paper-level quality signal used as a rerank tie-breaker.

use paper_store::PaperMeta;

const CITATION_SATURATION: f64 = 1000.0;

/// Quality in `[0, 1]` from citations, recency, availability and metadata completeness.
///
/// | signal | weight |
/// |---|---|
/// | citations, `ln(1+c) / ln(1000)` capped at 1 | 0.30 |
/// | recency band | 0.20 |
/// | PDF link present | 0.15 |
/// | curated source (`arxiv`, `semantic_scholar`) | 0.10 |
/// | abstract longer than 200 chars | 0.10 |
/// | two or more authors | 0.05 |
/// | title of 5 to 20 words | 0.05 |
pub fn quality_score(meta: &PaperMeta, current_year: i32) -> f32 {
    let mut score = 0.0f64;

    if let Some(c) = meta.citation_count {
        let norm = (1.0 + f64::from(c)).ln() / CITATION_SATURATION.ln();
        score += norm.min(1.0) * 0.3;
    }

    if let Some(year) = meta.year {
        score += recency(current_year - year) * 0.2;
    }

    if meta.pdf_url.as_deref().is_some_and(|u| !u.trim().is_empty()) {
        score += 0.15;
    }

    let source = meta.source.to_ascii_lowercase();
    if source == "arxiv" || source == "semantic_scholar" {
        score += 0.1;
    }

    if meta
        .abstract_text
        .as_deref()
        .is_some_and(|a| a.chars().count() > 200)
    {
        score += 0.1;
    }

    if meta.authors.len() >= 2 {
        score += 0.05;
    }

    let title_words = meta.title.split_whitespace().count();
    if (5..=20).contains(&title_words) {
        score += 0.05;
    }

    score.min(1.0) as f32
}

/// Newer is better; papers dated in the future count as current.
fn recency(age: i32) -> f64 {
    match age {
        i32::MIN..=1 => 1.0,
        2..=5 => 0.8,
        6..=10 => 0.6,
        _ => (1.0 - f64::from(age) / 50.0).max(0.3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> PaperMeta {
        PaperMeta {
            title: "Attention Is All You Need".into(),
            authors: vec!["Vaswani".into(), "Shazeer".into()],
            year: Some(2017),
            source: "arxiv".into(),
            citation_count: Some(999),
            pdf_url: Some("https://arxiv.org/pdf/1706.03762".into()),
            abstract_text: Some("x".repeat(300)),
        }
    }

    #[test]
    fn fully_populated_paper_scores_high() {
        let s = quality_score(&meta(), 2018);
        assert!((s - 0.95).abs() < 1e-4, "got {s}");
    }

    #[test]
    fn empty_metadata_scores_zero() {
        assert_eq!(quality_score(&PaperMeta::default(), 2025), 0.0);
    }

    #[test]
    fn old_papers_keep_a_recency_floor() {
        let mut m = PaperMeta {
            year: Some(1950),
            ..PaperMeta::default()
        };
        let s = quality_score(&m, 2025);
        assert!((s - 0.3 * 0.2).abs() < 1e-6);

        m.year = Some(2030);
        assert!((quality_score(&m, 2025) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn citations_are_log_scaled() {
        let few = PaperMeta {
            citation_count: Some(9),
            ..PaperMeta::default()
        };
        let many = PaperMeta {
            citation_count: Some(100_000),
            ..PaperMeta::default()
        };
        let a = quality_score(&few, 2025);
        let b = quality_score(&many, 2025);
        assert!(a > 0.0 && a < b);
        assert!((b - 0.3).abs() < 1e-6);
    }
}
