//! Filter conversion to Qdrant `Filter`.

use crate::record::PaperFilter;
use qdrant_client::qdrant::{
    Condition, FieldCondition, Filter, Match, condition::ConditionOneOf, r#match::MatchValue,
};
use tracing::debug;

/// Payload field carrying the owning paper id.
pub const PAPER_ID_FIELD: &str = "paper_id";

/// Converts [`PaperFilter`] to a Qdrant [`Filter`]: one `should` keyword
/// condition per paper id, so a chunk matches when it belongs to any of them.
pub fn to_qdrant_filter(f: &PaperFilter) -> Filter {
    debug!("filters::to_qdrant_filter paper_ids={}", f.paper_ids.len());

    let should = f
        .paper_ids
        .iter()
        .map(|id| Condition {
            condition_one_of: Some(ConditionOneOf::Field(FieldCondition {
                key: PAPER_ID_FIELD.to_string(),
                r#match: Some(Match {
                    match_value: Some(MatchValue::Keyword(id.clone())),
                }),
                ..Default::default()
            })),
        })
        .collect();

    Filter {
        should,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_should_condition_per_paper() {
        let f = to_qdrant_filter(&PaperFilter::new(["p1", "p2"]));
        assert_eq!(f.should.len(), 2);
        assert!(f.must.is_empty());
    }
}
