//! Prompt builder: labeled context blocks under a character budget.

use crate::candidate::Candidate;
use crate::mode::AnswerMode;

/// Build the user prompt for `mode` with ranked context compacted into at
/// most `max_chars` of context text.
///
/// Each block is headed `[Context i - Paper ID: x, Chunk n] title`. Modes
/// that reason across papers get the blocks grouped per paper, in order of
/// each paper's first appearance. Ranking order is otherwise preserved.
pub fn build_user_prompt(
    mode: AnswerMode,
    question: &str,
    ctx: &[Candidate],
    max_chars: usize,
) -> String {
    let mut out = String::new();
    out.push_str("Question:\n");
    out.push_str(mode.generation_question(question.trim()).as_str());
    out.push_str("\n\n");

    if ctx.is_empty() {
        return out;
    }

    let ordered = if mode.groups_by_paper() {
        group_by_paper(ctx)
    } else {
        ctx.iter().collect()
    };

    out.push_str("Context:\n");
    let mut budget = max_chars;
    let mut current_paper: Option<&str> = None;

    for (i, c) in ordered.iter().enumerate() {
        if mode.groups_by_paper() && current_paper != Some(c.paper_id()) {
            current_paper = Some(c.paper_id());
            let group = format!("\n## Paper {}\n", c.paper_id());
            if group.len() >= budget {
                break;
            }
            out.push_str(&group);
            budget -= group.len();
        }

        let header = format!(
            "[Context {} - Paper ID: {}, Chunk {}] {}\n",
            i + 1,
            c.paper_id(),
            c.chunk.position,
            c.chunk.meta.title.trim()
        );
        let text = c.chunk.text.trim();

        if header.len() >= budget {
            break;
        }
        out.push_str(&header);
        budget -= header.len();

        let take = budget.saturating_sub(2);
        if text.len() > take {
            out.push_str(safe_truncate(text, take));
            out.push_str("\n…\n");
            break;
        }
        out.push_str(text);
        out.push('\n');
        budget -= text.len() + 1;
    }

    out.push('\n');
    out.push_str("Answer using only the context above and cite papers by their Paper ID.\n");
    out
}

fn group_by_paper(ctx: &[Candidate]) -> Vec<&Candidate> {
    let mut papers: Vec<&str> = Vec::new();
    for c in ctx {
        if !papers.contains(&c.paper_id()) {
            papers.push(c.paper_id());
        }
    }
    papers
        .into_iter()
        .flat_map(move |p| ctx.iter().filter(move |c| c.paper_id() == p))
        .collect()
}

/// Longest prefix of `s` no longer than `max` bytes ending on a char boundary.
pub(crate) fn safe_truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        s
    } else {
        let mut end = max;
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        &s[..end]
    }
}
