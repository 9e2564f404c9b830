use gabarit_model::{Block, Run};

use crate::catalog::TokenCatalog;
use crate::invisible::{find_ignoring_invisible, strip_invisible};

/// The outcome of running the substitution passes over one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockEdit {
    /// No token matched; the block is untouched.
    Unchanged,
    /// Run-exact pass: individual runs rewritten in place, styling kept.
    Spans(Vec<(usize, String)>),
    /// Reconstruction pass: the block collapses onto a single run carrying
    /// the full replaced text. Styling internal to the block is lost.
    Collapse(String),
}

impl BlockEdit {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, BlockEdit::Unchanged)
    }
}

/// Run the run-exact pass, then the block-reconstruction pass, over one
/// block. Pure: the block is not mutated; the caller applies the edit.
pub fn substitute_block(block: &Block, catalog: &TokenCatalog) -> BlockEdit {
    let mut texts: Vec<String> = block.runs.iter().map(|r| r.text.clone()).collect();
    let mut span_edits: Vec<(usize, String)> = Vec::new();

    // Pass 1: a run whose cleaned, trimmed text equals a token exactly.
    for (idx, text) in texts.iter_mut().enumerate() {
        let cleaned = strip_invisible(text);
        let trimmed = cleaned.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(binding) = catalog
            .iter()
            .find(|b| !b.token.is_empty() && b.token == trimmed)
        {
            span_edits.push((idx, binding.value.clone()));
            *text = binding.value.clone();
        }
    }

    // Pass 2: tokens still present in the concatenated text (fragmented
    // across runs, possibly with invisibles interleaved).
    let joined = texts.concat();
    if let Some(replaced) = replace_all_tokens(&joined, catalog) {
        return BlockEdit::Collapse(replaced);
    }

    if span_edits.is_empty() {
        BlockEdit::Unchanged
    } else {
        BlockEdit::Spans(span_edits)
    }
}

/// Single-string variant for spreadsheet cells: exact match first, then
/// substring / gap-tolerant replacement. Returns `None` when nothing
/// matched.
pub fn substitute_text(text: &str, catalog: &TokenCatalog) -> Option<String> {
    let cleaned = strip_invisible(text);
    let trimmed = cleaned.trim();
    if let Some(binding) = catalog
        .iter()
        .find(|b| !b.token.is_empty() && b.token == trimmed)
    {
        return Some(binding.value.clone());
    }
    replace_all_tokens(text, catalog)
}

/// Replace every occurrence of every token, longest token first. Returns
/// `None` when no occurrence was found.
fn replace_all_tokens(text: &str, catalog: &TokenCatalog) -> Option<String> {
    let mut out = text.to_string();
    let mut changed = false;

    for binding in catalog.iter() {
        if binding.token.is_empty() {
            continue;
        }
        // Resume searching after each splice so a value that happens to
        // contain token characters can never be re-matched.
        let mut search_from = 0usize;
        while search_from < out.len() {
            let Some(range) = find_ignoring_invisible(&out[search_from..], &binding.token) else {
                break;
            };
            let start = search_from + range.start;
            let end = search_from + range.end;
            out.replace_range(start..end, &binding.value);
            search_from = start + binding.value.len();
            changed = true;
        }
    }

    changed.then_some(out)
}

/// Apply an edit to a block, enforcing the collapse ownership rule: all
/// runs cleared, full text on the first surviving run (created when the
/// block had none).
pub fn apply_edit(block: &mut Block, edit: &BlockEdit) {
    match edit {
        BlockEdit::Unchanged => {}
        BlockEdit::Spans(edits) => {
            for (idx, text) in edits {
                if let Some(run) = block.runs.get_mut(*idx) {
                    run.text = text.clone();
                }
            }
        }
        BlockEdit::Collapse(text) => {
            block.runs.truncate(1);
            match block.runs.first_mut() {
                Some(run) => run.text = text.clone(),
                None => block.runs.push(Run::new(text.clone())),
            }
        }
    }
}

/// Run texts as they will read after the edit is applied. Used to evaluate
/// strike rules against the post-substitution text.
pub fn edited_run_texts(block: &Block, edit: &BlockEdit) -> Vec<String> {
    match edit {
        BlockEdit::Unchanged => block.runs.iter().map(|r| r.text.clone()).collect(),
        BlockEdit::Spans(edits) => {
            let mut texts: Vec<String> = block.runs.iter().map(|r| r.text.clone()).collect();
            for (idx, text) in edits {
                if let Some(slot) = texts.get_mut(*idx) {
                    *slot = text.clone();
                }
            }
            texts
        }
        BlockEdit::Collapse(text) => vec![text.clone()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::TokenCatalog;
    use pretty_assertions::assert_eq;

    fn catalog() -> TokenCatalog {
        TokenCatalog::new([
            ("XXX1", "Acme Tour"),
            ("XXX10", "OUI"),
            ("COMPTENUM", "C-042"),
        ])
    }

    #[test]
    fn single_run_exact_match_replaces_verbatim() {
        let block = Block::from_texts(["  XXX1 "]);
        // Trimming applies to the match decision only; the run ends up with
        // the resolved value verbatim.
        assert_eq!(
            substitute_block(&block, &catalog()),
            BlockEdit::Spans(vec![(0, "Acme Tour".to_string())])
        );
    }

    #[test]
    fn longest_token_wins_over_embedded_prefix() {
        let block = Block::from_texts(["Precommande: XXX10"]);
        assert_eq!(
            substitute_block(&block, &catalog()),
            BlockEdit::Collapse("Precommande: OUI".to_string())
        );
    }

    #[test]
    fn fragmented_token_collapses_block() {
        let block = Block::from_texts(["Precommande: XXX", "10"]);
        assert_eq!(
            substitute_block(&block, &catalog()),
            BlockEdit::Collapse("Precommande: OUI".to_string())
        );
    }

    #[test]
    fn invisible_interleaved_token_is_found() {
        let block = Block::from_texts(["Projet: XX\u{200B}X1"]);
        assert_eq!(
            substitute_block(&block, &catalog()),
            BlockEdit::Collapse("Projet: Acme Tour".to_string())
        );
    }

    #[test]
    fn untouched_block_is_unchanged() {
        let block = Block::from_texts(["Nothing to see here"]);
        assert!(substitute_block(&block, &catalog()).is_unchanged());
    }

    #[test]
    fn run_exact_pass_satisfies_block_pass() {
        // Once the run-exact pass resolved the only token, the block pass
        // must not fire (the value itself is not re-matched).
        let block = Block::from_texts(["XXX1"]);
        let edit = substitute_block(&block, &catalog());
        assert_eq!(edit, BlockEdit::Spans(vec![(0, "Acme Tour".to_string())]));
    }

    #[test]
    fn value_containing_token_characters_is_not_rematched() {
        let catalog = TokenCatalog::new([("AB", "ABAB")]);
        assert_eq!(substitute_text("xxAByy", &catalog).unwrap(), "xxABAByy");
    }

    #[test]
    fn substitute_text_exact_cell() {
        assert_eq!(substitute_text("XXX1", &catalog()).unwrap(), "Acme Tour");
        assert_eq!(substitute_text(" XXX1 ", &catalog()).unwrap(), "Acme Tour");
        assert_eq!(substitute_text("plain", &catalog()), None);
    }

    #[test]
    fn collapse_creates_run_when_block_had_none() {
        let mut block = Block::default();
        apply_edit(&mut block, &BlockEdit::Collapse("text".to_string()));
        assert_eq!(block.runs.len(), 1);
        assert_eq!(block.text(), "text");
    }

    #[test]
    fn collapse_drops_every_run_but_the_first() {
        let mut block = Block::from_texts(["a", "b", "c"]);
        apply_edit(&mut block, &BlockEdit::Collapse("done".to_string()));
        assert_eq!(block.runs.len(), 1);
        assert_eq!(block.text(), "done");
    }

    #[test]
    fn edited_run_texts_reflect_collapse() {
        let block = Block::from_texts(["a", "b"]);
        assert_eq!(
            edited_run_texts(&block, &BlockEdit::Collapse("z".to_string())),
            vec!["z".to_string()]
        );
    }
}
