//! The contract-document pipeline: scan, plan, rewrite, save, repair.

use std::path::Path;

use gabarit_engine::{
    contract_strike_rules, contract_tokens, edited_run_texts, runs_to_strike, substitute_block,
    BlockEdit, StrikeRule, TokenCatalog,
};
use gabarit_model::{Block, FillRecord};
use gabarit_opc::OpcPackage;
use tracing::{debug, warn};

use crate::repair::repair_saved_package;
use crate::rewrite::apply_plans;
use crate::{scan_blocks, DocxError, DOCUMENT_PART};

/// Planned outcome for one block: the substitution edit plus the indexes
/// of runs to strike through, computed against the post-substitution run
/// texts.
#[derive(Debug, Clone)]
pub struct BlockPlan {
    pub edit: BlockEdit,
    pub strike_runs: Vec<usize>,
}

impl BlockPlan {
    pub fn is_noop(&self) -> bool {
        matches!(self.edit, BlockEdit::Unchanged) && self.strike_runs.is_empty()
    }
}

/// What the fill did, for logging and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxFillReport {
    pub blocks_scanned: usize,
    pub blocks_edited: usize,
    pub runs_struck: usize,
    pub repair_applied: bool,
}

/// Plan edits and strikes for every block.
pub fn plan_blocks(
    blocks: &[Block],
    catalog: &TokenCatalog,
    rules: &[StrikeRule],
    record: &FillRecord,
) -> Vec<BlockPlan> {
    blocks
        .iter()
        .map(|block| {
            let edit = substitute_block(block, catalog);
            let edited = edited_run_texts(block, &edit);
            let mut strike_runs: Vec<usize> = Vec::new();
            for rule in rules {
                if !rule.fires(record) {
                    continue;
                }
                for idx in runs_to_strike(&edited, &rule.fragment) {
                    if !strike_runs.contains(&idx) {
                        strike_runs.push(idx);
                    }
                }
            }
            strike_runs.sort_unstable();
            BlockPlan { edit, strike_runs }
        })
        .collect()
}

/// Fill a contract template with the record's values and write the result
/// to `output`.
///
/// The document story is rewritten in a single streaming pass, the package
/// is saved atomically, then the raw-markup repair sweeps the saved word
/// parts for placeholders that were split beyond what the run model could
/// see. Repair is best effort: if it fails the substituted output stands.
pub fn fill_docx(
    template: impl AsRef<Path>,
    record: &FillRecord,
    output: impl AsRef<Path>,
) -> Result<DocxFillReport, DocxError> {
    let output = output.as_ref();
    let mut pkg = OpcPackage::from_path(template)?;
    let doc = pkg.required_part(DOCUMENT_PART)?.to_vec();

    let blocks = scan_blocks(&doc)?;
    let catalog = contract_tokens(record);
    let rules = contract_strike_rules();
    let plans = plan_blocks(&blocks, &catalog, &rules, record);

    let blocks_edited = plans
        .iter()
        .filter(|p| !matches!(p.edit, BlockEdit::Unchanged))
        .count();
    let runs_struck: usize = plans.iter().map(|p| p.strike_runs.len()).sum();

    if plans.iter().any(|p| !p.is_noop()) {
        let rewritten = apply_plans(&doc, &blocks, &plans)?;
        pkg.set_part(DOCUMENT_PART, rewritten);
    }
    pkg.save(output)?;
    debug!(
        blocks = blocks.len(),
        edited = blocks_edited,
        struck = runs_struck,
        "document story rewritten"
    );

    let repair_applied = match repair_saved_package(output, &catalog) {
        Ok(changed) => changed,
        Err(err) => {
            warn!(error = %err, "raw markup repair failed, keeping substituted output");
            false
        }
    };

    Ok(DocxFillReport {
        blocks_scanned: blocks.len(),
        blocks_edited,
        runs_struck,
        repair_applied,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FillRecord {
        FillRecord::from_value(value).unwrap()
    }

    #[test]
    fn plans_strike_on_post_substitution_text() {
        // The strike fragment only appears once XXX tokens are replaced.
        let rec = record(json!({
            "nomProjet": "Abonnement mensurel SHOPIFY (12 mois) 948 euro",
            "shopifyPlanMonthlySelected": false
        }));
        let catalog = contract_tokens(&rec);
        let rules = contract_strike_rules();
        let blocks = vec![Block::from_texts(["XXX1"])];
        let plans = plan_blocks(&blocks, &catalog, &rules, &rec);
        assert!(matches!(plans[0].edit, BlockEdit::Spans(_)));
        assert_eq!(plans[0].strike_runs, vec![0]);
    }

    #[test]
    fn selected_plan_is_not_struck() {
        let rec = record(json!({
            "shopifyPlanMonthlySelected": true
        }));
        let catalog = contract_tokens(&rec);
        let rules = contract_strike_rules();
        let blocks = vec![Block::from_texts([
            "Abonnement mensurel SHOPIFY (12 mois) 948 euro",
        ])];
        let plans = plan_blocks(&blocks, &catalog, &rules, &rec);
        assert!(plans[0].strike_runs.is_empty());
    }
}
