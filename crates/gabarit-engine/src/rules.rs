use gabarit_model::FillRecord;

/// A conditional formatting rule: a literal text fragment paired with the
/// record flag that keeps it alive. When the flag is false (or absent) the
/// fragment is struck through wherever it appears.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrikeRule {
    pub fragment: String,
    pub condition_key: String,
}

impl StrikeRule {
    pub fn new(fragment: impl Into<String>, condition_key: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            condition_key: condition_key.into(),
        }
    }

    /// Rules are independent: each is evaluated once per record, and firing
    /// marks text for strike-through.
    pub fn fires(&self, record: &FillRecord) -> bool {
        !record.flag(&self.condition_key)
    }
}

/// The built-in contract rules: each unselected subscription plan line is
/// struck. The fragment text must match the template text exactly.
pub fn contract_strike_rules() -> Vec<StrikeRule> {
    vec![
        StrikeRule::new(
            "Abonnement mensurel SHOPIFY (12 mois) 948 euro",
            "shopifyPlanMonthlySelected",
        ),
        StrikeRule::new(
            "Abonnement annuel SHOPIFY (12 mois) 948 euro",
            "shopifyPlanYearlySelected",
        ),
    ]
}

/// Indices of the runs to strike for one fired rule: every run whose own
/// text contains the fragment, provided the block as a whole contains it.
///
/// Additive and idempotent: marking an already-struck run is a no-op at the
/// container level.
pub fn runs_to_strike(run_texts: &[String], fragment: &str) -> Vec<usize> {
    if fragment.is_empty() {
        return Vec::new();
    }
    let block_text: String = run_texts.concat();
    if !block_text.contains(fragment) {
        return Vec::new();
    }
    run_texts
        .iter()
        .enumerate()
        .filter(|(_, text)| text.contains(fragment))
        .map(|(idx, _)| idx)
        .collect()
}
