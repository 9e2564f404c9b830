use gabarit_model::FillRecord;

/// One placeholder token bound to its resolved value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBinding {
    pub token: String,
    pub value: String,
}

/// Immutable, ordered token → value mapping.
///
/// Entries are ordered by descending token length (char count), ties broken
/// by declaration order. Every substitution pass iterates in this order so
/// a token whose text is a substring of another (`XXX1` inside `XXX10`) is
/// never matched before the longer token is resolved.
#[derive(Debug, Clone, Default)]
pub struct TokenCatalog {
    entries: Vec<TokenBinding>,
}

impl TokenCatalog {
    pub fn new<I, T, V>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (T, V)>,
        T: Into<String>,
        V: Into<String>,
    {
        let mut entries: Vec<TokenBinding> = bindings
            .into_iter()
            .map(|(token, value)| TokenBinding {
                token: token.into(),
                value: value.into(),
            })
            .collect();
        // Stable sort keeps declaration order for equal-length tokens.
        entries.sort_by_key(|b| std::cmp::Reverse(b.token.chars().count()));
        Self { entries }
    }

    pub fn entries(&self) -> &[TokenBinding] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenBinding> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Token catalog for the contract document family (`XXX1..XXX15`,
/// `COMPTENUM`).
pub fn contract_tokens(record: &FillRecord) -> TokenCatalog {
    TokenCatalog::new([
        ("XXX1", record.text("nomProjet")),
        ("XXX2", record.text("typeProjet")),
        ("XXX3", record.text("commercial")),
        ("XXX4", record.raison_sociale("clientName")),
        ("XXX5", record.text("compteClientRef")),
        ("XXX6", record.text("contactsClient")),
        ("XXX7", record.text("dateMiseEnLigne")),
        ("XXX8", record.text("dateCommercialisation")),
        ("XXX9", record.text("dateSortieOfficielle")),
        ("XXX10", record.yes_no("precommande").to_string()),
        ("XXX11", record.yes_no("dedicaceEnvisagee").to_string()),
        ("XXX12", record.text("boutiqueEnLigne")),
        ("XXX13", record.text("chefProjet")),
        (
            "XXX14",
            record.first_text(&["dateDemarageProjet", "demarrageProjet"]),
        ),
        ("XXX15", record.text("contactsClient")),
        ("COMPTENUM", record.text("compteClientRef")),
    ])
}

/// Token catalog for the merch spreadsheet headers.
pub fn merch_tokens(record: &FillRecord) -> TokenCatalog {
    let nom_projet = record.text("nomProjet");
    let shopify_domain = record.text("shopifyDomain");
    TokenCatalog::new([
        ("SHOPIFY_DOMAIN", shopify_domain.clone()),
        ("shopifyDomain", shopify_domain),
        ("nonProjet", nom_projet.clone()),
        ("nomProjet", nom_projet.clone()),
        ("CLIENT", nom_projet.clone()),
        ("PROJET", nom_projet),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: serde_json::Value) -> FillRecord {
        FillRecord::from_value(value).unwrap()
    }

    #[test]
    fn entries_are_ordered_longest_first() {
        let catalog = TokenCatalog::new([("XXX1", "a"), ("COMPTENUM", "b"), ("XXX10", "c")]);
        let tokens: Vec<&str> = catalog.iter().map(|b| b.token.as_str()).collect();
        assert_eq!(tokens, ["COMPTENUM", "XXX10", "XXX1"]);
    }

    #[test]
    fn equal_length_tokens_keep_declaration_order() {
        let catalog = TokenCatalog::new([("nonProjet", "a"), ("nomProjet", "b")]);
        let tokens: Vec<&str> = catalog.iter().map(|b| b.token.as_str()).collect();
        assert_eq!(tokens, ["nonProjet", "nomProjet"]);
    }

    #[test]
    fn contract_tokens_render_booleans_as_oui_non() {
        let catalog = contract_tokens(&record(json!({
            "nomProjet": "Acme Tour",
            "precommande": true
        })));
        let find = |t: &str| {
            catalog
                .iter()
                .find(|b| b.token == t)
                .map(|b| b.value.clone())
                .unwrap()
        };
        assert_eq!(find("XXX1"), "Acme Tour");
        assert_eq!(find("XXX10"), "OUI");
        assert_eq!(find("XXX11"), "NON");
        assert_eq!(find("XXX2"), "");
    }

    #[test]
    fn short_tokens_sort_after_their_superstrings() {
        let catalog = contract_tokens(&record(json!({})));
        let pos = |t: &str| catalog.iter().position(|b| b.token == t).unwrap();
        assert!(pos("XXX10") < pos("XXX1"));
        assert!(pos("XXX15") < pos("XXX1"));
    }
}
