use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::scalar_text;

/// One merch product record from the payload's `products` list.
///
/// Upstream payloads are not canonical about field names, so the historical
/// aliases are all accepted. `stock` maps a `size-color` composite key (or a
/// bare size) to a stock count that may arrive as a number or a digit string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Product {
    #[serde(rename = "typeProduit", alias = "type")]
    pub type_produit: String,
    #[serde(rename = "titre", alias = "title")]
    pub titre: String,
    pub description: String,
    #[serde(rename = "codeEAN", alias = "ean", alias = "codeBarres")]
    pub code_ean: String,
    #[serde(rename = "poids", alias = "weight")]
    pub poids: Value,
    #[serde(rename = "prix", alias = "price")]
    pub prix: Value,
    #[serde(rename = "occ", alias = "OCC")]
    pub occ: bool,
    pub couleurs: Vec<String>,
    pub tailles: Vec<String>,
    pub stock: BTreeMap<String, Value>,
}

impl Product {
    /// Sum of every stock entry that is a non-negative integer count.
    pub fn total_stock(&self) -> u64 {
        self.stock.values().filter_map(stock_count).sum()
    }

    /// Stock for one size across all colors: entries whose composite key
    /// starts with `<size>-`, plus bare entries equal to the size.
    pub fn size_stock(&self, size: &str) -> u64 {
        self.stock
            .iter()
            .filter_map(|(key, value)| {
                let matches = match key.split_once('-') {
                    Some((entry_size, _color)) => entry_size == size,
                    None => key == size,
                };
                if matches {
                    stock_count(value)
                } else {
                    None
                }
            })
            .sum()
    }

    pub fn couleurs_joined(&self) -> String {
        self.couleurs.join(", ")
    }

    pub fn tailles_joined(&self) -> String {
        self.tailles.join(", ")
    }

    pub fn poids_text(&self) -> String {
        scalar_text(&self.poids)
    }

    pub fn prix_text(&self) -> String {
        scalar_text(&self.prix)
    }
}

fn stock_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}
