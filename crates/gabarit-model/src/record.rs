use serde_json::{Map, Value};
use thiserror::Error;

use crate::Product;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("payload is not a JSON object (got {0})")]
    NotAnObject(&'static str),
    #[error("invalid product record at index {index}: {source}")]
    InvalidProduct {
        index: usize,
        source: serde_json::Error,
    },
}

/// The decoded input record: a flat field-name → value mapping plus an
/// optional `products` list.
///
/// Computed once per invocation and immutable thereafter; every accessor has
/// a defined default (empty string / `false`) for absent keys, matching the
/// tolerant lookup behavior the upstream payloads rely on.
#[derive(Debug, Clone)]
pub struct FillRecord {
    fields: Map<String, Value>,
}

impl FillRecord {
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            Value::Null => Err(RecordError::NotAnObject("null")),
            Value::Bool(_) => Err(RecordError::NotAnObject("bool")),
            Value::Number(_) => Err(RecordError::NotAnObject("number")),
            Value::String(_) => Err(RecordError::NotAnObject("string")),
            Value::Array(_) => Err(RecordError::NotAnObject("array")),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// Field rendered as text; absent, null and empty values all yield `""`.
    pub fn text(&self, key: &str) -> String {
        self.fields.get(key).map(scalar_text).unwrap_or_default()
    }

    /// Boolean field; absent or non-boolean values count as `false`.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.fields.get(key), Some(Value::Bool(true)))
    }

    /// Boolean field rendered in the fixed `OUI`/`NON` vocabulary.
    pub fn yes_no(&self, key: &str) -> &'static str {
        if self.flag(key) {
            "OUI"
        } else {
            "NON"
        }
    }

    /// First key in `keys` with a non-empty text rendering, else `""`.
    pub fn first_text(&self, keys: &[&str]) -> String {
        keys.iter()
            .map(|k| self.text(k))
            .find(|t| !t.is_empty())
            .unwrap_or_default()
    }

    /// Legal name of the client: `raisonSociale` when present, otherwise the
    /// leading `_`-segment of the fallback key (`clientName`/`customerName`).
    pub fn raison_sociale(&self, fallback_key: &str) -> String {
        let direct = self.text("raisonSociale");
        if !direct.is_empty() {
            return direct;
        }
        let fallback = self.text(fallback_key);
        fallback
            .split('_')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Structured merch product records under `products` (absent → empty).
    pub fn products(&self) -> Result<Vec<Product>, RecordError> {
        let Some(Value::Array(items)) = self.fields.get("products") else {
            return Ok(Vec::new());
        };
        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                serde_json::from_value(item.clone())
                    .map_err(|source| RecordError::InvalidProduct { index, source })
            })
            .collect()
    }
}

/// Render a JSON scalar the way it should appear in a filled document.
///
/// Booleans deliberately render as `true`/`false` here; fields with the
/// `OUI`/`NON` business vocabulary go through [`FillRecord::yes_no`] instead.
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> FillRecord {
        FillRecord::from_value(value).unwrap()
    }

    #[test]
    fn rejects_non_objects() {
        assert!(FillRecord::from_value(json!([1, 2])).is_err());
        assert!(FillRecord::from_value(json!("text")).is_err());
    }

    #[test]
    fn text_defaults_to_empty() {
        let r = record(json!({"nomProjet": "Acme Tour", "n": 3}));
        assert_eq!(r.text("nomProjet"), "Acme Tour");
        assert_eq!(r.text("n"), "3");
        assert_eq!(r.text("missing"), "");
    }

    #[test]
    fn yes_no_rendering() {
        let r = record(json!({"precommande": true, "dedicaceEnvisagee": false}));
        assert_eq!(r.yes_no("precommande"), "OUI");
        assert_eq!(r.yes_no("dedicaceEnvisagee"), "NON");
        assert_eq!(r.yes_no("absent"), "NON");
    }

    #[test]
    fn raison_sociale_falls_back_to_client_name_prefix() {
        let r = record(json!({"clientName": "Acme_Records_42"}));
        assert_eq!(r.raison_sociale("clientName"), "Acme");

        let r = record(json!({"raisonSociale": "Acme SARL", "clientName": "x_y"}));
        assert_eq!(r.raison_sociale("clientName"), "Acme SARL");
    }

    #[test]
    fn first_text_picks_first_non_empty() {
        let r = record(json!({"dateSortie": "", "dateAlbum": "2025-06-01"}));
        assert_eq!(
            r.first_text(&["dateSortie", "dateDeSortie", "dateAlbum"]),
            "2025-06-01"
        );
    }
}
